//! Units waiting for parents that have not arrived yet.
//!
//! Each entry is keyed by the unit's hash and indexed by every parent it is
//! still missing. When a parent is admitted, [`PendingUnits::resolve`] hands
//! back the dependents that now have everything. Entries carry a deadline;
//! [`PendingUnits::expire`] evicts the overdue ones. The table is bounded and
//! evicts its oldest entry when full.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use tokio::sync::oneshot;
use tokio::time::Instant;
use weave_dag::{ChainIndex, Unit};
use weave_types::Hash;

use crate::NodeError;

/// Answers a `submit_unit` caller once its unit is settled.
pub type Waiter = oneshot::Sender<Result<ChainIndex, NodeError>>;

pub struct PendingEntry {
    pub unit: Unit,
    /// Parents not yet admitted.
    pub missing: BTreeSet<Hash>,
    pub deadline: Instant,
    pub waiters: Vec<Waiter>,
    seq: u64,
}

impl PendingEntry {
    pub fn hash(&self) -> Hash {
        self.unit.hash()
    }

    /// Fail every waiter with the error built by `err`.
    pub fn fail(self, err: impl Fn() -> NodeError) {
        for waiter in self.waiters {
            let _ = waiter.send(Err(err()));
        }
    }
}

pub struct PendingUnits {
    entries: HashMap<Hash, PendingEntry>,
    /// missing parent → units waiting on it
    dependents: HashMap<Hash, BTreeSet<Hash>>,
    /// arrival order, for oldest-first eviction
    order: BTreeMap<u64, Hash>,
    next_seq: u64,
    max_size: usize,
}

impl PendingUnits {
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: HashMap::new(),
            dependents: HashMap::new(),
            order: BTreeMap::new(),
            next_seq: 0,
            max_size: max_size.max(1),
        }
    }

    /// Park `unit` until `missing` arrive. A unit already parked keeps its
    /// place and deadline and gains `waiters`. Returns the entry evicted to
    /// make room, if any.
    pub fn insert(
        &mut self,
        unit: Unit,
        missing: impl IntoIterator<Item = Hash>,
        deadline: Instant,
        waiters: Vec<Waiter>,
    ) -> Option<PendingEntry> {
        let hash = unit.hash();
        if let Some(entry) = self.entries.get_mut(&hash) {
            entry.waiters.extend(waiters);
            return None;
        }

        let evicted = if self.entries.len() >= self.max_size {
            self.pop_oldest()
        } else {
            None
        };

        let missing: BTreeSet<Hash> = missing.into_iter().collect();
        for parent in &missing {
            self.dependents.entry(*parent).or_default().insert(hash);
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.order.insert(seq, hash);
        self.entries.insert(
            hash,
            PendingEntry {
                unit,
                missing,
                deadline,
                waiters,
                seq,
            },
        );
        evicted
    }

    /// Add `waiter` to a parked unit. Hands it back if the unit is not parked.
    pub fn attach(&mut self, hash: &Hash, waiter: Waiter) -> Result<(), Waiter> {
        match self.entries.get_mut(hash) {
            Some(entry) => {
                entry.waiters.push(waiter);
                Ok(())
            }
            None => Err(waiter),
        }
    }

    /// `arrived` was admitted: drop it from every dependent's missing set
    /// and return the dependents with nothing left to wait for.
    pub fn resolve(&mut self, arrived: &Hash) -> Vec<PendingEntry> {
        let Some(waiting) = self.dependents.remove(arrived) else {
            return Vec::new();
        };
        let mut ready = Vec::new();
        for hash in waiting {
            let complete = match self.entries.get_mut(&hash) {
                Some(entry) => {
                    entry.missing.remove(arrived);
                    entry.missing.is_empty()
                }
                None => false,
            };
            if complete {
                if let Some(entry) = self.remove(&hash) {
                    ready.push(entry);
                }
            }
        }
        ready
    }

    /// Remove and return every entry whose deadline is at or before `now`,
    /// oldest first.
    pub fn expire(&mut self, now: Instant) -> Vec<PendingEntry> {
        let overdue: Vec<Hash> = self
            .order
            .values()
            .filter(|h| self.entries.get(*h).is_some_and(|e| e.deadline <= now))
            .copied()
            .collect();
        overdue.iter().filter_map(|h| self.remove(h)).collect()
    }

    /// Empty the table, oldest first.
    pub fn drain(&mut self) -> Vec<PendingEntry> {
        let hashes: Vec<Hash> = self.order.values().copied().collect();
        hashes.iter().filter_map(|h| self.remove(h)).collect()
    }

    pub fn remove(&mut self, hash: &Hash) -> Option<PendingEntry> {
        let entry = self.entries.remove(hash)?;
        self.order.remove(&entry.seq);
        for parent in &entry.missing {
            if let Some(set) = self.dependents.get_mut(parent) {
                set.remove(hash);
                if set.is_empty() {
                    self.dependents.remove(parent);
                }
            }
        }
        Some(entry)
    }

    fn pop_oldest(&mut self) -> Option<PendingEntry> {
        let (_, hash) = self.order.first_key_value()?;
        let hash = *hash;
        self.remove(&hash)
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.entries.contains_key(hash)
    }

    /// Whether some parked unit still needs `hash`.
    pub fn is_wanted(&self, hash: &Hash) -> bool {
        self.dependents.contains_key(hash)
    }

    /// Every parent some parked unit is waiting for.
    pub fn wanted(&self) -> Vec<Hash> {
        let mut hashes: Vec<Hash> = self.dependents.keys().copied().collect();
        hashes.sort();
        hashes
    }

    pub fn missing_of(&self, hash: &Hash) -> Option<Vec<Hash>> {
        self.entries
            .get(hash)
            .map(|e| e.missing.iter().copied().collect())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use weave_dag::{Header, Transaction};
    use weave_types::{AssetId, Timestamp};

    fn h(n: u8) -> Hash {
        Hash::new([n; 32])
    }

    fn unit(parents: &[Hash], nonce: u8) -> Unit {
        let header = Header::new(parents.to_vec(), vec![AssetId::PTN], 10, 0, vec![nonce]).unwrap();
        Unit::new_at(&header, Vec::<Transaction>::new(), Timestamp::EPOCH)
    }

    #[test]
    fn resolves_when_all_parents_arrive() {
        let mut pending = PendingUnits::new(8);
        let now = Instant::now();
        let u = unit(&[h(1), h(2)], 0);
        pending.insert(u.clone(), [h(1), h(2)], now, vec![]);
        assert!(pending.is_wanted(&h(1)));
        assert_eq!(pending.wanted(), vec![h(1), h(2)]);

        assert!(pending.resolve(&h(1)).is_empty());
        assert_eq!(pending.missing_of(&u.hash()), Some(vec![h(2)]));
        assert!(!pending.is_wanted(&h(1)));

        let ready = pending.resolve(&h(2));
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].hash(), u.hash());
        assert!(pending.is_empty());
        assert!(pending.wanted().is_empty());
    }

    #[test]
    fn one_parent_releases_many_dependents() {
        let mut pending = PendingUnits::new(8);
        let now = Instant::now();
        pending.insert(unit(&[h(1)], 0), [h(1)], now, vec![]);
        pending.insert(unit(&[h(1)], 1), [h(1)], now, vec![]);
        pending.insert(unit(&[h(1), h(3)], 2), [h(1), h(3)], now, vec![]);
        let ready = pending.resolve(&h(1));
        assert_eq!(ready.len(), 2);
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn full_table_evicts_oldest() {
        let mut pending = PendingUnits::new(2);
        let now = Instant::now();
        let first = unit(&[h(1)], 0);
        pending.insert(first.clone(), [h(1)], now, vec![]);
        pending.insert(unit(&[h(2)], 1), [h(2)], now, vec![]);
        let evicted = pending.insert(unit(&[h(3)], 2), [h(3)], now, vec![]);
        assert_eq!(evicted.map(|e| e.hash()), Some(first.hash()));
        assert_eq!(pending.len(), 2);
        assert!(!pending.is_wanted(&h(1)));
    }

    #[test]
    fn reinsert_keeps_entry_and_adds_waiters() {
        let mut pending = PendingUnits::new(2);
        let now = Instant::now();
        let u = unit(&[h(1)], 0);
        let (tx1, _rx1) = oneshot::channel();
        let (tx2, _rx2) = oneshot::channel();
        pending.insert(u.clone(), [h(1)], now, vec![tx1]);
        assert!(pending
            .insert(u.clone(), [h(1)], now + Duration::from_secs(60), vec![tx2])
            .is_none());
        let entry = pending.remove(&u.hash()).unwrap();
        assert_eq!(entry.waiters.len(), 2);
        assert_eq!(entry.deadline, now);
    }

    #[test]
    fn attach_returns_waiter_for_unknown_unit() {
        let mut pending = PendingUnits::new(2);
        let (tx, _rx) = oneshot::channel();
        assert!(pending.attach(&h(9), tx).is_err());
    }

    #[tokio::test]
    async fn expire_takes_overdue_entries_and_fails_waiters() {
        let mut pending = PendingUnits::new(8);
        let now = Instant::now();
        let late = unit(&[h(1)], 0);
        let (tx, rx) = oneshot::channel();
        pending.insert(late.clone(), [h(1)], now, vec![tx]);
        pending.insert(unit(&[h(2)], 1), [h(2)], now + Duration::from_secs(30), vec![]);

        let expired = pending.expire(now + Duration::from_secs(1));
        assert_eq!(expired.len(), 1);
        let hash = expired[0].hash();
        for entry in expired {
            entry.fail(|| NodeError::OrphanTimeout(hash));
        }
        assert!(matches!(rx.await.unwrap(), Err(NodeError::OrphanTimeout(x)) if x == late.hash()));
        assert_eq!(pending.len(), 1);
        assert_eq!(pending.drain().len(), 1);
        assert!(pending.is_empty());
    }
}
