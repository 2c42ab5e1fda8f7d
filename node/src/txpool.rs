//! In-memory transaction pool for a single node.

use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use weave_dag::{DagError, Transaction, TxPool};
use weave_types::Hash;

struct PoolState {
    queue: VecDeque<Transaction>,
    known: HashSet<Hash>,
}

/// FIFO queue of verified transactions. Confirmed transactions are evicted
/// as soon as the resolver reports them.
pub struct LocalTxPool {
    state: Mutex<PoolState>,
    max_size: usize,
}

impl LocalTxPool {
    pub fn new(max_size: usize) -> Self {
        Self {
            state: Mutex::new(PoolState {
                queue: VecDeque::new(),
                known: HashSet::new(),
            }),
            max_size,
        }
    }

    /// Queue `tx`. Returns `Ok(false)` for a transaction already queued or a
    /// full pool.
    pub fn add(&self, tx: Transaction) -> Result<bool, DagError> {
        tx.verify()?;
        let mut state = self.state.lock();
        if state.queue.len() >= self.max_size || !state.known.insert(tx.hash()) {
            return Ok(false);
        }
        state.queue.push_back(tx);
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TxPool for LocalTxPool {
    fn pending(&self) -> Vec<Transaction> {
        self.state.lock().queue.iter().cloned().collect()
    }

    fn notify_confirmed(&self, unit_hash: &Hash, tx_hashes: &[Hash]) {
        if tx_hashes.is_empty() {
            return;
        }
        let confirmed: HashSet<&Hash> = tx_hashes.iter().collect();
        let mut state = self.state.lock();
        let before = state.queue.len();
        state.queue.retain(|tx| !confirmed.contains(&tx.hash()));
        for hash in tx_hashes {
            state.known.remove(hash);
        }
        tracing::debug!(
            unit = %unit_hash,
            evicted = before - state.queue.len(),
            "confirmed transactions evicted from pool"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weave_dag::{Message, Payload, TextPayload};
    use weave_types::{Address, Timestamp};

    fn tx(nonce: u64) -> Transaction {
        Transaction::new(
            nonce,
            Address::new("P1sender"),
            1,
            vec![Message::new(Payload::Text(TextPayload {
                text: format!("{nonce}"),
            }))],
            Timestamp::new(nonce),
        )
    }

    #[test]
    fn fifo_with_dedup() {
        let pool = LocalTxPool::new(8);
        assert!(pool.add(tx(1)).unwrap());
        assert!(pool.add(tx(2)).unwrap());
        assert!(!pool.add(tx(1)).unwrap());
        let pending: Vec<u64> = pool.pending().iter().map(Transaction::nonce).collect();
        assert_eq!(pending, vec![1, 2]);
    }

    #[test]
    fn bounded() {
        let pool = LocalTxPool::new(1);
        assert!(pool.add(tx(1)).unwrap());
        assert!(!pool.add(tx(2)).unwrap());
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn confirmation_evicts() {
        let pool = LocalTxPool::new(8);
        pool.add(tx(1)).unwrap();
        pool.add(tx(2)).unwrap();
        pool.notify_confirmed(&Hash::ZERO, &[tx(1).hash()]);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.pending()[0].nonce(), 2);
        assert!(pool.add(tx(1)).unwrap());
    }
}
