//! Per-asset main-chain state.
//!
//! An [`AssetChain`] holds the resolved metadata of every unit on one asset:
//! levels, witnessed levels, best parents, the current main chain and the
//! stable prefix. It never holds unit data; the resolver's arena does.
//!
//! Invariants:
//! - `main_chain[i]` has best-parent depth `i`, so indices are gap-free;
//! - `main_chain[..=last_stable]` never changes once stable;
//! - every free unit has no known child on this asset;
//! - the main-chain tip's best-parent path runs through the last stable
//!   unit, and so does every unit built on it.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use weave_types::{Address, AssetId, Hash};

use crate::header::ChainIndex;

/// Resolved metadata for one unit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnitProps {
    pub hash: Hash,
    pub asset: AssetId,
    pub author: Address,
    /// Parents on the same asset; cross-asset parents are not listed.
    pub parents: Vec<Hash>,
    pub children: Vec<Hash>,
    pub level: u64,
    pub witnessed_level: u64,
    pub best_parent: Option<Hash>,
    /// Length of the best-parent path down to the asset root.
    pub depth: u64,
    pub is_free: bool,
    pub is_on_main_chain: bool,
    pub is_stable: bool,
    /// Highest level each active witness authored in this unit's ancestry.
    pub witness_levels: BTreeMap<Address, u64>,
    pub(crate) confirmed: bool,
}

impl UnitProps {
    /// Main-chain position, or the best-parent depth for side units.
    pub fn chain_index(&self) -> ChainIndex {
        ChainIndex::new(self.asset, self.is_on_main_chain, self.depth)
    }

    /// Highest witnessed level first, then smallest hash.
    fn rank(&self) -> (u64, Reverse<Hash>) {
        (self.witnessed_level, Reverse(self.hash))
    }
}

/// What one insertion changed on the chain.
#[derive(Debug, Default)]
pub(crate) struct ChainUpdate {
    pub joined_main: Vec<(ChainIndex, Hash)>,
    pub left_main: Vec<Hash>,
    pub stabilized: Vec<(ChainIndex, Hash)>,
    /// Units joining the main chain for the first time.
    pub first_confirmations: Vec<Hash>,
}

/// The k-th highest witness level, k being the majority; 0 while fewer
/// than a majority of witnesses appear.
pub(crate) fn witnessed_level(levels: &BTreeMap<Address, u64>, majority: usize) -> u64 {
    if majority == 0 || levels.len() < majority {
        return 0;
    }
    let mut values: Vec<u64> = levels.values().copied().collect();
    values.sort_unstable_by(|a, b| b.cmp(a));
    values[majority - 1]
}

pub(crate) struct AssetChain {
    asset: AssetId,
    props: HashMap<Hash, UnitProps>,
    free: BTreeSet<Hash>,
    main_chain: Vec<Hash>,
    last_stable: usize,
}

impl AssetChain {
    /// Open a chain at `root`, which is main-chain index 0 and stable.
    pub fn with_root(asset: AssetId, root: Hash, author: Address, witnesses: &[Address]) -> Self {
        let mut witness_levels = BTreeMap::new();
        if witnesses.contains(&author) {
            witness_levels.insert(author.clone(), 0);
        }
        let props = UnitProps {
            hash: root,
            asset,
            author,
            parents: Vec::new(),
            children: Vec::new(),
            level: 0,
            witnessed_level: 0,
            best_parent: None,
            depth: 0,
            is_free: true,
            is_on_main_chain: true,
            is_stable: true,
            witness_levels,
            confirmed: true,
        };
        let mut free = BTreeSet::new();
        free.insert(root);
        Self {
            asset,
            props: HashMap::from([(root, props)]),
            free,
            main_chain: vec![root],
            last_stable: 0,
        }
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.props.contains_key(hash)
    }

    pub fn props(&self, hash: &Hash) -> Option<&UnitProps> {
        self.props.get(hash)
    }

    pub fn main_chain(&self) -> &[Hash] {
        &self.main_chain
    }

    pub fn last_stable_index(&self) -> u64 {
        self.last_stable as u64
    }

    pub fn len(&self) -> usize {
        self.props.len()
    }

    /// Free units, most preferred first.
    pub fn free_units(&self) -> Vec<Hash> {
        let mut free: Vec<&UnitProps> = self.free.iter().filter_map(|h| self.props.get(h)).collect();
        free.sort_by_key(|p| Reverse(p.rank()));
        free.into_iter().map(|p| p.hash).collect()
    }

    /// Children of `hash` on this asset.
    pub fn children(&self, hash: &Hash) -> &[Hash] {
        self.props
            .get(hash)
            .map(|p| p.children.as_slice())
            .unwrap_or(&[])
    }

    /// Record a unit whose same-asset parents are all present, then move
    /// the main chain and the stable point.
    pub fn insert(
        &mut self,
        hash: Hash,
        author: Address,
        parents: Vec<Hash>,
        witnesses: &[Address],
        majority: usize,
    ) -> ChainUpdate {
        let parent_props: Vec<&UnitProps> =
            parents.iter().filter_map(|p| self.props.get(p)).collect();
        debug_assert_eq!(parent_props.len(), parents.len());

        let level = parent_props.iter().map(|p| p.level).max().unwrap_or(0) + 1;

        let mut witness_levels = BTreeMap::new();
        for parent in &parent_props {
            for (witness, lvl) in &parent.witness_levels {
                if witnesses.contains(witness) {
                    let entry = witness_levels.entry(witness.clone()).or_insert(0);
                    *entry = (*entry).max(*lvl);
                }
            }
        }
        if witnesses.contains(&author) {
            witness_levels.insert(author.clone(), level);
        }
        let wl = witnessed_level(&witness_levels, majority);

        // Parents whose best-parent path bypasses the last stable unit only
        // compete when no parent runs through it.
        let anchor = self.main_chain[self.last_stable];
        let anchored: Vec<&UnitProps> = parent_props
            .iter()
            .copied()
            .filter(|p| self.passes_through(&p.hash, &anchor))
            .collect();
        let candidates = if anchored.is_empty() {
            &parent_props
        } else {
            &anchored
        };
        let best = candidates.iter().max_by_key(|p| p.rank());
        let best_parent = best.map(|p| p.hash);
        let depth = best.map(|p| p.depth + 1).unwrap_or(0);

        for parent in &parents {
            if let Some(p) = self.props.get_mut(parent) {
                p.children.push(hash);
                p.is_free = false;
            }
            self.free.remove(parent);
        }

        self.props.insert(
            hash,
            UnitProps {
                hash,
                asset: self.asset,
                author,
                parents,
                children: Vec::new(),
                level,
                witnessed_level: wl,
                best_parent,
                depth,
                is_free: true,
                is_on_main_chain: false,
                is_stable: false,
                witness_levels,
                confirmed: false,
            },
        );
        self.free.insert(hash);

        let mut update = ChainUpdate::default();
        self.update_main_chain(&mut update);
        self.update_stability(witnesses, majority, &mut update);
        update
    }

    /// Whether the best-parent path from `from` runs through `anchor`.
    fn passes_through(&self, from: &Hash, anchor: &Hash) -> bool {
        let Some(anchor_depth) = self.props.get(anchor).map(|p| p.depth) else {
            return false;
        };
        let mut cursor = *from;
        loop {
            let Some(props) = self.props.get(&cursor) else {
                return false;
            };
            if props.depth <= anchor_depth {
                return cursor == *anchor;
            }
            match props.best_parent {
                Some(bp) => cursor = bp,
                None => return false,
            }
        }
    }

    fn select_tip(&self) -> Option<Hash> {
        let anchor = self.main_chain[self.last_stable];
        self.free
            .iter()
            .filter(|h| self.passes_through(h, &anchor))
            .filter_map(|h| self.props.get(h))
            .max_by_key(|p| p.rank())
            .map(|p| p.hash)
    }

    fn update_main_chain(&mut self, update: &mut ChainUpdate) {
        let Some(tip) = self.select_tip() else {
            return;
        };
        let stable_depth = self.last_stable as u64;
        let mut path = Vec::new();
        let mut cursor = tip;
        while let Some(props) = self.props.get(&cursor) {
            if props.depth <= stable_depth {
                break;
            }
            path.push(cursor);
            match props.best_parent {
                Some(bp) => cursor = bp,
                None => break,
            }
        }
        path.reverse();

        let base = self.last_stable + 1;
        let shared = path
            .iter()
            .zip(self.main_chain[base..].iter())
            .take_while(|(a, b)| a == b)
            .count();

        for dropped in self.main_chain.split_off(base + shared) {
            if let Some(p) = self.props.get_mut(&dropped) {
                p.is_on_main_chain = false;
            }
            update.left_main.push(dropped);
        }
        for hash in path.into_iter().skip(shared) {
            let index = self.main_chain.len() as u64;
            if let Some(p) = self.props.get_mut(&hash) {
                debug_assert_eq!(p.depth, index);
                p.is_on_main_chain = true;
                if !p.confirmed {
                    p.confirmed = true;
                    update.first_confirmations.push(hash);
                }
            }
            self.main_chain.push(hash);
            update
                .joined_main
                .push((ChainIndex::new(self.asset, true, index), hash));
        }
    }

    fn update_stability(&mut self, witnesses: &[Address], majority: usize, update: &mut ChainUpdate) {
        while let Some(&candidate) = self.main_chain.get(self.last_stable + 1) {
            if !self.can_stabilize(&candidate, witnesses, majority) {
                break;
            }
            self.last_stable += 1;
            if let Some(p) = self.props.get_mut(&candidate) {
                p.is_stable = true;
            }
            update.stabilized.push((
                ChainIndex::new(self.asset, true, self.last_stable as u64),
                candidate,
            ));
        }
    }

    /// A main-chain unit is stable once a majority of witnesses built on
    /// it and no free unit outside its descendants can outrank its level.
    fn can_stabilize(&self, candidate: &Hash, witnesses: &[Address], majority: usize) -> bool {
        let Some(level) = self.props.get(candidate).map(|p| p.level) else {
            return false;
        };
        if majority == 0 || self.witness_support(candidate, witnesses) < majority {
            return false;
        }
        self.free.iter().all(|tip| {
            self.has_ancestor(tip, candidate, level)
                || self
                    .props
                    .get(tip)
                    .map(|p| p.witnessed_level < level)
                    .unwrap_or(true)
        })
    }

    /// Distinct active witnesses among the authors of `root` and its
    /// descendants.
    fn witness_support(&self, root: &Hash, witnesses: &[Address]) -> usize {
        let mut authors: HashSet<&Address> = HashSet::new();
        let mut seen: HashSet<Hash> = HashSet::new();
        let mut queue = VecDeque::from([*root]);
        while let Some(hash) = queue.pop_front() {
            if !seen.insert(hash) {
                continue;
            }
            let Some(props) = self.props.get(&hash) else {
                continue;
            };
            if witnesses.contains(&props.author) {
                authors.insert(&props.author);
            }
            queue.extend(props.children.iter().copied());
        }
        authors.len()
    }

    /// Whether `ancestor` (at `ancestor_level`) is reachable from `from`
    /// through parent links. Levels strictly decrease along parent links, so
    /// the walk stops at that level.
    fn has_ancestor(&self, from: &Hash, ancestor: &Hash, ancestor_level: u64) -> bool {
        let mut seen: HashSet<Hash> = HashSet::new();
        let mut stack = vec![*from];
        while let Some(hash) = stack.pop() {
            if hash == *ancestor {
                return true;
            }
            if !seen.insert(hash) {
                continue;
            }
            let Some(props) = self.props.get(&hash) else {
                continue;
            };
            if props.level <= ancestor_level {
                continue;
            }
            stack.extend(props.parents.iter().copied());
        }
        false
    }
}
