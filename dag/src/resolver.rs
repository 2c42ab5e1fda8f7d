//! The main-chain resolver.
//!
//! Units live in an arena keyed by content hash (shared read, exclusive
//! insert). Resolved metadata lives in one [`AssetChain`] per asset, each
//! behind its own mutex: that mutex is the only place main-chain indices are
//! assigned, so index assignment per asset is serialized while different
//! assets and all read paths proceed concurrently.
//!
//! Lock order is always chain mutex, then arena lock.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use weave_types::{Address, AssetId, Hash};

use crate::chain::{AssetChain, UnitProps};
use crate::error::DagError;
use crate::header::ChainIndex;
use crate::ports::{TxPool, WitnessSchedule};
use crate::unit::Unit;

/// The outcome of admitting one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Insertion {
    pub hash: Hash,
    /// The unit's position right after insertion.
    pub chain_index: ChainIndex,
    /// Units that joined the main chain, in index order.
    pub joined_main: Vec<(ChainIndex, Hash)>,
    /// Units that left the main chain.
    pub left_main: Vec<Hash>,
    /// Units that became stable, in index order.
    pub stabilized: Vec<(ChainIndex, Hash)>,
    /// An earlier unit by the same author over the same parent set.
    pub double_authored: Option<Hash>,
}

pub struct MainChainResolver {
    units: RwLock<HashMap<Hash, Arc<Unit>>>,
    chains: RwLock<HashMap<AssetId, Arc<Mutex<AssetChain>>>>,
    genesis: Hash,
    txpool: Option<Arc<dyn TxPool>>,
}

impl MainChainResolver {
    /// Start a DAG from its genesis unit, which becomes index 0 of the
    /// genesis asset and is stable from the start.
    pub fn new(genesis: Unit, witnesses: &dyn WitnessSchedule) -> Result<Self, DagError> {
        if !genesis.is_genesis() {
            return Err(DagError::InvalidInput(
                "the first unit of a DAG must have no parents".into(),
            ));
        }
        genesis.verify_hash()?;
        let author = genesis
            .author()
            .map(|a| a.address.clone())
            .ok_or_else(|| DagError::InvalidInput("genesis unit has no author".into()))?;
        let hash = genesis.hash();
        let asset = genesis.asset();
        let chain = AssetChain::with_root(asset, hash, author, &witnesses.witnesses());
        tracing::info!(genesis = %hash, asset = %asset, "main-chain resolver initialised");
        Ok(Self {
            units: RwLock::new(HashMap::from([(hash, Arc::new(genesis))])),
            chains: RwLock::new(HashMap::from([(asset, Arc::new(Mutex::new(chain)))])),
            genesis: hash,
            txpool: None,
        })
    }

    /// Notify `txpool` whenever a unit first joins a main chain.
    pub fn with_txpool(mut self, txpool: Arc<dyn TxPool>) -> Self {
        self.txpool = Some(txpool);
        self
    }

    pub fn genesis_hash(&self) -> Hash {
        self.genesis
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.units.read().contains_key(hash)
    }

    pub fn get(&self, hash: &Hash) -> Option<Arc<Unit>> {
        self.units.read().get(hash).cloned()
    }

    pub fn unit_count(&self) -> usize {
        self.units.read().len()
    }

    /// Parents of `unit` not yet in the DAG.
    pub fn missing_parents(&self, unit: &Unit) -> Vec<Hash> {
        let units = self.units.read();
        unit.parents()
            .iter()
            .filter(|p| !units.contains_key(*p))
            .copied()
            .collect()
    }

    fn chain(&self, asset: &AssetId) -> Option<Arc<Mutex<AssetChain>>> {
        self.chains.read().get(asset).cloned()
    }

    pub fn assets(&self) -> Vec<AssetId> {
        let mut assets: Vec<AssetId> = self.chains.read().keys().copied().collect();
        assets.sort();
        assets
    }

    pub fn props(&self, hash: &Hash) -> Option<UnitProps> {
        let asset = self.get(hash)?.asset();
        let chain = self.chain(&asset)?;
        let guard = chain.lock();
        guard.props(hash).cloned()
    }

    /// Current resolved position of a unit.
    pub fn chain_index(&self, hash: &Hash) -> Option<ChainIndex> {
        self.props(hash).map(|p| p.chain_index())
    }

    pub fn is_stable(&self, hash: &Hash) -> bool {
        self.props(hash).map(|p| p.is_stable).unwrap_or(false)
    }

    /// Tips of an asset's DAG, most preferred first.
    pub fn free_units(&self, asset: &AssetId) -> Vec<Hash> {
        self.chain(asset)
            .map(|c| c.lock().free_units())
            .unwrap_or_default()
    }

    pub fn main_chain(&self, asset: &AssetId) -> Vec<Hash> {
        self.chain(asset)
            .map(|c| c.lock().main_chain().to_vec())
            .unwrap_or_default()
    }

    pub fn main_chain_len(&self, asset: &AssetId) -> usize {
        self.chain(asset)
            .map(|c| c.lock().main_chain().len())
            .unwrap_or(0)
    }

    pub fn last_stable_index(&self, asset: &AssetId) -> Option<u64> {
        self.chain(asset).map(|c| c.lock().last_stable_index())
    }

    /// Validate `unit` against the DAG and admit it.
    ///
    /// Rejections happen before anything is stored: a failed insertion never
    /// leaves a partial unit behind. `MissingParents` is the only transient
    /// outcome.
    pub fn insert_unit(
        &self,
        unit: Unit,
        schedule: &dyn WitnessSchedule,
    ) -> Result<Insertion, DagError> {
        let hash = unit.hash();
        if self.contains(&hash) {
            return Err(DagError::Duplicate(hash));
        }
        if unit.is_genesis() {
            return Err(DagError::InvalidInput(format!(
                "unit {hash} has no parents but the DAG already has a genesis"
            )));
        }
        unit.header().validate_structure()?;
        let author = unit
            .author()
            .map(|a| a.address.clone())
            .ok_or_else(|| DagError::InvalidInput(format!("unit {hash} has no author")))?;
        if !schedule.is_authorized(&author) {
            return Err(DagError::UnauthorizedAuthor(author));
        }
        unit.verify_hash()?;

        let missing = self.missing_parents(&unit);
        if !missing.is_empty() {
            return Err(DagError::MissingParents(missing));
        }

        let asset = unit.asset();
        let same_asset: Vec<Hash> = {
            let units = self.units.read();
            unit.parents()
                .iter()
                .filter(|p| units.get(*p).map(|u| u.asset() == asset).unwrap_or(false))
                .copied()
                .collect()
        };
        let witnesses = schedule.witnesses();
        let majority = schedule.majority();

        if same_asset.is_empty() {
            return self.open_asset(unit, author, &witnesses);
        }

        let chain = self
            .chain(&asset)
            .ok_or_else(|| DagError::InvalidInput(format!("asset {asset} has no chain")))?;
        let mut chain = chain.lock();
        if chain.contains(&hash) {
            return Err(DagError::Duplicate(hash));
        }

        let double_authored = self.find_double_authoring(&chain, &unit, &same_asset);
        if let Some(earlier) = double_authored {
            tracing::warn!(
                author = %author,
                first = %earlier,
                second = %hash,
                "double authoring over the same parent set"
            );
        }

        let unit = Arc::new(unit);
        self.units.write().insert(hash, Arc::clone(&unit));
        let update = chain.insert(hash, author, same_asset, &witnesses, majority);
        let chain_index = chain
            .props(&hash)
            .map(|p| p.chain_index())
            .unwrap_or(ChainIndex::new(asset, false, 0));
        drop(chain);

        for (index, stable) in &update.stabilized {
            tracing::debug!(asset = %asset, index = index.index, hash = %stable, "unit stable");
        }
        self.notify_confirmed(&update.first_confirmations);

        Ok(Insertion {
            hash,
            chain_index,
            joined_main: update.joined_main,
            left_main: update.left_main,
            stabilized: update.stabilized,
            double_authored,
        })
    }

    /// First unit of an asset: it references the DAG only through other
    /// assets' units and becomes the root of its own chain.
    fn open_asset(
        &self,
        unit: Unit,
        author: Address,
        witnesses: &[Address],
    ) -> Result<Insertion, DagError> {
        let hash = unit.hash();
        let asset = unit.asset();
        let mut chains = self.chains.write();
        if self.contains(&hash) {
            return Err(DagError::Duplicate(hash));
        }
        if chains.contains_key(&asset) {
            return Err(DagError::InvalidInput(format!(
                "unit {hash} has no parent on asset {asset}, which already has a root"
            )));
        }
        let chain = AssetChain::with_root(asset, hash, author, witnesses);
        chains.insert(asset, Arc::new(Mutex::new(chain)));
        self.units.write().insert(hash, Arc::new(unit));
        drop(chains);

        tracing::info!(asset = %asset, root = %hash, "opened asset chain");
        self.notify_confirmed(&[hash]);
        let index = ChainIndex::new(asset, true, 0);
        Ok(Insertion {
            hash,
            chain_index: index,
            joined_main: vec![(index, hash)],
            left_main: Vec::new(),
            stabilized: vec![(index, hash)],
            double_authored: None,
        })
    }

    fn find_double_authoring(
        &self,
        chain: &AssetChain,
        unit: &Unit,
        same_asset_parents: &[Hash],
    ) -> Option<Hash> {
        let first_parent = same_asset_parents.first()?;
        let author = unit.author()?;
        let units = self.units.read();
        chain
            .children(first_parent)
            .iter()
            .filter_map(|sibling| units.get(sibling))
            .find(|sibling| {
                sibling.author().map(|a| &a.address) == Some(&author.address)
                    && sibling.header().same_parent_set(unit.header())
            })
            .map(|sibling| sibling.hash())
    }

    fn notify_confirmed(&self, hashes: &[Hash]) {
        let Some(pool) = &self.txpool else {
            return;
        };
        for hash in hashes {
            if let Some(unit) = self.get(hash) {
                pool.notify_confirmed(hash, &unit.tx_hashes());
            }
        }
    }
}
