//! Interfaces to the collaborators around the ledger core.

use async_trait::async_trait;
use thiserror::Error;
use weave_types::{Address, Hash};

use crate::transaction::Transaction;
use crate::unit::Unit;

/// Source of pending transactions and sink of confirmations.
pub trait TxPool: Send + Sync {
    /// Candidate transactions for the next unit, in inclusion order.
    fn pending(&self) -> Vec<Transaction>;

    /// Called once for each unit the first time it joins the main chain.
    fn notify_confirmed(&self, unit_hash: &Hash, tx_hashes: &[Hash]);
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncError {
    #[error("no peer reachable")]
    Unreachable,

    #[error("sync transport error: {0}")]
    Transport(String),
}

/// The peer network, as seen by the core.
#[async_trait]
pub trait SyncLayer: Send + Sync {
    /// Ask peers for a unit. `Ok(None)` means no peer has it.
    async fn fetch_unit(&self, hash: &Hash) -> Result<Option<Unit>, SyncError>;

    /// Hand a locally authored unit over for distribution.
    async fn broadcast_unit(&self, unit: &Unit);
}

/// The witness set the resolver measures agreement against, and the rule
/// deciding who may author units.
pub trait WitnessSchedule: Send + Sync {
    fn witnesses(&self) -> Vec<Address>;

    /// Number of distinct witnesses that constitutes a majority.
    fn majority(&self) -> usize;

    fn is_authorized(&self, author: &Address) -> bool;
}

/// A witness set that never changes.
#[derive(Clone, Debug)]
pub struct FixedWitnesses {
    witnesses: Vec<Address>,
    majority: usize,
}

impl FixedWitnesses {
    /// Simple majority: more than half of the set.
    pub fn new(mut witnesses: Vec<Address>) -> Self {
        witnesses.sort();
        witnesses.dedup();
        let majority = witnesses.len() / 2 + 1;
        Self {
            witnesses,
            majority,
        }
    }

    pub fn with_majority(witnesses: Vec<Address>, majority: usize) -> Self {
        let mut fixed = Self::new(witnesses);
        fixed.majority = majority.min(fixed.witnesses.len()).max(1);
        fixed
    }
}

impl WitnessSchedule for FixedWitnesses {
    fn witnesses(&self) -> Vec<Address> {
        self.witnesses.clone()
    }

    fn majority(&self) -> usize {
        self.majority
    }

    fn is_authorized(&self, author: &Address) -> bool {
        self.witnesses.binary_search(author).is_ok()
    }
}
