//! Nullable transaction pool: fixed candidates, recorded confirmations.

use parking_lot::Mutex;
use weave_dag::{Transaction, TxPool};
use weave_types::Hash;

/// A pool that always offers the same transactions and remembers every
/// confirmation it is told about.
#[derive(Default)]
pub struct NullTxPool {
    pending: Mutex<Vec<Transaction>>,
    /// (unit hash, transaction hashes) per notification.
    confirmed: Mutex<Vec<(Hash, Vec<Hash>)>>,
}

impl NullTxPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pending(transactions: Vec<Transaction>) -> Self {
        Self {
            pending: Mutex::new(transactions),
            ..Self::default()
        }
    }

    pub fn set_pending(&self, transactions: Vec<Transaction>) {
        *self.pending.lock() = transactions;
    }

    pub fn confirmations(&self) -> Vec<(Hash, Vec<Hash>)> {
        self.confirmed.lock().clone()
    }

    /// Units reported as confirmed, in notification order.
    pub fn confirmed_units(&self) -> Vec<Hash> {
        self.confirmed.lock().iter().map(|(unit, _)| *unit).collect()
    }
}

impl TxPool for NullTxPool {
    fn pending(&self) -> Vec<Transaction> {
        self.pending.lock().clone()
    }

    fn notify_confirmed(&self, unit_hash: &Hash, tx_hashes: &[Hash]) {
        self.confirmed.lock().push((*unit_hash, tx_hashes.to_vec()));
    }
}
