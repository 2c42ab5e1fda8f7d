//! Units: the atomic committed entity of the ledger.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use weave_types::{AssetId, Hash, Timestamp};

use crate::codec;
use crate::error::DagError;
use crate::header::{copy_header, Author, Header};
use crate::transaction::Transaction;

/// A header plus its transactions, identified by the hash of their
/// canonical encoding.
///
/// Fields are only reachable through accessors: once built, a unit never
/// changes. Cloning shares the transaction list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    header: Header,
    transactions: Arc<Vec<Transaction>>,
    hash: Hash,
    size: u64,
    creation_time: Timestamp,
    gas_price: u64,
}

impl Unit {
    /// Build a unit stamped with the current time.
    pub fn new(header: &Header, transactions: impl Into<Arc<Vec<Transaction>>>) -> Self {
        Self::new_at(header, transactions, Timestamp::now())
    }

    /// Build a unit with an explicit creation time (genesis, replays).
    pub fn new_at(
        header: &Header,
        transactions: impl Into<Arc<Vec<Transaction>>>,
        creation_time: Timestamp,
    ) -> Self {
        let header = copy_header(header);
        let transactions = transactions.into();
        let (hash, size) = Self::identity(&header, &transactions);
        Self {
            header,
            transactions,
            hash,
            size,
            creation_time,
            gas_price: 0,
        }
    }

    fn identity(header: &Header, transactions: &[Transaction]) -> (Hash, u64) {
        let bytes = codec::encode(&(header, transactions));
        (weave_crypto::content_hash(&bytes), bytes.len() as u64)
    }

    /// Attach the gas price in force when the unit was authored.
    pub fn with_gas_price(mut self, gas_price: u64) -> Self {
        self.gas_price = gas_price;
        self
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Shared handle to the transaction list.
    pub fn shared_transactions(&self) -> Arc<Vec<Transaction>> {
        Arc::clone(&self.transactions)
    }

    pub fn hash(&self) -> Hash {
        self.hash
    }

    /// Canonical-encoding length of header plus transactions.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn creation_time(&self) -> Timestamp {
        self.creation_time
    }

    pub fn gas_price(&self) -> u64 {
        self.gas_price
    }

    /// Gas used as committed in the hashed header.
    pub fn gas_used(&self) -> u64 {
        self.header.gas_used
    }

    pub fn parents(&self) -> &[Hash] {
        &self.header.parent_units
    }

    pub fn author(&self) -> Option<&Author> {
        self.header.author.as_ref()
    }

    /// The asset whose main chain this unit belongs to.
    pub fn asset(&self) -> AssetId {
        self.header.number.asset_id
    }

    pub fn is_genesis(&self) -> bool {
        self.header.is_genesis()
    }

    pub fn tx_hashes(&self) -> Vec<Hash> {
        self.transactions.iter().map(Transaction::hash).collect()
    }

    /// Linear scan for a transaction by hash.
    pub fn transaction(&self, hash: &Hash) -> Result<&Transaction, DagError> {
        self.transactions
            .iter()
            .find(|tx| tx.hash() == *hash)
            .ok_or(DagError::NotFound(*hash))
    }

    /// Recompute hash and size from the fields.
    pub fn verify_hash(&self) -> Result<(), DagError> {
        let (actual, size) = Self::identity(&self.header, &self.transactions);
        if actual != self.hash {
            return Err(DagError::CorruptionDetected {
                expected: self.hash,
                actual,
            });
        }
        if size != self.size {
            return Err(DagError::InvalidInput(format!(
                "declared size {} but encoding is {} bytes",
                self.size, size
            )));
        }
        Ok(())
    }

    /// Hash check plus every transaction and message check.
    pub fn verify_contents(&self) -> Result<(), DagError> {
        self.verify_hash()?;
        self.transactions.iter().try_for_each(Transaction::verify)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        codec::encode(self)
    }

    /// Decode a unit received from elsewhere and check its identity.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DagError> {
        let unit: Unit = codec::decode(bytes)?;
        unit.verify_hash()?;
        Ok(unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{Payload, TextPayload};
    use crate::transaction::Message;
    use weave_types::Address;

    fn tx(text: &str) -> Transaction {
        Transaction::new(
            0,
            Address::new("P1sender"),
            1,
            vec![Message::new(Payload::Text(TextPayload { text: text.into() }))],
            Timestamp::new(5),
        )
    }

    fn header() -> Header {
        Header::new(vec![Hash::new([1; 32])], vec![], 100, 7, vec![]).unwrap()
    }

    #[test]
    fn hash_is_idempotent_and_independent_of_time() {
        let a = Unit::new_at(&header(), vec![tx("a")], Timestamp::new(1));
        let b = Unit::new_at(&header(), vec![tx("a")], Timestamp::new(2));
        assert_eq!(a.hash(), b.hash());
        assert!(a.verify_hash().is_ok());
    }

    #[test]
    fn hash_covers_transactions() {
        let a = Unit::new_at(&header(), vec![tx("a")], Timestamp::EPOCH);
        let b = Unit::new_at(&header(), vec![tx("b")], Timestamp::EPOCH);
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn size_is_encoding_length() {
        let txs = vec![tx("a"), tx("b")];
        let unit = Unit::new_at(&header(), txs.clone(), Timestamp::EPOCH);
        let expected = codec::encode(&(&header(), txs.as_slice())).len() as u64;
        assert_eq!(unit.size(), expected);
    }

    #[test]
    fn header_is_copied_in() {
        let mut h = header();
        let unit = Unit::new_at(&h, Vec::<Transaction>::new(), Timestamp::EPOCH);
        h.parent_units.push(Hash::new([2; 32]));
        assert_eq!(unit.parents().len(), 1);
        assert!(unit.verify_hash().is_ok());
    }

    #[test]
    fn clones_share_transactions() {
        let unit = Unit::new_at(&header(), vec![tx("a")], Timestamp::EPOCH);
        let copy = unit.clone();
        assert!(Arc::ptr_eq(
            &unit.shared_transactions(),
            &copy.shared_transactions()
        ));
    }

    #[test]
    fn shared_list_is_not_recopied() {
        let list = Arc::new(vec![tx("a")]);
        let unit = Unit::new_at(&header(), Arc::clone(&list), Timestamp::EPOCH);
        assert!(Arc::ptr_eq(&list, &unit.shared_transactions()));
    }

    #[test]
    fn gas_fields() {
        let unit = Unit::new_at(&header(), Vec::<Transaction>::new(), Timestamp::EPOCH).with_gas_price(3);
        assert_eq!(unit.gas_used(), 7);
        assert_eq!(unit.gas_price(), 3);
    }

    #[test]
    fn tampered_gas_used_fails_decoding() {
        let unit = Unit::new_at(&header(), vec![tx("a")], Timestamp::EPOCH);
        let mut bumped = header();
        bumped.gas_used += 1;
        // the unit encoding starts with its header
        let offset = codec::encode(&header())
            .iter()
            .zip(codec::encode(&bumped))
            .position(|(a, b)| *a != b)
            .unwrap();

        let mut bytes = unit.to_bytes();
        bytes[offset] ^= 0x01;
        assert!(matches!(
            Unit::from_bytes(&bytes),
            Err(DagError::CorruptionDetected { .. })
        ));
    }

    #[test]
    fn transaction_lookup() {
        let t = tx("a");
        let unit = Unit::new_at(&header(), vec![t.clone()], Timestamp::EPOCH);
        assert_eq!(unit.transaction(&t.hash()).unwrap(), &t);
        let missing = Hash::new([9; 32]);
        assert_eq!(
            unit.transaction(&missing).unwrap_err(),
            DagError::NotFound(missing)
        );
    }

    #[test]
    fn bytes_roundtrip_preserves_identity() {
        let unit = Unit::new_at(&header(), vec![tx("a")], Timestamp::new(9)).with_gas_price(2);
        let back = Unit::from_bytes(&unit.to_bytes()).unwrap();
        assert_eq!(back, unit);
    }

    #[test]
    fn corrupted_bytes_are_detected() {
        let unit = Unit::new_at(&header(), vec![tx("a")], Timestamp::EPOCH);
        let mut bytes = unit.to_bytes();
        // first parent hash starts after the 8-byte parent count
        bytes[8] ^= 0x01;
        assert!(matches!(
            Unit::from_bytes(&bytes),
            Err(DagError::CorruptionDetected { .. })
        ));
    }
}
