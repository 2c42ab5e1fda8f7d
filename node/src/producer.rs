//! Local unit authoring.

use parking_lot::Mutex;
use weave_consensus::ConsensusEngine;
use weave_dag::{Header, MainChainResolver, TxPool, Unit, WitnessSchedule};
use weave_types::{Address, AssetId, KeyPair, Timestamp};

use crate::NodeError;

/// Builds a unit whenever the local mediator owns the current slot, at most
/// once per slot.
pub struct UnitProducer {
    keypair: KeyPair,
    address: Address,
    max_parents: usize,
    gas_limit: u64,
    last_slot: Mutex<Option<u64>>,
}

impl UnitProducer {
    pub fn new(keypair: KeyPair, max_parents: usize, gas_limit: u64) -> Self {
        let address = weave_crypto::derive_address(&keypair.public);
        Self {
            keypair,
            address,
            max_parents: max_parents.max(1),
            gas_limit,
            last_slot: Mutex::new(None),
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    /// The unit for the slot containing `now`, or `None` when the slot
    /// belongs to someone else or was already used.
    ///
    /// Parents are the native chain's free units, best first, capped at
    /// `max_parents`.
    pub fn produce(
        &self,
        now: Timestamp,
        resolver: &MainChainResolver,
        engine: &ConsensusEngine,
        txpool: &dyn TxPool,
    ) -> Result<Option<Unit>, NodeError> {
        if !engine.is_authorized(&self.address) || engine.scheduled_author(now) != self.address {
            return Ok(None);
        }
        let slot = engine.current_slot(now);
        let mut last = self.last_slot.lock();
        if matches!(*last, Some(used) if used >= slot) {
            return Ok(None);
        }

        let mut parents = resolver.free_units(&AssetId::PTN);
        parents.truncate(self.max_parents);
        let mut header = Header::new(
            parents,
            vec![AssetId::PTN],
            self.gas_limit,
            0,
            slot.to_le_bytes().to_vec(),
        )?;
        header.witnesses = engine.witnesses();
        header.sign(&self.keypair);

        let unit = Unit::new_at(&header, txpool.pending(), now).with_gas_price(engine.gas_price());
        *last = Some(slot);
        tracing::debug!(
            hash = %unit.hash(),
            slot,
            parents = unit.parents().len(),
            transactions = unit.transactions().len(),
            "authored unit"
        );
        Ok(Some(unit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weave_consensus::{EngineConfig, MediatorSchedule, DEFAULT_MAJORITY_BPS};
    use weave_dag::Transaction;

    struct EmptyPool;

    impl TxPool for EmptyPool {
        fn pending(&self) -> Vec<Transaction> {
            Vec::new()
        }

        fn notify_confirmed(&self, _: &weave_types::Hash, _: &[weave_types::Hash]) {}
    }

    fn setup() -> (UnitProducer, MainChainResolver, ConsensusEngine) {
        let key = weave_crypto::keypair_from_seed(&[1; 32]);
        let other = weave_crypto::keypair_from_seed(&[2; 32]);
        let mediators = vec![
            weave_crypto::derive_address(&key.public),
            weave_crypto::derive_address(&other.public),
        ];
        let schedule =
            MediatorSchedule::new(mediators, Timestamp::EPOCH, 5, DEFAULT_MAJORITY_BPS).unwrap();
        let engine = ConsensusEngine::new(schedule, EngineConfig::default());
        let header = Header::genesis(Address::new("P1holder"), engine.witnesses(), vec![]);
        let genesis = Unit::new_at(&header, Vec::<Transaction>::new(), Timestamp::EPOCH);
        let resolver = MainChainResolver::new(genesis, &engine).unwrap();
        (UnitProducer::new(key, 4, 1_000), resolver, engine)
    }

    /// First time in `[0, 100)` seconds at which `address` owns the slot.
    fn own_slot_time(engine: &ConsensusEngine, address: &Address) -> Timestamp {
        (0..100)
            .map(Timestamp::new)
            .find(|t| engine.scheduled_author(*t) == *address)
            .unwrap()
    }

    #[test]
    fn produces_once_per_owned_slot() {
        let (producer, resolver, engine) = setup();
        let t = own_slot_time(&engine, producer.address());

        let unit = producer.produce(t, &resolver, &engine, &EmptyPool).unwrap().unwrap();
        assert_eq!(unit.parents(), &[resolver.genesis_hash()]);
        assert_eq!(unit.author().map(|a| &a.address), Some(producer.address()));
        assert_eq!(unit.gas_price(), engine.gas_price());
        assert!(unit.header().verify_author().is_ok());

        assert!(producer.produce(t, &resolver, &engine, &EmptyPool).unwrap().is_none());
    }

    #[test]
    fn skips_foreign_slots() {
        let (producer, resolver, engine) = setup();
        let foreign = (0..100)
            .map(Timestamp::new)
            .find(|t| engine.scheduled_author(*t) != *producer.address())
            .unwrap();
        assert!(producer.produce(foreign, &resolver, &engine, &EmptyPool).unwrap().is_none());
    }

    #[test]
    fn removed_mediator_stops_authoring() {
        let (producer, resolver, engine) = setup();
        let t = own_slot_time(&engine, producer.address());
        engine
            .set_active_mediators(vec![Address::new("P1someone")])
            .unwrap();
        assert!(producer.produce(t, &resolver, &engine, &EmptyPool).unwrap().is_none());
    }
}
