#![allow(dead_code)]

use weave_dag::{FixedWitnesses, Header, MainChainResolver, Transaction, Unit, WitnessSchedule};
use weave_types::{Address, AssetId, Hash, KeyPair, Timestamp};

/// A set of mediator keys plus a resolver bootstrapped from their genesis.
pub struct Fixture {
    pub keys: Vec<KeyPair>,
    pub schedule: FixedWitnesses,
    pub resolver: MainChainResolver,
    pub genesis: Hash,
}

impl Fixture {
    pub fn new(mediators: u8) -> Self {
        let keys: Vec<KeyPair> = (1..=mediators)
            .map(|i| weave_crypto::keypair_from_seed(&[i; 32]))
            .collect();
        let schedule = FixedWitnesses::new(
            keys.iter()
                .map(|k| weave_crypto::derive_address(&k.public))
                .collect(),
        );
        let header = Header::genesis(Address::new("P1holder"), schedule.witnesses(), vec![]);
        let genesis_unit = Unit::new_at(&header, Vec::<Transaction>::new(), Timestamp::EPOCH);
        let genesis = genesis_unit.hash();
        let resolver = MainChainResolver::new(genesis_unit, &schedule).unwrap();
        Self {
            keys,
            schedule,
            resolver,
            genesis,
        }
    }

    pub fn address(&self, mediator: usize) -> Address {
        weave_crypto::derive_address(&self.keys[mediator].public)
    }

    /// A signed unit by `mediator` over `parents`; `nonce` keeps otherwise
    /// identical units distinct.
    pub fn unit(&self, mediator: usize, parents: Vec<Hash>, nonce: u64) -> Unit {
        let mut header =
            Header::new(parents, vec![AssetId::PTN], 1_000, 0, nonce.to_le_bytes().to_vec())
                .unwrap();
        header.witnesses = self.schedule.witnesses();
        header.sign(&self.keys[mediator]);
        Unit::new_at(&header, Vec::<Transaction>::new(), Timestamp::new(nonce))
    }

    pub fn insert(&self, unit: &Unit) -> weave_dag::Insertion {
        self.resolver.insert_unit(unit.clone(), &self.schedule).unwrap()
    }

    /// Check that the main chain is a gap-free index sequence from 0.
    pub fn assert_main_chain_contiguous(&self) {
        let main = self.resolver.main_chain(&AssetId::PTN);
        assert_eq!(main.first(), Some(&self.genesis));
        for (i, hash) in main.iter().enumerate() {
            let index = self.resolver.chain_index(hash).unwrap();
            assert!(index.is_main, "unit at {i} not flagged main");
            assert_eq!(index.index, i as u64);
        }
    }
}
