//! Mediator rotation.
//!
//! Time is cut into slots of `interval` seconds starting at the genesis
//! time. `n` consecutive slots form a round; within a round each active
//! mediator owns exactly one slot, in an order derived from hashing the round
//! number with the mediator's address. The order is a pure function of the
//! round and the active set, so every node computes the same rotation.

use weave_dag::{GenesisConfig, WitnessSchedule};
use weave_types::{Address, Timestamp};

use crate::error::ConsensusError;

/// Default majority threshold in basis points: more than half.
pub const DEFAULT_MAJORITY_BPS: u32 = 5_000;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediatorSchedule {
    mediators: Vec<Address>,
    genesis_time: Timestamp,
    interval: u64,
    majority_bps: u32,
}

impl MediatorSchedule {
    pub fn new(
        mediators: Vec<Address>,
        genesis_time: Timestamp,
        interval: u64,
        majority_bps: u32,
    ) -> Result<Self, ConsensusError> {
        if interval == 0 {
            return Err(ConsensusError::InvalidSchedule(
                "mediator interval must be positive".into(),
            ));
        }
        if majority_bps > 10_000 {
            return Err(ConsensusError::InvalidSchedule(format!(
                "majority of {majority_bps} bps exceeds 10000"
            )));
        }
        let mut schedule = Self {
            mediators: Vec::new(),
            genesis_time,
            interval,
            majority_bps,
        };
        schedule.replace_mediators(mediators)?;
        Ok(schedule)
    }

    /// The rotation a chain starts with.
    pub fn from_genesis(config: &GenesisConfig, majority_bps: u32) -> Result<Self, ConsensusError> {
        let mediators = config
            .active_mediators()
            .map_err(|e| ConsensusError::InvalidSchedule(e.to_string()))?;
        Self::new(
            mediators,
            config.genesis_time(),
            config.system_config.mediator_interval,
            majority_bps,
        )
    }

    pub(crate) fn replace_mediators(
        &mut self,
        mut mediators: Vec<Address>,
    ) -> Result<(), ConsensusError> {
        mediators.sort();
        mediators.dedup();
        if mediators.is_empty() {
            return Err(ConsensusError::NoMediators);
        }
        self.mediators = mediators;
        Ok(())
    }

    /// Active mediators, sorted.
    pub fn mediators(&self) -> &[Address] {
        &self.mediators
    }

    pub fn len(&self) -> usize {
        self.mediators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mediators.is_empty()
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.mediators.binary_search(address).is_ok()
    }

    pub fn interval(&self) -> u64 {
        self.interval
    }

    pub fn genesis_time(&self) -> Timestamp {
        self.genesis_time
    }

    /// Slot containing `time`. Times before genesis fall in slot 0.
    pub fn slot_at(&self, time: Timestamp) -> u64 {
        time.as_secs().saturating_sub(self.genesis_time.as_secs()) / self.interval
    }

    pub fn round_of(&self, slot: u64) -> u64 {
        slot / self.len() as u64
    }

    pub fn slot_start(&self, slot: u64) -> Timestamp {
        self.genesis_time
            .plus_secs(slot.saturating_mul(self.interval))
    }

    /// Authoring order of `round`.
    pub fn round_order(&self, round: u64) -> Vec<Address> {
        let round_bytes = round.to_le_bytes();
        let mut order = self.mediators.clone();
        order.sort_by_cached_key(|address| {
            weave_crypto::blake2b_256_multi(&[&round_bytes, address.as_str().as_bytes()])
        });
        order
    }

    /// Mediator owning `slot`.
    pub fn mediator_for_slot(&self, slot: u64) -> Address {
        let n = self.len() as u64;
        let order = self.round_order(slot / n);
        order[(slot % n) as usize].clone()
    }

    pub fn scheduled_mediator(&self, time: Timestamp) -> Address {
        self.mediator_for_slot(self.slot_at(time))
    }

    /// Distinct witnesses needed for agreement: `n * bps / 10000 + 1`,
    /// never more than `n`.
    pub fn majority(&self) -> usize {
        let n = self.len();
        (n * self.majority_bps as usize / 10_000 + 1).min(n)
    }
}

impl WitnessSchedule for MediatorSchedule {
    fn witnesses(&self) -> Vec<Address> {
        self.mediators.clone()
    }

    fn majority(&self) -> usize {
        MediatorSchedule::majority(self)
    }

    /// Any active mediator may author. The slot turn only decides when the
    /// local mediator produces a unit.
    fn is_authorized(&self, author: &Address) -> bool {
        self.contains(author)
    }
}
