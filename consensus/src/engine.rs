//! The consensus engine: mediator rotation state plus the event bus.

use parking_lot::{Mutex, RwLock};
use weave_dag::WitnessSchedule;
use weave_types::{Address, Timestamp};

use crate::bus::{EventBus, Subscription, DEFAULT_EVENT_BUFFER};
use crate::error::ConsensusError;
use crate::event::{ConsensusEvent, EventFilter};
use crate::schedule::MediatorSchedule;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Running,
    /// Terminal.
    Stopped,
}

#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Per-subscriber queue depth.
    pub event_buffer: usize,
    /// Initial gas price policy.
    pub gas_price: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            event_buffer: DEFAULT_EVENT_BUFFER,
            gas_price: 1,
        }
    }
}

/// Owns the active mediator set, the gas price policy, and the event bus.
///
/// Each engine has its own registry, so several engines can coexist in one
/// process (one per test, for instance).
pub struct ConsensusEngine {
    state: RwLock<EngineState>,
    schedule: RwLock<MediatorSchedule>,
    gas_price: RwLock<u64>,
    last_round: Mutex<Option<u64>>,
    bus: EventBus,
}

impl ConsensusEngine {
    pub fn new(schedule: MediatorSchedule, config: EngineConfig) -> Self {
        Self {
            state: RwLock::new(EngineState::Idle),
            schedule: RwLock::new(schedule),
            gas_price: RwLock::new(config.gas_price),
            last_round: Mutex::new(None),
            bus: EventBus::new(config.event_buffer),
        }
    }

    /// Idle → Running. Starting a running engine is a no-op; a stopped
    /// engine cannot be restarted.
    pub fn start(&self) -> Result<(), ConsensusError> {
        {
            let mut state = self.state.write();
            match *state {
                EngineState::Running => return Ok(()),
                EngineState::Stopped => return Err(ConsensusError::Stopped),
                EngineState::Idle => *state = EngineState::Running,
            }
        }
        let schedule = self.schedule.read();
        tracing::info!(
            mediators = schedule.len(),
            majority = schedule.majority(),
            interval = schedule.interval(),
            "consensus engine started"
        );
        drop(schedule);
        self.bus.publish(ConsensusEvent::EngineStarted);
        Ok(())
    }

    /// Move to Stopped and close every subscription. Idempotent.
    pub fn stop(&self) {
        {
            let mut state = self.state.write();
            if *state == EngineState::Stopped {
                return;
            }
            *state = EngineState::Stopped;
        }
        self.bus.publish(ConsensusEvent::EngineStopped);
        self.bus.close();
        tracing::info!(dropped_events = self.bus.dropped(), "consensus engine stopped");
    }

    pub fn state(&self) -> EngineState {
        *self.state.read()
    }

    pub fn is_running(&self) -> bool {
        self.state() == EngineState::Running
    }

    pub fn subscribe(&self, filter: EventFilter) -> Result<Subscription, ConsensusError> {
        if self.state() == EngineState::Stopped {
            return Err(ConsensusError::Stopped);
        }
        self.bus.subscribe(filter)
    }

    /// Broadcast to every live subscriber; returns the number reached.
    pub fn publish(&self, event: ConsensusEvent) -> usize {
        self.bus.publish(event)
    }

    pub fn dropped_events(&self) -> u64 {
        self.bus.dropped()
    }

    /// Publish `RoundAdvanced` the first time a later round is observed.
    /// Returns the new round, or `None` if the round is unchanged or the
    /// engine is not running.
    pub fn advance_round(&self, now: Timestamp) -> Option<u64> {
        if !self.is_running() {
            return None;
        }
        let (round, slot, scheduled) = {
            let schedule = self.schedule.read();
            let slot = schedule.slot_at(now);
            (schedule.round_of(slot), slot, schedule.mediator_for_slot(slot))
        };
        {
            let mut last = self.last_round.lock();
            if matches!(*last, Some(seen) if seen >= round) {
                return None;
            }
            *last = Some(round);
        }
        tracing::debug!(round, slot, scheduled = %scheduled, "round advanced");
        self.bus.publish(ConsensusEvent::RoundAdvanced {
            round,
            slot,
            scheduled,
        });
        Some(round)
    }

    /// The mediator whose turn it is at `now`.
    pub fn scheduled_author(&self, now: Timestamp) -> Address {
        self.schedule.read().scheduled_mediator(now)
    }

    pub fn current_slot(&self, now: Timestamp) -> u64 {
        self.schedule.read().slot_at(now)
    }

    /// Snapshot of the rotation.
    pub fn schedule(&self) -> MediatorSchedule {
        self.schedule.read().clone()
    }

    pub fn active_mediators(&self) -> Vec<Address> {
        self.schedule.read().mediators().to_vec()
    }

    /// Replace the active set. Takes effect for the next authorization check.
    pub fn set_active_mediators(&self, mediators: Vec<Address>) -> Result<(), ConsensusError> {
        let updated = {
            let mut schedule = self.schedule.write();
            schedule.replace_mediators(mediators)?;
            schedule.mediators().to_vec()
        };
        tracing::info!(count = updated.len(), "active mediators updated");
        self.bus.publish(ConsensusEvent::MediatorsUpdated { mediators: updated });
        Ok(())
    }

    pub fn gas_price(&self) -> u64 {
        *self.gas_price.read()
    }

    pub fn set_gas_price(&self, price: u64) {
        let previous = std::mem::replace(&mut *self.gas_price.write(), price);
        if previous != price {
            self.bus.publish(ConsensusEvent::GasPriceChanged {
                previous,
                current: price,
            });
        }
    }
}

impl WitnessSchedule for ConsensusEngine {
    fn witnesses(&self) -> Vec<Address> {
        self.active_mediators()
    }

    fn majority(&self) -> usize {
        self.schedule.read().majority()
    }

    fn is_authorized(&self, author: &Address) -> bool {
        self.schedule.read().is_authorized(author)
    }
}
