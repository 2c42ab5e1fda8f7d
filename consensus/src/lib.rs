//! Consensus: who may author the next unit, and who hears about it.
//!
//! - [`schedule`]: mediator rotation: slots, rounds, authoring order, majority.
//! - [`engine`]: the engine state machine (Idle → Running → Stopped).
//! - [`event`]: typed consensus events and subscription filters.
//! - [`bus`]: the per-engine subscriber registry with bounded queues.
//! - [`error`]: consensus error types.

pub mod bus;
pub mod engine;
pub mod error;
pub mod event;
pub mod schedule;

pub use bus::{EventBus, Subscription};
pub use engine::{ConsensusEngine, EngineConfig, EngineState};
pub use error::ConsensusError;
pub use event::{ConsensusEvent, EventFilter, EventTopic};
pub use schedule::{MediatorSchedule, DEFAULT_MAJORITY_BPS};
