use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConsensusError {
    #[error("consensus engine is stopped")]
    Stopped,

    #[error("active mediator set is empty")]
    NoMediators,

    #[error("invalid mediator schedule: {0}")]
    InvalidSchedule(String),
}
