use thiserror::Error;
use weave_types::Hash;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("{0}")]
    Dag(#[from] weave_dag::DagError),

    #[error("consensus error: {0}")]
    Consensus(#[from] weave_consensus::ConsensusError),

    #[error("unit {0} timed out waiting for its parents")]
    OrphanTimeout(Hash),

    #[error("unit {0} was evicted from the full pending table")]
    PendingEvicted(Hash),

    #[error("config error: {0}")]
    Config(String),

    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("node is shutting down")]
    ShuttingDown,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl NodeError {
    /// Whether the failure came from the unit itself rather than the node.
    pub fn is_rejection(&self) -> bool {
        matches!(self, NodeError::Dag(e) if !e.is_transient())
    }
}
