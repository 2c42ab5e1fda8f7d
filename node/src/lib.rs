//! Weave full node: orchestrates the DAG resolver and mediator consensus.
//!
//! The node is the coordinator that:
//! - Verifies incoming units and inserts them into the resolver
//! - Parks units whose parents are missing and fetches those parents
//! - Evicts parked units that wait too long
//! - Advances mediator rounds and authors units in the local mediator's slots
//! - Publishes every outcome on the consensus event bus

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod node;
pub mod pending;
pub mod processor;
pub mod producer;
pub mod shutdown;
pub mod sync;
pub mod txpool;

pub use config::NodeConfig;
pub use error::NodeError;
pub use logging::{init_logging, LogFormat};
pub use metrics::NodeMetrics;
pub use node::{Admission, WeaveNode};
pub use pending::{PendingEntry, PendingUnits};
pub use producer::UnitProducer;
pub use shutdown::ShutdownController;
pub use sync::IsolatedSync;
pub use txpool::LocalTxPool;
