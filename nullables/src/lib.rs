//! Nullable infrastructure for deterministic testing.
//!
//! The collaborators the node talks to (peer sync, transaction pool) are
//! abstracted behind the ports in `weave-dag`. This crate provides
//! test-friendly implementations that:
//! - Answer from scripted state
//! - Record every call for assertions
//! - Never touch the network
//!
//! Usage: hand these to the node in place of the real collaborators.

pub mod sync;
pub mod txpool;

pub use sync::NullSyncLayer;
pub use txpool::NullTxPool;
