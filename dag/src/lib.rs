//! The weave DAG ledger core.
//!
//! Units reference one or more parent units by content hash, forming a DAG
//! per asset. This crate holds:
//!
//! - the immutable unit model (`Header`, `Unit`, `Transaction`, payloads) with
//!   deterministic bincode/blake2b identities;
//! - the [`MainChainResolver`], which picks best parents, assigns gap-free
//!   main-chain indices per asset and marks units stable;
//! - genesis synthesis from a [`GenesisConfig`];
//! - the ports through which the transaction pool, the sync layer and the
//!   witness schedule are consumed.

pub mod chain;
pub mod codec;
pub mod error;
pub mod genesis;
pub mod header;
pub mod payload;
pub mod ports;
pub mod resolver;
pub mod transaction;
pub mod unit;

pub use chain::UnitProps;
pub use error::DagError;
pub use genesis::{create_genesis_unit, genesis_transactions, GenesisConfig, SystemConfig};
pub use header::{copy_header, Author, ChainIndex, Header};
pub use payload::{
    AppTag, ConfigPayload, ContractDeployPayload, ContractInvokePayload, ContractTemplatePayload,
    Input, Output, Payload, PaymentPayload, TextPayload,
};
pub use ports::{FixedWitnesses, SyncError, SyncLayer, TxPool, WitnessSchedule};
pub use resolver::{Insertion, MainChainResolver};
pub use transaction::{Message, Transaction};
pub use unit::Unit;
