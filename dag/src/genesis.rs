//! Genesis configuration and genesis unit synthesis.
//!
//! The genesis document is produced by the `create-genesis-json` command and
//! consumed once at bootstrap. Every node must derive a byte-identical
//! genesis unit from it, so nothing here reads the clock.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use weave_types::{Address, AssetId, Timestamp};

use crate::error::DagError;
use crate::header::Header;
use crate::payload::{ConfigPayload, Output, Payload, PaymentPayload};
use crate::transaction::{Message, Transaction};
use crate::unit::Unit;

pub const DEFAULT_VERSION: &str = "0.6.0";
pub const DEFAULT_TOKEN_AMOUNT: u64 = 1_000_000_000;
pub const DEFAULT_TOKEN_DECIMAL: u32 = 8;
pub const DEFAULT_CHAIN_ID: u64 = 1;
pub const DEFAULT_MEDIATOR_COUNT: usize = 3;
pub const DEFAULT_MEDIATOR_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_DEPOSIT_RATE: f64 = 0.02;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemConfig {
    /// Seconds per mediator slot.
    pub mediator_interval: u64,
    pub deposit_rate: f64,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            mediator_interval: DEFAULT_MEDIATOR_INTERVAL_SECS,
            deposit_rate: DEFAULT_DEPOSIT_RATE,
        }
    }
}

/// The genesis document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenesisConfig {
    pub version: String,
    pub token_amount: u64,
    pub token_decimal: u32,
    pub chain_id: u64,
    pub token_holder: String,
    pub system_config: SystemConfig,
    pub initial_active_mediators: usize,
    pub initial_mediator_candidates: Vec<String>,
    /// Creation time recorded on the genesis unit; also the start of slot 0.
    #[serde(default)]
    pub initial_timestamp: u64,
}

impl GenesisConfig {
    /// The document `create-genesis-json` writes: defaults everywhere and
    /// `account` as token holder and as every initial candidate.
    pub fn example(account: &str) -> Self {
        Self {
            version: DEFAULT_VERSION.to_string(),
            token_amount: DEFAULT_TOKEN_AMOUNT,
            token_decimal: DEFAULT_TOKEN_DECIMAL,
            chain_id: DEFAULT_CHAIN_ID,
            token_holder: account.to_string(),
            system_config: SystemConfig::default(),
            initial_active_mediators: DEFAULT_MEDIATOR_COUNT,
            initial_mediator_candidates: vec![account.to_string(); DEFAULT_MEDIATOR_COUNT],
            initial_timestamp: 0,
        }
    }

    pub fn from_json_str(s: &str) -> Result<Self, DagError> {
        serde_json::from_str(s).map_err(|e| DagError::Config(e.to_string()))
    }

    pub fn from_json_file(path: &Path) -> Result<Self, DagError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| DagError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&contents)
    }

    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).expect("GenesisConfig is always serializable to JSON")
    }

    /// Reject documents a chain cannot start from.
    pub fn validate(&self) -> Result<(), DagError> {
        let fail = |msg: String| Err(DagError::Config(msg));
        if self.version.trim().is_empty() {
            return fail("version must not be empty".into());
        }
        if self.chain_id == 0 {
            return fail("chainId must be positive".into());
        }
        if Address::parse(self.token_holder.as_str()).is_err() {
            return fail(format!("tokenHolder {:?} is not an address", self.token_holder));
        }
        if self.system_config.mediator_interval == 0 {
            return fail("systemConfig.mediatorInterval must be positive".into());
        }
        if !self.system_config.deposit_rate.is_finite() || self.system_config.deposit_rate < 0.0 {
            return fail("systemConfig.depositRate must be a non-negative number".into());
        }
        if self.initial_active_mediators == 0 {
            return fail("initialActiveMediators must be positive".into());
        }
        if self.initial_mediator_candidates.len() < self.initial_active_mediators {
            return fail(format!(
                "initialActiveMediators is {} but only {} candidates are listed",
                self.initial_active_mediators,
                self.initial_mediator_candidates.len()
            ));
        }
        if let Some(bad) = self
            .initial_mediator_candidates
            .iter()
            .find(|c| Address::parse(c.as_str()).is_err())
        {
            return fail(format!("mediator candidate {bad:?} is not an address"));
        }
        Ok(())
    }

    pub fn token_holder_address(&self) -> Result<Address, DagError> {
        Address::parse(self.token_holder.as_str()).map_err(|e| DagError::Config(e.to_string()))
    }

    /// The first `initialActiveMediators` distinct candidates, in listed
    /// order.
    pub fn active_mediators(&self) -> Result<Vec<Address>, DagError> {
        let mut seen = HashSet::new();
        let mut active = Vec::new();
        for candidate in &self.initial_mediator_candidates {
            let addr =
                Address::parse(candidate.as_str()).map_err(|e| DagError::Config(e.to_string()))?;
            if seen.insert(addr.clone()) {
                active.push(addr);
            }
            if active.len() == self.initial_active_mediators {
                break;
            }
        }
        Ok(active)
    }

    pub fn genesis_time(&self) -> Timestamp {
        Timestamp::new(self.initial_timestamp)
    }

    fn system_entries(&self) -> BTreeMap<String, String> {
        let mut entries = BTreeMap::new();
        entries.insert("chain_id".to_string(), self.chain_id.to_string());
        entries.insert("version".to_string(), self.version.clone());
        entries.insert(
            "mediator_interval".to_string(),
            self.system_config.mediator_interval.to_string(),
        );
        entries.insert(
            "deposit_rate".to_string(),
            self.system_config.deposit_rate.to_string(),
        );
        entries.insert(
            "token_decimal".to_string(),
            self.token_decimal.to_string(),
        );
        entries
    }
}

/// The initial transaction set: system parameters plus the issuance of the
/// whole token supply to the holder.
pub fn genesis_transactions(config: &GenesisConfig) -> Result<Vec<Transaction>, DagError> {
    let holder = config.token_holder_address()?;
    let messages = vec![
        Message::new(Payload::ConfigUpdate(ConfigPayload {
            config_set: config.system_entries(),
        })),
        Message::new(Payload::Payment(PaymentPayload {
            inputs: Vec::new(),
            outputs: vec![Output {
                value: config.token_amount,
                recipient: holder.clone(),
                asset: AssetId::PTN,
            }],
        })),
    ];
    Ok(vec![Transaction::new(
        0,
        holder,
        0,
        messages,
        config.genesis_time(),
    )])
}

/// Synthesize the genesis unit at index 0 of the native chain.
pub fn create_genesis_unit(
    config: &GenesisConfig,
    transactions: Vec<Transaction>,
) -> Result<Unit, DagError> {
    config.validate()?;
    let header = Header::genesis(
        config.token_holder_address()?,
        config.active_mediators()?,
        config.version.as_bytes().to_vec(),
    );
    let unit = Unit::new_at(&header, transactions, config.genesis_time());
    tracing::debug!(
        hash = %unit.hash(),
        chain_id = config.chain_id,
        mediators = config.initial_active_mediators,
        "synthesized genesis unit"
    );
    Ok(unit)
}
