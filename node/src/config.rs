//! Node configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use weave_consensus::DEFAULT_MAJORITY_BPS;
use weave_types::KeyPair;

use crate::logging::LogFormat;
use crate::NodeError;

/// Configuration for a weave node.
///
/// Every field has a default, so a partial (or empty) TOML file is valid.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Genesis document (JSON).
    #[serde(default = "default_genesis_path")]
    pub genesis_path: PathBuf,

    /// Seconds a unit may wait for missing parents before it is evicted.
    #[serde(default = "default_orphan_timeout_secs")]
    pub orphan_timeout_secs: u64,

    /// Upper bound on units waiting for parents; the oldest is evicted first.
    #[serde(default = "default_max_pending_units")]
    pub max_pending_units: usize,

    #[serde(default = "default_max_fetch_attempts")]
    pub max_fetch_attempts: u32,

    #[serde(default = "default_fetch_retry_interval_ms")]
    pub fetch_retry_interval_ms: u64,

    /// Bound on a single `fetch_unit` call.
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,

    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,

    /// Per-subscriber event queue depth.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,

    /// Witness majority in basis points of the active set.
    #[serde(default = "default_majority_bps")]
    pub majority_bps: u32,

    /// Parents referenced by a locally authored unit.
    #[serde(default = "default_max_parents")]
    pub max_parents: usize,

    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,

    /// Initial gas price policy.
    #[serde(default = "default_gas_price")]
    pub gas_price: u64,

    /// Hex ed25519 seed of the local mediator. Authoring is off without it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mediator_seed: Option<String>,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_true")]
    pub enable_metrics: bool,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_genesis_path() -> PathBuf {
    PathBuf::from("genesis.json")
}

fn default_orphan_timeout_secs() -> u64 {
    30
}

fn default_max_pending_units() -> usize {
    4096
}

fn default_max_fetch_attempts() -> u32 {
    5
}

fn default_fetch_retry_interval_ms() -> u64 {
    500
}

fn default_fetch_timeout_ms() -> u64 {
    2_000
}

fn default_sweep_interval_ms() -> u64 {
    1_000
}

fn default_event_buffer() -> usize {
    1024
}

fn default_majority_bps() -> u32 {
    DEFAULT_MAJORITY_BPS
}

fn default_max_parents() -> usize {
    16
}

fn default_gas_limit() -> u64 {
    10_000_000
}

fn default_gas_price() -> u64 {
    1
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

// ── Impl ───────────────────────────────────────────────────────────────

impl NodeConfig {
    pub fn from_toml_file(path: &Path) -> Result<Self, NodeError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| NodeError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        let config: Self = toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> String {
        toml::to_string_pretty(self).expect("NodeConfig is always serializable to TOML")
    }

    /// Reject values the node cannot run with.
    pub fn validate(&self) -> Result<(), NodeError> {
        let positive = [
            ("orphan_timeout_secs", self.orphan_timeout_secs),
            ("max_pending_units", self.max_pending_units as u64),
            ("max_fetch_attempts", u64::from(self.max_fetch_attempts)),
            ("sweep_interval_ms", self.sweep_interval_ms),
            ("event_buffer", self.event_buffer as u64),
            ("max_parents", self.max_parents as u64),
            ("fetch_timeout_ms", self.fetch_timeout_ms),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, v)| *v == 0) {
            return Err(NodeError::Config(format!("{name} must be positive")));
        }
        if self.majority_bps > 10_000 {
            return Err(NodeError::Config(format!(
                "majority_bps is {} but may not exceed 10000",
                self.majority_bps
            )));
        }
        self.log_format()?;
        self.mediator_keypair()?;
        Ok(())
    }

    pub fn log_format(&self) -> Result<LogFormat, NodeError> {
        self.log_format.parse()
    }

    /// The local mediator's key pair, when a seed is configured.
    pub fn mediator_keypair(&self) -> Result<Option<KeyPair>, NodeError> {
        let Some(seed_hex) = &self.mediator_seed else {
            return Ok(None);
        };
        let bytes = hex::decode(seed_hex.trim())
            .map_err(|e| NodeError::Config(format!("mediator_seed: {e}")))?;
        let seed: [u8; 32] = bytes.try_into().map_err(|b: Vec<u8>| {
            NodeError::Config(format!("mediator_seed must be 32 bytes, got {}", b.len()))
        })?;
        Ok(Some(weave_crypto::keypair_from_seed(&seed)))
    }

    pub fn orphan_timeout(&self) -> Duration {
        Duration::from_secs(self.orphan_timeout_secs)
    }

    pub fn fetch_retry_interval(&self) -> Duration {
        Duration::from_millis(self.fetch_retry_interval_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            genesis_path: default_genesis_path(),
            orphan_timeout_secs: default_orphan_timeout_secs(),
            max_pending_units: default_max_pending_units(),
            max_fetch_attempts: default_max_fetch_attempts(),
            fetch_retry_interval_ms: default_fetch_retry_interval_ms(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            sweep_interval_ms: default_sweep_interval_ms(),
            event_buffer: default_event_buffer(),
            majority_bps: default_majority_bps(),
            max_parents: default_max_parents(),
            gas_limit: default_gas_limit(),
            gas_price: default_gas_price(),
            mediator_seed: None,
            log_format: default_log_format(),
            log_level: default_log_level(),
            enable_metrics: default_true(),
        }
    }
}
