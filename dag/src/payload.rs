//! Message payloads.
//!
//! The set of payload kinds is closed. Every payload is addressed by an
//! application tag, and raw payload bytes are only interpreted after the tag
//! has selected the variant to decode into.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use weave_types::{Address, AssetId, Hash};

use crate::codec;
use crate::error::DagError;

/// Application tag selecting how a message payload is interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AppTag {
    Payment,
    ContractTemplate,
    ContractDeploy,
    ContractInvoke,
    Config,
    Text,
}

impl AppTag {
    pub const ALL: [AppTag; 6] = [
        AppTag::Payment,
        AppTag::ContractTemplate,
        AppTag::ContractDeploy,
        AppTag::ContractInvoke,
        AppTag::Config,
        AppTag::Text,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AppTag::Payment => "payment",
            AppTag::ContractTemplate => "contract_template",
            AppTag::ContractDeploy => "contract_deploy",
            AppTag::ContractInvoke => "contract_invoke",
            AppTag::Config => "config",
            AppTag::Text => "text",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == tag)
    }
}

impl fmt::Display for AppTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to an output of an earlier transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Input {
    pub previous_tx: Hash,
    pub output_index: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    pub value: u64,
    pub recipient: Address,
    pub asset: AssetId,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentPayload {
    pub inputs: Vec<Input>,
    pub outputs: Vec<Output>,
}

/// Read set and write set entries are the key/value pairs a contract
/// operation touched; execution uses them for optimistic conflict checks.
pub type StateSet = BTreeMap<String, Vec<u8>>;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractTemplatePayload {
    pub template_id: Hash,
    pub bytecode: Vec<u8>,
    pub read_set: StateSet,
    pub write_set: StateSet,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractDeployPayload {
    pub template_id: Hash,
    pub contract_id: Hash,
    pub args: Vec<Vec<u8>>,
    pub read_set: StateSet,
    pub write_set: StateSet,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractInvokePayload {
    pub contract_id: Hash,
    pub function: String,
    pub args: Vec<Vec<u8>>,
    pub read_set: StateSet,
    pub write_set: StateSet,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigPayload {
    pub config_set: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextPayload {
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Payload {
    Payment(PaymentPayload),
    ContractTemplateDeploy(ContractTemplatePayload),
    ContractInstanceDeploy(ContractDeployPayload),
    ContractInvoke(ContractInvokePayload),
    ConfigUpdate(ConfigPayload),
    Text(TextPayload),
}

impl Payload {
    pub fn app(&self) -> AppTag {
        match self {
            Payload::Payment(_) => AppTag::Payment,
            Payload::ContractTemplateDeploy(_) => AppTag::ContractTemplate,
            Payload::ContractInstanceDeploy(_) => AppTag::ContractDeploy,
            Payload::ContractInvoke(_) => AppTag::ContractInvoke,
            Payload::ConfigUpdate(_) => AppTag::Config,
            Payload::Text(_) => AppTag::Text,
        }
    }

    /// Canonical bytes of the variant body, without the variant tag.
    pub fn encode_body(&self) -> Vec<u8> {
        match self {
            Payload::Payment(p) => codec::encode(p),
            Payload::ContractTemplateDeploy(p) => codec::encode(p),
            Payload::ContractInstanceDeploy(p) => codec::encode(p),
            Payload::ContractInvoke(p) => codec::encode(p),
            Payload::ConfigUpdate(p) => codec::encode(p),
            Payload::Text(p) => codec::encode(p),
        }
    }

    /// Decode a payload body whose kind is given by `app`.
    pub fn decode_body(app: AppTag, bytes: &[u8]) -> Result<Self, DagError> {
        Ok(match app {
            AppTag::Payment => Payload::Payment(codec::decode(bytes)?),
            AppTag::ContractTemplate => Payload::ContractTemplateDeploy(codec::decode(bytes)?),
            AppTag::ContractDeploy => Payload::ContractInstanceDeploy(codec::decode(bytes)?),
            AppTag::ContractInvoke => Payload::ContractInvoke(codec::decode(bytes)?),
            AppTag::Config => Payload::ConfigUpdate(codec::decode(bytes)?),
            AppTag::Text => Payload::Text(codec::decode(bytes)?),
        })
    }

    /// Hash of the variant body.
    pub fn body_hash(&self) -> Hash {
        weave_crypto::content_hash(&self.encode_body())
    }
}
