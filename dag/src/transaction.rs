//! Transactions and the messages they batch.

use serde::{Deserialize, Serialize};
use weave_types::{Address, Hash, Timestamp};

use crate::codec;
use crate::error::DagError;
use crate::payload::{AppTag, Payload};

/// One application message inside a transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub app: AppTag,
    pub payload_hash: Hash,
    pub payload: Payload,
}

impl Message {
    pub fn new(payload: Payload) -> Self {
        Self {
            app: payload.app(),
            payload_hash: payload.body_hash(),
            payload,
        }
    }

    /// Decode a message from its application tag string and raw payload
    /// bytes. The tag picks the payload variant before any byte is read.
    pub fn decode(app: &str, body: &[u8]) -> Result<Self, DagError> {
        let tag = AppTag::parse(app)
            .ok_or_else(|| DagError::InvalidInput(format!("unknown application tag {app:?}")))?;
        Ok(Self::new(Payload::decode_body(tag, body)?))
    }

    /// The tag must name the payload's own variant and the payload hash
    /// must match the body.
    pub fn verify(&self) -> Result<(), DagError> {
        if self.app != self.payload.app() {
            return Err(DagError::InvalidInput(format!(
                "message tagged {} carries a {} payload",
                self.app,
                self.payload.app()
            )));
        }
        let actual = self.payload.body_hash();
        if actual != self.payload_hash {
            return Err(DagError::CorruptionDetected {
                expected: self.payload_hash,
                actual,
            });
        }
        Ok(())
    }
}

/// A signed-upstream batch of messages from one account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    nonce: u64,
    hash: Hash,
    messages: Vec<Message>,
    from: Address,
    fee: u64,
    creation_time: Timestamp,
}

impl Transaction {
    pub fn new(
        nonce: u64,
        from: Address,
        fee: u64,
        messages: Vec<Message>,
        creation_time: Timestamp,
    ) -> Self {
        let hash = Self::compute_hash(nonce, &messages, &from, fee, creation_time);
        Self {
            nonce,
            hash,
            messages,
            from,
            fee,
            creation_time,
        }
    }

    fn compute_hash(
        nonce: u64,
        messages: &[Message],
        from: &Address,
        fee: u64,
        creation_time: Timestamp,
    ) -> Hash {
        codec::hash_of(&(nonce, messages, from, fee, creation_time))
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn hash(&self) -> Hash {
        self.hash
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn from(&self) -> &Address {
        &self.from
    }

    pub fn fee(&self) -> u64 {
        self.fee
    }

    pub fn creation_time(&self) -> Timestamp {
        self.creation_time
    }

    /// Recompute the hash and check every message.
    pub fn verify(&self) -> Result<(), DagError> {
        let actual = Self::compute_hash(
            self.nonce,
            &self.messages,
            &self.from,
            self.fee,
            self.creation_time,
        );
        if actual != self.hash {
            return Err(DagError::CorruptionDetected {
                expected: self.hash,
                actual,
            });
        }
        self.messages.iter().try_for_each(Message::verify)
    }
}
