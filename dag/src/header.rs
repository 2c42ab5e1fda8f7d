//! Unit headers: parent references, authorship and chain position.

use serde::{Deserialize, Serialize};
use weave_types::{Address, AssetId, Hash, KeyPair, PublicKey, Signature};

use crate::codec;
use crate::error::DagError;

/// Position of a unit along one asset's main chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChainIndex {
    pub asset_id: AssetId,
    pub is_main: bool,
    pub index: u64,
}

impl ChainIndex {
    pub fn new(asset_id: AssetId, is_main: bool, index: u64) -> Self {
        Self {
            asset_id,
            is_main,
            index,
        }
    }

    /// Index 0 on the native asset's main chain.
    pub fn genesis() -> Self {
        Self::new(AssetId::PTN, true, 0)
    }
}

/// The identity that produced a unit and its signature over the header.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub address: Address,
    pub public_key: PublicKey,
    pub authentifier: Signature,
}

/// Unit metadata without transaction bodies.
///
/// `number` is the position the author claims when producing the unit;
/// the resolver's view (`MainChainResolver::chain_index`) is authoritative
/// once the unit is in the DAG.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub parent_units: Vec<Hash>,
    pub asset_ids: Vec<AssetId>,
    pub author: Option<Author>,
    pub witnesses: Vec<Address>,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub state_root: Hash,
    pub number: ChainIndex,
    pub extra: Vec<u8>,
}

impl Header {
    /// Build an unsigned header for a non-genesis unit.
    ///
    /// The unit is placed on the chain of the first listed asset (the native
    /// asset if none is given).
    pub fn new(
        parents: Vec<Hash>,
        assets: Vec<AssetId>,
        gas_limit: u64,
        gas_used: u64,
        extra: Vec<u8>,
    ) -> Result<Self, DagError> {
        if parents.is_empty() {
            return Err(DagError::InvalidInput(
                "a non-genesis header needs at least one parent".into(),
            ));
        }
        let asset = assets.first().copied().unwrap_or(AssetId::PTN);
        Ok(Self {
            parent_units: parents,
            asset_ids: assets,
            author: None,
            witnesses: Vec::new(),
            gas_limit,
            gas_used,
            state_root: Hash::ZERO,
            number: ChainIndex::new(asset, false, 0),
            extra,
        })
    }

    /// The designated genesis construction: no parents, index 0 on the
    /// native chain, authored (unsigned) by the token holder.
    pub fn genesis(holder: Address, witnesses: Vec<Address>, extra: Vec<u8>) -> Self {
        Self {
            parent_units: Vec::new(),
            asset_ids: vec![AssetId::PTN],
            author: Some(Author {
                address: holder,
                public_key: PublicKey::ZERO,
                authentifier: Signature::ZERO,
            }),
            witnesses,
            gas_limit: 0,
            gas_used: 0,
            state_root: Hash::ZERO,
            number: ChainIndex::genesis(),
            extra,
        }
    }

    /// Content hash over every field, parents in their listed order.
    pub fn hash(&self) -> Hash {
        codec::hash_of(self)
    }

    /// The hash an author signs: the header with its authentifier zeroed.
    pub fn signing_hash(&self) -> Hash {
        match &self.author {
            Some(author) if !author.authentifier.is_zero() => {
                let mut unsigned = self.clone();
                if let Some(a) = unsigned.author.as_mut() {
                    a.authentifier = Signature::ZERO;
                }
                unsigned.hash()
            }
            _ => self.hash(),
        }
    }

    /// Set the author from `keypair` and sign the header.
    pub fn sign(&mut self, keypair: &KeyPair) {
        self.author = Some(Author {
            address: weave_crypto::derive_address(&keypair.public),
            public_key: keypair.public,
            authentifier: Signature::ZERO,
        });
        let signature = weave_crypto::sign_message(self.signing_hash().as_bytes(), &keypair.private);
        if let Some(author) = self.author.as_mut() {
            author.authentifier = signature;
        }
    }

    /// Check that the author's address belongs to its public key and that
    /// the authentifier signs this header.
    pub fn verify_author(&self) -> Result<(), DagError> {
        let Some(author) = &self.author else {
            return Err(DagError::InvalidSignature(self.hash()));
        };
        let derived = weave_crypto::derive_address(&author.public_key);
        let signing_hash = self.signing_hash();
        if derived != author.address
            || !weave_crypto::verify_signature(
                signing_hash.as_bytes(),
                &author.authentifier,
                &author.public_key,
            )
        {
            return Err(DagError::InvalidSignature(self.hash()));
        }
        Ok(())
    }

    pub fn is_genesis(&self) -> bool {
        self.parent_units.is_empty()
    }

    pub fn author_address(&self) -> Option<&Address> {
        self.author.as_ref().map(|a| &a.address)
    }

    /// Ordered comparison of the whole parent list.
    pub fn same_parents(&self, other: &Header) -> bool {
        self.parent_units == other.parent_units
    }

    /// Order-independent comparison of the whole parent set.
    ///
    /// Two distinct units by one author over the same parent set are a
    /// double authoring at the same DAG position.
    pub fn same_parent_set(&self, other: &Header) -> bool {
        if self.parent_units.len() != other.parent_units.len() {
            return false;
        }
        let mut left = self.parent_units.clone();
        let mut right = other.parent_units.clone();
        left.sort_unstable();
        right.sort_unstable();
        left == right
    }

    /// Structural checks that need no DAG context.
    pub fn validate_structure(&self) -> Result<(), DagError> {
        if self.is_genesis() {
            return Ok(());
        }
        let mut seen = self.parent_units.clone();
        seen.sort_unstable();
        seen.dedup();
        if seen.len() != self.parent_units.len() {
            return Err(DagError::InvalidInput("duplicate parent reference".into()));
        }
        if self.gas_used > self.gas_limit {
            return Err(DagError::InvalidInput(format!(
                "gas used {} exceeds limit {}",
                self.gas_used, self.gas_limit
            )));
        }
        if !self.asset_ids.is_empty() && !self.asset_ids.contains(&self.number.asset_id) {
            return Err(DagError::InvalidInput(format!(
                "chain asset {} not among the unit's assets",
                self.number.asset_id
            )));
        }
        Ok(())
    }
}

/// Independent copy of `header`: every vector is freshly allocated, so
/// mutating the copy never reaches the source.
pub fn copy_header(header: &Header) -> Header {
    Header {
        parent_units: header.parent_units.to_vec(),
        asset_ids: header.asset_ids.to_vec(),
        author: header.author.clone(),
        witnesses: header.witnesses.to_vec(),
        gas_limit: header.gas_limit,
        gas_used: header.gas_used,
        state_root: header.state_root,
        number: header.number,
        extra: header.extra.to_vec(),
    }
}
