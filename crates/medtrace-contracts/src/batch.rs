//! The batch aggregate.
//!
//! A `Batch` is created once by the manufacturer, then only ever grows by
//! appended custody blocks. Confidential attributes are held as sealed
//! envelopes and are never part of any hashed or signed payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::block::ChainBlock;

/// Publicly readable descriptive fields of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicBatchInfo {
    pub medicine_name: String,
    pub manufacturer_name: String,
    pub manufacturing_date: DateTime<Utc>,
    pub expiry_date: DateTime<Utc>,
}

/// Proprietary batch attributes, sealed as one bundle at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidentialDetails {
    /// Potency / strength, e.g. "500mg".
    pub strength: String,
    pub quantity: u64,
    /// Identifier of the downstream distributor the batch is dispatched to.
    pub distributor_id: String,
    pub dispatch_date: DateTime<Utc>,
}

/// Names of the sealed slots a batch carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConfidentialField {
    BatchDetails,
    Prescription,
}

impl ConfidentialField {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidentialField::BatchDetails => "batchDetails",
            ConfidentialField::Prescription => "prescription",
        }
    }
}

/// An authenticated-encryption envelope as stored next to the batch.
///
/// `nonce` and `ciphertext` are lowercase hex. The ciphertext includes the
/// authentication tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SealedField {
    pub algorithm: String,
    pub nonce: String,
    pub ciphertext: String,
}

/// The root aggregate: one medicine batch and its custody chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
    /// Human-assigned identifier. Immutable once set.
    pub batch_id: String,

    #[serde(flatten)]
    pub public: PublicBatchInfo,

    /// Sealed `ConfidentialDetails`.
    pub batch_details: SealedField,

    /// Sealed prescription text, present once the batch is dispensed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prescription: Option<SealedField>,

    /// Cached `dataHash` of the genesis block.
    pub genesis_data_hash: String,

    /// Cached `chainHash` of the genesis block.
    pub genesis_chain_hash: String,

    /// Set once the terminal dispense block is appended.
    #[serde(default)]
    pub is_complete: bool,

    pub created_at: DateTime<Utc>,

    /// Custody blocks in chain order, genesis first.
    pub chain: Vec<ChainBlock>,
}

impl Batch {
    /// The last block in the chain, if any.
    pub fn tail(&self) -> Option<&ChainBlock> {
        self.chain.last()
    }

    /// Replace one sealed confidential slot.
    pub fn set_sealed(&mut self, field: ConfidentialField, sealed: SealedField) {
        match field {
            ConfidentialField::BatchDetails => self.batch_details = sealed,
            ConfidentialField::Prescription => self.prescription = Some(sealed),
        }
    }

    pub fn status(&self) -> BatchStatus {
        if self.is_complete {
            BatchStatus::Completed
        } else {
            BatchStatus::InTransit
        }
    }
}

/// Coarse lifecycle status shown to readers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchStatus {
    InTransit,
    Completed,
}
