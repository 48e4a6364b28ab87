//! Chain verification outcomes.
//!
//! The validator either walks the whole chain and produces a `ChainReport`,
//! or stops at the first divergence with an `IntegrityFailure` naming the
//! block index and the reason.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MedtraceError;
use crate::role::Role;

/// Why a block failed re-verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntegrityReason {
    /// The recorded fields no longer hash to the stored `dataHash`.
    DataMismatch,
    /// `previousHash` does not point at the preceding block.
    LinkBroken,
    /// The stored `chainHash` does not fold the prior chain correctly.
    ChainMismatch,
    /// The HMAC signature does not verify under the role's key.
    SignatureInvalid,
    /// The chain has no blocks at all.
    MissingGenesis,
    /// A Manufacturer block outside index 0, or a non-Manufacturer genesis.
    RoleOutOfOrder,
}

impl IntegrityReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntegrityReason::DataMismatch => "DATA_MISMATCH",
            IntegrityReason::LinkBroken => "LINK_BROKEN",
            IntegrityReason::ChainMismatch => "CHAIN_MISMATCH",
            IntegrityReason::SignatureInvalid => "SIGNATURE_INVALID",
            IntegrityReason::MissingGenesis => "MISSING_GENESIS",
            IntegrityReason::RoleOutOfOrder => "ROLE_OUT_OF_ORDER",
        }
    }
}

impl fmt::Display for IntegrityReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The first point of divergence found by the validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityFailure {
    pub index: usize,
    pub reason: IntegrityReason,
}

impl From<IntegrityFailure> for MedtraceError {
    fn from(f: IntegrityFailure) -> Self {
        MedtraceError::ChainIntegrity {
            index: f.index,
            reason: f.reason,
        }
    }
}

/// Summary of a chain that verified end to end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainReport {
    pub batch_id: String,
    pub blocks_checked: usize,
    /// `chainHash` of the last block; a compact commitment to the history.
    pub terminal_chain_hash: String,
    /// False when signature checks were skipped by policy.
    pub signatures_checked: bool,
}

/// A `batchId|chainHash` reference decoded from a portable code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReference {
    pub batch_id: String,
    pub chain_hash: String,
}

/// Result of verifying a scanned reference against its batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceCheck {
    pub report: ChainReport,
    /// Index of the block whose `chainHash` the reference names.
    pub position: usize,
    /// True when the reference names the current tail of the chain.
    pub is_latest: bool,
}

/// One row of a batch's custody timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntry {
    pub role: Role,
    pub location: String,
    pub timestamp: DateTime<Utc>,
    pub previous_hash: String,
    pub chain_hash: String,
    pub signature_valid: bool,
}
