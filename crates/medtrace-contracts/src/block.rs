//! Chain block types.
//!
//! A `ChainBlock` is one custody event. The role-specific fields live in a
//! closed `BlockEvent` sum type so that every field that is ever hashed is
//! named in the type; nothing rides along untyped.
//!
//! On the wire the event is flattened into the block and tagged by `role`:
//!
//! ```json
//! {
//!   "role": "Distributor",
//!   "location": "Regional Warehouse",
//!   "handlerDetails": "R. Osei",
//!   "contactInfo": "+44 20 7946 0000",
//!   "timestamp": "2025-12-03T09:15:00Z",
//!   "previousHash": "…",
//!   "dataHash": "…",
//!   "chainHash": "…",
//!   "hmacSignature": "…"
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::role::Role;

/// Seed standing in for the previous hash of the genesis block.
///
/// Cross-version constant: changing it invalidates every stored chain.
pub const GENESIS_BLOCK_HASH: &str = "GENESIS_BLOCK_HASH";

/// Fields recorded by the manufacturer when a batch is created.
///
/// The public descriptive fields are replicated here so a verifier never
/// needs a second source of truth for what was hashed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenesisEvent {
    /// Where the batch left production. Not part of the canonical payload.
    pub location: String,
    pub medicine_name: String,
    pub manufacturer_name: String,
    /// Units produced, already coerced to a whole number.
    pub quantity: u64,
    pub manufacturing_date: DateTime<Utc>,
    pub expiry_date: DateTime<Utc>,
}

/// Fields recorded when a downstream custodian takes the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandoffEvent {
    pub location: String,
    /// Name of the person or site that handled the batch.
    pub handler_details: String,
    pub contact_info: String,
}

/// The role-tagged body of a chain block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role")]
pub enum BlockEvent {
    /// Batch creation. Only ever the first block.
    Manufacturer(GenesisEvent),
    /// Receipt by a distributor. May repeat.
    Distributor(HandoffEvent),
    /// Dispense by a pharmacy. Terminal.
    Pharmacy(HandoffEvent),
}

impl BlockEvent {
    pub fn role(&self) -> Role {
        match self {
            BlockEvent::Manufacturer(_) => Role::Manufacturer,
            BlockEvent::Distributor(_) => Role::Distributor,
            BlockEvent::Pharmacy(_) => Role::Pharmacy,
        }
    }

    pub fn location(&self) -> &str {
        match self {
            BlockEvent::Manufacturer(e) => &e.location,
            BlockEvent::Distributor(e) | BlockEvent::Pharmacy(e) => &e.location,
        }
    }

    /// True for the dispense event that closes a batch.
    pub fn is_terminal(&self) -> bool {
        matches!(self, BlockEvent::Pharmacy(_))
    }
}

/// One immutable custody block in a batch's chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainBlock {
    #[serde(flatten)]
    pub event: BlockEvent,

    /// When the event was recorded, truncated to millisecond precision.
    pub timestamp: DateTime<Utc>,

    /// `dataHash` of the preceding block, or `GENESIS_BLOCK_HASH`.
    pub previous_hash: String,

    /// SHA-256 (hex) of this block's canonical payload.
    pub data_hash: String,

    /// SHA-256 (hex) of `previous chainHash ‖ dataHash`.
    pub chain_hash: String,

    /// HMAC-SHA256 (hex) over the block's signature summary.
    pub hmac_signature: String,
}

impl ChainBlock {
    pub fn role(&self) -> Role {
        self.event.role()
    }

    pub fn is_genesis(&self) -> bool {
        self.previous_hash == GENESIS_BLOCK_HASH
    }
}
