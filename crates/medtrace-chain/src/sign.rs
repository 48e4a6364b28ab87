//! HMAC signatures proving which custodian emitted a block.
//!
//! The signed message is the canonical JSON of a reduced summary:
//! `{batchId, chainHash, dataHash, role, timestamp}` with keys sorted and the
//! timestamp rendered by `canonical::format_instant`. It is independent of
//! data-hash correctness: a block can have a valid hash and a forged
//! signature, or the reverse, and each is detected separately.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;

use medtrace_contracts::{block::ChainBlock, keys::SigningKey, role::Role};

use crate::canonical::{format_instant, sorted_json};

type HmacSha256 = Hmac<Sha256>;

/// The fields a block signature commits to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureSummary<'a> {
    pub batch_id: &'a str,
    pub data_hash: &'a str,
    pub chain_hash: &'a str,
    pub timestamp: DateTime<Utc>,
    pub role: Role,
}

impl<'a> SignatureSummary<'a> {
    /// Summarize a stored block for signing or verification.
    pub fn for_block(batch_id: &'a str, block: &'a ChainBlock) -> Self {
        Self {
            batch_id,
            data_hash: &block.data_hash,
            chain_hash: &block.chain_hash,
            timestamp: block.timestamp,
            role: block.role(),
        }
    }

    /// The exact bytes fed to the MAC.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut fields: BTreeMap<&'static str, Value> = BTreeMap::new();
        fields.insert("batchId", Value::from(self.batch_id));
        fields.insert("dataHash", Value::from(self.data_hash));
        fields.insert("chainHash", Value::from(self.chain_hash));
        fields.insert("timestamp", Value::from(format_instant(&self.timestamp)));
        fields.insert("role", Value::from(self.role.as_str()));
        sorted_json(fields)
    }
}

fn keyed(key: &SigningKey) -> HmacSha256 {
    // HMAC hashes over-long keys and pads short ones; no length is invalid.
    <HmacSha256 as Mac>::new_from_slice(key.as_bytes()).expect("HMAC accepts keys of any length")
}

/// Compute the hex HMAC-SHA256 of `summary` under `key`.
pub fn sign(summary: &SignatureSummary<'_>, key: &SigningKey) -> String {
    let mut mac = keyed(key);
    mac.update(&summary.canonical_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Check `signature_hex` against `summary` in constant time.
///
/// Malformed hex is simply a failed verification.
pub fn verify(summary: &SignatureSummary<'_>, signature_hex: &str, key: &SigningKey) -> bool {
    let Ok(expected) = hex::decode(signature_hex) else {
        return false;
    };
    let mut mac = keyed(key);
    mac.update(&summary.canonical_bytes());
    mac.verify_slice(&expected).is_ok()
}
