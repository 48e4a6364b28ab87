//! Content and chain fingerprints.
//!
//! Both functions are pure SHA-256 over explicit byte sequences and return
//! lowercase 64-character hex strings.
//!
//! - `data_hash` covers one block's canonical payload.
//! - `chain_hash` covers `previous chainHash ‖ dataHash`, ASCII hex, with no
//!   separator. Because each chain hash folds in its predecessor, it commits
//!   to the entire history up to that block.

use sha2::{Digest, Sha256};

use crate::canonical::CanonicalPayload;

/// SHA-256 of `bytes`, hex-encoded.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Fingerprint of a canonical payload.
pub fn data_hash(payload: &CanonicalPayload) -> String {
    sha256_hex(payload.as_bytes())
}

/// Fold `data_hash` into the chain after `previous_chain_hash`.
///
/// For the genesis block `previous_chain_hash` is `GENESIS_BLOCK_HASH`.
pub fn chain_hash(previous_chain_hash: &str, data_hash: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(previous_chain_hash.as_bytes());
    hasher.update(data_hash.as_bytes());
    hex::encode(hasher.finalize())
}
