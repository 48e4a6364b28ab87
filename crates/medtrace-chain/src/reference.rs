//! Portable `batchId|chainHash` references.
//!
//! This module owns only the string contract. Rendering the string into an
//! optical code (and scanning it back) belongs to an external codec.

use medtrace_contracts::{
    error::{MedtraceError, MedtraceResult},
    verify::BatchReference,
};

use crate::canonical::{validate_batch_id, RESERVED_ID_CHAR};

/// Join a batch id and chain hash into a reference string.
///
/// Fails when the batch id is empty or contains the separator, since such a
/// reference could not be decoded back to the same pair.
pub fn encode_reference(batch_id: &str, chain_hash: &str) -> MedtraceResult<String> {
    validate_batch_id(batch_id).map_err(|e| MedtraceError::MalformedReference {
        reason: e.to_string(),
    })?;
    Ok(format!("{batch_id}{RESERVED_ID_CHAR}{chain_hash}"))
}

/// Split a reference string on its first separator.
pub fn decode_reference(reference: &str) -> MedtraceResult<BatchReference> {
    match reference.split_once(RESERVED_ID_CHAR) {
        None => Err(MedtraceError::MalformedReference {
            reason: format!("no '{RESERVED_ID_CHAR}' separator in reference"),
        }),
        Some(("", _)) => Err(MedtraceError::MalformedReference {
            reason: "reference has an empty batch id".to_string(),
        }),
        Some((_, "")) => Err(MedtraceError::MalformedReference {
            reason: "reference has an empty chain hash".to_string(),
        }),
        Some((batch_id, chain_hash)) => Ok(BatchReference {
            batch_id: batch_id.to_string(),
            chain_hash: chain_hash.to_string(),
        }),
    }
}
