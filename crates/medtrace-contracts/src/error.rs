//! Error types for the medtrace custody engine.
//!
//! Every fallible operation in the workspace returns `MedtraceResult<T>`.
//! Variants carry enough context for the calling transport layer to decide
//! whether to surface, retry, or refuse the custody action.

use thiserror::Error;

use crate::verify::IntegrityReason;

/// The unified error type for the medtrace workspace.
#[derive(Debug, Error)]
pub enum MedtraceError {
    /// A batch with this identifier already exists. The caller must pick
    /// another identifier.
    #[error("batch '{batch_id}' already exists")]
    DuplicateBatch { batch_id: String },

    /// No batch is stored under this identifier.
    #[error("batch '{batch_id}' not found")]
    BatchNotFound { batch_id: String },

    /// A concurrent append won the race for the tail of the chain.
    ///
    /// The only retryable error: reload the chain and rebuild the block
    /// against the refreshed last-block hash.
    #[error(
        "append conflict on batch '{batch_id}': block links to '{attempted}' but chain tail is '{current}'"
    )]
    ChainAppendConflict {
        batch_id: String,
        attempted: String,
        current: String,
    },

    /// The batch already carries its terminal dispense block.
    #[error("batch '{batch_id}' is complete; no further custody events may be appended")]
    BatchClosed { batch_id: String },

    /// An input field could not be normalized into its canonical form.
    #[error("cannot canonicalize field '{field}': {reason}")]
    Canonicalization { field: String, reason: String },

    /// The validator found a divergence in the stored chain.
    ///
    /// Always fatal to the operation that requested verification.
    #[error("chain integrity failure at block {index}: {reason}")]
    ChainIntegrity { index: usize, reason: IntegrityReason },

    /// Sealed data could not be opened: wrong key or corrupt ciphertext.
    #[error("decryption failed: {reason}")]
    Decryption { reason: String },

    /// A confidential field could not be serialized or encrypted.
    #[error("sealing failed: {reason}")]
    SealFailed { reason: String },

    /// A portable reference string did not follow the `batchId|chainHash` shape.
    #[error("malformed reference: {reason}")]
    MalformedReference { reason: String },

    /// A reference decoded cleanly but names a chain hash the batch never had.
    #[error("reference hash '{chain_hash}' does not appear in the chain of batch '{batch_id}'")]
    ReferenceMismatch { batch_id: String, chain_hash: String },

    /// A custody action was attempted out of order (e.g. a second genesis).
    #[error("invalid custody transition: {reason}")]
    InvalidTransition { reason: String },

    /// A raw request body failed boundary validation.
    #[error("request rejected at intake: {reason}")]
    IntakeRejected { reason: String },

    /// A required configuration value or secret is missing or invalid.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },

    /// The persistence collaborator failed.
    #[error("batch store failure: {reason}")]
    StoreFailed { reason: String },
}

impl MedtraceError {
    /// True when the caller may safely retry the same logical action.
    pub fn is_retryable(&self) -> bool {
        matches!(self, MedtraceError::ChainAppendConflict { .. })
    }

    /// Shorthand for a `Canonicalization` error.
    pub fn canonicalization(field: impl Into<String>, reason: impl Into<String>) -> Self {
        MedtraceError::Canonicalization {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Convenience alias used throughout the medtrace crates.
pub type MedtraceResult<T> = Result<T, MedtraceError>;
