//! Collaborator contracts the custody ledger consumes.
//!
//! - `BatchStore`   : persistence, with an atomic per-batch append
//! - `OpticalCodec` : renders and scans portable reference strings
//! - `Clock`        : the source of "now" for events without a timestamp
//!
//! The ledger owns ordering and integrity rules; implementations of these
//! traits only move bytes.

use chrono::{DateTime, Utc};

use medtrace_contracts::{
    batch::{Batch, ConfidentialField, SealedField},
    block::ChainBlock,
    error::MedtraceResult,
};

/// Persistence for batches and their chains.
pub trait BatchStore: Send + Sync {
    /// Store a freshly created batch.
    ///
    /// Returns `MedtraceError::DuplicateBatch` if the id is taken.
    fn insert_batch(&self, batch: Batch) -> MedtraceResult<()>;

    /// A consistent snapshot of the batch, chain included.
    ///
    /// Returns `MedtraceError::BatchNotFound` for unknown ids.
    fn load_batch(&self, batch_id: &str) -> MedtraceResult<Batch>;

    /// The batch's blocks in chain order.
    fn load_chain(&self, batch_id: &str) -> MedtraceResult<Vec<ChainBlock>> {
        Ok(self.load_batch(batch_id)?.chain)
    }

    /// Attach `block` to the chain as one indivisible step.
    ///
    /// Implementations must serialize appends per batch and refuse a block
    /// whose `previousHash` is not the current tail's `dataHash`
    /// (`ChainAppendConflict`). A terminal block completes the batch in the
    /// same step. Readers never observe a partial append.
    fn append_block(&self, batch_id: &str, block: ChainBlock) -> MedtraceResult<()>;

    /// `append_block`, filling one sealed slot in the same step. Either both
    /// land or neither does.
    fn append_block_with_field(
        &self,
        batch_id: &str,
        block: ChainBlock,
        field: ConfidentialField,
        sealed: SealedField,
    ) -> MedtraceResult<()>;

    /// Replace one sealed confidential slot.
    fn save_encrypted_field(
        &self,
        batch_id: &str,
        field: ConfidentialField,
        sealed: SealedField,
    ) -> MedtraceResult<()>;

    /// Ids of every stored batch, sorted.
    fn batch_ids(&self) -> MedtraceResult<Vec<String>>;
}

/// An external optical code library (QR or similar).
pub trait OpticalCodec: Send + Sync {
    /// Render `reference` into image bytes.
    fn render(&self, reference: &str) -> MedtraceResult<Vec<u8>>;

    /// Decode the reference carried by `image`, if one can be found.
    fn scan(&self, image: &[u8]) -> MedtraceResult<Option<String>>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at one instant, for reproducible runs.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
