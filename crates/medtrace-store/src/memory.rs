//! In-memory implementation of `BatchStore`.
//!
//! Each batch sits behind its own `Mutex`, so appends to one batch are
//! serialized while different batches proceed in parallel. The outer
//! `RwLock` guards only the id → batch map and is held just long enough to
//! find or insert an entry.
//!
//! `append_block` is a compare-and-swap on the tail: under the batch lock it
//! hands the block to `builder::commit`, which refuses a block whose
//! `previousHash` no longer names the tail. Readers clone the batch under
//! the same lock and so never see a half-applied append.
//! `append_block_with_field` does the same and fills a sealed slot before
//! the lock is released.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use tracing::{info, warn};

use medtrace_chain::builder;
use medtrace_contracts::{
    batch::{Batch, ConfidentialField, SealedField},
    block::ChainBlock,
    error::{MedtraceError, MedtraceResult},
};
use medtrace_core::traits::BatchStore;

type BatchCell = Arc<Mutex<Batch>>;

fn poisoned(what: &str) -> MedtraceError {
    MedtraceError::StoreFailed {
        reason: format!("{what} lock poisoned"),
    }
}

fn log_rejected(batch_id: &str, err: &MedtraceError) {
    if err.is_retryable() {
        warn!(batch_id = %batch_id, error = %err, "append rejected: stale previous hash");
    }
}

fn log_completed(batch: &Batch) {
    if batch.is_complete {
        info!(batch_id = %batch.batch_id, blocks = batch.chain.len(), "batch completed");
    }
}

/// Thread-safe, process-local batch storage.
#[derive(Default)]
pub struct InMemoryBatchStore {
    batches: RwLock<HashMap<String, BatchCell>>,
}

impl InMemoryBatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn cell(&self, batch_id: &str) -> MedtraceResult<BatchCell> {
        let batches = self.batches.read().map_err(|_| poisoned("batch index"))?;
        batches
            .get(batch_id)
            .cloned()
            .ok_or_else(|| MedtraceError::BatchNotFound {
                batch_id: batch_id.to_string(),
            })
    }

    fn lock(cell: &BatchCell) -> MedtraceResult<MutexGuard<'_, Batch>> {
        cell.lock().map_err(|_| poisoned("batch"))
    }

    /// Number of stored batches.
    pub fn len(&self) -> usize {
        self.batches.read().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply `edit` to a stored batch in place, bypassing every chain rule.
    ///
    /// Exists to simulate out-of-band tampering with the storage layer.
    pub fn tamper_with(&self, batch_id: &str, edit: impl FnOnce(&mut Batch)) -> MedtraceResult<()> {
        let cell = self.cell(batch_id)?;
        let mut batch = Self::lock(&cell)?;
        edit(&mut *batch);
        warn!(batch_id = %batch_id, "stored batch modified out of band");
        Ok(())
    }
}

impl BatchStore for InMemoryBatchStore {
    fn insert_batch(&self, batch: Batch) -> MedtraceResult<()> {
        let mut batches = self.batches.write().map_err(|_| poisoned("batch index"))?;
        if batches.contains_key(&batch.batch_id) {
            return Err(MedtraceError::DuplicateBatch {
                batch_id: batch.batch_id,
            });
        }
        info!(batch_id = %batch.batch_id, "batch stored");
        batches.insert(batch.batch_id.clone(), Arc::new(Mutex::new(batch)));
        Ok(())
    }

    fn load_batch(&self, batch_id: &str) -> MedtraceResult<Batch> {
        let cell = self.cell(batch_id)?;
        let batch = Self::lock(&cell)?;
        Ok(batch.clone())
    }

    fn append_block(&self, batch_id: &str, block: ChainBlock) -> MedtraceResult<()> {
        let cell = self.cell(batch_id)?;
        let mut batch = Self::lock(&cell)?;
        builder::commit(&mut batch, block).inspect_err(|err| log_rejected(batch_id, err))?;
        log_completed(&batch);
        Ok(())
    }

    fn append_block_with_field(
        &self,
        batch_id: &str,
        block: ChainBlock,
        field: ConfidentialField,
        sealed: SealedField,
    ) -> MedtraceResult<()> {
        let cell = self.cell(batch_id)?;
        let mut batch = Self::lock(&cell)?;
        builder::commit_with_field(&mut batch, block, field, sealed)
            .inspect_err(|err| log_rejected(batch_id, err))?;
        log_completed(&batch);
        Ok(())
    }

    fn save_encrypted_field(
        &self,
        batch_id: &str,
        field: ConfidentialField,
        sealed: SealedField,
    ) -> MedtraceResult<()> {
        let cell = self.cell(batch_id)?;
        let mut batch = Self::lock(&cell)?;
        batch.set_sealed(field, sealed);
        Ok(())
    }

    fn batch_ids(&self) -> MedtraceResult<Vec<String>> {
        let batches = self.batches.read().map_err(|_| poisoned("batch index"))?;
        let mut ids: Vec<String> = batches.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}
