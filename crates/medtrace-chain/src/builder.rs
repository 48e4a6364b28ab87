//! Block construction and the batch's append-only rules.
//!
//! `create_genesis` and `append` build fully populated, signed blocks;
//! `commit` attaches a built block to a batch only if it still links to the
//! current tail, which is what lets a store turn a lost race into a
//! `ChainAppendConflict` instead of a fork.

use chrono::{DateTime, Utc};
use tracing::debug;

use medtrace_contracts::{
    batch::{Batch, ConfidentialField, PublicBatchInfo, SealedField},
    block::{BlockEvent, ChainBlock, GenesisEvent, GENESIS_BLOCK_HASH},
    error::{MedtraceError, MedtraceResult},
    keys::SigningKeys,
};

use crate::{
    canonical::{canonicalize, validate_batch_id},
    hash::{chain_hash, data_hash},
    sign::{sign, SignatureSummary},
};

/// Hash, link, and sign `event` after the given predecessor values.
fn seal_block(
    batch_id: &str,
    event: BlockEvent,
    timestamp: DateTime<Utc>,
    previous_hash: &str,
    previous_chain_hash: &str,
    keys: &dyn SigningKeys,
) -> ChainBlock {
    let payload = canonicalize(batch_id, &event, &timestamp, previous_hash);
    let data_hash = data_hash(&payload);
    let chain_hash = chain_hash(previous_chain_hash, &data_hash);

    let role = event.role();
    let summary = SignatureSummary {
        batch_id,
        data_hash: &data_hash,
        chain_hash: &chain_hash,
        timestamp,
        role,
    };
    let hmac_signature = sign(&summary, keys.signing_key(role));

    ChainBlock {
        event,
        timestamp,
        previous_hash: previous_hash.to_string(),
        data_hash,
        chain_hash,
        hmac_signature,
    }
}

/// Build the first block of a batch.
///
/// The seed `GENESIS_BLOCK_HASH` stands in for both the previous data hash
/// and the previous chain hash.
pub fn create_genesis(
    batch_id: &str,
    event: GenesisEvent,
    timestamp: DateTime<Utc>,
    keys: &dyn SigningKeys,
) -> MedtraceResult<ChainBlock> {
    validate_batch_id(batch_id)?;
    let block = seal_block(
        batch_id,
        BlockEvent::Manufacturer(event),
        timestamp,
        GENESIS_BLOCK_HASH,
        GENESIS_BLOCK_HASH,
        keys,
    );
    debug!(batch_id = %batch_id, data_hash = %block.data_hash, "genesis block built");
    Ok(block)
}

/// Assemble a new batch around its genesis block, caching the genesis hashes.
pub fn open_batch(
    batch_id: &str,
    public: PublicBatchInfo,
    batch_details: SealedField,
    genesis: ChainBlock,
    created_at: DateTime<Utc>,
) -> MedtraceResult<Batch> {
    validate_batch_id(batch_id)?;
    if !genesis.is_genesis() || !matches!(genesis.event, BlockEvent::Manufacturer(_)) {
        return Err(MedtraceError::InvalidTransition {
            reason: "a batch must open with a Manufacturer genesis block".to_string(),
        });
    }

    Ok(Batch {
        batch_id: batch_id.to_string(),
        public,
        batch_details,
        prescription: None,
        genesis_data_hash: genesis.data_hash.clone(),
        genesis_chain_hash: genesis.chain_hash.clone(),
        is_complete: false,
        created_at,
        chain: vec![genesis],
    })
}

/// Build the next block for `batch` from its current tail.
///
/// Rejects closed batches, a second Manufacturer block, and timestamps that
/// precede the tail. The returned block is not attached; pass it to
/// `commit` (usually via a store) to make it part of the chain.
pub fn append(
    batch: &Batch,
    event: BlockEvent,
    timestamp: DateTime<Utc>,
    keys: &dyn SigningKeys,
) -> MedtraceResult<ChainBlock> {
    if batch.is_complete {
        return Err(MedtraceError::BatchClosed {
            batch_id: batch.batch_id.clone(),
        });
    }
    if matches!(event, BlockEvent::Manufacturer(_)) {
        return Err(MedtraceError::InvalidTransition {
            reason: format!("batch '{}' already has a genesis block", batch.batch_id),
        });
    }

    let tail = batch.tail().ok_or_else(|| MedtraceError::InvalidTransition {
        reason: format!("batch '{}' has no genesis block to extend", batch.batch_id),
    })?;
    if tail.event.is_terminal() {
        return Err(MedtraceError::BatchClosed {
            batch_id: batch.batch_id.clone(),
        });
    }
    if timestamp < tail.timestamp {
        return Err(MedtraceError::InvalidTransition {
            reason: format!(
                "event time {} precedes the previous custody event at {}",
                timestamp, tail.timestamp
            ),
        });
    }

    Ok(seal_block(
        &batch.batch_id,
        event,
        timestamp,
        &tail.data_hash,
        &tail.chain_hash,
        keys,
    ))
}

/// Attach a built block to `batch` if it still links to the tail.
///
/// A block built against a stale tail yields `ChainAppendConflict` and leaves
/// the batch untouched. A terminal (Pharmacy) block completes the batch in
/// the same step.
pub fn commit(batch: &mut Batch, block: ChainBlock) -> MedtraceResult<()> {
    if batch.is_complete {
        return Err(MedtraceError::BatchClosed {
            batch_id: batch.batch_id.clone(),
        });
    }

    let current = batch
        .tail()
        .map(|tail| tail.data_hash.as_str())
        .unwrap_or(GENESIS_BLOCK_HASH);
    if block.previous_hash != current {
        return Err(MedtraceError::ChainAppendConflict {
            batch_id: batch.batch_id.clone(),
            attempted: block.previous_hash.clone(),
            current: current.to_string(),
        });
    }

    let terminal = block.event.is_terminal();
    batch.chain.push(block);
    if terminal {
        mark_complete(batch)?;
    }
    Ok(())
}

/// `commit`, then fill one sealed slot. Nothing is attached if the block is
/// refused.
pub fn commit_with_field(
    batch: &mut Batch,
    block: ChainBlock,
    field: ConfidentialField,
    sealed: SealedField,
) -> MedtraceResult<()> {
    commit(batch, block)?;
    batch.set_sealed(field, sealed);
    Ok(())
}

/// Close the batch. Valid only once its tail is a Pharmacy dispense block.
pub fn mark_complete(batch: &mut Batch) -> MedtraceResult<()> {
    match batch.tail() {
        Some(tail) if tail.event.is_terminal() => {
            batch.is_complete = true;
            Ok(())
        }
        _ => Err(MedtraceError::InvalidTransition {
            reason: format!(
                "batch '{}' cannot be completed before a dispense event",
                batch.batch_id
            ),
        }),
    }
}
