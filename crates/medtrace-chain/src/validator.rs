//! Chain validation: one left-to-right pass that re-derives every hash.
//!
//! For each block `i`:
//!
//! 1. **Role order**: only block 0 is a Manufacturer block, and nothing
//!    follows a Pharmacy block.
//! 2. **Data**: `dataHash` must equal the hash of the block's re-derived
//!    canonical payload.
//! 3. **Link**: `previousHash` must equal the `dataHash` of block `i-1`, or
//!    `GENESIS_BLOCK_HASH` for block 0.
//! 4. **Chain**: `chainHash` must equal `H(expected previous chainHash ‖
//!    fresh dataHash)`.
//! 5. **Signature** (unless skipped by policy): the HMAC must verify under
//!    the role's key.
//!
//! The walk stops at the first failure and reports its index and reason.

use tracing::{debug, warn};

use medtrace_contracts::{
    batch::{Batch, PublicBatchInfo},
    block::{BlockEvent, ChainBlock, GenesisEvent, GENESIS_BLOCK_HASH},
    keys::SigningKeys,
    verify::{ChainReport, IntegrityFailure, IntegrityReason},
};

use crate::{
    canonical::canonicalize_block,
    hash::{chain_hash, data_hash},
    sign::{verify, SignatureSummary},
};

/// Whether block signatures are checked during validation.
#[derive(Clone, Copy)]
pub enum SignatureCheck<'a> {
    Enforce(&'a dyn SigningKeys),
    Skip,
}

impl SignatureCheck<'_> {
    pub fn is_enforced(&self) -> bool {
        matches!(self, SignatureCheck::Enforce(_))
    }
}

fn fail(batch_id: &str, index: usize, reason: IntegrityReason) -> IntegrityFailure {
    warn!(batch_id = %batch_id, index, reason = %reason, "chain integrity failure");
    IntegrityFailure { index, reason }
}

/// Validate an ordered chain belonging to `batch_id`.
///
/// An empty chain fails at index 0 with `MissingGenesis`: every batch is
/// created with its genesis block.
pub fn validate_chain(
    batch_id: &str,
    blocks: &[ChainBlock],
    signatures: SignatureCheck<'_>,
) -> Result<ChainReport, IntegrityFailure> {
    if blocks.is_empty() {
        return Err(fail(batch_id, 0, IntegrityReason::MissingGenesis));
    }

    let mut expected_previous_chain_hash = GENESIS_BLOCK_HASH.to_string();

    for (index, block) in blocks.iter().enumerate() {
        let previous = index.checked_sub(1).map(|i| &blocks[i]);

        let is_manufacturer = matches!(block.event, BlockEvent::Manufacturer(_));
        let out_of_order = match previous {
            None => !is_manufacturer,
            Some(prev) => is_manufacturer || prev.event.is_terminal(),
        };
        if out_of_order {
            return Err(fail(batch_id, index, IntegrityReason::RoleOutOfOrder));
        }

        let fresh_data_hash = data_hash(&canonicalize_block(batch_id, block));
        if fresh_data_hash != block.data_hash {
            return Err(fail(batch_id, index, IntegrityReason::DataMismatch));
        }

        let expected_link = previous
            .map(|prev| prev.data_hash.as_str())
            .unwrap_or(GENESIS_BLOCK_HASH);
        if block.previous_hash != expected_link {
            return Err(fail(batch_id, index, IntegrityReason::LinkBroken));
        }

        let fresh_chain_hash = chain_hash(&expected_previous_chain_hash, &fresh_data_hash);
        if fresh_chain_hash != block.chain_hash {
            return Err(fail(batch_id, index, IntegrityReason::ChainMismatch));
        }

        if let SignatureCheck::Enforce(keys) = signatures {
            let summary = SignatureSummary::for_block(batch_id, block);
            if !verify(&summary, &block.hmac_signature, keys.signing_key(block.role())) {
                return Err(fail(batch_id, index, IntegrityReason::SignatureInvalid));
            }
        }

        debug!(batch_id = %batch_id, index, role = %block.role(), "block verified");
        expected_previous_chain_hash = block.chain_hash.clone();
    }

    Ok(ChainReport {
        batch_id: batch_id.to_string(),
        blocks_checked: blocks.len(),
        terminal_chain_hash: expected_previous_chain_hash,
        signatures_checked: signatures.is_enforced(),
    })
}

/// Validate a whole batch: its chain, the cached genesis hashes, and the
/// public descriptive fields.
///
/// Stale caches and public fields that differ from what the genesis block
/// hashed are reported against block 0, since they claim to describe it.
pub fn validate_batch(
    batch: &Batch,
    signatures: SignatureCheck<'_>,
) -> Result<ChainReport, IntegrityFailure> {
    let report = validate_chain(&batch.batch_id, &batch.chain, signatures)?;

    let genesis = &batch.chain[0];
    if let BlockEvent::Manufacturer(event) = &genesis.event {
        if !public_matches_genesis(&batch.public, event) {
            return Err(fail(&batch.batch_id, 0, IntegrityReason::DataMismatch));
        }
    }
    if batch.genesis_data_hash != genesis.data_hash {
        return Err(fail(&batch.batch_id, 0, IntegrityReason::DataMismatch));
    }
    if batch.genesis_chain_hash != genesis.chain_hash {
        return Err(fail(&batch.batch_id, 0, IntegrityReason::ChainMismatch));
    }
    Ok(report)
}

fn public_matches_genesis(public: &PublicBatchInfo, genesis: &GenesisEvent) -> bool {
    public.medicine_name == genesis.medicine_name
        && public.manufacturer_name == genesis.manufacturer_name
        && public.manufacturing_date == genesis.manufacturing_date
        && public.expiry_date == genesis.expiry_date
}

/// Position of the block whose `chainHash` equals `chain_hash`, if any.
pub fn locate_chain_hash(blocks: &[ChainBlock], chain_hash: &str) -> Option<usize> {
    blocks.iter().position(|block| block.chain_hash == chain_hash)
}
