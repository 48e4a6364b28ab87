//! Scenario 1: Full custody walk
//!
//! One batch travels the whole chain of custody:
//!   1. Manufacturer creates the batch; the genesis block is sealed and a
//!      reference code is issued
//!   2. Two distributor legs are received, each validated before appending
//!   3. The pharmacy dispenses, completing the batch atomically
//!   4. The chain is re-verified; the code issued at step 1 and the latest
//!      code both still verify
//!   5. The custody timeline and the sealed fields are revealed
//!
//! With `export_dir`, the finished batch is also written as a JSON snapshot.

use std::path::Path;

use medtrace_contracts::error::MedtraceResult;
use medtrace_store::snapshot;

use super::{short, Harness};

pub const BATCH_ID: &str = "AMX-2025-1128";

/// Run Scenario 1: Full custody walk.
pub fn run_scenario(export_dir: Option<&Path>) -> MedtraceResult<()> {
    println!("=== Scenario 1: Full Custody Walk ===");
    println!();

    let harness = Harness::new()?;
    let ledger = &harness.ledger;

    // ── Manufacturer ──────────────────────────────────────────────────────────

    let batch = harness.create(BATCH_ID)?;
    let genesis = &batch.chain[0];
    let first_code = ledger.render_reference(&harness.codec, BATCH_ID)?;

    println!("  Batch created:          {}", batch.batch_id);
    println!("  Medicine:               {}", batch.public.medicine_name);
    println!("  Genesis previousHash:   {}", genesis.previous_hash);
    println!("  Genesis dataHash:       {}...", short(&genesis.data_hash));
    println!("  Reference code issued:  {} bytes", first_code.len());
    println!();

    // ── Distribution ──────────────────────────────────────────────────────────

    for block in harness.walk_route(BATCH_ID)? {
        println!(
            "  [{}] {:<40} chainHash {}...",
            block.role(),
            block.event.location(),
            short(&block.chain_hash)
        );
    }

    // ── Pharmacy ──────────────────────────────────────────────────────────────

    let dispensed = harness.dispense(BATCH_ID)?;
    println!(
        "  [{}] {:<43} chainHash {}...",
        dispensed.role(),
        dispensed.event.location(),
        short(&dispensed.chain_hash)
    );
    println!();

    // ── Verification ──────────────────────────────────────────────────────────

    let report = ledger.verify_batch(BATCH_ID)?;
    println!(
        "  Chain verification:     AUTHENTIC ({} blocks, signatures {})",
        report.blocks_checked,
        if report.signatures_checked { "checked" } else { "skipped" }
    );

    let early = ledger.scan_and_verify(&harness.codec, &first_code)?;
    let latest = ledger.scan_and_verify(&harness.codec, &ledger.render_reference(&harness.codec, BATCH_ID)?)?;
    println!(
        "  Creation-time code:     VERIFIED (block {}, latest: {})",
        early.position, early.is_latest
    );
    println!(
        "  Current code:           VERIFIED (block {}, latest: {})",
        latest.position, latest.is_latest
    );
    println!();

    // ── Timeline & sealed fields ──────────────────────────────────────────────

    println!("  Custody timeline:");
    for entry in ledger.history(BATCH_ID)? {
        println!(
            "    {}  {:<12} {:<40} signature {}",
            entry.timestamp.format("%Y-%m-%d %H:%M"),
            entry.role.to_string(),
            entry.location,
            if entry.signature_valid { "OK" } else { "INVALID" }
        );
    }

    let details = ledger.reveal_confidential(BATCH_ID)?;
    let prescription = ledger.reveal_prescription(BATCH_ID)?;
    println!();
    println!(
        "  Sealed batch details:   strength {}, quantity {}, distributor {}",
        details.strength, details.quantity, details.distributor_id
    );
    println!(
        "  Sealed prescription:    {}",
        prescription.as_deref().unwrap_or("(none)")
    );

    if let Some(dir) = export_dir {
        let path = snapshot::write_snapshot(dir, &ledger.batch(BATCH_ID)?)?;
        println!("  Snapshot written:       {}", path.display());
    }

    println!();
    println!("  Scenario 1 complete.");
    println!();
    Ok(())
}
