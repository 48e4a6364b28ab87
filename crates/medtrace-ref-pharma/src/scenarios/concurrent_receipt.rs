//! Scenario 3: Concurrent receipt race
//!
//! Two distributor terminals both read the batch, build their receipt block
//! against the same tail, and submit at the same instant. The store's
//! per-batch compare-and-swap lets exactly one land; the other gets a
//! retryable `ChainAppendConflict` and succeeds on resubmission, so the
//! chain stays linear.

use std::sync::Barrier;
use std::thread;

use medtrace_chain::builder;
use medtrace_contracts::{
    block::{BlockEvent, HandoffEvent},
    error::{MedtraceError, MedtraceResult},
    request::Receipt,
};
use medtrace_core::traits::BatchStore;

use super::{short, Harness};
use crate::mock_data::distribution_route;

pub const BATCH_ID: &str = "AMX-2025-1130";

/// Result of one race.
#[derive(Debug)]
pub struct RaceOutcome {
    /// Terminal index (0 or 1) whose block landed first.
    pub winner: usize,
    pub loser_error: MedtraceError,
    /// Chain length after the loser resubmitted.
    pub final_length: usize,
}

/// Race two receipts built from the same stale tail, then let the loser
/// retry through the ledger.
pub fn race(harness: &Harness) -> MedtraceResult<RaceOutcome> {
    harness.create(BATCH_ID)?;
    let stale = harness.store.load_batch(BATCH_ID)?;
    let keys = &harness.ledger.config().keys;

    let route = distribution_route();
    let blocks = route
        .iter()
        .map(|stop| {
            let event = BlockEvent::Distributor(HandoffEvent {
                location: stop.location.to_string(),
                handler_details: stop.handler.to_string(),
                contact_info: stop.contact.to_string(),
            });
            let timestamp = stale.chain[0].timestamp + chrono::Duration::hours(1);
            builder::append(&stale, event, timestamp, keys)
        })
        .collect::<MedtraceResult<Vec<_>>>()?;

    let barrier = Barrier::new(blocks.len());
    let (store, barrier) = (&harness.store, &barrier);
    let results: Vec<MedtraceResult<()>> = thread::scope(|s| {
        let handles: Vec<_> = blocks
            .into_iter()
            .map(|block| {
                s.spawn(move || {
                    barrier.wait();
                    store.append_block(BATCH_ID, block)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| {
                handle.join().unwrap_or_else(|_| {
                    Err(MedtraceError::StoreFailed {
                        reason: "receipt thread panicked".to_string(),
                    })
                })
            })
            .collect()
    });

    let mut winner = None;
    let mut loser = None;
    for (terminal, result) in results.into_iter().enumerate() {
        match result {
            Ok(()) if winner.is_none() => winner = Some(terminal),
            Ok(()) => {
                return Err(MedtraceError::InvalidTransition {
                    reason: "both stale receipts were appended; the chain forked".to_string(),
                })
            }
            Err(err) if err.is_retryable() => loser = Some((terminal, err)),
            Err(err) => return Err(err),
        }
    }
    let (Some(winner), Some((loser_terminal, loser_error))) = (winner, loser) else {
        return Err(MedtraceError::InvalidTransition {
            reason: "race did not produce exactly one winner and one loser".to_string(),
        });
    };

    // The loser resubmits; the ledger rebuilds its block on the fresh tail.
    let stop = &route[loser_terminal];
    harness.ledger.receive(Receipt {
        batch_id: BATCH_ID.to_string(),
        location: Some(stop.location.to_string()),
        handler_details: stop.handler.to_string(),
        contact_info: stop.contact.to_string(),
        timestamp: Some(stop.timestamp.into()),
    })?;

    let report = harness.ledger.verify_batch(BATCH_ID)?;
    Ok(RaceOutcome {
        winner,
        loser_error,
        final_length: report.blocks_checked,
    })
}

/// Run Scenario 3: Concurrent receipt race.
pub fn run_scenario() -> MedtraceResult<()> {
    println!("=== Scenario 3: Concurrent Receipt Race ===");
    println!();

    let harness = Harness::new()?;
    let outcome = race(&harness)?;

    println!("  Terminal {} appended first.", outcome.winner);
    println!("  Other terminal rejected: {}", outcome.loser_error);
    println!("  Retryable:              {}", outcome.loser_error.is_retryable());
    println!("  After resubmission:     {} blocks, AUTHENTIC", outcome.final_length);
    for entry in harness.ledger.history(BATCH_ID)? {
        println!(
            "    {:<12} {:<40} prev {}...",
            entry.role.to_string(),
            entry.location,
            short(&entry.previous_hash)
        );
    }

    println!();
    println!("  Scenario 3 complete.");
    println!();
    Ok(())
}
