//! Pharmaceutical reference runtime demo scenarios.
//!
//! Each scenario is a self-contained module that wires real medtrace
//! components (intake, ledger, in-memory store, validator) together with
//! mock supply-chain data and demonstrates one property of the custody
//! chain.

pub mod concurrent_receipt;
pub mod supply_chain;
pub mod tamper;

use std::sync::Arc;

use tracing::debug;

use medtrace_config::{EngineConfig, EngineSettings};
use medtrace_contracts::{
    batch::Batch,
    block::ChainBlock,
    error::MedtraceResult,
};
use medtrace_core::{traits::FixedClock, CustodyLedger};
use medtrace_intake::IntakeValidator;
use medtrace_store::InMemoryBatchStore;

use crate::{
    codec::TextCodec,
    mock_data::{demo_now, demo_secrets, dispense_body, distribution_route, new_batch_body, receipt_body},
};

/// Embedded engine settings shared by every scenario.
pub const PHARMA_SETTINGS: &str = include_str!("../../settings/pharma.toml");

/// The components one scenario run needs, wired together.
pub struct Harness {
    pub store: Arc<InMemoryBatchStore>,
    pub ledger: CustodyLedger,
    pub intake: IntakeValidator,
    pub codec: TextCodec,
}

impl Harness {
    pub fn new() -> MedtraceResult<Self> {
        let settings = EngineSettings::from_toml_str(PHARMA_SETTINGS)?;
        let config = EngineConfig::new(settings, demo_secrets()?);
        let store = Arc::new(InMemoryBatchStore::new());
        let ledger = CustodyLedger::new(store.clone(), config).with_clock(FixedClock(demo_now()));

        Ok(Self {
            store,
            ledger,
            intake: IntakeValidator::new()?,
            codec: TextCodec,
        })
    }

    /// Create `batch_id` from the mock manufacturer body.
    pub fn create(&self, batch_id: &str) -> MedtraceResult<Batch> {
        let request = self.intake.parse_new_batch(&new_batch_body(batch_id))?;
        self.ledger.create_batch(request)
    }

    /// Record every distributor leg of the mock route.
    pub fn walk_route(&self, batch_id: &str) -> MedtraceResult<Vec<ChainBlock>> {
        distribution_route()
            .iter()
            .map(|stop| {
                debug!(batch_id = %batch_id, location = %stop.location, "route stop");
                let request = self.intake.parse_receipt(&receipt_body(batch_id, stop))?;
                self.ledger.receive(request)
            })
            .collect()
    }

    pub fn dispense(&self, batch_id: &str) -> MedtraceResult<ChainBlock> {
        let request = self.intake.parse_dispense(&dispense_body(batch_id))?;
        self.ledger.dispense(request)
    }

    /// Create, route, and dispense `batch_id`.
    pub fn full_custody(&self, batch_id: &str) -> MedtraceResult<Batch> {
        debug!(batch_id = %batch_id, "full custody walk");
        self.create(batch_id)?;
        self.walk_route(batch_id)?;
        self.dispense(batch_id)?;
        self.ledger.batch(batch_id)
    }
}

/// First 12 characters of a hex digest, for display.
pub(crate) fn short(hash: &str) -> &str {
    hash.get(..12).unwrap_or(hash)
}
