//! The custody ledger: every custody action runs through here.
//!
//! Pipeline for a handoff (receipt or dispense):
//!
//!   Normalize input → Load batch → Validate whole chain → Build block → Atomic append
//!
//! A chain that fails validation is a hard stop: the handoff is refused with
//! the failing index and reason, and nothing is appended. Only
//! `ChainAppendConflict` is worth retrying; the caller does so by resubmitting
//! the same request, which rebuilds the block against the fresh tail.

use std::sync::Arc;

use tracing::{debug, info, warn};

use medtrace_chain::{
    builder,
    canonical::{normalize_instant, normalize_quantity, validate_batch_id},
    reference::{decode_reference, encode_reference},
    sign::{verify, SignatureSummary},
    validator::{locate_chain_hash, validate_batch},
};
use medtrace_config::EngineConfig;
use medtrace_contracts::{
    batch::{Batch, ConfidentialDetails, ConfidentialField, PublicBatchInfo, SealedField},
    block::{BlockEvent, ChainBlock, GenesisEvent, HandoffEvent},
    error::{MedtraceError, MedtraceResult},
    keys::SigningKeys,
    request::{Dispense, NewBatch, RawInstant, Receipt},
    role::Role,
    verify::{BatchReference, ChainReport, ReferenceCheck, TimelineEntry},
};
use medtrace_seal::{open_json, open_text, seal_json, seal_text, SealContext};

use crate::traits::{BatchStore, Clock, OpticalCodec, SystemClock};

/// Orchestrates custody actions over a `BatchStore`.
///
/// Holds no per-batch state; any number of threads may share one ledger.
pub struct CustodyLedger {
    store: Arc<dyn BatchStore>,
    config: EngineConfig,
    clock: Box<dyn Clock>,
}

impl CustodyLedger {
    pub fn new(store: Arc<dyn BatchStore>, config: EngineConfig) -> Self {
        Self {
            store,
            config,
            clock: Box::new(SystemClock),
        }
    }

    /// Replace the wall clock used for events that carry no timestamp.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ── Custody actions ──────────────────────────────────────────────────────

    /// Create a batch and its Manufacturer genesis block.
    ///
    /// Every input field is normalized before anything is hashed; an
    /// unparsable field fails the request with `Canonicalization` and nothing
    /// is stored.
    pub fn create_batch(&self, request: NewBatch) -> MedtraceResult<Batch> {
        let NewBatch {
            batch_id,
            medicine_name,
            manufacturer_name,
            manufacturing_date,
            expiry_date,
            quantity,
            strength,
            distributor_id,
            dispatch_date,
            location,
            timestamp,
        } = request;

        validate_batch_id(&batch_id)?;
        let now = self.clock.now();
        let timestamp = normalize_instant("timestamp", timestamp.as_ref(), now)?;

        let event = GenesisEvent {
            location: self.location(Role::Manufacturer, location),
            medicine_name: required_text("medicineName", medicine_name)?,
            manufacturer_name: required_text("manufacturerName", manufacturer_name)?,
            quantity: normalize_quantity(&quantity)?,
            manufacturing_date: normalize_instant("manufacturingDate", Some(&manufacturing_date), now)?,
            expiry_date: normalize_instant("expiryDate", Some(&expiry_date), now)?,
        };
        let details = ConfidentialDetails {
            strength: required_text("strength", strength)?,
            quantity: event.quantity,
            distributor_id: required_text("distributorId", distributor_id)?,
            dispatch_date: normalize_instant("dispatchDate", Some(&dispatch_date), now)?,
        };
        let public = PublicBatchInfo {
            medicine_name: event.medicine_name.clone(),
            manufacturer_name: event.manufacturer_name.clone(),
            manufacturing_date: event.manufacturing_date,
            expiry_date: event.expiry_date,
        };

        let sealed = seal_json(
            &details,
            &SealContext::new(&batch_id, ConfidentialField::BatchDetails),
            self.config.keys.seal_key(),
        )?;
        let genesis = builder::create_genesis(&batch_id, event, timestamp, &self.config.keys)?;
        let batch = builder::open_batch(&batch_id, public, sealed, genesis, now)?;

        self.store.insert_batch(batch.clone())?;
        info!(
            batch_id = %batch.batch_id,
            data_hash = %batch.genesis_data_hash,
            "batch created"
        );
        Ok(batch)
    }

    /// Record a Distributor receipt.
    pub fn receive(&self, request: Receipt) -> MedtraceResult<ChainBlock> {
        let Receipt {
            batch_id,
            location,
            handler_details,
            contact_info,
            timestamp,
        } = request;

        let event = BlockEvent::Distributor(HandoffEvent {
            location: self.location(Role::Distributor, location),
            handler_details: required_text("handlerDetails", handler_details)?,
            contact_info: required_text("contactInfo", contact_info)?,
        });
        self.append_event(&batch_id, event, timestamp.as_ref(), None)
    }

    /// Record the terminal Pharmacy dispense and seal the prescription.
    ///
    /// The dispense block, the completed flag, and the sealed prescription
    /// are written by one store append; a refused append stores none of them.
    pub fn dispense(&self, request: Dispense) -> MedtraceResult<ChainBlock> {
        let Dispense {
            batch_id,
            location,
            handler_details,
            contact_info,
            prescription,
            timestamp,
        } = request;

        let event = BlockEvent::Pharmacy(HandoffEvent {
            location: self.location(Role::Pharmacy, location),
            handler_details: required_text("handlerDetails", handler_details)?,
            contact_info: required_text("contactInfo", contact_info)?,
        });
        let prescription = required_text("prescription", prescription)?;
        let sealed = seal_text(
            &prescription,
            &SealContext::new(&batch_id, ConfidentialField::Prescription),
            self.config.keys.seal_key(),
        )?;

        let attachment = Some((ConfidentialField::Prescription, sealed));
        let block = self.append_event(&batch_id, event, timestamp.as_ref(), attachment)?;

        info!(batch_id = %batch_id, "batch dispensed and completed");
        Ok(block)
    }

    fn append_event(
        &self,
        batch_id: &str,
        event: BlockEvent,
        raw_timestamp: Option<&RawInstant>,
        attachment: Option<(ConfidentialField, SealedField)>,
    ) -> MedtraceResult<ChainBlock> {
        let timestamp = normalize_instant("timestamp", raw_timestamp, self.clock.now())?;
        let role = event.role();

        let batch = self.store.load_batch(batch_id)?;
        if let Err(err) = self.validate(&batch) {
            warn!(
                batch_id = %batch_id,
                role = %role,
                error = %err,
                "refusing custody event on a chain that fails verification"
            );
            return Err(err);
        }

        let block = builder::append(&batch, event, timestamp, &self.config.keys)?;
        let appended = match attachment {
            Some((field, sealed)) => {
                self.store
                    .append_block_with_field(batch_id, block.clone(), field, sealed)
            }
            None => self.store.append_block(batch_id, block.clone()),
        };
        if let Err(err) = appended {
            if err.is_retryable() {
                warn!(batch_id = %batch_id, role = %role, "lost append race; caller may retry");
            }
            return Err(err);
        }

        info!(
            batch_id = %batch_id,
            role = %role,
            index = batch.chain.len(),
            chain_hash = %block.chain_hash,
            "custody block appended"
        );
        Ok(block)
    }

    // ── Verification ─────────────────────────────────────────────────────────

    fn validate(&self, batch: &Batch) -> MedtraceResult<ChainReport> {
        let signatures = self
            .config
            .keys
            .signature_check(self.config.settings.validation.signatures);
        Ok(validate_batch(batch, signatures)?)
    }

    /// Re-verify the full stored chain of `batch_id`.
    pub fn verify_batch(&self, batch_id: &str) -> MedtraceResult<ChainReport> {
        let batch = self.store.load_batch(batch_id)?;
        let report = self.validate(&batch)?;
        info!(
            batch_id = %batch_id,
            blocks = report.blocks_checked,
            signatures_checked = report.signatures_checked,
            "chain verified"
        );
        Ok(report)
    }

    /// Verify a `batchId|chainHash` reference.
    ///
    /// The whole chain must verify, and the referenced hash must be one of
    /// its chain hashes. A reference issued at an earlier custody step stays
    /// valid; `is_latest` tells whether the batch has moved on since.
    pub fn verify_reference(&self, reference: &str) -> MedtraceResult<ReferenceCheck> {
        let BatchReference {
            batch_id,
            chain_hash,
        } = decode_reference(reference)?;

        let batch = self.store.load_batch(&batch_id)?;
        let report = self.validate(&batch)?;

        let Some(position) = locate_chain_hash(&batch.chain, &chain_hash) else {
            warn!(batch_id = %batch_id, chain_hash = %chain_hash, "reference names an unknown chain hash");
            return Err(MedtraceError::ReferenceMismatch {
                batch_id,
                chain_hash,
            });
        };

        debug!(batch_id = %batch_id, position, "reference verified");
        Ok(ReferenceCheck {
            report,
            position,
            is_latest: position + 1 == batch.chain.len(),
        })
    }

    /// Decode a scanned image with `codec`, then verify the reference in it.
    pub fn scan_and_verify(
        &self,
        codec: &dyn OpticalCodec,
        image: &[u8],
    ) -> MedtraceResult<ReferenceCheck> {
        let reference = codec
            .scan(image)?
            .ok_or_else(|| MedtraceError::MalformedReference {
                reason: "no reference found in scanned image".to_string(),
            })?;
        self.verify_reference(&reference)
    }

    /// The reference for the batch's current tail. Refused for a chain that
    /// fails verification.
    pub fn latest_reference(&self, batch_id: &str) -> MedtraceResult<String> {
        let batch = self.store.load_batch(batch_id)?;
        let report = self.validate(&batch)?;
        encode_reference(batch_id, &report.terminal_chain_hash)
    }

    /// Render the latest reference through `codec`.
    pub fn render_reference(&self, codec: &dyn OpticalCodec, batch_id: &str) -> MedtraceResult<Vec<u8>> {
        codec.render(&self.latest_reference(batch_id)?)
    }

    // ── Reads ────────────────────────────────────────────────────────────────

    pub fn batch(&self, batch_id: &str) -> MedtraceResult<Batch> {
        self.store.load_batch(batch_id)
    }

    /// Per-block custody timeline with each block's signature status.
    ///
    /// This is a display read, not a verification: it reports signatures
    /// block by block instead of stopping at the first failure.
    pub fn history(&self, batch_id: &str) -> MedtraceResult<Vec<TimelineEntry>> {
        let chain = self.store.load_chain(batch_id)?;
        Ok(chain
            .iter()
            .map(|block| TimelineEntry {
                role: block.role(),
                location: block.event.location().to_string(),
                timestamp: block.timestamp,
                previous_hash: block.previous_hash.clone(),
                chain_hash: block.chain_hash.clone(),
                signature_valid: verify(
                    &SignatureSummary::for_block(batch_id, block),
                    &block.hmac_signature,
                    self.config.keys.signing_key(block.role()),
                ),
            })
            .collect())
    }

    /// Open the sealed batch details.
    pub fn reveal_confidential(&self, batch_id: &str) -> MedtraceResult<ConfidentialDetails> {
        let batch = self.store.load_batch(batch_id)?;
        open_json(
            &batch.batch_details,
            &SealContext::new(batch_id, ConfidentialField::BatchDetails),
            self.config.keys.seal_key(),
        )
    }

    /// Open the sealed prescription, if the batch has been dispensed.
    pub fn reveal_prescription(&self, batch_id: &str) -> MedtraceResult<Option<String>> {
        let batch = self.store.load_batch(batch_id)?;
        batch
            .prescription
            .as_ref()
            .map(|sealed| {
                open_text(
                    sealed,
                    &SealContext::new(batch_id, ConfidentialField::Prescription),
                    self.config.keys.seal_key(),
                )
            })
            .transpose()
    }

    fn location(&self, role: Role, requested: Option<String>) -> String {
        requested
            .map(|location| location.trim().to_string())
            .filter(|location| !location.is_empty())
            .unwrap_or_else(|| self.config.settings.locations.for_role(role).to_string())
    }
}

fn required_text(field: &str, value: String) -> MedtraceResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(MedtraceError::canonicalization(field, "must not be blank"));
    }
    Ok(trimmed.to_string())
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use medtrace_chain::builder;
    use medtrace_config::{EngineConfig, EngineSettings, Secrets, SignaturePolicy};
    use medtrace_contracts::{
        batch::{Batch, ConfidentialField, SealedField},
        block::{BlockEvent, ChainBlock, GENESIS_BLOCK_HASH},
        error::{MedtraceError, MedtraceResult},
        request::{Dispense, NewBatch, Receipt},
        role::Role,
        verify::IntegrityReason,
    };

    use crate::traits::{BatchStore, FixedClock, OpticalCodec};

    use super::CustodyLedger;

    // ── Mock helpers ─────────────────────────────────────────────────────────

    /// A single-mutex store that applies `builder::commit` on append.
    #[derive(Default)]
    struct MockStore {
        batches: Mutex<HashMap<String, Batch>>,
        /// Make every standalone `save_encrypted_field` fail.
        field_saves_fail: bool,
    }

    impl MockStore {
        fn tamper(&self, batch_id: &str, edit: impl FnOnce(&mut Batch)) {
            edit(self.batches.lock().unwrap().get_mut(batch_id).unwrap());
        }
    }

    fn not_found(batch_id: &str) -> MedtraceError {
        MedtraceError::BatchNotFound {
            batch_id: batch_id.to_string(),
        }
    }

    impl BatchStore for MockStore {
        fn insert_batch(&self, batch: Batch) -> MedtraceResult<()> {
            let mut batches = self.batches.lock().unwrap();
            if batches.contains_key(&batch.batch_id) {
                return Err(MedtraceError::DuplicateBatch {
                    batch_id: batch.batch_id,
                });
            }
            batches.insert(batch.batch_id.clone(), batch);
            Ok(())
        }

        fn load_batch(&self, batch_id: &str) -> MedtraceResult<Batch> {
            let batches = self.batches.lock().unwrap();
            batches.get(batch_id).cloned().ok_or_else(|| not_found(batch_id))
        }

        fn append_block(&self, batch_id: &str, block: ChainBlock) -> MedtraceResult<()> {
            let mut batches = self.batches.lock().unwrap();
            let batch = batches.get_mut(batch_id).ok_or_else(|| not_found(batch_id))?;
            builder::commit(batch, block)
        }

        fn append_block_with_field(
            &self,
            batch_id: &str,
            block: ChainBlock,
            field: ConfidentialField,
            sealed: SealedField,
        ) -> MedtraceResult<()> {
            let mut batches = self.batches.lock().unwrap();
            let batch = batches.get_mut(batch_id).ok_or_else(|| not_found(batch_id))?;
            builder::commit_with_field(batch, block, field, sealed)
        }

        fn save_encrypted_field(
            &self,
            batch_id: &str,
            field: ConfidentialField,
            sealed: SealedField,
        ) -> MedtraceResult<()> {
            if self.field_saves_fail {
                return Err(MedtraceError::StoreFailed {
                    reason: "field writes unavailable".to_string(),
                });
            }
            let mut batches = self.batches.lock().unwrap();
            let batch = batches.get_mut(batch_id).ok_or_else(|| not_found(batch_id))?;
            batch.set_sealed(field, sealed);
            Ok(())
        }

        fn batch_ids(&self) -> MedtraceResult<Vec<String>> {
            let mut ids: Vec<String> = self.batches.lock().unwrap().keys().cloned().collect();
            ids.sort();
            Ok(ids)
        }
    }

    /// "Renders" a reference as `QR:` followed by its bytes.
    struct MockCodec;

    impl OpticalCodec for MockCodec {
        fn render(&self, reference: &str) -> MedtraceResult<Vec<u8>> {
            Ok([b"QR:".as_slice(), reference.as_bytes()].concat())
        }

        fn scan(&self, image: &[u8]) -> MedtraceResult<Option<String>> {
            Ok(image
                .strip_prefix(b"QR:")
                .map(|bytes| String::from_utf8_lossy(bytes).into_owned()))
        }
    }

    fn config(policy: SignaturePolicy) -> EngineConfig {
        let mut settings = EngineSettings::default();
        settings.validation.signatures = policy;
        let secrets = Secrets::from_lookup(|name| match name {
            "SECRET_KEY" => Some("test-signing-secret".to_string()),
            "AES_SECRET" => Some("test-aes-secret".to_string()),
            _ => None,
        })
        .unwrap();
        EngineConfig::new(settings, secrets)
    }

    fn ledger_with(policy: SignaturePolicy) -> (Arc<MockStore>, CustodyLedger) {
        ledger_on(MockStore::default(), policy)
    }

    fn ledger_on(store: MockStore, policy: SignaturePolicy) -> (Arc<MockStore>, CustodyLedger) {
        let store = Arc::new(store);
        let clock = FixedClock(Utc.with_ymd_and_hms(2025, 12, 2, 10, 0, 0).unwrap());
        let ledger = CustodyLedger::new(store.clone(), config(policy)).with_clock(clock);
        (store, ledger)
    }

    fn ledger() -> (Arc<MockStore>, CustodyLedger) {
        ledger_with(SignaturePolicy::Enforce)
    }

    fn new_batch(batch_id: &str) -> NewBatch {
        serde_json::from_value(json!({
            "batchNumber": batch_id,
            "medicineName": "Paracetamol",
            "manufacturerName": "Lumen Pharma",
            "manufacturingDate": "2025-12-02",
            "expiryDate": "2027-12-02",
            "quantityProduced": "1000",
            "strength": "500mg",
            "distributorId": "DIST-7",
            "dispatchDate": "2025-12-03"
        }))
        .unwrap()
    }

    fn receipt(batch_id: &str, location: &str, day: u32) -> Receipt {
        Receipt {
            batch_id: batch_id.to_string(),
            location: Some(location.to_string()),
            handler_details: "R. Osei".to_string(),
            contact_info: "+44 20 7946 0000".to_string(),
            timestamp: Some(Utc.with_ymd_and_hms(2025, 12, day, 9, 0, 0).unwrap().into()),
        }
    }

    fn dispense(batch_id: &str) -> Dispense {
        Dispense {
            batch_id: batch_id.to_string(),
            location: None,
            handler_details: "Dr. A. Mensah".to_string(),
            contact_info: "pharmacy@example.org".to_string(),
            prescription: "Take 2 tablets every 6 hours".to_string(),
            timestamp: Some("2025-12-05T14:30:00Z".into()),
        }
    }

    // ── Creation ─────────────────────────────────────────────────────────────

    #[test]
    fn test_create_batch() {
        let (_, ledger) = ledger();
        let batch = ledger.create_batch(new_batch("B001")).unwrap();

        assert_eq!(batch.chain.len(), 1);
        let genesis = &batch.chain[0];
        assert_eq!(genesis.previous_hash, GENESIS_BLOCK_HASH);
        assert_eq!(genesis.event.location(), "Factory Output");
        assert!(matches!(genesis.event, BlockEvent::Manufacturer(ref e) if e.quantity == 1000));

        let report = ledger.verify_batch("B001").unwrap();
        assert_eq!(report.blocks_checked, 1);
        assert!(report.signatures_checked);

        let details = ledger.reveal_confidential("B001").unwrap();
        assert_eq!(details.strength, "500mg");
        assert_eq!(details.distributor_id, "DIST-7");
        assert_eq!(ledger.reveal_prescription("B001").unwrap(), None);
    }

    #[test]
    fn test_duplicate_batch_rejected() {
        let (_, ledger) = ledger();
        ledger.create_batch(new_batch("B001")).unwrap();
        let err = ledger.create_batch(new_batch("B001")).unwrap_err();
        assert!(matches!(err, MedtraceError::DuplicateBatch { ref batch_id } if batch_id == "B001"));
    }

    #[test]
    fn test_bad_input_stores_nothing() {
        let (store, ledger) = ledger();

        let mut bad_date = new_batch("B001");
        bad_date.expiry_date = "next year".into();
        let err = ledger.create_batch(bad_date).unwrap_err();
        assert!(matches!(err, MedtraceError::Canonicalization { ref field, .. } if field == "expiryDate"));

        let mut bad_id = new_batch("B|001");
        bad_id.batch_id = "B|001".to_string();
        assert!(ledger.create_batch(bad_id).is_err());

        assert!(store.batch_ids().unwrap().is_empty());
    }

    // ── Handoffs ─────────────────────────────────────────────────────────────

    #[test]
    fn test_full_custody_walk() {
        let (_, ledger) = ledger();
        let batch = ledger.create_batch(new_batch("B001")).unwrap();

        let received = ledger.receive(receipt("B001", "Regional Warehouse", 3)).unwrap();
        assert_eq!(received.previous_hash, batch.chain[0].data_hash);
        ledger.receive(receipt("B001", "City Depot", 4)).unwrap();

        let dispensed = ledger.dispense(dispense("B001")).unwrap();
        assert_eq!(dispensed.role(), Role::Pharmacy);
        assert_eq!(dispensed.event.location(), "Pharmacy Counter");

        let batch = ledger.batch("B001").unwrap();
        assert!(batch.is_complete, "dispense must complete the batch");
        assert_eq!(ledger.verify_batch("B001").unwrap().blocks_checked, 4);
        assert_eq!(
            ledger.reveal_prescription("B001").unwrap().as_deref(),
            Some("Take 2 tablets every 6 hours")
        );

        let err = ledger.receive(receipt("B001", "Late Depot", 6)).unwrap_err();
        assert!(matches!(err, MedtraceError::BatchClosed { .. }), "got {err:?}");
    }

    /// The prescription rides on the dispense append itself, so a store
    /// whose standalone field writes fail still ends up consistent.
    #[test]
    fn test_dispense_attaches_prescription_in_same_append() {
        let store = MockStore {
            field_saves_fail: true,
            ..MockStore::default()
        };
        let (store, ledger) = ledger_on(store, SignaturePolicy::Enforce);
        ledger.create_batch(new_batch("B001")).unwrap();
        ledger.receive(receipt("B001", "Regional Warehouse", 3)).unwrap();

        ledger.dispense(dispense("B001")).unwrap();

        let batch = store.load_batch("B001").unwrap();
        assert!(batch.is_complete);
        assert!(batch.prescription.is_some());
        assert_eq!(
            ledger.reveal_prescription("B001").unwrap().as_deref(),
            Some("Take 2 tablets every 6 hours")
        );
    }

    /// A refused dispense leaves no prescription behind.
    #[test]
    fn test_refused_dispense_stores_no_prescription() {
        let (store, ledger) = ledger();
        ledger.create_batch(new_batch("B001")).unwrap();
        ledger.receive(receipt("B001", "Regional Warehouse", 3)).unwrap();
        store.tamper("B001", |batch| batch.chain[1].hmac_signature = "0".repeat(64));

        assert!(ledger.dispense(dispense("B001")).is_err());
        let batch = store.load_batch("B001").unwrap();
        assert_eq!(batch.prescription, None);
        assert!(!batch.is_complete);
    }

    #[test]
    fn test_unknown_batch() {
        let (_, ledger) = ledger();
        let err = ledger.receive(receipt("NOPE", "W", 3)).unwrap_err();
        assert!(matches!(err, MedtraceError::BatchNotFound { .. }));
    }

    #[test]
    fn test_blank_handler_rejected() {
        let (_, ledger) = ledger();
        ledger.create_batch(new_batch("B001")).unwrap();

        let mut request = receipt("B001", "W", 3);
        request.handler_details = "   ".to_string();
        let err = ledger.receive(request).unwrap_err();
        assert!(matches!(err, MedtraceError::Canonicalization { ref field, .. } if field == "handlerDetails"));
    }

    /// A tampered chain is a hard stop: the receipt is refused and nothing
    /// is appended.
    #[test]
    fn test_tampered_chain_refuses_handoff() {
        let (store, ledger) = ledger();
        ledger.create_batch(new_batch("B001")).unwrap();
        ledger.receive(receipt("B001", "Regional Warehouse", 3)).unwrap();

        store.tamper("B001", |batch| {
            if let BlockEvent::Distributor(event) = &mut batch.chain[1].event {
                event.location = "Unlicensed Warehouse".to_string();
            }
        });

        let err = ledger.dispense(dispense("B001")).unwrap_err();
        assert!(
            matches!(
                err,
                MedtraceError::ChainIntegrity {
                    index: 1,
                    reason: IntegrityReason::DataMismatch
                }
            ),
            "got {err:?}"
        );
        assert!(!err.is_retryable());

        let batch = ledger.batch("B001").unwrap();
        assert_eq!(batch.chain.len(), 2);
        assert!(batch.prescription.is_none(), "refused dispense must not store a prescription");
    }

    #[test]
    fn test_signature_policy() {
        for (policy, expect_ok) in [(SignaturePolicy::Enforce, false), (SignaturePolicy::Skip, true)] {
            let (store, ledger) = ledger_with(policy);
            ledger.create_batch(new_batch("B001")).unwrap();
            store.tamper("B001", |batch| batch.chain[0].hmac_signature = "00".repeat(32));

            let result = ledger.verify_batch("B001");
            assert_eq!(result.is_ok(), expect_ok, "policy {policy:?}");
            if let Ok(report) = result {
                assert!(!report.signatures_checked);
            }
        }
    }

    // ── References ───────────────────────────────────────────────────────────

    #[test]
    fn test_references_stay_verifiable() {
        let (_, ledger) = ledger();
        ledger.create_batch(new_batch("B001")).unwrap();
        let issued_at_creation = ledger.latest_reference("B001").unwrap();

        ledger.receive(receipt("B001", "Regional Warehouse", 3)).unwrap();
        let latest = ledger.latest_reference("B001").unwrap();

        let early = ledger.verify_reference(&issued_at_creation).unwrap();
        assert_eq!(early.position, 0);
        assert!(!early.is_latest);

        let now = ledger.verify_reference(&latest).unwrap();
        assert_eq!(now.position, 1);
        assert!(now.is_latest);
    }

    #[test]
    fn test_reference_failures() {
        let (_, ledger) = ledger();
        ledger.create_batch(new_batch("B001")).unwrap();

        assert!(matches!(
            ledger.verify_reference("no-separator"),
            Err(MedtraceError::MalformedReference { .. })
        ));
        assert!(matches!(
            ledger.verify_reference(&format!("B001|{}", "a".repeat(64))),
            Err(MedtraceError::ReferenceMismatch { .. })
        ));
        assert!(matches!(
            ledger.verify_reference("B999|abc"),
            Err(MedtraceError::BatchNotFound { .. })
        ));
    }

    #[test]
    fn test_render_and_scan() {
        let (_, ledger) = ledger();
        ledger.create_batch(new_batch("B001")).unwrap();

        let image = ledger.render_reference(&MockCodec, "B001").unwrap();
        let check = ledger.scan_and_verify(&MockCodec, &image).unwrap();
        assert!(check.is_latest);
        assert_eq!(check.report.batch_id, "B001");

        let err = ledger.scan_and_verify(&MockCodec, b"blurry photo").unwrap_err();
        assert!(matches!(err, MedtraceError::MalformedReference { .. }));
    }

    // ── History ──────────────────────────────────────────────────────────────

    #[test]
    fn test_history_reports_each_signature() {
        let (store, ledger) = ledger();
        ledger.create_batch(new_batch("B001")).unwrap();
        ledger.receive(receipt("B001", "Regional Warehouse", 3)).unwrap();
        ledger.dispense(dispense("B001")).unwrap();

        let history = ledger.history("B001").unwrap();
        let roles: Vec<Role> = history.iter().map(|entry| entry.role).collect();
        assert_eq!(roles, vec![Role::Manufacturer, Role::Distributor, Role::Pharmacy]);
        assert!(history.iter().all(|entry| entry.signature_valid));
        assert_eq!(history[1].location, "Regional Warehouse");

        store.tamper("B001", |batch| batch.chain[1].hmac_signature = "not hex".to_string());
        let history = ledger.history("B001").unwrap();
        let valid: Vec<bool> = history.iter().map(|entry| entry.signature_valid).collect();
        assert_eq!(valid, vec![true, false, true]);
    }
}
