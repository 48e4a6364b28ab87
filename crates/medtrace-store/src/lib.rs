//! # medtrace-store
//!
//! Storage for the medtrace custody ledger.
//!
//! - [`InMemoryBatchStore`]: the reference `BatchStore`, with a per-batch
//!   critical section and compare-and-swap appends so a chain never forks.
//! - [`snapshot`]: export and import of batches as pretty JSON files.

pub mod memory;
pub mod snapshot;

pub use memory::InMemoryBatchStore;

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Barrier};
    use std::thread;

    use chrono::{DateTime, TimeZone, Utc};

    use medtrace_chain::{
        builder,
        validator::{validate_batch, SignatureCheck},
    };
    use medtrace_config::{EngineConfig, EngineSettings, Secrets};
    use medtrace_contracts::{
        batch::{Batch, ConfidentialField, PublicBatchInfo, SealedField},
        block::{BlockEvent, GenesisEvent, HandoffEvent},
        error::MedtraceError,
        keys::{SigningKey, SigningKeys},
        request::Receipt,
        verify::IntegrityReason,
    };
    use medtrace_core::{traits::BatchStore, CustodyLedger};

    use super::*;

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 12, day, 10, 0, 0).unwrap()
    }

    fn key() -> SigningKey {
        SigningKey::new("store-test-secret")
    }

    fn sealed_placeholder() -> SealedField {
        SealedField {
            algorithm: "ChaCha20-Poly1305".to_string(),
            nonce: "00".repeat(12),
            ciphertext: "00".repeat(16),
        }
    }

    fn make_batch(batch_id: &str) -> Batch {
        make_batch_signed(batch_id, &key())
    }

    fn make_batch_signed(batch_id: &str, keys: &dyn SigningKeys) -> Batch {
        let event = GenesisEvent {
            location: "Factory Output".to_string(),
            medicine_name: "Amoxicillin".to_string(),
            manufacturer_name: "Northgate Labs".to_string(),
            quantity: 1000,
            manufacturing_date: at(1),
            expiry_date: at(1) + chrono::Duration::days(730),
        };
        let public = PublicBatchInfo {
            medicine_name: event.medicine_name.clone(),
            manufacturer_name: event.manufacturer_name.clone(),
            manufacturing_date: event.manufacturing_date,
            expiry_date: event.expiry_date,
        };
        let genesis = builder::create_genesis(batch_id, event, at(2), keys).unwrap();
        builder::open_batch(batch_id, public, sealed_placeholder(), genesis, at(2)).unwrap()
    }

    fn handoff(location: &str) -> BlockEvent {
        BlockEvent::Distributor(HandoffEvent {
            location: location.to_string(),
            handler_details: "K. Tanaka".to_string(),
            contact_info: "ops@northgate.example".to_string(),
        })
    }

    // ── InMemoryBatchStore ───────────────────────────────────────────────────

    #[test]
    fn test_insert_load_and_duplicates() {
        let store = InMemoryBatchStore::new();
        store.insert_batch(make_batch("B002")).unwrap();
        store.insert_batch(make_batch("B001")).unwrap();

        assert_eq!(store.batch_ids().unwrap(), vec!["B001", "B002"]);
        assert_eq!(store.load_chain("B001").unwrap().len(), 1);

        let err = store.insert_batch(make_batch("B001")).unwrap_err();
        assert!(matches!(err, MedtraceError::DuplicateBatch { .. }));

        let err = store.load_batch("B404").unwrap_err();
        assert!(matches!(err, MedtraceError::BatchNotFound { .. }));
    }

    #[test]
    fn test_save_encrypted_field() {
        let store = InMemoryBatchStore::new();
        store.insert_batch(make_batch("B001")).unwrap();

        let mut sealed = sealed_placeholder();
        sealed.ciphertext = "ab".repeat(20);
        store
            .save_encrypted_field("B001", ConfidentialField::Prescription, sealed.clone())
            .unwrap();
        assert_eq!(store.load_batch("B001").unwrap().prescription, Some(sealed));
    }

    /// A block and its sealed slot land together, or not at all.
    #[test]
    fn test_append_with_field_is_all_or_nothing() {
        let store = InMemoryBatchStore::new();
        store.insert_batch(make_batch("B001")).unwrap();
        let stale = store.load_batch("B001").unwrap();

        let receipt = builder::append(&stale, handoff("North Hub"), at(3), &key()).unwrap();
        store.append_block("B001", receipt).unwrap();

        let dispense = BlockEvent::Pharmacy(HandoffEvent {
            location: "Harbour Pharmacy".to_string(),
            handler_details: "L. Moreau".to_string(),
            contact_info: "rx@harbour.example".to_string(),
        });
        let mut sealed = sealed_placeholder();
        sealed.ciphertext = "cd".repeat(20);

        let late = builder::append(&stale, dispense.clone(), at(4), &key()).unwrap();
        let err = store
            .append_block_with_field("B001", late, ConfidentialField::Prescription, sealed.clone())
            .unwrap_err();
        assert!(matches!(err, MedtraceError::ChainAppendConflict { .. }), "got {err:?}");
        let batch = store.load_batch("B001").unwrap();
        assert_eq!(batch.chain.len(), 2);
        assert_eq!(batch.prescription, None);
        assert!(!batch.is_complete);

        let fresh = builder::append(&batch, dispense, at(4), &key()).unwrap();
        store
            .append_block_with_field("B001", fresh, ConfidentialField::Prescription, sealed.clone())
            .unwrap();
        let batch = store.load_batch("B001").unwrap();
        assert_eq!(batch.chain.len(), 3);
        assert_eq!(batch.prescription, Some(sealed));
        assert!(batch.is_complete);
    }

    /// Two appends built from the same stale tail race on one batch: exactly
    /// one lands and the other gets a retryable conflict.
    #[test]
    fn test_concurrent_stale_appends() {
        let store = InMemoryBatchStore::new();
        store.insert_batch(make_batch("B001")).unwrap();

        let snapshot = store.load_batch("B001").unwrap();
        let first = builder::append(&snapshot, handoff("North Hub"), at(3), &key()).unwrap();
        let second = builder::append(&snapshot, handoff("South Hub"), at(3), &key()).unwrap();
        assert_eq!(first.previous_hash, second.previous_hash);

        let barrier = Barrier::new(2);
        let (racing_store, barrier) = (&store, &barrier);
        let results: Vec<_> = thread::scope(|s| {
            let handles: Vec<_> = [first, second]
                .into_iter()
                .map(|block| {
                    s.spawn(move || {
                        barrier.wait();
                        racing_store.append_block("B001", block)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let successes = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1, "exactly one racer must win: {results:?}");
        let loser = results.into_iter().find_map(Result::err).unwrap();
        assert!(
            matches!(loser, MedtraceError::ChainAppendConflict { .. }),
            "loser must see a conflict, got {loser:?}"
        );

        let batch = store.load_batch("B001").unwrap();
        assert_eq!(batch.chain.len(), 2, "chain must not fork");
        let key = key();
        assert!(validate_batch(&batch, SignatureCheck::Enforce(&key)).is_ok());
    }

    /// Many distributors hammer one batch through the ledger; every receipt
    /// either lands or loses a race, and the chain stays linear.
    #[test]
    fn test_ledger_receipts_under_contention() {
        let secrets = Secrets::from_lookup(|name| Some(format!("{name}-value"))).unwrap();
        let store = Arc::new(InMemoryBatchStore::new());
        let ledger = CustodyLedger::new(store.clone(), EngineConfig::new(EngineSettings::default(), secrets));

        store
            .insert_batch(make_batch_signed("B001", &ledger.config().keys))
            .unwrap();

        const RACERS: usize = 8;
        let barrier = Barrier::new(RACERS);
        let (ledger, barrier) = (&ledger, &barrier);
        let outcomes: Vec<_> = thread::scope(|s| {
            let handles: Vec<_> = (0..RACERS)
                .map(|i| {
                    s.spawn(move || {
                        barrier.wait();
                        ledger.receive(Receipt {
                            batch_id: "B001".to_string(),
                            location: Some(format!("Depot {i}")),
                            handler_details: "K. Tanaka".to_string(),
                            contact_info: "ops@northgate.example".to_string(),
                            timestamp: Some(at(3).into()),
                        })
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let landed = outcomes.iter().filter(|r| r.is_ok()).count();
        assert!(landed >= 1);
        for outcome in &outcomes {
            if let Err(err) = outcome {
                assert!(err.is_retryable(), "only append conflicts are expected, got {err:?}");
            }
        }

        let report = ledger.verify_batch("B001").unwrap();
        assert_eq!(report.blocks_checked, 1 + landed);
    }

    #[test]
    fn test_tampering_is_visible_to_validation() {
        let store = InMemoryBatchStore::new();
        store.insert_batch(make_batch("B001")).unwrap();
        store
            .tamper_with("B001", |batch| {
                if let BlockEvent::Manufacturer(event) = &mut batch.chain[0].event {
                    event.quantity = 10;
                }
            })
            .unwrap();

        let key = key();
        let failure = validate_batch(&store.load_batch("B001").unwrap(), SignatureCheck::Enforce(&key))
            .unwrap_err();
        assert_eq!(failure.index, 0);
        assert_eq!(failure.reason, IntegrityReason::DataMismatch);
    }

    // ── Snapshots ────────────────────────────────────────────────────────────

    #[test]
    fn test_snapshot_export_import() {
        let dir = tempfile::tempdir().unwrap();
        let source = InMemoryBatchStore::new();
        source.insert_batch(make_batch("B001")).unwrap();
        source.insert_batch(make_batch("LOT/7")).unwrap();

        let paths = snapshot::export_all(&source, dir.path()).unwrap();
        assert_eq!(paths.len(), 2);
        assert!(paths[1].ends_with("batch_LOT_7.json"));

        std::fs::write(dir.path().join("notes.json"), "{\"not\": \"a batch\"}").unwrap();
        std::fs::write(dir.path().join("README.txt"), "ignored").unwrap();

        let target = InMemoryBatchStore::new();
        let imported = snapshot::import_dir(&target, dir.path()).unwrap();
        assert_eq!(imported, vec!["B001", "LOT/7"]);
        assert_eq!(target.load_batch("B001").unwrap(), source.load_batch("B001").unwrap());

        let key = key();
        let batch = snapshot::read_snapshot(&paths[0]).unwrap();
        assert!(validate_batch(&batch, SignatureCheck::Enforce(&key)).is_ok());
    }

    /// Editing a snapshot on disk is caught once it is read back and
    /// validated.
    #[test]
    fn test_edited_snapshot_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = snapshot::write_snapshot(dir.path(), &make_batch("B001")).unwrap();

        let edited = std::fs::read_to_string(&path)
            .unwrap()
            .replace("Amoxicillin", "Amoxycillin");
        std::fs::write(&path, edited).unwrap();

        let key = key();
        let batch = snapshot::read_snapshot(&path).unwrap();
        let failure = validate_batch(&batch, SignatureCheck::Enforce(&key)).unwrap_err();
        assert_eq!(failure.index, 0);
        assert_eq!(failure.reason, IntegrityReason::DataMismatch);

        assert!(snapshot::read_snapshot(&dir.path().join("missing.json")).is_err());
    }
}
