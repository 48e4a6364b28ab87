//! Batch snapshots: one pretty-printed JSON file per batch, in the wire
//! format.
//!
//! Snapshots are untrusted input. Importing one does not vouch for it; run
//! the validator over what comes back.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use medtrace_contracts::{
    batch::Batch,
    error::{MedtraceError, MedtraceResult},
};
use medtrace_core::traits::BatchStore;

fn store_failed(reason: String) -> MedtraceError {
    MedtraceError::StoreFailed { reason }
}

/// Ensure that `dir` exists.
pub fn ensure_dir(dir: &Path) -> MedtraceResult<()> {
    fs::create_dir_all(dir)
        .map_err(|e| store_failed(format!("cannot create '{}': {}", dir.display(), e)))
}

/// `batch_<id>.json`, with characters unsafe in file names replaced.
pub fn snapshot_path(dir: &Path, batch_id: &str) -> PathBuf {
    let safe: String = batch_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    dir.join(format!("batch_{safe}.json"))
}

/// Write `batch` into `dir` and return the file path.
pub fn write_snapshot(dir: &Path, batch: &Batch) -> MedtraceResult<PathBuf> {
    ensure_dir(dir)?;
    let path = snapshot_path(dir, &batch.batch_id);
    let json = serde_json::to_string_pretty(batch)
        .map_err(|e| store_failed(format!("cannot serialize batch '{}': {}", batch.batch_id, e)))?;
    fs::write(&path, json)
        .map_err(|e| store_failed(format!("cannot write '{}': {}", path.display(), e)))?;
    debug!(batch_id = %batch.batch_id, path = %path.display(), "snapshot written");
    Ok(path)
}

/// Read one snapshot file.
pub fn read_snapshot(path: &Path) -> MedtraceResult<Batch> {
    let json = fs::read_to_string(path)
        .map_err(|e| store_failed(format!("cannot read '{}': {}", path.display(), e)))?;
    serde_json::from_str(&json)
        .map_err(|e| store_failed(format!("'{}' is not a batch snapshot: {}", path.display(), e)))
}

/// Write every batch in `store` into `dir`.
pub fn export_all(store: &dyn BatchStore, dir: &Path) -> MedtraceResult<Vec<PathBuf>> {
    store
        .batch_ids()?
        .iter()
        .map(|batch_id| write_snapshot(dir, &store.load_batch(batch_id)?))
        .collect()
}

/// Load every `*.json` snapshot in `dir` into `store`, sorted by batch id.
///
/// Files that do not parse as batches are skipped with a warning; a batch id
/// that already exists in `store` fails the import.
pub fn import_dir(store: &dyn BatchStore, dir: &Path) -> MedtraceResult<Vec<String>> {
    let entries = fs::read_dir(dir)
        .map_err(|e| store_failed(format!("cannot list '{}': {}", dir.display(), e)))?;

    let mut batches = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|e| store_failed(format!("cannot list '{}': {}", dir.display(), e)))?
            .path();
        if path.extension().and_then(|s| s.to_str()) != Some("json") {
            continue;
        }
        match read_snapshot(&path) {
            Ok(batch) => batches.push(batch),
            Err(err) => warn!(path = %path.display(), error = %err, "skipping unreadable snapshot"),
        }
    }
    batches.sort_by(|a, b| a.batch_id.cmp(&b.batch_id));

    let mut imported = Vec::with_capacity(batches.len());
    for batch in batches {
        imported.push(batch.batch_id.clone());
        store.insert_batch(batch)?;
    }
    Ok(imported)
}
