//! Intake validator for raw custody request bodies.
//!
//! Runs in two phases, mirroring how requests fail in practice:
//!
//! 1. **Structural**: the body is checked against the request kind's JSON
//!    Schema using the `jsonschema` crate.
//! 2. **Semantic**: batch id usability, non-blank text, parseable dates and
//!    quantities, expiry after manufacture.
//!
//! Every failure from both phases is collected so the caller sees the full
//! list in one report.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use medtrace_chain::canonical::{normalize_instant, normalize_quantity, validate_batch_id};
use medtrace_contracts::{
    error::{MedtraceError, MedtraceResult},
    request::{Dispense, NewBatch, RawInstant, RawQuantity, Receipt},
};

use crate::schema::RequestKind;

/// One failed intake rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntakeFailure {
    pub rule_id: String,
    pub message: String,
}

/// Outcome of checking one request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntakeReport {
    pub kind: RequestKind,
    pub passed: bool,
    pub failures: Vec<IntakeFailure>,
}

impl IntakeReport {
    /// All failure messages joined into one line.
    pub fn summary(&self) -> String {
        self.failures
            .iter()
            .map(|f| format!("[{}] {}", f.rule_id, f.message))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Validates request bodies before they become typed requests.
///
/// Schemas are compiled once at construction.
pub struct IntakeValidator {
    validators: HashMap<RequestKind, jsonschema::Validator>,
}

impl IntakeValidator {
    /// Compile the schema for every request kind.
    ///
    /// Returns `MedtraceError::ConfigError` if a schema fails to compile.
    pub fn new() -> MedtraceResult<Self> {
        let mut validators = HashMap::new();
        for kind in RequestKind::ALL {
            let validator =
                jsonschema::validator_for(&kind.schema()).map_err(|e| MedtraceError::ConfigError {
                    reason: format!("invalid {} schema: {e}", kind.as_str()),
                })?;
            validators.insert(kind, validator);
        }
        Ok(Self { validators })
    }

    /// Check `body` as a `kind` request and report every failure.
    pub fn check(&self, kind: RequestKind, body: &Value) -> IntakeReport {
        let mut failures = Vec::new();

        // ── Phase 1: JSON Schema structural validation ───────────────────────
        if let Some(validator) = self.validators.get(&kind) {
            for error in validator.iter_errors(body) {
                let message = format!("JSON Schema violation at {}: {}", error.instance_path, error);
                warn!(kind = kind.as_str(), %message, "structural intake failure");
                failures.push(IntakeFailure {
                    rule_id: "json-schema".to_string(),
                    message,
                });
            }
        }

        // ── Phase 2: Semantic rules ──────────────────────────────────────────
        if body.is_object() {
            for (rule_id, message) in semantic_failures(kind, body) {
                warn!(kind = kind.as_str(), rule_id, %message, "semantic intake failure");
                failures.push(IntakeFailure {
                    rule_id: rule_id.to_string(),
                    message,
                });
            }
        }

        let passed = failures.is_empty();
        debug!(kind = kind.as_str(), passed, failure_count = failures.len(), "intake check complete");
        IntakeReport { kind, passed, failures }
    }

    pub fn parse_new_batch(&self, body: &Value) -> MedtraceResult<NewBatch> {
        self.parse(RequestKind::NewBatch, body)
    }

    pub fn parse_receipt(&self, body: &Value) -> MedtraceResult<Receipt> {
        self.parse(RequestKind::Receipt, body)
    }

    pub fn parse_dispense(&self, body: &Value) -> MedtraceResult<Dispense> {
        self.parse(RequestKind::Dispense, body)
    }

    /// Check, then deserialize. Any failure rejects the whole body.
    fn parse<T: DeserializeOwned>(&self, kind: RequestKind, body: &Value) -> MedtraceResult<T> {
        let report = self.check(kind, body);
        if !report.passed {
            return Err(MedtraceError::IntakeRejected {
                reason: report.summary(),
            });
        }
        T::deserialize(body).map_err(|e| MedtraceError::IntakeRejected {
            reason: format!("{} body does not deserialize: {e}", kind.as_str()),
        })
    }
}

// ── Semantic rules ────────────────────────────────────────────────────────────

fn text_fields(kind: RequestKind) -> &'static [&'static str] {
    match kind {
        RequestKind::NewBatch => &["medicineName", "manufacturerName", "strength", "distributorId"],
        RequestKind::Receipt => &["handlerDetails", "contactInfo"],
        RequestKind::Dispense => &["handlerDetails", "contactInfo", "prescription"],
    }
}

fn date_fields(kind: RequestKind) -> &'static [&'static str] {
    match kind {
        RequestKind::NewBatch => &["manufacturingDate", "expiryDate", "dispatchDate", "timestamp"],
        RequestKind::Receipt | RequestKind::Dispense => &["timestamp"],
    }
}

fn present<'v>(body: &'v Value, field: &str) -> Option<&'v Value> {
    body.get(field).filter(|v| !v.is_null())
}

fn parse_date(field: &str, value: &Value) -> Result<DateTime<Utc>, String> {
    let raw = RawInstant::deserialize(value).map_err(|_| format!("'{field}' is not a date"))?;
    normalize_instant(field, Some(&raw), Utc::now()).map_err(|e| e.to_string())
}

fn semantic_failures(kind: RequestKind, body: &Value) -> Vec<(&'static str, String)> {
    let mut failures = Vec::new();

    match present(body, "batchId").or_else(|| present(body, "batchNumber")) {
        Some(Value::String(batch_id)) => {
            if let Err(err) = validate_batch_id(batch_id) {
                failures.push(("batch-id", err.to_string()));
            }
        }
        Some(other) => failures.push(("batch-id", format!("batch id must be a string, got {other}"))),
        None => {}
    }

    for field in text_fields(kind) {
        if let Some(Value::String(s)) = present(body, field) {
            if s.trim().is_empty() {
                failures.push(("non-blank", format!("'{field}' must not be blank")));
            }
        }
    }

    let mut dates = HashMap::new();
    for field in date_fields(kind) {
        if let Some(value) = present(body, field) {
            match parse_date(field, value) {
                Ok(instant) => {
                    dates.insert(*field, instant);
                }
                Err(message) => failures.push(("date-format", message)),
            }
        }
    }

    if kind == RequestKind::NewBatch {
        if let Some(value) = present(body, "quantity").or_else(|| present(body, "quantityProduced")) {
            let parsed = RawQuantity::deserialize(value)
                .map_err(|_| "quantity is not a number".to_string())
                .and_then(|raw| normalize_quantity(&raw).map_err(|e| e.to_string()));
            if let Err(message) = parsed {
                failures.push(("quantity", message));
            }
        }

        if let (Some(made), Some(expires)) = (dates.get("manufacturingDate"), dates.get("expiryDate")) {
            if expires <= made {
                failures.push((
                    "expiry-after-manufacture",
                    "expiryDate must be later than manufacturingDate".to_string(),
                ));
            }
        }
    }

    failures
}
