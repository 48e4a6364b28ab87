//! Canonicalization: the single place that turns custody data into bytes
//! for hashing.
//!
//! Every producer (batch creation, receipt, dispense) and every verifier
//! goes through these functions. Nothing else in the workspace serializes
//! for hashing.
//!
//! Canonical form is compact JSON with keys in lexicographic order:
//!
//! - Manufacturer: `batchId, expiryDate, manufacturerName,
//!   manufacturingDate, medicineName, quantity, role, timestamp`
//! - Distributor / Pharmacy: `batchId, contactInfo, handlerDetails,
//!   location, previousHash, role, timestamp`
//!
//! Instants are emitted as `YYYY-MM-DDTHH:MM:SS.mmmZ`; quantities as JSON
//! integers.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, SubsecRound, TimeZone, Utc};
use serde_json::{Map, Value};

use medtrace_contracts::{
    block::{BlockEvent, ChainBlock},
    error::{MedtraceError, MedtraceResult},
    request::{RawInstant, RawQuantity},
};

/// Separator reserved by the portable reference format.
pub const RESERVED_ID_CHAR: char = '|';

/// The deterministic byte form of a block's hash-relevant fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalPayload(Vec<u8>);

impl CanonicalPayload {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

// ── Field normalization ───────────────────────────────────────────────────────

/// Render an instant the one way it is ever rendered for hashing or signing.
pub fn format_instant(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Normalize a date-like input to a UTC instant at millisecond precision.
///
/// - `None` resolves to `now`.
/// - RFC 3339 strings keep their instant, whatever their offset.
/// - `YYYY-MM-DD` is midnight UTC.
/// - Offset-less date-times (`YYYY-MM-DDTHH:MM:SS[.fff]`) are read as UTC.
/// - Epoch milliseconds must be in chrono's representable range.
///
/// Anything else is a `Canonicalization` error naming `field`.
pub fn normalize_instant(
    field: &str,
    raw: Option<&RawInstant>,
    now: DateTime<Utc>,
) -> MedtraceResult<DateTime<Utc>> {
    let instant = match raw {
        None => now,
        Some(RawInstant::Instant(dt)) => *dt,
        Some(RawInstant::EpochMillis(ms)) => Utc.timestamp_millis_opt(*ms).single().ok_or_else(|| {
            MedtraceError::canonicalization(field, format!("epoch milliseconds {ms} out of range"))
        })?,
        Some(RawInstant::Text(text)) => parse_instant_text(field, text)?,
    };
    Ok(instant.trunc_subsecs(3))
}

fn parse_instant_text(field: &str, text: &str) -> MedtraceResult<DateTime<Utc>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(MedtraceError::canonicalization(field, "empty date value"));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&midnight));
        }
    }

    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, pattern) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }

    Err(MedtraceError::canonicalization(
        field,
        format!("'{trimmed}' is not a recognizable date"),
    ))
}

/// Coerce a quantity to a whole number of units.
///
/// `100`, `100.0`, `"100"` and `" 100 "` all normalize to `100`. Negative,
/// fractional, non-finite, and non-numeric values are rejected.
pub fn normalize_quantity(raw: &RawQuantity) -> MedtraceResult<u64> {
    match raw {
        RawQuantity::Count(n) => Ok(*n),
        RawQuantity::Decimal(f) => whole_units(*f),
        RawQuantity::Text(text) => {
            let trimmed = text.trim();
            if let Ok(n) = trimmed.parse::<u64>() {
                return Ok(n);
            }
            match trimmed.parse::<f64>() {
                Ok(f) => whole_units(f),
                Err(_) => Err(MedtraceError::canonicalization(
                    "quantity",
                    format!("'{trimmed}' is not a number"),
                )),
            }
        }
    }
}

fn whole_units(value: f64) -> MedtraceResult<u64> {
    // 2^53: beyond this an f64 no longer names a unique integer.
    const MAX_EXACT: f64 = 9_007_199_254_740_992.0;

    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 || value > MAX_EXACT {
        return Err(MedtraceError::canonicalization(
            "quantity",
            format!("{value} is not a whole, non-negative unit count"),
        ));
    }
    Ok(value as u64)
}

/// Reject identifiers that could not round-trip through a portable reference.
pub fn validate_batch_id(batch_id: &str) -> MedtraceResult<()> {
    if batch_id.trim().is_empty() {
        return Err(MedtraceError::canonicalization("batchId", "batch id is empty"));
    }
    if batch_id.contains(RESERVED_ID_CHAR) {
        return Err(MedtraceError::canonicalization(
            "batchId",
            format!("batch id must not contain '{RESERVED_ID_CHAR}'"),
        ));
    }
    Ok(())
}

// ── Canonical payloads ────────────────────────────────────────────────────────

/// Build the canonical payload for an event about to become (or already
/// recorded as) a block.
///
/// `previous_hash` only enters the payload for Distributor and Pharmacy
/// events; the genesis payload is fixed by the manufacturer's fields alone.
pub fn canonicalize(
    batch_id: &str,
    event: &BlockEvent,
    timestamp: &DateTime<Utc>,
    previous_hash: &str,
) -> CanonicalPayload {
    let mut fields: BTreeMap<&'static str, Value> = BTreeMap::new();
    fields.insert("batchId", text(batch_id));
    fields.insert("role", text(event.role().as_str()));
    fields.insert("timestamp", text(&format_instant(timestamp)));

    match event {
        BlockEvent::Manufacturer(genesis) => {
            fields.insert("medicineName", text(&genesis.medicine_name));
            fields.insert("manufacturerName", text(&genesis.manufacturer_name));
            fields.insert("quantity", Value::from(genesis.quantity));
            fields.insert("manufacturingDate", text(&format_instant(&genesis.manufacturing_date)));
            fields.insert("expiryDate", text(&format_instant(&genesis.expiry_date)));
        }
        BlockEvent::Distributor(handoff) | BlockEvent::Pharmacy(handoff) => {
            fields.insert("location", text(&handoff.location));
            fields.insert("handlerDetails", text(&handoff.handler_details));
            fields.insert("contactInfo", text(&handoff.contact_info));
            fields.insert("previousHash", text(previous_hash));
        }
    }

    CanonicalPayload(sorted_json(fields))
}

/// Re-derive the canonical payload of a stored block.
pub fn canonicalize_block(batch_id: &str, block: &ChainBlock) -> CanonicalPayload {
    canonicalize(batch_id, &block.event, &block.timestamp, &block.previous_hash)
}

fn text(s: &str) -> Value {
    Value::String(s.to_string())
}

/// Serialize `fields` as compact JSON in key order.
///
/// The object is filled by walking the `BTreeMap`, so key order is sorted
/// whether or not serde_json preserves insertion order.
pub(crate) fn sorted_json(fields: BTreeMap<&'static str, Value>) -> Vec<u8> {
    let mut object = Map::new();
    for (key, value) in fields {
        object.insert(key.to_string(), value);
    }
    Value::Object(object).to_string().into_bytes()
}
