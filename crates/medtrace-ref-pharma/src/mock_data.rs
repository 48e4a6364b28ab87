//! Simulated supply-chain data for the medtrace reference runtime.
//!
//! All data in this module is hardcoded and fictional. Request bodies are
//! raw JSON in the loose shapes real clients send (string quantities, plain
//! dates, epoch milliseconds) so every scenario also exercises intake.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};

use medtrace_config::Secrets;
use medtrace_contracts::error::MedtraceResult;

// ── Secrets (demo only) ───────────────────────────────────────────────────────

/// Fixed, fictional secrets so scenario output is reproducible.
pub fn demo_secrets() -> MedtraceResult<Secrets> {
    Secrets::from_lookup(|name| match name {
        "SECRET_KEY" => Some("demo-signing-secret-do-not-deploy".to_string()),
        "AES_SECRET" => Some("demo-aes-secret-do-not-deploy".to_string()),
        _ => None,
    })
}

/// The instant the demo ledger treats as "now".
pub fn demo_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 12, 2, 8, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

// ── Request bodies (mock) ─────────────────────────────────────────────────────

/// Manufacturer creation body for `batch_id`.
pub fn new_batch_body(batch_id: &str) -> Value {
    json!({
        "batchNumber": batch_id,
        "medicineName": "Amoxicillin 500mg Capsules",
        "manufacturerName": "Northgate Laboratories",
        "manufacturingDate": "2025-11-28",
        "expiryDate": "2027-11-28",
        "quantityProduced": "1000",
        "strength": "500mg",
        "distributorId": "DIST-0042",
        "dispatchDate": 1_764_720_000_000i64,
        "timestamp": "2025-12-02T08:00:00Z"
    })
}

/// One leg of the distribution route.
pub struct RouteStop {
    pub location: &'static str,
    pub handler: &'static str,
    pub contact: &'static str,
    pub timestamp: &'static str,
}

/// The distributor legs every reference batch travels, in order.
pub fn distribution_route() -> Vec<RouteStop> {
    vec![
        RouteStop {
            location: "Northgate Dispatch Bay 3",
            handler: "K. Tanaka (Driver, Fleet 12)",
            contact: "+1-555-0142",
            timestamp: "2025-12-03T06:30:00Z",
        },
        RouteStop {
            location: "Regional Distribution Center, Unit B",
            handler: "M. Alvarez (Receiving Lead)",
            contact: "receiving@rdc.example",
            timestamp: "2025-12-03T14:10:00Z",
        },
    ]
}

pub fn receipt_body(batch_id: &str, stop: &RouteStop) -> Value {
    json!({
        "batchId": batch_id,
        "location": stop.location,
        "handlerDetails": stop.handler,
        "contactInfo": stop.contact,
        "timestamp": stop.timestamp
    })
}

pub fn dispense_body(batch_id: &str) -> Value {
    json!({
        "batchId": batch_id,
        "handlerDetails": "J. Okafor, PharmD",
        "contactInfo": "+1-555-0199",
        "prescription": "Amoxicillin 500mg: 1 capsule three times daily for 7 days (Rx 88213)",
        "timestamp": "2025-12-05T11:45:00Z"
    })
}
