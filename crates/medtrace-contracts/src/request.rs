//! Raw custody requests as they arrive from a calling transport layer.
//!
//! These types deliberately accept the loose shapes callers send in
//! practice: dates as strings, date-time objects, or epoch milliseconds;
//! quantities as numbers or numeric strings. Nothing here is hashed directly.
//! The canonicalizer normalizes every value before it reaches a block.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A date-like value in any of the accepted input shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawInstant {
    /// A fully qualified instant.
    Instant(DateTime<Utc>),
    /// Milliseconds since the Unix epoch.
    EpochMillis(i64),
    /// Any other textual date representation, normalized later.
    Text(String),
}

impl From<DateTime<Utc>> for RawInstant {
    fn from(value: DateTime<Utc>) -> Self {
        RawInstant::Instant(value)
    }
}

impl From<&str> for RawInstant {
    fn from(value: &str) -> Self {
        RawInstant::Text(value.to_string())
    }
}

/// A quantity in any of the accepted input shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawQuantity {
    Count(u64),
    Decimal(f64),
    Text(String),
}

impl From<u64> for RawQuantity {
    fn from(value: u64) -> Self {
        RawQuantity::Count(value)
    }
}

impl From<&str> for RawQuantity {
    fn from(value: &str) -> Self {
        RawQuantity::Text(value.to_string())
    }
}

/// Manufacturer request creating a batch and its genesis block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBatch {
    #[serde(alias = "batchNumber")]
    pub batch_id: String,
    pub medicine_name: String,
    pub manufacturer_name: String,
    pub manufacturing_date: RawInstant,
    pub expiry_date: RawInstant,
    #[serde(alias = "quantityProduced")]
    pub quantity: RawQuantity,

    // Sealed at rest, never hashed.
    pub strength: String,
    pub distributor_id: String,
    pub dispatch_date: RawInstant,

    /// Defaults to the configured manufacturer location.
    #[serde(default)]
    pub location: Option<String>,
    /// Event time; the ledger clock is used when absent.
    #[serde(default)]
    pub timestamp: Option<RawInstant>,
}

/// Distributor request confirming receipt of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    #[serde(alias = "batchNumber")]
    pub batch_id: String,
    #[serde(default)]
    pub location: Option<String>,
    pub handler_details: String,
    pub contact_info: String,
    #[serde(default)]
    pub timestamp: Option<RawInstant>,
}

/// Pharmacy request dispensing a batch to a patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dispense {
    #[serde(alias = "batchNumber")]
    pub batch_id: String,
    #[serde(default)]
    pub location: Option<String>,
    pub handler_details: String,
    pub contact_info: String,
    /// Patient prescription text; sealed, never hashed.
    pub prescription: String,
    #[serde(default)]
    pub timestamp: Option<RawInstant>,
}
