//! JSON Schema documents for the three custody request bodies.
//!
//! The schemas fix shape and types only. Whether a date parses or a batch
//! id is usable is left to the semantic rules in `engine`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Which request body is being checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestKind {
    NewBatch,
    Receipt,
    Dispense,
}

impl RequestKind {
    pub const ALL: [RequestKind; 3] = [RequestKind::NewBatch, RequestKind::Receipt, RequestKind::Dispense];

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::NewBatch => "new-batch",
            RequestKind::Receipt => "receipt",
            RequestKind::Dispense => "dispense",
        }
    }

    pub fn schema(&self) -> Value {
        match self {
            RequestKind::NewBatch => new_batch_schema(),
            RequestKind::Receipt => handoff_schema(false),
            RequestKind::Dispense => handoff_schema(true),
        }
    }
}

fn text() -> Value {
    json!({ "type": "string", "minLength": 1 })
}

fn instant() -> Value {
    json!({ "type": ["string", "integer"] })
}

fn batch_id_required() -> Value {
    json!({
        "anyOf": [
            { "required": ["batchId"] },
            { "required": ["batchNumber"] }
        ]
    })
}

fn new_batch_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "batchId": text(),
            "batchNumber": text(),
            "medicineName": text(),
            "manufacturerName": text(),
            "manufacturingDate": instant(),
            "expiryDate": instant(),
            "quantity": { "type": ["integer", "number", "string"] },
            "quantityProduced": { "type": ["integer", "number", "string"] },
            "strength": text(),
            "distributorId": text(),
            "dispatchDate": instant(),
            "location": { "type": ["string", "null"] },
            "timestamp": { "type": ["string", "integer", "null"] }
        },
        "required": [
            "medicineName", "manufacturerName", "manufacturingDate", "expiryDate",
            "strength", "distributorId", "dispatchDate"
        ],
        "allOf": [
            batch_id_required(),
            { "anyOf": [ { "required": ["quantity"] }, { "required": ["quantityProduced"] } ] }
        ]
    })
}

fn handoff_schema(dispense: bool) -> Value {
    let mut schema = json!({
        "type": "object",
        "properties": {
            "batchId": text(),
            "batchNumber": text(),
            "location": { "type": ["string", "null"] },
            "handlerDetails": text(),
            "contactInfo": text(),
            "timestamp": { "type": ["string", "integer", "null"] }
        },
        "required": ["handlerDetails", "contactInfo"],
        "allOf": [batch_id_required()]
    });
    if dispense {
        schema["properties"]["prescription"] = text();
        if let Some(required) = schema["required"].as_array_mut() {
            required.push(json!("prescription"));
        }
    }
    schema
}
