//! Custodian roles.
//!
//! The set is closed: only these three roles ever write a block. Patients
//! read and verify but never append.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MedtraceError;

/// The custodian that emitted a chain block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Manufacturer,
    Distributor,
    Pharmacy,
}

impl Role {
    /// The exact string used in canonical payloads and on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Manufacturer => "Manufacturer",
            Role::Distributor => "Distributor",
            Role::Pharmacy => "Pharmacy",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = MedtraceError;

    /// Parse a role tag. Matching is exact; anything outside the closed set
    /// is rejected rather than defaulted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Manufacturer" => Ok(Role::Manufacturer),
            "Distributor" => Ok(Role::Distributor),
            "Pharmacy" => Ok(Role::Pharmacy),
            other => Err(MedtraceError::canonicalization(
                "role",
                format!("'{other}' is not one of Manufacturer, Distributor, Pharmacy"),
            )),
        }
    }
}
