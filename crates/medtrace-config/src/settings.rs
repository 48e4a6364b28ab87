//! Engine settings schema.
//!
//! Everything here is optional in TOML; an empty document yields the
//! defaults.
//!
//! ```toml
//! [validation]
//! signatures = "enforce"   # or "skip"
//!
//! [locations]
//! manufacturer = "Factory Output"
//! distributor = "Distribution Center"
//! pharmacy = "Pharmacy Counter"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use medtrace_contracts::{
    error::{MedtraceError, MedtraceResult},
    role::Role,
};

/// Whether chain validation checks HMAC signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignaturePolicy {
    #[default]
    Enforce,
    Skip,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValidationSettings {
    pub signatures: SignaturePolicy,
}

/// Location recorded on a block when the request omits one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LocationDefaults {
    pub manufacturer: String,
    pub distributor: String,
    pub pharmacy: String,
}

impl Default for LocationDefaults {
    fn default() -> Self {
        Self {
            manufacturer: "Factory Output".to_string(),
            distributor: "Distribution Center".to_string(),
            pharmacy: "Pharmacy Counter".to_string(),
        }
    }
}

impl LocationDefaults {
    pub fn for_role(&self, role: Role) -> &str {
        match role {
            Role::Manufacturer => &self.manufacturer,
            Role::Distributor => &self.distributor,
            Role::Pharmacy => &self.pharmacy,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineSettings {
    pub validation: ValidationSettings,
    pub locations: LocationDefaults,
}

impl EngineSettings {
    /// Parse settings from a TOML string.
    ///
    /// Returns `MedtraceError::ConfigError` on malformed TOML or unknown keys.
    pub fn from_toml_str(s: &str) -> MedtraceResult<Self> {
        toml::from_str(s).map_err(|e| MedtraceError::ConfigError {
            reason: format!("failed to parse engine settings TOML: {}", e),
        })
    }

    /// Read and parse the settings file at `path`.
    pub fn from_file(path: &Path) -> MedtraceResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| MedtraceError::ConfigError {
            reason: format!("failed to read settings file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }
}
