//! # medtrace-config
//!
//! Loads everything the custody engine needs before it can serve requests:
//!
//! - [`EngineSettings`] from an optional TOML file (signature policy and
//!   default block locations);
//! - [`Secrets`] from the environment, derived into a [`KeyRing`].
//!
//! A missing or blank secret is a `ConfigError` at load time, never a
//! per-request failure.
//!
//! ```rust,ignore
//! let config = EngineConfig::load(Some(Path::new("config/engine.toml")))?;
//! ```

pub mod secrets;
pub mod settings;

use std::path::Path;

use tracing::info;

use medtrace_contracts::error::MedtraceResult;

pub use secrets::{KeyRing, Secrets};
pub use settings::{EngineSettings, LocationDefaults, SignaturePolicy};

/// Settings plus derived keys.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub settings: EngineSettings,
    pub keys: KeyRing,
}

impl EngineConfig {
    pub fn new(settings: EngineSettings, secrets: Secrets) -> Self {
        Self {
            settings,
            keys: secrets.into_key_ring(),
        }
    }

    /// Load settings from `path` (or defaults) and secrets from the
    /// environment.
    pub fn load(path: Option<&Path>) -> MedtraceResult<Self> {
        let settings = match path {
            Some(path) => EngineSettings::from_file(path)?,
            None => EngineSettings::default(),
        };
        let secrets = Secrets::from_env()?;

        info!(
            signatures = ?settings.validation.signatures,
            settings_file = ?path,
            "engine configuration loaded"
        );
        Ok(Self::new(settings, secrets))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
