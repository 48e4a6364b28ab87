//! Fail-fast secret loading.
//!
//! `SECRET_KEY` signs blocks and `AES_SECRET` seeds the seal key. Both must
//! be present and non-empty before the engine serves a single request.

use medtrace_chain::validator::SignatureCheck;
use medtrace_contracts::{
    error::{MedtraceError, MedtraceResult},
    keys::{SealKey, SigningKey, SigningKeys},
    role::Role,
};
use medtrace_seal::derive_seal_key;

use crate::settings::SignaturePolicy;

pub const SIGNING_SECRET_VAR: &str = "SECRET_KEY";
pub const SEAL_SECRET_VAR: &str = "AES_SECRET";

/// The raw secret strings, before key derivation.
pub struct Secrets {
    signing: String,
    sealing: String,
}

impl Secrets {
    /// Read both secrets from the process environment.
    pub fn from_env() -> MedtraceResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read both secrets through `lookup`, failing on the first one that is
    /// missing or blank.
    pub fn from_lookup<F>(lookup: F) -> MedtraceResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |name: &str| -> MedtraceResult<String> {
            match lookup(name) {
                Some(value) if !value.trim().is_empty() => Ok(value),
                Some(_) => Err(MedtraceError::ConfigError {
                    reason: format!("secret '{name}' is set but empty"),
                }),
                None => Err(MedtraceError::ConfigError {
                    reason: format!("required secret '{name}' is not set"),
                }),
            }
        };

        Ok(Self {
            signing: require(SIGNING_SECRET_VAR)?,
            sealing: require(SEAL_SECRET_VAR)?,
        })
    }

    pub fn into_key_ring(self) -> KeyRing {
        KeyRing {
            signing: SigningKey::new(&self.signing),
            sealing: derive_seal_key(&self.sealing),
        }
    }
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Secrets(<redacted>)")
    }
}

/// Derived keys held for the life of the process.
///
/// Every role signs with the same key today; lookups go through
/// `SigningKeys` so that can change without touching callers.
#[derive(Debug, Clone)]
pub struct KeyRing {
    signing: SigningKey,
    sealing: SealKey,
}

impl KeyRing {
    pub fn new(signing: SigningKey, sealing: SealKey) -> Self {
        Self { signing, sealing }
    }

    pub fn seal_key(&self) -> &SealKey {
        &self.sealing
    }

    /// The validator's signature mode under `policy`.
    pub fn signature_check(&self, policy: SignaturePolicy) -> SignatureCheck<'_> {
        match policy {
            SignaturePolicy::Enforce => SignatureCheck::Enforce(self),
            SignaturePolicy::Skip => SignatureCheck::Skip,
        }
    }
}

impl SigningKeys for KeyRing {
    fn signing_key(&self, _role: Role) -> &SigningKey {
        &self.signing
    }
}
