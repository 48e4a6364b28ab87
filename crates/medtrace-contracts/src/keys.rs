//! Secret key newtypes.
//!
//! Both types redact themselves in `Debug` output so keys never leak into
//! logs or panic messages.

use std::fmt;

use crate::role::Role;

/// Process-wide HMAC signing secret.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningKey(Vec<u8>);

impl SigningKey {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self(secret.as_ref().to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningKey(<redacted>)")
    }
}

/// 256-bit symmetric key for sealing confidential fields.
#[derive(Clone, PartialEq, Eq)]
pub struct SealKey([u8; 32]);

impl SealKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for SealKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SealKey(<redacted>)")
    }
}

/// Resolves the HMAC key a given role signs with.
///
/// A bare `SigningKey` answers for every role.
pub trait SigningKeys: Send + Sync {
    fn signing_key(&self, role: Role) -> &SigningKey;
}

impl SigningKeys for SigningKey {
    fn signing_key(&self, _role: Role) -> &SigningKey {
        self
    }
}
