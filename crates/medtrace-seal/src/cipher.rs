//! ChaCha20-Poly1305 envelopes for confidential batch fields.
//!
//! Every seal draws a fresh 96-bit nonce from the OS RNG, so sealing the same
//! plaintext twice yields different ciphertexts. The batch id and field name
//! are bound in as associated data: an envelope copied onto another batch,
//! or into another slot, fails to open.

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Key, Nonce,
};
use rand_core::{OsRng, RngCore};
use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use medtrace_contracts::{
    batch::{ConfidentialField, SealedField},
    error::{MedtraceError, MedtraceResult},
    keys::SealKey,
};

/// Algorithm label written into every envelope.
pub const ALGORITHM: &str = "ChaCha20-Poly1305";

const NONCE_LEN: usize = 12;

/// Where a sealed value lives. Serialized into the AEAD associated data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SealContext<'a> {
    pub batch_id: &'a str,
    pub field: ConfidentialField,
}

impl<'a> SealContext<'a> {
    pub fn new(batch_id: &'a str, field: ConfidentialField) -> Self {
        Self { batch_id, field }
    }

    fn associated_data(&self) -> Vec<u8> {
        format!("{}|{}", self.batch_id, self.field.as_str()).into_bytes()
    }
}

/// Derive the 256-bit seal key from the configured secret string.
pub fn derive_seal_key(secret: &str) -> SealKey {
    SealKey::from_bytes(Sha256::digest(secret.as_bytes()).into())
}

fn cipher_for(key: &SealKey) -> ChaCha20Poly1305 {
    ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()))
}

fn decryption(reason: impl Into<String>) -> MedtraceError {
    MedtraceError::Decryption {
        reason: reason.into(),
    }
}

/// Encrypt `plaintext` for `context`.
pub fn seal(plaintext: &[u8], context: &SealContext<'_>, key: &SealKey) -> MedtraceResult<SealedField> {
    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);

    let aad = context.associated_data();
    let ciphertext = cipher_for(key)
        .encrypt(
            Nonce::from_slice(&nonce_bytes),
            Payload {
                msg: plaintext,
                aad: &aad,
            },
        )
        .map_err(|_| MedtraceError::SealFailed {
            reason: format!("failed to encrypt field '{}'", context.field.as_str()),
        })?;

    debug!(batch_id = %context.batch_id, field = context.field.as_str(), "field sealed");
    Ok(SealedField {
        algorithm: ALGORITHM.to_string(),
        nonce: hex::encode(nonce_bytes),
        ciphertext: hex::encode(ciphertext),
    })
}

/// Decrypt and authenticate `sealed` for `context`.
///
/// A wrong key, a tampered ciphertext, a mismatched context, or a malformed
/// envelope all fail with `Decryption`.
pub fn open(sealed: &SealedField, context: &SealContext<'_>, key: &SealKey) -> MedtraceResult<Vec<u8>> {
    if sealed.algorithm != ALGORITHM {
        return Err(decryption(format!("unsupported algorithm '{}'", sealed.algorithm)));
    }
    let nonce_bytes = hex::decode(&sealed.nonce).map_err(|e| decryption(format!("nonce is not hex: {e}")))?;
    if nonce_bytes.len() != NONCE_LEN {
        return Err(decryption(format!(
            "nonce must be {NONCE_LEN} bytes, got {}",
            nonce_bytes.len()
        )));
    }
    let ciphertext =
        hex::decode(&sealed.ciphertext).map_err(|e| decryption(format!("ciphertext is not hex: {e}")))?;

    let aad = context.associated_data();
    cipher_for(key)
        .decrypt(
            Nonce::from_slice(&nonce_bytes),
            Payload {
                msg: &ciphertext,
                aad: &aad,
            },
        )
        .map_err(|_| {
            warn!(
                batch_id = %context.batch_id,
                field = context.field.as_str(),
                "sealed field failed authentication"
            );
            decryption(format!(
                "field '{}' of batch '{}' did not authenticate",
                context.field.as_str(),
                context.batch_id
            ))
        })
}

/// Serialize `value` as JSON and seal it.
pub fn seal_json<T: Serialize>(
    value: &T,
    context: &SealContext<'_>,
    key: &SealKey,
) -> MedtraceResult<SealedField> {
    let plaintext = serde_json::to_vec(value).map_err(|e| MedtraceError::SealFailed {
        reason: format!("failed to serialize '{}': {e}", context.field.as_str()),
    })?;
    seal(&plaintext, context, key)
}

/// Open `sealed` and deserialize the JSON inside.
pub fn open_json<T: DeserializeOwned>(
    sealed: &SealedField,
    context: &SealContext<'_>,
    key: &SealKey,
) -> MedtraceResult<T> {
    let plaintext = open(sealed, context, key)?;
    serde_json::from_slice(&plaintext)
        .map_err(|e| decryption(format!("sealed '{}' is not valid JSON: {e}", context.field.as_str())))
}

/// Seal a UTF-8 string.
pub fn seal_text(text: &str, context: &SealContext<'_>, key: &SealKey) -> MedtraceResult<SealedField> {
    seal(text.as_bytes(), context, key)
}

/// Open a sealed UTF-8 string.
pub fn open_text(sealed: &SealedField, context: &SealContext<'_>, key: &SealKey) -> MedtraceResult<String> {
    let plaintext = open(sealed, context, key)?;
    String::from_utf8(plaintext).map_err(|_| decryption("sealed text is not valid UTF-8"))
}
