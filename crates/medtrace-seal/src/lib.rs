//! # medtrace-seal
//!
//! Confidential batch attributes (strength, quantity, distributor, dispatch
//! date, and the prescription recorded at dispense) are stored only as
//! authenticated-encryption envelopes. Nothing sealed here ever enters a
//! hashed or signed payload.

pub mod cipher;

pub use cipher::{derive_seal_key, open, open_json, open_text, seal, seal_json, seal_text, SealContext};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::{TimeZone, Utc};

    use medtrace_contracts::{
        batch::{ConfidentialDetails, ConfidentialField},
        error::MedtraceError,
    };

    use super::*;

    fn details() -> ConfidentialDetails {
        ConfidentialDetails {
            strength: "500mg".to_string(),
            quantity: 1000,
            distributor_id: "DIST-7".to_string(),
            dispatch_date: Utc.with_ymd_and_hms(2025, 12, 3, 0, 0, 0).unwrap(),
        }
    }

    fn ctx(batch_id: &str) -> SealContext<'_> {
        SealContext::new(batch_id, ConfidentialField::BatchDetails)
    }

    #[test]
    fn test_round_trip_json() {
        let key = derive_seal_key("aes-secret");
        let sealed = seal_json(&details(), &ctx("B001"), &key).unwrap();

        assert_eq!(sealed.algorithm, cipher::ALGORITHM);
        assert_eq!(sealed.nonce.len(), 24, "96-bit nonce as hex");
        assert!(!sealed.ciphertext.contains("500mg"));

        let opened: ConfidentialDetails = open_json(&sealed, &ctx("B001"), &key).unwrap();
        assert_eq!(opened, details());
    }

    #[test]
    fn test_fresh_nonce_per_seal() {
        let key = derive_seal_key("aes-secret");
        let a = seal_text("Take 2 daily", &ctx("B001"), &key).unwrap();
        let b = seal_text("Take 2 daily", &ctx("B001"), &key).unwrap();
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn test_wrong_key_fails() {
        let sealed = seal_text("Take 2 daily", &ctx("B001"), &derive_seal_key("aes-secret")).unwrap();
        let err = open_text(&sealed, &ctx("B001"), &derive_seal_key("other-secret")).unwrap_err();
        assert!(matches!(err, MedtraceError::Decryption { .. }), "got {err:?}");
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let key = derive_seal_key("aes-secret");
        let mut sealed = seal_text("Take 2 daily", &ctx("B001"), &key).unwrap();
        let flipped = if sealed.ciphertext.starts_with('0') { "1" } else { "0" };
        sealed.ciphertext.replace_range(0..1, flipped);
        assert!(matches!(
            open_text(&sealed, &ctx("B001"), &key),
            Err(MedtraceError::Decryption { .. })
        ));
    }

    /// An envelope lifted onto another batch or slot does not authenticate.
    #[test]
    fn test_context_is_bound() {
        let key = derive_seal_key("aes-secret");
        let sealed = seal_text("Take 2 daily", &ctx("B001"), &key).unwrap();

        assert!(open_text(&sealed, &ctx("B002"), &key).is_err());
        let prescription_slot = SealContext::new("B001", ConfidentialField::Prescription);
        assert!(open_text(&sealed, &prescription_slot, &key).is_err());
    }

    #[test]
    fn test_malformed_envelopes_fail_cleanly() {
        let key = derive_seal_key("aes-secret");
        let good = seal_text("x", &ctx("B001"), &key).unwrap();

        let mut bad_algorithm = good.clone();
        bad_algorithm.algorithm = "AES-256-ECB".to_string();
        let mut short_nonce = good.clone();
        short_nonce.nonce = "abcd".to_string();
        let mut not_hex = good;
        not_hex.ciphertext = "zz".to_string();

        for sealed in [bad_algorithm, short_nonce, not_hex] {
            assert!(matches!(
                open(&sealed, &ctx("B001"), &key),
                Err(MedtraceError::Decryption { .. })
            ));
        }
    }

    /// A value JSON cannot represent fails as a sealing error, not a store error.
    #[test]
    fn test_unserializable_value_is_a_seal_failure() {
        let key = derive_seal_key("aes-secret");
        let mut tuple_keys = BTreeMap::new();
        tuple_keys.insert((1u8, 2u8), "not a JSON object key");

        let err = seal_json(&tuple_keys, &ctx("B001"), &key).unwrap_err();
        assert!(matches!(err, MedtraceError::SealFailed { .. }), "got {err:?}");
    }

    #[test]
    fn test_seal_key_is_sha256_of_secret() {
        let key = derive_seal_key("abc");
        assert_eq!(
            hex::encode(key.as_bytes()),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
