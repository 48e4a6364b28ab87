//! # medtrace-chain
//!
//! The canonical hash-chain integrity engine for medicine custody records.
//!
//! ## Overview
//!
//! Each custody event is canonicalized into sorted compact JSON, hashed into
//! a `dataHash`, folded into a `chainHash` with everything before it, and
//! signed with an HMAC over a reduced summary. Re-verification re-runs the
//! same three steps per block and reports the first divergence.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use medtrace_chain::{builder, validator::{validate_chain, SignatureCheck}};
//!
//! let genesis = builder::create_genesis("B001", event, now, &key)?;
//! let report = validate_chain("B001", &[genesis], SignatureCheck::Enforce(&key))?;
//! ```

pub mod builder;
pub mod canonical;
pub mod hash;
pub mod reference;
pub mod sign;
pub mod validator;

pub use builder::{append, commit, commit_with_field, create_genesis, mark_complete, open_batch};
pub use canonical::{canonicalize, canonicalize_block, CanonicalPayload};
pub use hash::{chain_hash, data_hash};
pub use reference::{decode_reference, encode_reference};
pub use validator::{locate_chain_hash, validate_batch, validate_chain, SignatureCheck};

// ── Tests ─────────────────────────────────────────────────────────────────────
