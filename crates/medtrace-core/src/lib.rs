//! # medtrace-core
//!
//! The custody ledger for medicine batches.
//!
//! This crate provides:
//! - The collaborator traits (`BatchStore`, `OpticalCodec`, `Clock`)
//! - The `CustodyLedger` that runs create / receive / dispense / verify
//!   against them, refusing any handoff on a chain that fails verification
//!
//! ## Usage
//!
//! ```rust,ignore
//! use medtrace_core::CustodyLedger;
//!
//! let ledger = CustodyLedger::new(store, EngineConfig::load(None)?);
//! ledger.create_batch(request)?;
//! ```

pub mod ledger;
pub mod traits;

pub use ledger::CustodyLedger;
