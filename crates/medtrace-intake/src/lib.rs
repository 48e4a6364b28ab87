//! # medtrace-intake
//!
//! Boundary validation for raw custody request bodies.
//!
//! [`IntakeValidator`] checks a JSON body against its request kind's schema
//! and a set of semantic rules, then deserializes it into the typed request
//! the ledger accepts. Anything that would make canonicalization fail is
//! caught here first, with every problem listed at once.
//!
//! ```rust,ignore
//! let intake = IntakeValidator::new()?;
//! let request = intake.parse_receipt(&body)?;
//! ledger.receive(request)?;
//! ```

pub mod engine;
pub mod schema;

pub use engine::{IntakeFailure, IntakeReport, IntakeValidator};
pub use schema::RequestKind;

// ── Tests ─────────────────────────────────────────────────────────────────────
