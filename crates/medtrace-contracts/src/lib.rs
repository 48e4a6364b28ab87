//! # medtrace-contracts
//!
//! Shared types, wire formats, and error contracts for the medtrace custody
//! chain.
//!
//! All crates in the workspace import from here. No hashing, signing, or
//! storage logic lives in this crate; only data definitions and errors.

pub mod batch;
pub mod block;
pub mod error;
pub mod keys;
pub mod request;
pub mod role;
pub mod verify;
