//! # medtrace-ref-pharma
//!
//! Pharmaceutical reference runtime for the medtrace custody chain.
//!
//! Demonstrates three supply-chain scenarios using mock data:
//!
//! 1. **Full custody walk**: manufacturer → distributors → pharmacy, with
//!    reference codes issued and verified along the way.
//! 2. **Tamper localization**: out-of-band edits to stored blocks, each
//!    caught at the exact block touched.
//! 3. **Concurrent receipt race**: two stale appends, one winner, one
//!    retryable conflict.
//!
//! All data is hardcoded and fictional. No external systems are contacted.

pub mod codec;
pub mod mock_data;
pub mod scenarios;
