//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to target:
//!     → timeouts.rs (per-attempt deadline)
//!     → On failure: retries.rs (check if retryable)
//!     → backoff.rs (jittered delay before the next attempt)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every downstream call has a deadline
//! - Retries only for idempotent requests (GET, HEAD)
//! - Retry count is bounded by configuration, default zero

pub mod backoff;
pub mod retries;
pub mod timeouts;

pub use backoff::Backoff;
pub use retries::{is_idempotent, RetryPolicy};
pub use timeouts::{with_deadline, DeadlineElapsed};
