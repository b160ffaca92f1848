//! Retry logic.
//!
//! # Responsibilities
//! - Determine if a request is retryable (GET/HEAD only)
//! - Bound the number of attempts per request
//!
//! # Design Decisions
//! - Never retry POST/PUT/DELETE/PATCH (non-idempotent)
//! - Only connectivity failures (connect, timeout) are retried; a downstream
//!   response of any status is passed through
//! - Default is no retry

use axum::http::Method;

use crate::forwarding::ForwardError;

/// Attempt budget for one forwarded request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
}

impl RetryPolicy {
    /// `retries` extra attempts for GET/HEAD when `replayable`, one attempt otherwise.
    pub fn new(method: &Method, retries: u32, replayable: bool) -> Self {
        let max_attempts = if is_idempotent(method) && replayable {
            retries.saturating_add(1)
        } else {
            1
        };
        Self { max_attempts }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Whether another attempt may follow failed attempt number `attempt` (1-based).
    pub fn allows(&self, attempt: u32, error: &ForwardError) -> bool {
        attempt < self.max_attempts && error.is_connectivity()
    }
}

/// Methods the gateway is allowed to replay.
pub fn is_idempotent(method: &Method) -> bool {
    method == Method::GET || method == Method::HEAD
}
