//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap each downstream attempt with a deadline
//! - Cancel the attempt cleanly when the deadline passes
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities; dropping the future drops the
//!   in-flight connection, which returns its slot to the client pool
//! - Timeout errors are distinct from other errors (504, not 502)

use std::future::Future;
use std::time::Duration;

/// The deadline passed before the operation finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("deadline of {0:?} elapsed")]
pub struct DeadlineElapsed(pub Duration);

/// Run `fut` with a deadline.
pub async fn with_deadline<F, T>(deadline: Duration, fut: F) -> Result<T, DeadlineElapsed>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(deadline, fut)
        .await
        .map_err(|_| DeadlineElapsed(deadline))
}
