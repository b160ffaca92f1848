//! Response bodies bounded by the attempt deadline.
//!
//! The target slot travels with the body: it is released when the body ends,
//! fails, hits the deadline, or is dropped by the client.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::{Body, Bytes};
use hyper::body::{Body as HttpBody, Frame, SizeHint};
use tokio::time::{Instant, Sleep};

use crate::load_balancer::TargetGuard;
use crate::resilience::DeadlineElapsed;

/// Streams a downstream body until it ends or `deadline` passes.
pub struct DeadlineBody {
    inner: Body,
    sleep: Pin<Box<Sleep>>,
    budget: std::time::Duration,
    guard: Option<TargetGuard>,
    expired: bool,
}

impl DeadlineBody {
    /// `budget` is the configured timeout, reported in the expiry error.
    pub fn new(
        inner: Body,
        deadline: Instant,
        budget: std::time::Duration,
        guard: TargetGuard,
    ) -> Self {
        Self {
            inner,
            sleep: Box::pin(tokio::time::sleep_until(deadline)),
            budget,
            guard: Some(guard),
            expired: false,
        }
    }

    fn finish(&mut self) {
        self.guard.take();
    }
}

impl HttpBody for DeadlineBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        if this.expired {
            return Poll::Ready(None);
        }

        // Checked first so a body that keeps trickling still stops on time.
        if this.sleep.as_mut().poll(cx).is_ready() {
            this.expired = true;
            // Dropping the downstream body closes its connection.
            this.inner = Body::empty();
            if let Some(guard) = this.guard.take() {
                tracing::warn!(
                    target_addr = %guard.target(),
                    timeout = ?this.budget,
                    "Downstream body exceeded the attempt deadline"
                );
            }
            return Poll::Ready(Some(Err(axum::Error::new(DeadlineElapsed(this.budget)))));
        }

        match Pin::new(&mut this.inner).poll_frame(cx) {
            Poll::Ready(None) => {
                this.finish();
                Poll::Ready(None)
            }
            Poll::Ready(Some(Err(e))) => {
                this.finish();
                Poll::Ready(Some(Err(e)))
            }
            other => other,
        }
    }

    fn is_end_stream(&self) -> bool {
        self.expired || self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}
