//! Audit events.
//!
//! The pipeline reports what it decided through an [`AuditSink`]. Sinks must
//! never block the request path.

use serde::Serialize;
use tokio::sync::mpsc;

/// One audited decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    TokenValidated {
        request_id: String,
        subject: Option<String>,
        cached: bool,
    },
    TokenRejected {
        request_id: String,
        reason: &'static str,
        /// Masked unless diagnostics are enabled.
        token: String,
    },
    CredentialsMissing {
        request_id: String,
        path: String,
    },
    AuthorizationDecided {
        request_id: String,
        policy: String,
        outcome: &'static str,
        reason: Option<String>,
    },
    RouteMiss {
        request_id: String,
        method: String,
        path: String,
    },
    ForwardAttemptFailed {
        request_id: String,
        route: String,
        attempt: u32,
        error: &'static str,
        target: String,
    },
    ForwardFailed {
        request_id: String,
        route: String,
        attempts: u32,
        error: &'static str,
    },
}

impl AuditEvent {
    /// Dotted event name, e.g. `forward.attempt_failed`.
    pub fn name(&self) -> &'static str {
        match self {
            AuditEvent::TokenValidated { .. } => "token.validated",
            AuditEvent::TokenRejected { .. } => "token.rejected",
            AuditEvent::CredentialsMissing { .. } => "credentials.missing",
            AuditEvent::AuthorizationDecided { .. } => "authorization.decided",
            AuditEvent::RouteMiss { .. } => "route.miss",
            AuditEvent::ForwardAttemptFailed { .. } => "forward.attempt_failed",
            AuditEvent::ForwardFailed { .. } => "forward.failed",
        }
    }
}

/// Destination for audit events.
pub trait AuditSink: Send + Sync {
    fn emit(&self, event: AuditEvent);
}

/// Writes events as structured `tracing` records under target `audit`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, event: AuditEvent) {
        let name = event.name();
        match serde_json::to_string(&event) {
            Ok(record) => match event {
                AuditEvent::TokenValidated { .. } | AuditEvent::AuthorizationDecided { .. } => {
                    tracing::info!(target: "audit", event = name, record = %record)
                }
                _ => tracing::warn!(target: "audit", event = name, record = %record),
            },
            Err(e) => tracing::error!(target: "audit", event = name, error = %e, "Unserializable audit event"),
        }
    }
}

/// Sends events over an unbounded channel. Dropped receivers are ignored.
#[derive(Debug, Clone)]
pub struct ChannelAuditSink {
    tx: mpsc::UnboundedSender<AuditEvent>,
}

impl ChannelAuditSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<AuditEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl AuditSink for ChannelAuditSink {
    fn emit(&self, event: AuditEvent) {
        let _ = self.tx.send(event);
    }
}
