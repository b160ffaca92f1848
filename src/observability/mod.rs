//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, histograms)
//!     → audit.rs (authentication, authorization, routing, forwarding decisions)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//!     → Audit sink (tracing target `audit`, or a channel)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows through all subsystems
//! - Metrics are cheap (atomic increments)
//! - Audit emission never blocks the pipeline

pub mod audit;
pub mod logging;
pub mod metrics;

pub use audit::{AuditEvent, AuditSink, ChannelAuditSink, TracingAuditSink};
