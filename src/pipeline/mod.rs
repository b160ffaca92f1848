//! Gateway pipeline.
//!
//! # Responsibilities
//! - Hold the atomically swapped configuration snapshot
//! - Drive each request through authenticate, authorize, route, forward
//! - Turn the first failure into a rejection response
//!
//! # Design Decisions
//! - One snapshot per request, loaded once
//! - Stages only move forward; the trace records the path taken
//! - Authentication runs exactly once and before routing, unless the request
//!   carries no credentials and targets a route explicitly marked anonymous

pub mod gateway;
pub mod rejection;
pub mod snapshot;
pub mod stage;

pub use gateway::{GatewayPipeline, PipelineOutcome};
pub use rejection::Rejection;
pub use snapshot::{GatewaySnapshot, SnapshotError, SnapshotStore};
pub use stage::{Stage, StageTrace};
