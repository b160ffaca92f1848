//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, path, host)
//!     → router.rs (ordered scan)
//!     → matcher.rs (host and method conditions)
//!     → template.rs (path template, captures)
//!     → Return: RouteMatch or None
//!
//! Route Compilation (per configuration snapshot):
//!     RouteConfig[]
//!     → parse templates, build target pools
//!     → stable sort by specificity
//!     → freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled once per snapshot, immutable at runtime
//! - No regex in hot path (segment comparison only)
//! - Deterministic: same input always matches same route
//! - First match wins (ordered by specificity, then declaration)

pub mod matcher;
pub mod router;
pub mod template;

pub use router::{Route, RouteError, RouteMatch, RouteTable};
pub use template::{Captures, PathTemplate, TemplateError};
