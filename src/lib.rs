//! Authenticating reverse-proxy gateway.
//!
//! Every inbound request is authenticated with a bearer token, authorized
//! against a named policy, resolved to a route and forwarded to one of the
//! route's targets. The downstream response is relayed verbatim.

// Request path
pub mod auth;
pub mod forwarding;
pub mod http;
pub mod pipeline;
pub mod routing;

// Traffic management
pub mod load_balancer;
pub mod resilience;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use config::schema::GatewayConfig;
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
pub use pipeline::{GatewayPipeline, SnapshotStore};
