//! HTTP front end.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, trace, deadline)
//!     → request.rs (request ID, routing host)
//!     → pipeline (authenticate, authorize, route, forward)
//!     → response.rs (rejection bodies)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use server::GatewayServer;
