//! Forwarding subsystem.
//!
//! # Data Flow
//! ```text
//! RouteMatch + ProxyRequest
//!     → rewrite.rs (downstream path from captures, query preserved)
//!     → load_balancer (select target, reserve slot)
//!     → headers.rs (hop-by-hop removal, Host, x-forwarded-*)
//!     → client.rs (pooled hyper client, per-attempt deadline, bounded retry)
//!     → response streamed back, hop-by-hop removed, x-request-id added
//! ```
//!
//! # Design Decisions
//! - The `Forward` trait is the seam between pipeline and network; tests
//!   substitute a counting stub
//! - Downstream status and body pass through unchanged, whatever the status
//! - Errors are values; the pipeline maps them to 400/502/503/504

pub mod body;
pub mod client;
pub mod headers;
pub mod rewrite;

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, Response, StatusCode, Uri};
use thiserror::Error;

use crate::routing::RouteMatch;

pub use client::HttpForwarder;

/// Why a request could not be forwarded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ForwardError {
    #[error("could not connect to {target}")]
    ConnectFailed { target: String },

    #[error("{target} did not respond within {timeout:?}")]
    Timeout { target: String, timeout: Duration },

    #[error("exchange with {target} failed: {reason}")]
    DownstreamError { target: String, reason: String },

    #[error("every target of route '{route}' is at its connection limit")]
    Saturated { route: String },

    #[error("request body could not be read: {reason}")]
    RequestBody { reason: String },
}

impl ForwardError {
    pub fn status(&self) -> StatusCode {
        match self {
            ForwardError::ConnectFailed { .. } | ForwardError::DownstreamError { .. } => {
                StatusCode::BAD_GATEWAY
            }
            ForwardError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            ForwardError::Saturated { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ForwardError::RequestBody { .. } => StatusCode::BAD_REQUEST,
        }
    }

    /// Stable identifier for logs, metrics and audit events.
    pub fn code(&self) -> &'static str {
        match self {
            ForwardError::ConnectFailed { .. } => "connect_failed",
            ForwardError::Timeout { .. } => "timeout",
            ForwardError::DownstreamError { .. } => "downstream_error",
            ForwardError::Saturated { .. } => "saturated",
            ForwardError::RequestBody { .. } => "request_body_unreadable",
        }
    }

    /// Connect and timeout failures; the only ones eligible for retry.
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            ForwardError::ConnectFailed { .. } | ForwardError::Timeout { .. }
        )
    }
}

/// An inbound request on its way downstream.
#[derive(Debug)]
pub struct ProxyRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Body,
    pub request_id: String,
    pub client_addr: Option<SocketAddr>,
}

impl ProxyRequest {
    pub fn from_request(
        request: Request<Body>,
        request_id: String,
        client_addr: Option<SocketAddr>,
    ) -> Self {
        let (parts, body) = request.into_parts();
        Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body,
            request_id,
            client_addr,
        }
    }
}

/// Sends a resolved request to one of the route's targets.
#[async_trait]
pub trait Forward: Send + Sync {
    async fn forward(
        &self,
        matched: &RouteMatch,
        request: ProxyRequest,
    ) -> Result<Response<Body>, ForwardError>;
}
