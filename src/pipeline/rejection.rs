//! Terminal failures of the pipeline.

use axum::http::StatusCode;
use thiserror::Error;

use crate::auth::{DenyReason, TokenError};
use crate::forwarding::ForwardError;
use crate::pipeline::stage::Stage;

/// Why a request did not reach a downstream response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("no bearer credentials were presented")]
    MissingCredentials,

    #[error("authorization scheme is not supported")]
    UnsupportedScheme,

    #[error(transparent)]
    Token(TokenError),

    #[error("authorization denied: {0}")]
    PolicyDenied(DenyReason),

    #[error("no route matches the request")]
    RouteNotFound,

    #[error(transparent)]
    Forward(ForwardError),
}

impl Rejection {
    pub fn status(&self) -> StatusCode {
        match self {
            Rejection::MissingCredentials | Rejection::UnsupportedScheme | Rejection::Token(_) => {
                StatusCode::UNAUTHORIZED
            }
            Rejection::PolicyDenied(_) => StatusCode::FORBIDDEN,
            Rejection::RouteNotFound => StatusCode::NOT_FOUND,
            Rejection::Forward(e) => e.status(),
        }
    }

    pub fn terminal_stage(&self) -> Stage {
        match self {
            Rejection::MissingCredentials | Rejection::UnsupportedScheme | Rejection::Token(_) => {
                Stage::RejectedUnauthenticated
            }
            Rejection::PolicyDenied(_) => Stage::RejectedForbidden,
            Rejection::RouteNotFound => Stage::RejectedNotFound,
            Rejection::Forward(_) => Stage::RejectedBadGateway,
        }
    }

    /// Body text safe for any environment: no token, no target address.
    pub fn public_message(&self) -> &'static str {
        match self.status() {
            StatusCode::UNAUTHORIZED => "unauthorized",
            StatusCode::FORBIDDEN => "forbidden",
            StatusCode::NOT_FOUND => "not found",
            StatusCode::GATEWAY_TIMEOUT => "gateway timeout",
            StatusCode::SERVICE_UNAVAILABLE => "service unavailable",
            StatusCode::BAD_REQUEST => "bad request",
            _ => "bad gateway",
        }
    }

    /// Stable identifier for logs and metrics.
    pub fn code(&self) -> &'static str {
        match self {
            Rejection::MissingCredentials => "missing_credentials",
            Rejection::UnsupportedScheme => "unsupported_scheme",
            Rejection::Token(e) => e.code(),
            Rejection::PolicyDenied(_) => "policy_denied",
            Rejection::RouteNotFound => "route_not_found",
            Rejection::Forward(e) => e.code(),
        }
    }
}
