//! Rejection responses.
//!
//! # Design Decisions
//! - JSON body `{"error": "..."}` with a generic message
//! - `detail` only when diagnostics are enabled (never in production)
//! - 401 carries `WWW-Authenticate: Bearer`

use axum::body::Body;
use axum::http::header::WWW_AUTHENTICATE;
use axum::http::{HeaderValue, Response, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::pipeline::Rejection;

pub fn rejection_response(rejection: &Rejection, diagnostics: bool) -> Response<Body> {
    let status = rejection.status();
    let body = if diagnostics {
        json!({
            "error": rejection.public_message(),
            "detail": rejection.to_string(),
        })
    } else {
        json!({ "error": rejection.public_message() })
    };

    let mut response = (status, Json(body)).into_response();
    if status == StatusCode::UNAUTHORIZED {
        response
            .headers_mut()
            .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    }
    response
}
