//! Request inspection.
//!
//! # Responsibilities
//! - Name the correlation header
//! - Read the request ID assigned by the request-id layer
//! - Extract the routing-relevant host
//! - Resolve `.` and `..` path segments before anything looks at the path
//!
//! # Design Decisions
//! - Request ID added as early as possible (outermost layer) for tracing
//! - A client-supplied `x-request-id` is kept and propagated

use std::borrow::Cow;

use axum::http::header::HOST;
use axum::http::uri::PathAndQuery;
use axum::http::{HeaderMap, HeaderName, Uri};
use uuid::Uuid;

/// Correlation header carried to targets and back to clients.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// The request ID, or a fresh v4 UUID when absent or not valid UTF-8.
pub fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// Host used for routing: the `Host` header, else the URI authority (HTTP/2).
pub fn request_host<'a>(headers: &'a HeaderMap, uri: &'a Uri) -> Option<&'a str> {
    headers
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| uri.authority().map(|a| a.as_str()))
}

/// `path` with dot segments removed as in RFC 3986 section 5.2.4.
///
/// Percent-encoded dots (`%2e`) count as dots; other escapes are untouched.
pub fn remove_dot_segments(path: &str) -> Cow<'_, str> {
    if !path.split('/').any(|s| dot_segment(s).is_some()) {
        return Cow::Borrowed(path);
    }

    let segments: Vec<&str> = path.split('/').collect();
    let last = segments.len() - 1;
    let mut out: Vec<&str> = Vec::with_capacity(segments.len());
    for (i, &segment) in segments.iter().enumerate().skip(1) {
        match dot_segment(segment) {
            Some(DotSegment::Current) => {}
            Some(DotSegment::Parent) => {
                out.pop();
            }
            None => {
                out.push(segment);
                continue;
            }
        }
        // A trailing dot segment leaves a directory path behind.
        if i == last {
            out.push("");
        }
    }
    Cow::Owned(format!("/{}", out.join("/")))
}

enum DotSegment {
    Current,
    Parent,
}

fn dot_segment(segment: &str) -> Option<DotSegment> {
    if segment.len() > 6 {
        return None;
    }
    match segment.to_ascii_lowercase().replace("%2e", ".").as_str() {
        "." => Some(DotSegment::Current),
        ".." => Some(DotSegment::Parent),
        _ => None,
    }
}

/// `uri` with its path normalized, or `None` when it is already normal.
pub fn normalize_uri(uri: &Uri) -> Result<Option<Uri>, axum::http::Error> {
    let normalized = match remove_dot_segments(uri.path()) {
        Cow::Borrowed(_) => return Ok(None),
        Cow::Owned(path) => path,
    };
    let path_and_query = match uri.query() {
        Some(query) => format!("{}?{}", normalized, query),
        None => normalized,
    };

    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(PathAndQuery::try_from(path_and_query)?);
    Ok(Some(Uri::from_parts(parts)?))
}
