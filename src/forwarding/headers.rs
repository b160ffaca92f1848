//! Header rewriting between client, gateway and target.
//!
//! Gateway-added headers are additive: a value the client or target already
//! set is never replaced. `Host` is the exception, it always names the target.

use std::net::SocketAddr;

use axum::http::header::{AUTHORIZATION, CONNECTION, HOST};
use axum::http::{HeaderMap, HeaderName, HeaderValue};

use crate::http::request::X_REQUEST_ID;
use crate::load_balancer::Target;

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");
const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");

/// Connection-scoped headers that never cross the proxy.
const HOP_BY_HOP: [&str; 9] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Remove hop-by-hop headers, including any named in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::try_from(name.trim()).ok())
        .collect();

    for name in listed {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

/// Per-request facts the upstream headers are derived from.
#[derive(Debug, Clone, Copy)]
pub struct UpstreamContext<'a> {
    pub request_id: &'a str,
    pub client_addr: Option<SocketAddr>,
    pub strip_authorization: bool,
}

/// Rewrite inbound headers for the chosen target.
pub fn prepare_upstream(headers: &mut HeaderMap, target: &Target, ctx: &UpstreamContext<'_>) {
    let original_host = headers.get(HOST).cloned();

    strip_hop_by_hop(headers);
    if ctx.strip_authorization {
        headers.remove(AUTHORIZATION);
    }

    if let Ok(host) = HeaderValue::from_str(&target.authority()) {
        headers.insert(HOST, host);
    }

    insert_absent(headers, X_REQUEST_ID, HeaderValue::from_str(ctx.request_id).ok());
    insert_absent(
        headers,
        X_FORWARDED_FOR,
        ctx.client_addr
            .and_then(|addr| HeaderValue::from_str(&addr.ip().to_string()).ok()),
    );
    insert_absent(headers, X_FORWARDED_HOST, original_host);
    insert_absent(headers, X_FORWARDED_PROTO, Some(HeaderValue::from_static("http")));
}

/// Rewrite target response headers for the client.
pub fn prepare_downstream(headers: &mut HeaderMap, request_id: &str) {
    strip_hop_by_hop(headers);
    insert_absent(headers, X_REQUEST_ID, HeaderValue::from_str(request_id).ok());
}

fn insert_absent(headers: &mut HeaderMap, name: HeaderName, value: Option<HeaderValue>) {
    if headers.contains_key(&name) {
        return;
    }
    if let Some(value) = value {
        headers.insert(name, value);
    }
}
