//! Route conditions other than the path.
//!
//! # Responsibilities
//! - Match the Host header (case-insensitive, port ignored)
//! - Match the request method
//! - Combine conditions with AND semantics
//!
//! # Design Decisions
//! - Path matching lives in `template.rs`; conditions here only filter
//! - Empty condition list = always matches
//! - A host-bound route never matches a request without a Host header

use axum::http::Method;

/// The parts of a request routing looks at.
#[derive(Debug, Clone, Copy)]
pub struct RequestTarget<'a> {
    pub method: &'a Method,
    pub path: &'a str,
    pub host: Option<&'a str>,
}

/// A condition a request must satisfy.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    fn matches(&self, req: &RequestTarget<'_>) -> bool;
}

/// Matches the Host header.
#[derive(Debug, Clone)]
pub struct HostMatcher {
    expected_host: String,
}

impl HostMatcher {
    /// The host is normalized to lowercase; a port in the pattern is dropped.
    pub fn new(host: impl Into<String>) -> Self {
        let host = host.into();
        Self {
            expected_host: strip_port(&host).to_ascii_lowercase(),
        }
    }
}

impl Matcher for HostMatcher {
    fn matches(&self, req: &RequestTarget<'_>) -> bool {
        req.host
            .map(|h| strip_port(h).eq_ignore_ascii_case(&self.expected_host))
            .unwrap_or(false)
    }
}

/// `example.com:8080` → `example.com`, `[::1]:8080` → `[::1]`.
fn strip_port(host: &str) -> &str {
    let host = host.trim();
    if host.starts_with('[') {
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }
    match host.rsplit_once(':') {
        Some((name, port)) if !name.contains(':') && port.bytes().all(|b| b.is_ascii_digit()) => {
            name
        }
        _ => host,
    }
}

/// Matches one of a set of methods.
#[derive(Debug, Clone)]
pub struct MethodMatcher {
    methods: Vec<Method>,
}

impl MethodMatcher {
    pub fn new(methods: Vec<Method>) -> Self {
        Self { methods }
    }
}

impl Matcher for MethodMatcher {
    fn matches(&self, req: &RequestTarget<'_>) -> bool {
        self.methods.iter().any(|m| m == req.method)
    }
}

/// Combines multiple matchers with AND semantics.
#[derive(Debug, Default)]
pub struct AndMatcher {
    matchers: Vec<Box<dyn Matcher>>,
}

impl AndMatcher {
    pub fn new(matchers: Vec<Box<dyn Matcher>>) -> Self {
        Self { matchers }
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }
}

impl Matcher for AndMatcher {
    fn matches(&self, req: &RequestTarget<'_>) -> bool {
        self.matchers.iter().all(|m| m.matches(req))
    }
}
