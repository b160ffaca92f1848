//! Authentication and authorization.
//!
//! # Responsibilities
//! - Extract credentials from the `Authorization` header
//! - Validate bearer tokens (signature, issuer, audience, lifetime)
//! - Cache successful validations until the token expires
//! - Evaluate named authorization policies against verified claims
//!
//! # Data Flow
//! ```text
//! Authorization header
//!     → Credentials::from_headers
//!     → ValidationCache::get (hit: done)
//!     → TokenValidator::validate → ValidationCache::insert
//!     → PolicySet::authorize → Decision
//! ```

pub mod cache;
pub mod claims;
pub mod policy;
pub mod token;

use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;

pub use cache::ValidationCache;
pub use claims::ClaimsSet;
pub use policy::{AuthorizationPolicy, ClaimPredicate, Decision, DenyReason, PolicySet};
pub use token::{
    mask_token, unix_now, KeyError, TokenError, TokenValidator, ValidToken, ValidationResult,
    ValidationRules, BEARER_SCHEME,
};

/// Credentials carried by a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Credentials<'a> {
    /// No `Authorization` header.
    Missing,
    /// `Authorization: Bearer <token>`; the scheme matches case-insensitively.
    Bearer(&'a str),
    /// A header with another scheme, an empty token, or non-ASCII bytes.
    Unsupported,
}

impl<'a> Credentials<'a> {
    pub fn from_headers(headers: &'a HeaderMap) -> Self {
        let Some(value) = headers.get(AUTHORIZATION) else {
            return Credentials::Missing;
        };
        let Ok(value) = value.to_str() else {
            return Credentials::Unsupported;
        };

        let value = value.trim();
        let Some((scheme, token)) = value.split_once(' ') else {
            return Credentials::Unsupported;
        };
        let token = token.trim();
        if !scheme.eq_ignore_ascii_case(BEARER_SCHEME) || token.is_empty() {
            return Credentials::Unsupported;
        }
        Credentials::Bearer(token)
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Credentials::Missing)
    }
}
