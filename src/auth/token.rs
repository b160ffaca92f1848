//! Bearer token validation.
//!
//! # Check order
//! The first failing check decides the result:
//! 1. structure: three non-empty base64url segments, JSON header and payload
//! 2. signature with the configured key and algorithm
//! 3. `iss` equals the expected issuer
//! 4. `aud` contains the expected audience
//! 5. lifetime: `exp` required, `nbf` optional, both widened by the clock skew
//!
//! Claims are only inspected after the signature is verified. Validation is
//! pure: no I/O, no logging. The caller decides what to audit.

use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::auth::claims::ClaimsSet;
use crate::config::schema::{JwtConfig, KeyConfig};

/// Scheme name carried by claims produced here.
pub const BEARER_SCHEME: &str = "Bearer";

/// Why a token was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,

    #[error("token signature is invalid")]
    BadSignature,

    #[error("token issuer does not match")]
    IssuerMismatch,

    #[error("token audience does not match")]
    AudienceMismatch,

    #[error("token has expired")]
    Expired,

    #[error("token is not valid yet")]
    NotYetValid,
}

impl TokenError {
    /// Stable identifier for logs and metrics.
    pub fn code(&self) -> &'static str {
        match self {
            TokenError::Malformed => "malformed",
            TokenError::BadSignature => "bad_signature",
            TokenError::IssuerMismatch => "issuer_mismatch",
            TokenError::AudienceMismatch => "audience_mismatch",
            TokenError::Expired => "expired",
            TokenError::NotYetValid => "not_yet_valid",
        }
    }
}

/// Errors resolving key material from configuration.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("environment variable '{0}' holding the signing secret is not set")]
    MissingEnv(String),

    #[error("signing secret is empty")]
    EmptySecret,

    #[error("failed to read public key {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("public key {path:?} is not a valid PEM key for {algorithm:?}: {source}")]
    Pem {
        path: PathBuf,
        algorithm: Algorithm,
        #[source]
        source: jsonwebtoken::errors::Error,
    },

    #[error("{kind} keys cannot verify {algorithm:?} tokens")]
    AlgorithmMismatch {
        kind: &'static str,
        algorithm: Algorithm,
    },
}

/// Rules a token must satisfy. Every check is mandatory.
#[derive(Clone)]
pub struct ValidationRules {
    pub issuer: String,
    pub audience: String,
    pub algorithm: Algorithm,
    /// Seconds added on both sides of the `nbf`..`exp` window.
    pub clock_skew: u64,
    key: DecodingKey,
}

impl std::fmt::Debug for ValidationRules {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationRules")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("algorithm", &self.algorithm)
            .field("clock_skew", &self.clock_skew)
            .finish_non_exhaustive()
    }
}

impl ValidationRules {
    /// Rules with zero clock skew.
    pub fn new(
        issuer: impl Into<String>,
        audience: impl Into<String>,
        algorithm: Algorithm,
        key: DecodingKey,
    ) -> Self {
        Self {
            issuer: issuer.into(),
            audience: audience.into(),
            algorithm,
            clock_skew: 0,
            key,
        }
    }

    pub fn with_clock_skew(mut self, secs: u64) -> Self {
        self.clock_skew = secs;
        self
    }

    /// Build rules from configuration, resolving the key once.
    pub fn from_config(config: &JwtConfig) -> Result<Self, KeyError> {
        let key = decoding_key(&config.key, config.algorithm)?;
        Ok(Self::new(
            config.issuer.clone(),
            config.audience.clone(),
            config.algorithm,
            key,
        )
        .with_clock_skew(config.clock_skew_secs))
    }
}

fn decoding_key(config: &KeyConfig, algorithm: Algorithm) -> Result<DecodingKey, KeyError> {
    let hmac = matches!(
        algorithm,
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
    );

    match config {
        KeyConfig::Secret { value } => {
            if !hmac {
                return Err(KeyError::AlgorithmMismatch {
                    kind: "shared secret",
                    algorithm,
                });
            }
            secret_key(value)
        }
        KeyConfig::SecretEnv { var } => {
            if !hmac {
                return Err(KeyError::AlgorithmMismatch {
                    kind: "shared secret",
                    algorithm,
                });
            }
            let value = std::env::var(var).map_err(|_| KeyError::MissingEnv(var.clone()))?;
            secret_key(&value)
        }
        KeyConfig::PublicKeyPem { path } => {
            let pem = fs::read(path).map_err(|source| KeyError::Io {
                path: path.clone(),
                source,
            })?;
            let key = match algorithm {
                Algorithm::RS256
                | Algorithm::RS384
                | Algorithm::RS512
                | Algorithm::PS256
                | Algorithm::PS384
                | Algorithm::PS512 => DecodingKey::from_rsa_pem(&pem),
                Algorithm::ES256 | Algorithm::ES384 => DecodingKey::from_ec_pem(&pem),
                Algorithm::EdDSA => DecodingKey::from_ed_pem(&pem),
                _ => {
                    return Err(KeyError::AlgorithmMismatch {
                        kind: "public",
                        algorithm,
                    })
                }
            };
            key.map_err(|source| KeyError::Pem {
                path: path.clone(),
                algorithm,
                source,
            })
        }
    }
}

fn secret_key(value: &str) -> Result<DecodingKey, KeyError> {
    if value.is_empty() {
        return Err(KeyError::EmptySecret);
    }
    Ok(DecodingKey::from_secret(value.as_bytes()))
}

/// A successfully validated token.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidToken {
    pub claims: ClaimsSet,
    /// `exp` in unix seconds, usable as a cache TTL.
    pub expires_at: u64,
}

pub type ValidationResult = Result<ValidToken, TokenError>;

/// Stateless validator for compact JWS bearer tokens.
#[derive(Debug, Clone)]
pub struct TokenValidator {
    rules: ValidationRules,
    signature: Validation,
}

impl TokenValidator {
    pub fn new(rules: ValidationRules) -> Self {
        // jsonwebtoken only verifies the signature here; claim checks run in
        // `check_claims` so their order and skew semantics stay explicit.
        let mut signature = Validation::new(rules.algorithm);
        signature.validate_exp = false;
        signature.validate_nbf = false;
        signature.validate_aud = false;
        signature.required_spec_claims.clear();
        signature.leeway = 0;

        Self { rules, signature }
    }

    pub fn rules(&self) -> &ValidationRules {
        &self.rules
    }

    /// Validate against the system clock.
    pub fn validate(&self, token: &str) -> ValidationResult {
        self.validate_at(token, unix_now())
    }

    /// Validate as if the current time were `now` (unix seconds).
    pub fn validate_at(&self, token: &str, now: u64) -> ValidationResult {
        decode_structure(token)?;

        let data = jsonwebtoken::decode::<Map<String, Value>>(token, &self.rules.key, &self.signature)
            .map_err(signature_error)?;

        let claims = ClaimsSet::new(BEARER_SCHEME, data.claims);
        let expires_at = self.check_claims(&claims, now)?;
        Ok(ValidToken { claims, expires_at })
    }

    fn check_claims(&self, claims: &ClaimsSet, now: u64) -> Result<u64, TokenError> {
        if claims.issuer() != Some(self.rules.issuer.as_str()) {
            return Err(TokenError::IssuerMismatch);
        }

        if !claims.audiences().contains(&self.rules.audience.as_str()) {
            return Err(TokenError::AudienceMismatch);
        }

        let skew = self.rules.clock_skew;
        let exp = match claims.timestamp("exp") {
            Some(Some(exp)) => exp,
            _ => return Err(TokenError::Malformed),
        };
        if now > exp.saturating_add(skew) {
            return Err(TokenError::Expired);
        }

        match claims.timestamp("nbf") {
            None => {}
            Some(None) => return Err(TokenError::Malformed),
            Some(Some(nbf)) => {
                if now < nbf.saturating_sub(skew) {
                    return Err(TokenError::NotYetValid);
                }
            }
        }

        Ok(exp)
    }
}

/// Check the compact serialization without trusting anything in it.
fn decode_structure(token: &str) -> Result<(), TokenError> {
    let mut parts = token.split('.');
    let (Some(header), Some(payload), Some(signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(TokenError::Malformed);
    };
    if header.is_empty() || payload.is_empty() || signature.is_empty() {
        return Err(TokenError::Malformed);
    }

    for segment in [header, payload] {
        let bytes = URL_SAFE_NO_PAD
            .decode(segment)
            .map_err(|_| TokenError::Malformed)?;
        serde_json::from_slice::<Map<String, Value>>(&bytes).map_err(|_| TokenError::Malformed)?;
    }
    Ok(())
}

fn signature_error(err: jsonwebtoken::errors::Error) -> TokenError {
    match err.kind() {
        ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
            TokenError::Malformed
        }
        _ => TokenError::BadSignature,
    }
}

/// Redacted form of a token, safe for production logs.
pub fn mask_token(token: &str) -> String {
    let len = token.chars().count();
    if len <= 16 {
        return format!("[redacted {} chars]", len);
    }
    let prefix: String = token.chars().take(8).collect();
    format!("{}...[redacted {} chars]", prefix, len)
}

/// Seconds since the unix epoch.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
