//! Verified claims.

use serde_json::{Map, Value};

/// Claims of a verified token, tagged with the scheme that produced them.
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimsSet {
    scheme: String,
    claims: Map<String, Value>,
}

impl ClaimsSet {
    pub fn new(scheme: impl Into<String>, claims: Map<String, Value>) -> Self {
        Self {
            scheme: scheme.into(),
            claims,
        }
    }

    /// Authentication scheme, e.g. `Bearer`.
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn issuer(&self) -> Option<&str> {
        self.claims.get("iss").and_then(Value::as_str)
    }

    pub fn subject(&self) -> Option<&str> {
        self.claims.get("sub").and_then(Value::as_str)
    }

    /// The `aud` claim, which may be a single string or a list.
    pub fn audiences(&self) -> Vec<&str> {
        self.values("aud")
    }

    /// Raw claim value.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }

    /// String values of a claim: one for a string, each string entry for a list.
    pub fn values(&self, name: &str) -> Vec<&str> {
        match self.claims.get(name) {
            Some(Value::String(s)) => vec![s.as_str()],
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        }
    }

    /// NumericDate claim in whole seconds.
    ///
    /// `None` when absent, `Some(None)` when present but not a number.
    pub fn timestamp(&self, name: &str) -> Option<Option<u64>> {
        self.claims.get(name).map(numeric_date)
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }
}

fn numeric_date(value: &Value) -> Option<u64> {
    if let Some(secs) = value.as_u64() {
        return Some(secs);
    }
    if let Some(secs) = value.as_i64() {
        return Some(secs.max(0) as u64);
    }
    value
        .as_f64()
        .filter(|f| f.is_finite())
        .map(|f| f.max(0.0) as u64)
}
