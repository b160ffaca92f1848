//! Authorization policies.
//!
//! A policy names the authentication schemes it accepts and, optionally, a
//! list of claim predicates that must all hold. Decisions are pure functions
//! of the policy and the claims; a missing policy is a deny, never an allow.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::claims::ClaimsSet;
use crate::config::schema::PolicyConfig;

/// A condition on one claim.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum ClaimPredicate {
    /// The claim exists, whatever its value.
    Present { claim: String },
    /// The claim is a string equal to `value`.
    Equals { claim: String, value: String },
    /// The claim is `value`, or a list containing it.
    Contains { claim: String, value: String },
    /// Some string value of the claim is one of `values`.
    OneOf { claim: String, values: Vec<String> },
}

impl ClaimPredicate {
    pub fn holds(&self, claims: &ClaimsSet) -> bool {
        match self {
            ClaimPredicate::Present { claim } => claims.get(claim).is_some(),
            ClaimPredicate::Equals { claim, value } => claims
                .get(claim)
                .and_then(|v| v.as_str())
                .is_some_and(|v| v == value),
            ClaimPredicate::Contains { claim, value } => {
                claims.values(claim).contains(&value.as_str())
            }
            ClaimPredicate::OneOf { claim, values } => claims
                .values(claim)
                .iter()
                .any(|v| values.iter().any(|allowed| allowed == v)),
        }
    }
}

impl fmt::Display for ClaimPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClaimPredicate::Present { claim } => write!(f, "{} is present", claim),
            ClaimPredicate::Equals { claim, value } => write!(f, "{} == {:?}", claim, value),
            ClaimPredicate::Contains { claim, value } => write!(f, "{} contains {:?}", claim, value),
            ClaimPredicate::OneOf { claim, values } => write!(f, "{} in {:?}", claim, values),
        }
    }
}

/// Why a request was not authorized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DenyReason {
    #[error("scheme '{scheme}' is not accepted by policy '{policy}'")]
    SchemeNotAccepted { policy: String, scheme: String },

    #[error("policy '{policy}' requires {predicate}")]
    PredicateFailed { policy: String, predicate: String },

    #[error("policy '{0}' is not defined")]
    UnknownPolicy(String),
}

/// Outcome of an authorization check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn outcome(&self) -> &'static str {
        match self {
            Decision::Allow => "allow",
            Decision::Deny(_) => "deny",
        }
    }
}

/// A named, compiled policy.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthorizationPolicy {
    name: String,
    schemes: Vec<String>,
    predicates: Vec<ClaimPredicate>,
}

impl AuthorizationPolicy {
    pub fn new(name: impl Into<String>, schemes: Vec<String>) -> Self {
        Self {
            name: name.into(),
            schemes,
            predicates: Vec::new(),
        }
    }

    pub fn with_predicate(mut self, predicate: ClaimPredicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn from_config(config: &PolicyConfig) -> Self {
        Self {
            name: config.name.clone(),
            schemes: config.schemes.clone(),
            predicates: config.require.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Allow when the claims come from an accepted scheme and every
    /// predicate holds. The first failure is reported.
    pub fn authorize(&self, claims: &ClaimsSet) -> Decision {
        let accepted = self
            .schemes
            .iter()
            .any(|s| s.eq_ignore_ascii_case(claims.scheme()));
        if !accepted {
            return Decision::Deny(DenyReason::SchemeNotAccepted {
                policy: self.name.clone(),
                scheme: claims.scheme().to_string(),
            });
        }

        match self.predicates.iter().find(|p| !p.holds(claims)) {
            Some(failed) => Decision::Deny(DenyReason::PredicateFailed {
                policy: self.name.clone(),
                predicate: failed.to_string(),
            }),
            None => Decision::Allow,
        }
    }
}

/// Policies by name.
#[derive(Debug, Clone, Default)]
pub struct PolicySet {
    policies: HashMap<String, Arc<AuthorizationPolicy>>,
}

impl PolicySet {
    pub fn from_configs(configs: &[PolicyConfig]) -> Self {
        let policies = configs
            .iter()
            .map(|c| (c.name.clone(), Arc::new(AuthorizationPolicy::from_config(c))))
            .collect();
        Self { policies }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<AuthorizationPolicy>> {
        self.policies.get(name)
    }

    /// Evaluate the named policy. Unknown names deny.
    pub fn authorize(&self, name: &str, claims: &ClaimsSet) -> Decision {
        match self.get(name) {
            Some(policy) => policy.authorize(claims),
            None => Decision::Deny(DenyReason::UnknownPolicy(name.to_string())),
        }
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}
