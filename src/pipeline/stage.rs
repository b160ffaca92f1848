//! Pipeline stages.

use std::fmt;

use thiserror::Error;

/// Where a request is in its lifecycle.
///
/// Declaration order is the only allowed direction of travel; every terminal
/// stage sorts after every working stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Received,
    Authenticating,
    Authorizing,
    Routing,
    Forwarding,
    Responded,
    RejectedUnauthenticated,
    RejectedForbidden,
    RejectedNotFound,
    RejectedBadGateway,
}

impl Stage {
    pub fn is_terminal(self) -> bool {
        self >= Stage::Responded
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Received => "received",
            Stage::Authenticating => "authenticating",
            Stage::Authorizing => "authorizing",
            Stage::Routing => "routing",
            Stage::Forwarding => "forwarding",
            Stage::Responded => "responded",
            Stage::RejectedUnauthenticated => "rejected_unauthenticated",
            Stage::RejectedForbidden => "rejected_forbidden",
            Stage::RejectedNotFound => "rejected_not_found",
            Stage::RejectedBadGateway => "rejected_bad_gateway",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal stage transition {from} -> {to}")]
pub struct TransitionError {
    pub from: Stage,
    pub to: Stage,
}

/// Stages visited by one request, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageTrace {
    visited: Vec<Stage>,
}

impl Default for StageTrace {
    fn default() -> Self {
        Self::new()
    }
}

impl StageTrace {
    pub fn new() -> Self {
        Self {
            visited: vec![Stage::Received],
        }
    }

    pub fn current(&self) -> Stage {
        self.visited.last().copied().unwrap_or(Stage::Received)
    }

    /// Move forward. Stages may be skipped, never revisited, and nothing
    /// follows a terminal stage.
    pub fn advance(&mut self, to: Stage) -> Result<(), TransitionError> {
        let from = self.current();
        if from.is_terminal() || to <= from {
            return Err(TransitionError { from, to });
        }
        self.visited.push(to);
        Ok(())
    }

    pub fn visited(&self) -> &[Stage] {
        &self.visited
    }

    pub fn reached(&self, stage: Stage) -> bool {
        self.visited.contains(&stage)
    }
}
