//! Least-connections selection.

use std::sync::Arc;

use crate::load_balancer::{target::Target, LoadBalancer};

/// Picks the target with the fewest requests in flight.
/// Ties go to the first target in declaration order.
#[derive(Debug, Default)]
pub struct LeastConnections;

impl LeastConnections {
    pub fn new() -> Self {
        Self
    }
}

impl LoadBalancer for LeastConnections {
    fn next_target(&self, targets: &[Arc<Target>]) -> Option<Arc<Target>> {
        targets
            .iter()
            .filter(|t| !t.is_saturated())
            .min_by_key(|t| t.active_connections())
            .cloned()
    }
}
