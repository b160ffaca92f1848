//! Per-route target pool.
//!
//! # Responsibilities
//! - Own the targets of one route
//! - Apply the route's selection strategy
//! - Hand out guards that track requests in flight

use std::sync::Arc;

use crate::config::schema::{LoadBalancing, TargetConfig};
use crate::load_balancer::{
    for_strategy,
    target::{Target, TargetGuard},
    LoadBalancer,
};

/// Targets of one route plus the strategy choosing among them.
#[derive(Debug)]
pub struct TargetPool {
    targets: Vec<Arc<Target>>,
    balancer: Box<dyn LoadBalancer>,
}

impl TargetPool {
    /// A single-target route needs no strategy; it always picks that target.
    pub fn new(
        configs: &[TargetConfig],
        strategy: Option<LoadBalancing>,
    ) -> Result<Self, url::ParseError> {
        let targets = configs
            .iter()
            .map(|c| Target::from_config(c).map(Arc::new))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            targets,
            balancer: for_strategy(strategy.unwrap_or(LoadBalancing::RoundRobin)),
        })
    }

    /// Select a target and reserve a slot on it.
    ///
    /// `None` when every target is at its concurrency limit.
    pub fn acquire(&self) -> Option<TargetGuard> {
        // Selection and reservation race with other requests; retry selection
        // a bounded number of times when the chosen target fills up meanwhile.
        for _ in 0..self.targets.len().max(1) {
            let target = self.balancer.next_target(&self.targets)?;
            if let Some(guard) = target.try_acquire() {
                return Some(guard);
            }
        }
        tracing::debug!(targets = self.targets.len(), "All targets saturated");
        None
    }

    pub fn targets(&self) -> &[Arc<Target>] {
        &self.targets
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(port: u16, max: usize) -> TargetConfig {
        TargetConfig {
            scheme: "http".into(),
            host: "127.0.0.1".into(),
            port,
            max_connections: max,
        }
    }

    #[test]
    fn test_acquire_until_saturated() {
        let pool = TargetPool::new(&[config(9000, 1), config(9001, 1)], Some(LoadBalancing::RoundRobin))
            .unwrap();
        let a = pool.acquire().unwrap();
        let b = pool.acquire().unwrap();
        assert_ne!(a.port, b.port);
        assert!(pool.acquire().is_none());

        drop(a);
        assert!(pool.acquire().is_some());
    }

    #[test]
    fn test_single_target_without_strategy() {
        let pool = TargetPool::new(&[config(9000, 5)], None).unwrap();
        assert_eq!(pool.len(), 1);
        for _ in 0..3 {
            assert_eq!(pool.acquire().unwrap().port, 9000);
        }
    }
}
