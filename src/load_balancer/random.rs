//! Uniform random selection.

use std::sync::Arc;

use crate::load_balancer::{target::Target, LoadBalancer};

/// Picks uniformly among targets that still have capacity.
#[derive(Debug, Default)]
pub struct Random;

impl Random {
    pub fn new() -> Self {
        Self
    }
}

impl LoadBalancer for Random {
    fn next_target(&self, targets: &[Arc<Target>]) -> Option<Arc<Target>> {
        let available: Vec<&Arc<Target>> = targets.iter().filter(|t| !t.is_saturated()).collect();
        if available.is_empty() {
            return None;
        }
        Some(available[fastrand::usize(..available.len())].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_only_picks_available() {
        let lb = Random::new();
        let full = Arc::new(Target::new("http", "127.0.0.1", 8080, 1).unwrap());
        let open = Arc::new(Target::new("http", "127.0.0.1", 8081, 1).unwrap());
        let _held = full.try_acquire().unwrap();
        let targets = vec![full, open];

        for _ in 0..20 {
            assert_eq!(lb.next_target(&targets).unwrap().port, 8081);
        }
        assert!(lb.next_target(&[]).is_none());
    }
}
