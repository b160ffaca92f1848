//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Route resolved → its TargetPool
//!     → apply the route's strategy:
//!         - round_robin.rs (rotate through targets)
//!         - least_conn.rs (fewest requests in flight)
//!         - random.rs (uniform choice)
//!     → target.rs (reserve a slot, RAII guard)
//!     → guard or Saturated
//! ```
//!
//! # Design Decisions
//! - Strategies are stateless apart from their own counters; targets track load
//! - Saturated targets are never selected
//! - One pool per route, rebuilt with every configuration snapshot

pub mod least_conn;
pub mod pool;
pub mod random;
pub mod round_robin;
pub mod target;

use std::fmt::Debug;
use std::sync::Arc;

use crate::config::schema::LoadBalancing;

pub use pool::TargetPool;
pub use target::{Target, TargetGuard};

/// A target selection strategy.
pub trait LoadBalancer: Send + Sync + Debug {
    /// Choose a target with spare capacity, if any.
    fn next_target(&self, targets: &[Arc<Target>]) -> Option<Arc<Target>>;
}

/// Strategy implementation for a configured name.
pub fn for_strategy(strategy: LoadBalancing) -> Box<dyn LoadBalancer> {
    match strategy {
        LoadBalancing::RoundRobin => Box::new(round_robin::RoundRobin::new()),
        LoadBalancing::LeastConnections => Box::new(least_conn::LeastConnections::new()),
        LoadBalancing::Random => Box::new(random::Random::new()),
    }
}
