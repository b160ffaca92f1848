//! Downstream target.
//!
//! # Responsibilities
//! - Represent a single downstream host:port
//! - Track requests in flight (for least-connections selection)
//! - Enforce the per-target concurrency limit

use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use url::Url;

use crate::config::schema::TargetConfig;

/// A single downstream target.
#[derive(Debug)]
pub struct Target {
    pub scheme: String,
    pub host: String,
    pub port: u16,
    /// `scheme://host:port/`, used as the base of outbound URIs.
    pub base_url: Url,
    /// Maximum concurrent requests allowed.
    pub max_connections: usize,
    active_connections: AtomicUsize,
}

impl Target {
    /// Build a target, rejecting hosts that do not form a valid URL.
    pub fn new(
        scheme: &str,
        host: &str,
        port: u16,
        max_connections: usize,
    ) -> Result<Self, url::ParseError> {
        let scheme = scheme.to_ascii_lowercase();
        let host_part = if host.contains(':') && !host.starts_with('[') {
            format!("[{}]", host)
        } else {
            host.to_string()
        };
        let base_url = Url::parse(&format!("{}://{}:{}/", scheme, host_part, port))?;
        Ok(Self {
            scheme,
            host: host.to_string(),
            port,
            base_url,
            max_connections,
            active_connections: AtomicUsize::new(0),
        })
    }

    pub fn from_config(config: &TargetConfig) -> Result<Self, url::ParseError> {
        Self::new(&config.scheme, &config.host, config.port, config.max_connections)
    }

    /// `host:port` as sent in the `Host` header.
    pub fn authority(&self) -> String {
        match self.base_url.host_str() {
            Some(host) => format!("{}:{}", host, self.port),
            None => format!("{}:{}", self.host, self.port),
        }
    }

    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }

    pub fn is_saturated(&self) -> bool {
        self.active_connections() >= self.max_connections
    }

    /// Reserve a slot. `None` when the target is at its limit.
    pub fn try_acquire(self: &Arc<Self>) -> Option<TargetGuard> {
        let mut prev = self.active_connections.load(Ordering::Relaxed);
        loop {
            if prev >= self.max_connections {
                return None;
            }
            match self.active_connections.compare_exchange_weak(
                prev,
                prev + 1,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(x) => prev = x,
            }
        }
        Some(TargetGuard {
            target: self.clone(),
        })
    }

    fn release(&self) {
        self.active_connections.fetch_sub(1, Ordering::AcqRel);
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.authority())
    }
}

/// Releases the reserved slot on drop.
#[derive(Debug)]
pub struct TargetGuard {
    target: Arc<Target>,
}

impl TargetGuard {
    pub fn target(&self) -> &Arc<Target> {
        &self.target
    }
}

impl Deref for TargetGuard {
    type Target = Target;
    fn deref(&self) -> &Self::Target {
        &self.target
    }
}

impl Drop for TargetGuard {
    fn drop(&mut self) {
        self.target.release();
    }
}
