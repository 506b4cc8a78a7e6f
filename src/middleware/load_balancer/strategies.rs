use std::sync::atomic::{AtomicUsize, Ordering};

use hyper::Uri;

/// Picks one instance of a service for a request
pub trait LoadBalanceStrategy: Send + Sync {
    /// Get the name of this strategy
    fn name(&self) -> &str;

    /// Select an instance, `None` when there is nothing to choose from
    fn select<'a>(&self, instances: &'a [Uri]) -> Option<&'a Uri>;
}

/// Round Robin load balancing strategy
#[derive(Debug, Default)]
pub struct RoundRobinStrategy {
    /// Current index for round robin selection
    current: AtomicUsize,
}

impl RoundRobinStrategy {
    /// Create a new RoundRobinStrategy
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalanceStrategy for RoundRobinStrategy {
    fn name(&self) -> &str {
        "round_robin"
    }

    fn select<'a>(&self, instances: &'a [Uri]) -> Option<&'a Uri> {
        if instances.is_empty() {
            return None;
        }

        let current = self.current.fetch_add(1, Ordering::Relaxed);
        instances.get(current % instances.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instances() -> Vec<Uri> {
        vec![
            Uri::from_static("http://localhost:8081/"),
            Uri::from_static("http://localhost:8082/"),
            Uri::from_static("http://localhost:8083/"),
        ]
    }

    #[test]
    fn test_round_robin_wraps_around() {
        let strategy = RoundRobinStrategy::new();
        let instances = instances();

        let picked: Vec<_> = (0..4)
            .map(|_| strategy.select(&instances).unwrap().port_u16().unwrap())
            .collect();

        assert_eq!(picked, vec![8081, 8082, 8083, 8081]);
        assert_eq!(strategy.name(), "round_robin");
    }

    #[test]
    fn test_round_robin_empty() {
        assert!(RoundRobinStrategy::new().select(&[]).is_none());
    }
}
