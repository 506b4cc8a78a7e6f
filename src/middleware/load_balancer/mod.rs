use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use hyper::Uri;

pub mod strategies;

use crate::error::{ConfigError, ForwardError};
use crate::middleware::load_balancer::strategies::{LoadBalanceStrategy, RoundRobinStrategy};
use crate::models::Target;

/// Turns a route target into a concrete upstream base URI
pub trait TargetResolver: Send + Sync {
    fn resolve(&self, target: &Target) -> Result<Uri, ForwardError>;
}

/// Instances registered under one logical service name
struct ServiceEntry {
    instances: Vec<Uri>,
    strategy: Box<dyn LoadBalanceStrategy>,
}

/// Static service directory built from configuration.
///
/// `Static` targets resolve to themselves; `Service` targets are looked up by
/// name and balanced round robin across the configured instances. The
/// directory is read-only after construction.
pub struct ServiceDirectory {
    services: HashMap<String, ServiceEntry>,
}

impl ServiceDirectory {
    /// Create an empty directory; only static targets resolve
    pub fn new() -> Self {
        Self {
            services: HashMap::new(),
        }
    }

    /// Register a service with its instance base URIs
    pub fn with_service(mut self, name: impl Into<String>, instances: Vec<Uri>) -> Self {
        self.services.insert(
            name.into(),
            ServiceEntry {
                instances,
                strategy: Box::new(RoundRobinStrategy::new()),
            },
        );
        self
    }

    /// Build a directory from the `services` configuration table
    pub fn from_config(services: &BTreeMap<String, Vec<String>>) -> Result<Self, ConfigError> {
        let mut directory = Self::new();

        for (name, urls) in services {
            let instances = urls
                .iter()
                .map(|url| {
                    Uri::from_str(url).map_err(|e| {
                        ConfigError::ValidationError(format!(
                            "Invalid instance '{}' for service '{}': {}",
                            url, name, e
                        ))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;

            directory = directory.with_service(name.clone(), instances);
        }

        Ok(directory)
    }

    /// Registered service names
    pub fn service_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.services.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for ServiceDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl TargetResolver for ServiceDirectory {
    fn resolve(&self, target: &Target) -> Result<Uri, ForwardError> {
        match target {
            Target::Static(uri) => Ok(uri.clone()),
            Target::Service(name) => {
                let entry = self
                    .services
                    .get(name)
                    .ok_or_else(|| ForwardError::UnknownService(name.clone()))?;

                let instance = entry
                    .strategy
                    .select(&entry.instances)
                    .ok_or_else(|| ForwardError::NoInstanceAvailable(name.clone()))?;

                tracing::debug!(
                    service = %name,
                    instance = %instance,
                    strategy = entry.strategy.name(),
                    "Resolved service instance"
                );

                Ok(instance.clone())
            }
        }
    }
}
