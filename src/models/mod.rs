// Models for the API Gateway

use std::fmt;
use std::str::FromStr;

use hyper::Uri;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ConfigError;

/// URI scheme marking a logical service name instead of an address
pub const SERVICE_SCHEME: &str = "lb://";

/// Where a matched route sends its traffic
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Fixed upstream address, e.g. `http://localhost:8081/`
    Static(Uri),

    /// Logical service name, e.g. `lb://AUTH-SERVICE`, resolved per request
    Service(String),
}

impl Target {
    /// Whether this target needs a service lookup before forwarding
    pub fn is_service(&self) -> bool {
        matches!(self, Target::Service(_))
    }
}

impl FromStr for Target {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        if let Some(name) = s.strip_prefix(SERVICE_SCHEME) {
            let name = name.trim_end_matches('/');
            if name.is_empty() || name.contains('/') {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid service target '{}'",
                    s
                )));
            }
            return Ok(Target::Service(name.to_string()));
        }

        let uri = Uri::from_str(s).map_err(|e| {
            ConfigError::ValidationError(format!("Invalid target URI '{}': {}", s, e))
        })?;

        match (uri.scheme_str(), uri.authority()) {
            (Some("http") | Some("https"), Some(_)) => Ok(Target::Static(uri)),
            _ => Err(ConfigError::ValidationError(format!(
                "Target '{}' must be an absolute http(s) URI or an {} service name",
                s, SERVICE_SCHEME
            ))),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Static(uri) => write!(f, "{}", uri),
            Target::Service(name) => write!(f, "{}{}", SERVICE_SCHEME, name),
        }
    }
}

impl Serialize for Target {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Target {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Target::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_static_target() {
        let target: Target = "http://localhost:8081/".parse().unwrap();
        match target {
            Target::Static(uri) => {
                assert_eq!(uri.host(), Some("localhost"));
                assert_eq!(uri.port_u16(), Some(8081));
            }
            other => panic!("expected static target, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_service_target() {
        let target: Target = "lb://AUTH-SERVICE".parse().unwrap();
        assert_eq!(target, Target::Service("AUTH-SERVICE".to_string()));
        assert!(target.is_service());
        assert_eq!(target.to_string(), "lb://AUTH-SERVICE");
    }

    #[test]
    fn test_reject_relative_and_empty_targets() {
        assert!("/just/a/path".parse::<Target>().is_err());
        assert!("lb://".parse::<Target>().is_err());
        assert!("ftp://host/".parse::<Target>().is_err());
    }
}
