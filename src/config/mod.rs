use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use hyper::header::HeaderName;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::core::router::{FilterKind, RouteTable};
use crate::error::ConfigError;
use crate::middleware::auth::models::JwtAlgorithm;
use crate::models::Target;

/// Environment variable holding the token verification secret
pub const SECRET_ENV: &str = "GATEWAY_JWT_SECRET";

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Upstream request timeout in seconds
    pub request_timeout: u64,

    /// Largest request body accepted, in bytes
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            request_timeout: 30,
            max_body_size: 2 * 1024 * 1024,
        }
    }
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Shared secret used to verify token signatures
    pub secret_key: Option<String>,

    /// Signature algorithm tokens must be signed with
    pub algorithm: JwtAlgorithm,

    /// Clock skew tolerated on `exp` and `nbf`, in seconds
    pub leeway_seconds: u64,

    /// Expected `iss` claim, checked only when set
    pub issuer: Option<String>,

    /// Expected `aud` claim, checked only when set
    pub audience: Option<String>,

    /// Path substrings that bypass authentication
    pub excluded_paths: Vec<String>,

    /// Header carrying the verified identity upstream
    pub identity_header: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret_key: None,
            algorithm: JwtAlgorithm::default(),
            leeway_seconds: 0,
            issuer: None,
            audience: None,
            excluded_paths: vec![
                "/signup".to_string(),
                "/login".to_string(),
                "/refreshtoken".to_string(),
            ],
            identity_header: "username".to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level, overridden by `RUST_LOG` when set
    pub level: String,

    /// Whether to log in JSON format
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Route definition in configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteDefinition {
    /// Unique route identifier
    pub id: String,

    /// Route path pattern, e.g. `/dib/**`
    pub path: String,

    /// `http://host:port/` or `lb://SERVICE-NAME`
    pub target: Target,

    /// Filters applied before forwarding, in order
    #[serde(default)]
    pub filters: Vec<FilterKind>,
}

impl RouteDefinition {
    pub fn new(id: &str, path: &str, target: Target, filters: Vec<FilterKind>) -> Self {
        Self {
            id: id.to_string(),
            path: path.to_string(),
            target,
            filters,
        }
    }
}

/// Main gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Authentication configuration
    pub auth: AuthConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Routes, evaluated in the order given
    pub routes: Vec<RouteDefinition>,

    /// Instance base URLs per logical service name
    pub services: BTreeMap<String, Vec<String>>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            auth: AuthConfig::default(),
            logging: LoggingConfig::default(),
            routes: vec![
                RouteDefinition::new(
                    "AUTH-SERVICE",
                    "/authenticate/**",
                    Target::Static(hyper::Uri::from_static("http://localhost:8081/")),
                    vec![FilterKind::Authentication],
                ),
                RouteDefinition::new(
                    "DEV-ISSUE-BOOK",
                    "/dib/**",
                    Target::Static(hyper::Uri::from_static("http://localhost:8082/")),
                    vec![FilterKind::Authentication],
                ),
            ],
            services: BTreeMap::new(),
        }
    }
}

impl GatewayConfig {
    /// Parse a configuration from TOML text without semantic checks
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Parse a configuration from TOML text and validate it
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config = Self::parse_toml(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from the environment.
    ///
    /// `GATEWAY_JWT_SECRET` replaces `auth.secret_key` so the secret can stay
    /// out of the config file.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(secret) = std::env::var(SECRET_ENV) {
            if !secret.is_empty() {
                self.auth.secret_key = Some(secret);
            }
        }
    }

    /// Load and validate configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadError(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Semantic checks; reports every problem, not just the first
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();

        if let Err(e) = RouteTable::from_definitions(&self.routes) {
            problems.push(e.to_string());
        }

        let needs_auth = self
            .routes
            .iter()
            .any(|r| r.filters.contains(&FilterKind::Authentication));
        let has_secret = self
            .auth
            .secret_key
            .as_deref()
            .map_or(false, |s| !s.is_empty());
        if needs_auth && !has_secret {
            problems.push("auth.secret_key is required when a route uses authentication".to_string());
        }

        if self.server.max_body_size == 0 {
            problems.push("server.max_body_size must be greater than zero".to_string());
        }

        if self.auth.excluded_paths.iter().any(|p| p.is_empty()) {
            problems.push("auth.excluded_paths must not contain empty entries".to_string());
        }

        if HeaderName::from_bytes(self.auth.identity_header.as_bytes()).is_err() {
            problems.push(format!(
                "auth.identity_header '{}' is not a valid header name",
                self.auth.identity_header
            ));
        }

        for route in &self.routes {
            if let Target::Service(name) = &route.target {
                if !self.services.contains_key(name) {
                    problems.push(format!(
                        "route '{}' targets unknown service '{}'",
                        route.id, name
                    ));
                }
            }
        }

        for (name, instances) in &self.services {
            if instances.is_empty() {
                problems.push(format!("service '{}' has no instances", name));
            }
            for instance in instances {
                match instance.parse::<Target>() {
                    Ok(Target::Static(_)) => {}
                    _ => problems.push(format!(
                        "service '{}' instance '{}' must be an absolute http(s) URI",
                        name, instance
                    )),
                }
            }
        }

        if !matches!(
            self.logging.level.as_str(),
            "trace" | "debug" | "info" | "warn" | "error"
        ) {
            problems.push(format!("logging.level '{}' is not a log level", self.logging.level));
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::ValidationError(problems.join("; ")))
        }
    }
}

/// Configuration manager trait
#[async_trait]
pub trait ConfigManager: Send + Sync {
    /// Get the current configuration
    async fn get_config(&self) -> GatewayConfig;

    /// Load, validate and install configuration from a file
    async fn load_from_file<P: AsRef<Path> + Send>(&self, path: P) -> Result<(), ConfigError>;

    /// Validate and replace the whole configuration
    async fn update_config(&self, config: GatewayConfig) -> Result<(), ConfigError>;
}

/// Basic implementation of the ConfigManager
pub struct BasicConfigManager {
    config: Arc<RwLock<GatewayConfig>>,
}

impl BasicConfigManager {
    /// Create a new BasicConfigManager with default configuration
    pub fn new() -> Self {
        Self::with_config(GatewayConfig::default())
    }

    pub fn with_config(config: GatewayConfig) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
        }
    }
}

impl Default for BasicConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConfigManager for BasicConfigManager {
    async fn get_config(&self) -> GatewayConfig {
        self.config.read().await.clone()
    }

    async fn load_from_file<P: AsRef<Path> + Send>(&self, path: P) -> Result<(), ConfigError> {
        let config = GatewayConfig::load_from_file(path)?;
        *self.config.write().await = config;
        Ok(())
    }

    async fn update_config(&self, config: GatewayConfig) -> Result<(), ConfigError> {
        config.validate()?;
        *self.config.write().await = config;
        Ok(())
    }
}
