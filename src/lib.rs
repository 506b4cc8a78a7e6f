// Edge Gateway Library

pub mod config;
pub mod core;
pub mod error;
pub mod middleware;
pub mod models;
pub mod utils;

// Re-export commonly used types
pub use crate::config::{AuthConfig, BasicConfigManager, ConfigManager, GatewayConfig, RouteDefinition};
pub use crate::core::{
    forwarder::{Forwarder, HttpForwarder},
    gateway::{ApiGateway, Gateway},
    pipeline::{Decision, GatewayPipeline},
    request::GatewayRequest,
    response::GatewayResponse,
    router::{Access, FilterKind, Route, RouteTable},
};
pub use crate::error::{AuthError, ConfigError, ForwardError, GatewayError};
pub use crate::middleware::auth::{jwt::TokenValidator, models::Claims, AuthenticationFilter, ExclusionSet};
pub use crate::middleware::load_balancer::{ServiceDirectory, TargetResolver};
pub use crate::middleware::{FilterOutcome, GatewayFilter};
pub use crate::models::Target;
