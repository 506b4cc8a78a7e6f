use std::collections::HashSet;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::RouteDefinition;
use crate::error::{ConfigError, GatewayError};
use crate::models::Target;

/// Filter that can be attached to a route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    /// Bearer token authentication with identity injection
    Authentication,
}

/// What a caller needs to reach a route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    RequiresAuth,
    Public,
}

/// Path pattern for route matching
///
/// Segments are literal, `*` or `:name` (exactly one segment) or a final
/// `**` (any remainder, including nothing). Parameter names are documentation
/// only; nothing is captured.
#[derive(Debug, Clone)]
struct PathPattern {
    /// Original path pattern
    pattern: String,

    /// Compiled regex for matching
    regex: Regex,
}

impl PathPattern {
    fn new(path: &str) -> Result<Self, ConfigError> {
        if !path.starts_with('/') {
            return Err(ConfigError::ValidationError(format!(
                "Route pattern '{}' must start with '/'",
                path
            )));
        }

        let segments: Vec<&str> = path.split('/').skip(1).collect();
        let last = segments.len().saturating_sub(1);

        let mut regex_pattern = "^".to_string();

        for (i, segment) in segments.iter().enumerate() {
            if *segment == "**" {
                if i != last {
                    return Err(ConfigError::ValidationError(format!(
                        "Route pattern '{}': '**' is only allowed as the last segment",
                        path
                    )));
                }
                // `/dib/**` matches `/dib` itself as well as everything below it
                regex_pattern.push_str("(?:/.*)?");
                continue;
            }

            regex_pattern.push('/');

            if *segment == ":" {
                return Err(ConfigError::ValidationError(format!(
                    "Route pattern '{}' has an unnamed parameter",
                    path
                )));
            }

            if *segment == "*" || segment.starts_with(':') {
                regex_pattern.push_str("[^/]+");
            } else {
                regex_pattern.push_str(&regex::escape(segment));
            }
        }

        regex_pattern.push('$');

        let regex = Regex::new(&regex_pattern).map_err(|e| {
            ConfigError::ValidationError(format!("Invalid route pattern '{}': {}", path, e))
        })?;

        Ok(Self {
            pattern: path.to_string(),
            regex,
        })
    }

    fn matches(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }
}

/// A compiled route: pattern, target and the filters that guard it
#[derive(Debug, Clone)]
pub struct Route {
    id: String,
    pattern: PathPattern,
    target: Target,
    filters: Vec<FilterKind>,
}

impl Route {
    /// Compile a route
    pub fn new(
        id: impl Into<String>,
        path: &str,
        target: Target,
        filters: Vec<FilterKind>,
    ) -> Result<Self, GatewayError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "Route for '{}' has an empty id",
                path
            ))
            .into());
        }

        Ok(Self {
            id,
            pattern: PathPattern::new(path)?,
            target,
            filters,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn path(&self) -> &str {
        &self.pattern.pattern
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Filters in the order they run
    pub fn filters(&self) -> &[FilterKind] {
        &self.filters
    }

    pub fn access(&self) -> Access {
        if self.filters.contains(&FilterKind::Authentication) {
            Access::RequiresAuth
        } else {
            Access::Public
        }
    }

    fn matches(&self, path: &str) -> bool {
        self.pattern.matches(path)
    }
}

impl TryFrom<&RouteDefinition> for Route {
    type Error = GatewayError;

    fn try_from(definition: &RouteDefinition) -> Result<Self, Self::Error> {
        Route::new(
            definition.id.clone(),
            &definition.path,
            definition.target.clone(),
            definition.filters.clone(),
        )
    }
}

/// Ordered, immutable route table.
///
/// Routes are tried in registration order and the first match wins. The table
/// is never mutated once built; a reload builds a new table and swaps it in.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    /// Build a table from compiled routes, rejecting duplicate ids
    pub fn new(routes: Vec<Route>) -> Result<Self, GatewayError> {
        let mut seen = HashSet::new();
        for route in &routes {
            if !seen.insert(route.id.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "Duplicate route id '{}'",
                    route.id
                ))
                .into());
            }
        }

        Ok(Self { routes })
    }

    /// Compile route definitions from configuration, keeping their order
    pub fn from_definitions(definitions: &[RouteDefinition]) -> Result<Self, GatewayError> {
        let routes = definitions
            .iter()
            .map(Route::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(routes)
    }

    /// Resolve a request path to the first matching route
    pub fn resolve(&self, path: &str) -> Result<&Route, GatewayError> {
        for route in &self.routes {
            if route.matches(path) {
                tracing::debug!(
                    route_id = %route.id,
                    pattern = %route.path(),
                    path = %path,
                    "Route matched"
                );
                return Ok(route);
            }
        }

        Err(GatewayError::RouteNotFound(path.to_string()))
    }

    /// All routes in evaluation order
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
