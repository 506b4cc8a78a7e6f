pub mod jwt;
pub mod models;

use std::sync::Arc;

use hyper::header::{HeaderName, AUTHORIZATION};
use hyper::StatusCode;

use crate::config::AuthConfig;
use crate::core::request::GatewayRequest;
use crate::error::{AuthError, ConfigError};
use crate::middleware::auth::jwt::TokenValidator;
use crate::middleware::auth::models::Claims;
use crate::middleware::{FilterOutcome, GatewayFilter};

const BEARER_PREFIX: &str = "Bearer ";

/// Path fragments that bypass authentication.
///
/// An entry matches when it appears anywhere in the request path, so
/// `/login` also exempts `/authenticate/login`.
#[derive(Debug, Clone, Default)]
pub struct ExclusionSet {
    entries: Vec<String>,
}

impl ExclusionSet {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(Into::into)
                .filter(|e: &String| !e.is_empty())
                .collect(),
        }
    }

    /// First entry contained in `path`
    pub fn matching(&self, path: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| path.contains(entry.as_str()))
            .map(String::as_str)
    }

    pub fn is_excluded(&self, path: &str) -> bool {
        self.matching(path).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Bearer token authentication filter.
///
/// Excluded paths pass untouched. Everything else needs a valid token; the
/// verified identity is written to the identity header (`username` by
/// default), replacing whatever the client sent under that name. Every
/// failure is a bare 401.
#[derive(Debug, Clone)]
pub struct AuthenticationFilter {
    validator: Arc<TokenValidator>,
    exclusions: Arc<ExclusionSet>,
    identity_header: HeaderName,
}

impl AuthenticationFilter {
    /// Create a new filter using the default `username` identity header
    pub fn new(validator: Arc<TokenValidator>, exclusions: Arc<ExclusionSet>) -> Self {
        Self {
            validator,
            exclusions,
            identity_header: HeaderName::from_static("username"),
        }
    }

    /// Build the filter and its validator from configuration
    pub fn from_config(config: &AuthConfig) -> Result<Self, ConfigError> {
        let validator = Arc::new(TokenValidator::from_config(config)?);
        let exclusions = Arc::new(ExclusionSet::new(config.excluded_paths.iter().cloned()));
        let identity_header = HeaderName::from_bytes(config.identity_header.as_bytes())
            .map_err(|e| {
                ConfigError::ValidationError(format!(
                    "Invalid identity header '{}': {}",
                    config.identity_header, e
                ))
            })?;

        Ok(Self::new(validator, exclusions).with_identity_header(identity_header))
    }

    pub fn with_identity_header(mut self, header: HeaderName) -> Self {
        self.identity_header = header;
        self
    }

    pub fn exclusions(&self) -> &ExclusionSet {
        &self.exclusions
    }

    /// Extract the raw token from the first Authorization value.
    ///
    /// A value without the `Bearer ` scheme is passed through whole and left
    /// for the validator to reject.
    fn extract_token(request: &GatewayRequest) -> Result<&str, AuthError> {
        let value = request
            .headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::TokenMissing)?;

        let value = value.to_str().map_err(|_| {
            AuthError::TokenMalformed("Authorization header is not valid ASCII".to_string())
        })?;

        Ok(value.strip_prefix(BEARER_PREFIX).unwrap_or(value))
    }

    fn authenticate(&self, request: &mut GatewayRequest) -> Result<Claims, AuthError> {
        let claims = self.validator.validate(Self::extract_token(request)?)?;

        request
            .set_header(self.identity_header.clone(), claims.username())
            .map_err(|_| {
                AuthError::TokenMalformed("identity is not a valid header value".to_string())
            })?;

        Ok(claims)
    }
}

impl GatewayFilter for AuthenticationFilter {
    fn apply(&self, mut request: GatewayRequest) -> FilterOutcome {
        if let Some(entry) = self.exclusions.matching(request.path()) {
            tracing::debug!(
                request_id = %request.request_id,
                path = %request.path(),
                exclusion = %entry,
                "Path excluded from authentication"
            );
            return FilterOutcome::Forward(request);
        }

        match self.authenticate(&mut request) {
            Ok(claims) => {
                tracing::debug!(
                    request_id = %request.request_id,
                    path = %request.path(),
                    user = %claims.username(),
                    expires = ?claims.expires_at_utc(),
                    "Authentication successful"
                );
                FilterOutcome::Forward(request)
            }
            Err(err) => {
                tracing::warn!(
                    request_id = %request.request_id,
                    path = %request.path(),
                    reason = err.kind(),
                    error = %err,
                    "Authentication failed"
                );
                FilterOutcome::Reject(StatusCode::UNAUTHORIZED)
            }
        }
    }

    fn name(&self) -> &str {
        "authentication"
    }
}
