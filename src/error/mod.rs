use thiserror::Error;

/// Gateway error types
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Authentication error: {0}")]
    AuthError(#[from] AuthError),

    #[error("Route not found: {0}")]
    RouteNotFound(String),

    #[error("Configuration error: {0}")]
    ConfigError(#[from] ConfigError),

    #[error("Forwarding error: {0}")]
    ForwardError(#[from] ForwardError),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Request body exceeds {0} bytes")]
    PayloadTooLarge(usize),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// HTTP status code mapping for gateway errors
impl GatewayError {
    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::AuthError(_) => 401,
            GatewayError::RouteNotFound(_) => 404,
            GatewayError::ConfigError(_) => 500,
            GatewayError::ForwardError(e) => e.status_code(),
            GatewayError::InternalError(_) => 500,
            GatewayError::InvalidRequest(_) => 400,
            GatewayError::PayloadTooLarge(_) => 413,
            GatewayError::IoError(_) => 500,
        }
    }
}

/// Bearer token failures.
///
/// Every variant surfaces to the caller as the same 401; the distinction only
/// exists for logging.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Token missing")]
    TokenMissing,

    #[error("Token malformed: {0}")]
    TokenMalformed(String),

    #[error("Token expired")]
    TokenExpired,

    #[error("Token not valid yet")]
    TokenNotYetValid,

    #[error("Token signature does not verify")]
    TokenBadSignature,

    #[error("Token algorithm not supported: {0}")]
    TokenUnsupportedAlgorithm(String),

    #[error("Token claim '{0}' does not match the expected value")]
    TokenClaimMismatch(&'static str),
}

impl AuthError {
    /// Short stable label used as a structured log field
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::TokenMissing => "missing",
            AuthError::TokenMalformed(_) => "malformed",
            AuthError::TokenExpired => "expired",
            AuthError::TokenNotYetValid => "not_yet_valid",
            AuthError::TokenBadSignature => "bad_signature",
            AuthError::TokenUnsupportedAlgorithm(_) => "unsupported_algorithm",
            AuthError::TokenClaimMismatch(_) => "claim_mismatch",
        }
    }
}

/// Upstream forwarding errors
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("Unknown service: {0}")]
    UnknownService(String),

    #[error("No instance available for service: {0}")]
    NoInstanceAvailable(String),

    #[error("Invalid upstream URI: {0}")]
    InvalidUri(String),

    #[error("Upstream request failed: {0}")]
    Upstream(String),

    #[error("Upstream request timed out")]
    Timeout,
}

impl ForwardError {
    pub fn status_code(&self) -> u16 {
        match self {
            ForwardError::UnknownService(_) => 503,
            ForwardError::NoInstanceAvailable(_) => 503,
            ForwardError::InvalidUri(_) => 502,
            ForwardError::Upstream(_) => 502,
            ForwardError::Timeout => 504,
        }
    }
}

/// Configuration specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_auth_error_maps_to_unauthorized() {
        let errors = vec![
            AuthError::TokenMissing,
            AuthError::TokenMalformed("x".to_string()),
            AuthError::TokenExpired,
            AuthError::TokenNotYetValid,
            AuthError::TokenBadSignature,
            AuthError::TokenUnsupportedAlgorithm("none".to_string()),
            AuthError::TokenClaimMismatch("iss"),
        ];

        for err in errors {
            assert_eq!(GatewayError::from(err).status_code(), 401);
        }
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(GatewayError::RouteNotFound("/x".to_string()).status_code(), 404);
        assert_eq!(
            GatewayError::from(ForwardError::Upstream("refused".to_string())).status_code(),
            502
        );
        assert_eq!(GatewayError::from(ForwardError::Timeout).status_code(), 504);
        assert_eq!(GatewayError::PayloadTooLarge(1024).status_code(), 413);
        assert_eq!(
            GatewayError::from(ConfigError::ValidationError("bad".to_string())).status_code(),
            500
        );
    }

    #[test]
    fn test_auth_error_kinds_are_distinct() {
        assert_eq!(AuthError::TokenExpired.kind(), "expired");
        assert_eq!(AuthError::TokenBadSignature.kind(), "bad_signature");
        assert_ne!(
            AuthError::TokenMissing.kind(),
            AuthError::TokenMalformed(String::new()).kind()
        );
    }
}
