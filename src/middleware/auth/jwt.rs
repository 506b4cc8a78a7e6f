use hmac::{Hmac, Mac};
use jwt::{Header, Token, VerifyWithKey};
use serde_json::{Map, Value};
use sha2::{Sha256, Sha384, Sha512};

use crate::config::AuthConfig;
use crate::error::{AuthError, ConfigError};
use crate::middleware::auth::models::{Claims, JwtAlgorithm};
use crate::utils::unix_now;

type Payload = Map<String, Value>;

/// HMAC key for the configured algorithm
#[derive(Clone)]
enum VerificationKey {
    Hs256(Hmac<Sha256>),
    Hs384(Hmac<Sha384>),
    Hs512(Hmac<Sha512>),
}

impl VerificationKey {
    fn new(algorithm: JwtAlgorithm, secret: &[u8]) -> Result<Self, ConfigError> {
        let invalid = |_| ConfigError::ValidationError("Invalid token verification key".to_string());

        Ok(match algorithm {
            JwtAlgorithm::HS256 => Self::Hs256(Hmac::<Sha256>::new_from_slice(secret).map_err(invalid)?),
            JwtAlgorithm::HS384 => Self::Hs384(Hmac::<Sha384>::new_from_slice(secret).map_err(invalid)?),
            JwtAlgorithm::HS512 => Self::Hs512(Hmac::<Sha512>::new_from_slice(secret).map_err(invalid)?),
        })
    }
}

/// Verifies bearer tokens and extracts their claims.
///
/// Validation is a pure function of the token and the current time. The key
/// and expected claims are fixed at construction.
#[derive(Clone)]
pub struct TokenValidator {
    algorithm: JwtAlgorithm,
    key: VerificationKey,
    leeway_seconds: u64,
    issuer: Option<String>,
    audience: Option<String>,
}

impl std::fmt::Debug for TokenValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenValidator")
            .field("algorithm", &self.algorithm)
            .field("leeway_seconds", &self.leeway_seconds)
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .finish_non_exhaustive()
    }
}

impl TokenValidator {
    /// Create a validator for tokens signed with `secret`
    pub fn new(secret: &[u8], algorithm: JwtAlgorithm) -> Result<Self, ConfigError> {
        if secret.is_empty() {
            return Err(ConfigError::ValidationError(
                "Token verification secret must not be empty".to_string(),
            ));
        }

        Ok(Self {
            algorithm,
            key: VerificationKey::new(algorithm, secret)?,
            leeway_seconds: 0,
            issuer: None,
            audience: None,
        })
    }

    /// Create a validator from the authentication configuration
    pub fn from_config(config: &AuthConfig) -> Result<Self, ConfigError> {
        let secret = config.secret_key.as_deref().ok_or_else(|| {
            ConfigError::ValidationError("auth.secret_key is not configured".to_string())
        })?;

        let mut validator =
            Self::new(secret.as_bytes(), config.algorithm)?.with_leeway(config.leeway_seconds);
        if let Some(issuer) = &config.issuer {
            validator = validator.with_issuer(issuer.clone());
        }
        if let Some(audience) = &config.audience {
            validator = validator.with_audience(audience.clone());
        }

        Ok(validator)
    }

    /// Tolerate clock skew on `exp` and `nbf`
    pub fn with_leeway(mut self, seconds: u64) -> Self {
        self.leeway_seconds = seconds;
        self
    }

    /// Require the `iss` claim to equal `issuer`
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Require the `aud` claim to contain `audience`
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    pub fn algorithm(&self) -> JwtAlgorithm {
        self.algorithm
    }

    /// Validate a raw token (scheme prefix already stripped) against the current time
    pub fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        self.validate_at(token, unix_now())
    }

    /// Validate a raw token as of `now` (seconds since the epoch)
    pub fn validate_at(&self, token: &str, now: u64) -> Result<Claims, AuthError> {
        if token.is_empty() {
            return Err(AuthError::TokenMissing);
        }

        let unverified: Token<Header, Payload, _> = Token::parse_unverified(token)
            .map_err(|e| AuthError::TokenMalformed(e.to_string()))?;

        let algorithm = unverified.header().algorithm;
        if algorithm != self.algorithm.algorithm_type() {
            return Err(AuthError::TokenUnsupportedAlgorithm(format!("{:?}", algorithm)));
        }

        let verified: Token<Header, Payload, _> = match &self.key {
            VerificationKey::Hs256(key) => unverified.verify_with_key(key),
            VerificationKey::Hs384(key) => unverified.verify_with_key(key),
            VerificationKey::Hs512(key) => unverified.verify_with_key(key),
        }
        .map_err(verification_error)?;

        let claims = Claims::from_payload(verified.claims().clone())?;

        if claims.is_expired_at(now, self.leeway_seconds) {
            return Err(AuthError::TokenExpired);
        }

        if claims.is_not_valid_yet_at(now, self.leeway_seconds) {
            return Err(AuthError::TokenNotYetValid);
        }

        if let Some(expected) = &self.issuer {
            if claims.issuer() != Some(expected.as_str()) {
                return Err(AuthError::TokenClaimMismatch("iss"));
            }
        }

        if let Some(expected) = &self.audience {
            if !claims.audiences().iter().any(|aud| aud == expected) {
                return Err(AuthError::TokenClaimMismatch("aud"));
            }
        }

        Ok(claims)
    }
}

fn verification_error(err: jwt::Error) -> AuthError {
    match err {
        jwt::Error::InvalidSignature => AuthError::TokenBadSignature,
        jwt::Error::AlgorithmMismatch(_, found) => {
            AuthError::TokenUnsupportedAlgorithm(format!("{:?}", found))
        }
        other => AuthError::TokenMalformed(other.to_string()),
    }
}
