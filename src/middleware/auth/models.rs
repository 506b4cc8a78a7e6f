use chrono::{DateTime, TimeZone, Utc};
use jwt::AlgorithmType;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AuthError;

/// Claim carrying the caller identity; `sub` is the fallback
pub const USERNAME_CLAIM: &str = "username";

/// Verified claims of a bearer token.
///
/// Only [`TokenValidator`](crate::middleware::auth::jwt::TokenValidator) builds
/// these, after the signature has been checked.
#[derive(Debug, Clone, PartialEq)]
pub struct Claims {
    username: String,
    expires_at: u64,
    issued_at: Option<u64>,
    not_before: Option<u64>,
    issuer: Option<String>,
    audiences: Vec<String>,
    payload: Map<String, Value>,
}

impl Claims {
    /// Type the raw payload of a verified token
    pub(crate) fn from_payload(payload: Map<String, Value>) -> Result<Self, AuthError> {
        let username = identity(&payload).ok_or_else(|| {
            AuthError::TokenMalformed("token carries neither 'username' nor 'sub'".to_string())
        })?;

        let expires_at = numeric_date(&payload, "exp")?
            .ok_or_else(|| AuthError::TokenMalformed("token has no 'exp' claim".to_string()))?;

        let issued_at = numeric_date(&payload, "iat")?;
        let not_before = numeric_date(&payload, "nbf")?;

        let issuer = match payload.get("iss") {
            None | Some(Value::Null) => None,
            Some(Value::String(iss)) => Some(iss.clone()),
            Some(_) => return Err(AuthError::TokenMalformed("'iss' must be a string".to_string())),
        };

        let audiences = match payload.get("aud") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::String(aud)) => vec![aud.clone()],
            Some(Value::Array(values)) => values
                .iter()
                .map(|v| {
                    v.as_str().map(str::to_string).ok_or_else(|| {
                        AuthError::TokenMalformed("'aud' entries must be strings".to_string())
                    })
                })
                .collect::<Result<_, _>>()?,
            Some(_) => {
                return Err(AuthError::TokenMalformed(
                    "'aud' must be a string or an array".to_string(),
                ))
            }
        };

        Ok(Self {
            username,
            expires_at,
            issued_at,
            not_before,
            issuer,
            audiences,
            payload,
        })
    }

    /// Identity injected upstream
    pub fn username(&self) -> &str {
        &self.username
    }

    /// The `sub` claim, if present
    pub fn subject(&self) -> Option<&str> {
        self.payload.get("sub").and_then(Value::as_str)
    }

    /// Expiration time (as Unix timestamp)
    pub fn expires_at(&self) -> u64 {
        self.expires_at
    }

    pub fn issued_at(&self) -> Option<u64> {
        self.issued_at
    }

    pub fn not_before(&self) -> Option<u64> {
        self.not_before
    }

    pub fn issuer(&self) -> Option<&str> {
        self.issuer.as_deref()
    }

    pub fn audiences(&self) -> &[String] {
        &self.audiences
    }

    /// Raw claim value by name
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.payload.get(name)
    }

    /// Get a claim value deserialized into `T`
    pub fn get_claim<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        self.payload
            .get(name)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    /// Check if the claims are expired at `now`
    pub fn is_expired_at(&self, now: u64, leeway: u64) -> bool {
        self.expires_at.saturating_add(leeway) < now
    }

    /// Check if the claims are not yet valid at `now`
    pub fn is_not_valid_yet_at(&self, now: u64, leeway: u64) -> bool {
        self.not_before
            .map_or(false, |nbf| nbf > now.saturating_add(leeway))
    }

    /// Expiry as a UTC timestamp, `None` if out of range
    pub fn expires_at_utc(&self) -> Option<DateTime<Utc>> {
        i64::try_from(self.expires_at)
            .ok()
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
    }

    /// Get remaining validity time in seconds
    pub fn remaining_validity_at(&self, now: u64) -> Option<u64> {
        self.expires_at.checked_sub(now).filter(|secs| *secs > 0)
    }
}

/// `username` as a string or number, else `sub`. Empty strings do not count.
fn identity(payload: &Map<String, Value>) -> Option<String> {
    let username = match payload.get(USERNAME_CLAIM) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };

    username.or_else(|| match payload.get("sub") {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    })
}

/// Seconds since the epoch; fractional values are truncated
fn numeric_date(payload: &Map<String, Value>, name: &'static str) -> Result<Option<u64>, AuthError> {
    match payload.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .map(Some)
            .ok_or_else(|| AuthError::TokenMalformed(format!("'{}' must not be negative", name))),
        Some(_) => Err(AuthError::TokenMalformed(format!("'{}' must be a number", name))),
    }
}

/// Supported JWT algorithms
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum JwtAlgorithm {
    /// HMAC with SHA-256
    #[default]
    HS256,
    /// HMAC with SHA-384
    HS384,
    /// HMAC with SHA-512
    HS512,
}

impl JwtAlgorithm {
    pub fn algorithm_type(self) -> AlgorithmType {
        match self {
            JwtAlgorithm::HS256 => AlgorithmType::Hs256,
            JwtAlgorithm::HS384 => AlgorithmType::Hs384,
            JwtAlgorithm::HS512 => AlgorithmType::Hs512,
        }
    }
}
