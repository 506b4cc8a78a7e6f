use std::net::IpAddr;
use std::time::SystemTime;

use bytes::Bytes;
use hyper::header::{HeaderName, HeaderValue, InvalidHeaderValue};
use hyper::{HeaderMap, Method, Uri};
use uuid::Uuid;

/// Represents a request to the API Gateway
#[derive(Debug, Clone)]
pub struct GatewayRequest {
    /// HTTP method
    pub method: Method,

    /// Request URI
    pub uri: Uri,

    /// HTTP headers
    pub headers: HeaderMap,

    /// Request body, passed through untouched
    pub body: Bytes,

    /// Client IP address
    pub client_ip: Option<IpAddr>,

    /// Request timestamp
    pub timestamp: SystemTime,

    /// Request ID for tracing
    pub request_id: String,
}

impl GatewayRequest {
    /// Create a new GatewayRequest
    pub fn new(
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        body: Bytes,
        client_ip: Option<IpAddr>,
    ) -> Self {
        Self {
            method,
            uri,
            headers,
            body,
            client_ip,
            timestamp: SystemTime::now(),
            request_id: Uuid::new_v4().to_string(),
        }
    }

    /// Request path without the query string
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Get the first value of a header as a string
    pub fn header(&self, name: &str) -> Option<String> {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
    }

    /// Set a header, replacing every existing value under that name.
    ///
    /// The value is written as its UTF-8 bytes, so non-ASCII text is carried
    /// as obs-text; control characters are still rejected.
    pub fn set_header(
        &mut self,
        name: HeaderName,
        value: &str,
    ) -> Result<(), InvalidHeaderValue> {
        let value = HeaderValue::from_bytes(value.as_bytes())?;
        self.headers.insert(name, value);
        Ok(())
    }
}
