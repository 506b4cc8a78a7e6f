use bytes::Bytes;
use hyper::{HeaderMap, StatusCode};

/// Represents a response from the API Gateway
#[derive(Debug, Clone)]
pub struct GatewayResponse {
    /// HTTP status code
    pub status: StatusCode,

    /// HTTP headers
    pub headers: HeaderMap,

    /// Response body
    pub body: Bytes,

    /// Route that produced the response (if one matched)
    pub route_id: Option<String>,

    /// Time taken to process the request in milliseconds
    pub processing_time_ms: u64,
}

impl GatewayResponse {
    /// Create a new GatewayResponse
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
            route_id: None,
            processing_time_ms: 0,
        }
    }

    /// Bare rejection: status only, no body, no custom headers
    pub fn rejection(status: StatusCode) -> Self {
        Self::new(status, HeaderMap::new(), Bytes::new())
    }

    /// Set the route id for this response
    pub fn with_route_id(mut self, route_id: impl Into<String>) -> Self {
        self.route_id = Some(route_id.into());
        self
    }

    /// Set processing time for this response
    pub fn with_processing_time(mut self, processing_time_ms: u64) -> Self {
        self.processing_time_ms = processing_time_ms;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::HeaderValue;

    #[test]
    fn test_gateway_response_new() {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("application/json"));
        let body = Bytes::from(r#"{"message": "success"}"#);

        let response = GatewayResponse::new(StatusCode::OK, headers.clone(), body.clone());

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.headers, headers);
        assert_eq!(response.body, body);
        assert!(response.route_id.is_none());
        assert_eq!(response.processing_time_ms, 0);
    }

    #[test]
    fn test_rejection_has_empty_body_and_no_headers() {
        let response = GatewayResponse::rejection(StatusCode::UNAUTHORIZED);

        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
        assert!(response.headers.is_empty());
        assert!(response.body.is_empty());
    }

    #[test]
    fn test_builders() {
        let response = GatewayResponse::rejection(StatusCode::NOT_FOUND)
            .with_route_id("DEV-ISSUE-BOOK")
            .with_processing_time(150);

        assert_eq!(response.route_id.as_deref(), Some("DEV-ISSUE-BOOK"));
        assert_eq!(response.processing_time_ms, 150);
    }
}
