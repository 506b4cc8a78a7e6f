use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hyper::header::{self, HeaderName};
use hyper::{HeaderMap, Uri};

use crate::core::request::GatewayRequest;
use crate::core::response::GatewayResponse;
use crate::error::{ForwardError, GatewayError};
use crate::middleware::load_balancer::TargetResolver;
use crate::models::Target;

/// Hands an accepted request to its upstream.
///
/// This is the seam to the proxy transport: the pipeline only decides where a
/// request goes, implementations decide how it gets there.
#[async_trait]
pub trait Forwarder: Send + Sync {
    async fn forward(
        &self,
        target: &Target,
        request: GatewayRequest,
    ) -> Result<GatewayResponse, GatewayError>;
}

/// Connection-scoped headers that must not be forwarded
const HOP_BY_HOP: [HeaderName; 7] = [
    header::CONNECTION,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP.iter() {
        headers.remove(name);
    }
    headers.remove("keep-alive");
}

/// Join an upstream base with the original path and query.
///
/// `http://host:8081/` + `/dib/books?page=2` → `http://host:8081/dib/books?page=2`;
/// a base path is kept as a prefix.
pub fn upstream_url(base: &Uri, request_uri: &Uri) -> Result<String, ForwardError> {
    let scheme = base
        .scheme_str()
        .ok_or_else(|| ForwardError::InvalidUri(base.to_string()))?;
    let authority = base
        .authority()
        .ok_or_else(|| ForwardError::InvalidUri(base.to_string()))?;

    let prefix = base.path().trim_end_matches('/');
    let mut url = format!("{}://{}{}{}", scheme, authority, prefix, request_uri.path());
    if let Some(query) = request_uri.query() {
        url.push('?');
        url.push_str(query);
    }

    Ok(url)
}

/// HTTP forwarder backed by `reqwest`
pub struct HttpForwarder {
    client: reqwest::Client,
    resolver: Arc<dyn TargetResolver>,
}

impl HttpForwarder {
    /// Create a forwarder with a per-request timeout
    pub fn new(resolver: Arc<dyn TargetResolver>, timeout: Duration) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| GatewayError::InternalError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, resolver })
    }
}

#[async_trait]
impl Forwarder for HttpForwarder {
    async fn forward(
        &self,
        target: &Target,
        request: GatewayRequest,
    ) -> Result<GatewayResponse, GatewayError> {
        let base = self.resolver.resolve(target)?;
        let url = upstream_url(&base, &request.uri)?;

        let mut headers = request.headers;
        strip_hop_by_hop(&mut headers);
        headers.remove(header::HOST);
        // Correlation id for the upstream; replaces any client-supplied value
        if let Ok(value) = header::HeaderValue::from_str(&request.request_id) {
            headers.insert("x-request-id", value);
        }

        tracing::debug!(
            request_id = %request.request_id,
            target = %target,
            url = %url,
            "Forwarding request"
        );

        let response = self
            .client
            .request(request.method, &url)
            .headers(headers)
            .body(request.body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ForwardError::Timeout
                } else {
                    ForwardError::Upstream(e.to_string())
                }
            })?;

        let status = response.status();
        let mut response_headers = response.headers().clone();
        strip_hop_by_hop(&mut response_headers);

        let body = response
            .bytes()
            .await
            .map_err(|e| ForwardError::Upstream(e.to_string()))?;

        Ok(GatewayResponse::new(status, response_headers, body))
    }
}
