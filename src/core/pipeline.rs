use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use hyper::StatusCode;
use tracing::Instrument;

use crate::config::GatewayConfig;
use crate::core::forwarder::{Forwarder, HttpForwarder};
use crate::core::request::GatewayRequest;
use crate::core::response::GatewayResponse;
use crate::core::router::{FilterKind, RouteTable};
use crate::error::GatewayError;
use crate::middleware::auth::AuthenticationFilter;
use crate::middleware::load_balancer::ServiceDirectory;
use crate::middleware::logging::request_span;
use crate::middleware::{FilterOutcome, GatewayFilter};
use crate::models::Target;
use crate::utils::duration_to_millis;

/// What the gateway decided to do with one request
#[derive(Debug)]
pub enum Decision {
    /// Hand the (possibly rewritten) request to the route's target
    Forward {
        request: GatewayRequest,
        route_id: String,
        target: Target,
    },

    /// Answer immediately with this status and an empty body
    Reject(StatusCode),
}

impl Decision {
    pub fn is_forward(&self) -> bool {
        matches!(self, Decision::Forward { .. })
    }

    /// Status of a rejection, `None` when forwarding
    pub fn rejection(&self) -> Option<StatusCode> {
        match self {
            Decision::Reject(status) => Some(*status),
            Decision::Forward { .. } => None,
        }
    }
}

/// Request edge of the gateway: route lookup, per-route filters, forwarding.
///
/// All state is immutable after construction and shared by `Arc`, so one
/// pipeline serves any number of concurrent requests.
#[derive(Clone)]
pub struct GatewayPipeline {
    routes: Arc<RouteTable>,
    filters: HashMap<FilterKind, Arc<dyn GatewayFilter>>,
    forwarder: Arc<dyn Forwarder>,
}

impl GatewayPipeline {
    /// Create a pipeline with no filters registered
    pub fn new(routes: Arc<RouteTable>, forwarder: Arc<dyn Forwarder>) -> Self {
        Self {
            routes,
            filters: HashMap::new(),
            forwarder,
        }
    }

    /// Register the implementation of a filter kind
    pub fn with_filter(mut self, kind: FilterKind, filter: Arc<dyn GatewayFilter>) -> Self {
        self.filters.insert(kind, filter);
        self
    }

    /// Build the full pipeline from configuration
    pub fn from_config(config: &GatewayConfig) -> Result<Self, GatewayError> {
        config.validate()?;

        let routes = Arc::new(RouteTable::from_definitions(&config.routes)?);
        let directory = Arc::new(ServiceDirectory::from_config(&config.services)?);
        let forwarder = Arc::new(HttpForwarder::new(
            directory,
            Duration::from_secs(config.server.request_timeout),
        )?);

        let mut pipeline = Self::new(routes.clone(), forwarder);

        let needs_auth = routes
            .routes()
            .iter()
            .any(|route| route.filters().contains(&FilterKind::Authentication));
        if needs_auth {
            let filter = AuthenticationFilter::from_config(&config.auth)?;
            tracing::info!(
                exclusions = filter.exclusions().len(),
                algorithm = ?config.auth.algorithm,
                "Authentication filter configured"
            );
            pipeline = pipeline.with_filter(FilterKind::Authentication, Arc::new(filter));
        }

        tracing::info!(routes = routes.len(), "Gateway pipeline built");
        Ok(pipeline)
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Decide what happens to a request without performing any I/O
    pub fn handle(&self, request: GatewayRequest) -> Decision {
        let route = match self.routes.resolve(request.path()) {
            Ok(route) => route,
            Err(_) => {
                tracing::info!(
                    request_id = %request.request_id,
                    path = %request.path(),
                    "No route matched"
                );
                return Decision::Reject(StatusCode::NOT_FOUND);
            }
        };

        let mut request = request;
        for kind in route.filters() {
            let filter = match self.filters.get(kind) {
                Some(filter) => filter,
                None => {
                    tracing::error!(
                        request_id = %request.request_id,
                        route_id = %route.id(),
                        filter = ?kind,
                        "Route references a filter that is not registered"
                    );
                    return Decision::Reject(StatusCode::INTERNAL_SERVER_ERROR);
                }
            };

            request = match filter.apply(request) {
                FilterOutcome::Forward(next) => next,
                FilterOutcome::Reject(status) => {
                    tracing::debug!(
                        route_id = %route.id(),
                        filter = filter.name(),
                        status = status.as_u16(),
                        "Request rejected by filter"
                    );
                    return Decision::Reject(status);
                }
            };
        }

        Decision::Forward {
            request,
            route_id: route.id().to_string(),
            target: route.target().clone(),
        }
    }

    /// Handle a request and, when accepted, forward it upstream
    pub async fn process(&self, request: GatewayRequest) -> Result<GatewayResponse, GatewayError> {
        let span = request_span(&request);
        let started = Instant::now();

        let decision = span.in_scope(|| self.handle(request));
        let response = match decision {
            Decision::Reject(status) => GatewayResponse::rejection(status),
            Decision::Forward {
                request,
                route_id,
                target,
            } => {
                span.record("route_id", route_id.as_str());
                self.forwarder
                    .forward(&target, request)
                    .instrument(span.clone())
                    .await?
                    .with_route_id(route_id)
            }
        };

        span.record("status", response.status.as_u16());
        let elapsed = duration_to_millis(started.elapsed());
        span.in_scope(|| {
            tracing::info!(
                status = response.status.as_u16(),
                elapsed_ms = elapsed,
                "Request completed"
            )
        });

        Ok(response.with_processing_time(elapsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouteDefinition;
    use crate::middleware::auth::jwt::TokenValidator;
    use crate::middleware::auth::models::JwtAlgorithm;
    use crate::middleware::auth::ExclusionSet;
    use async_trait::async_trait;
    use bytes::Bytes;
    use hmac::{Hmac, Mac};
    use hyper::header::{HeaderValue, AUTHORIZATION};
    use hyper::{HeaderMap, Method, Uri};
    use ::jwt::SignWithKey;
    use serde_json::json;
    use sha2::Sha256;
    use std::sync::Mutex;

    const SECRET: &[u8] = b"pipeline-test-secret";

    #[derive(Default)]
    struct RecordingForwarder {
        seen: Mutex<Vec<(Target, GatewayRequest)>>,
    }

    #[async_trait]
    impl Forwarder for RecordingForwarder {
        async fn forward(
            &self,
            target: &Target,
            request: GatewayRequest,
        ) -> Result<GatewayResponse, GatewayError> {
            self.seen.lock().unwrap().push((target.clone(), request));
            Ok(GatewayResponse::new(StatusCode::OK, HeaderMap::new(), Bytes::from("ok")))
        }
    }

    struct FailingForwarder;

    #[async_trait]
    impl Forwarder for FailingForwarder {
        async fn forward(
            &self,
            _target: &Target,
            _request: GatewayRequest,
        ) -> Result<GatewayResponse, GatewayError> {
            Err(crate::error::ForwardError::Upstream("connection refused".to_string()).into())
        }
    }

    fn table() -> Arc<RouteTable> {
        let definitions = vec![
            RouteDefinition::new(
                "AUTH-SERVICE",
                "/authenticate/**",
                "http://localhost:8081/".parse().unwrap(),
                vec![FilterKind::Authentication],
            ),
            RouteDefinition::new(
                "DEV-ISSUE-BOOK",
                "/dib/**",
                "http://localhost:8082/".parse().unwrap(),
                vec![FilterKind::Authentication],
            ),
            RouteDefinition::new(
                "STATUS",
                "/status",
                "lb://STATUS-SERVICE".parse().unwrap(),
                vec![],
            ),
        ];
        Arc::new(RouteTable::from_definitions(&definitions).unwrap())
    }

    fn auth_filter() -> Arc<dyn GatewayFilter> {
        let validator = Arc::new(TokenValidator::new(SECRET, JwtAlgorithm::HS256).unwrap());
        let exclusions = Arc::new(ExclusionSet::new(["/signup", "/login", "/refreshtoken"]));
        Arc::new(AuthenticationFilter::new(validator, exclusions))
    }

    fn pipeline(forwarder: Arc<dyn Forwarder>) -> GatewayPipeline {
        GatewayPipeline::new(table(), forwarder).with_filter(FilterKind::Authentication, auth_filter())
    }

    fn token(username: &str) -> String {
        let key: Hmac<Sha256> = Hmac::new_from_slice(SECRET).unwrap();
        json!({"username": username, "exp": crate::utils::unix_now() + 600})
            .sign_with_key(&key)
            .unwrap()
    }

    fn request(path: &str, bearer: Option<&str>) -> GatewayRequest {
        let mut headers = HeaderMap::new();
        if let Some(token) = bearer {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
            );
        }
        GatewayRequest::new(
            Method::GET,
            path.parse::<Uri>().unwrap(),
            headers,
            Bytes::new(),
            None,
        )
    }

    #[test]
    fn test_unknown_path_is_not_found() {
        let pipeline = pipeline(Arc::new(RecordingForwarder::default()));
        let decision = pipeline.handle(request("/unknown/path", None));
        assert_eq!(decision.rejection(), Some(StatusCode::NOT_FOUND));
    }

    #[test]
    fn test_protected_route_without_token_is_unauthorized() {
        let pipeline = pipeline(Arc::new(RecordingForwarder::default()));
        let decision = pipeline.handle(request("/dib/books", None));
        assert_eq!(decision.rejection(), Some(StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn test_excluded_login_forwards_to_auth_service() {
        let pipeline = pipeline(Arc::new(RecordingForwarder::default()));

        match pipeline.handle(request("/authenticate/login", None)) {
            Decision::Forward {
                request,
                route_id,
                target,
            } => {
                assert_eq!(route_id, "AUTH-SERVICE");
                assert_eq!(target.to_string(), "http://localhost:8081/");
                assert!(request.header("username").is_none());
            }
            Decision::Reject(status) => panic!("unexpected reject {}", status),
        }
    }

    #[test]
    fn test_valid_token_forwards_with_identity() {
        let pipeline = pipeline(Arc::new(RecordingForwarder::default()));
        let token = token("alice");

        match pipeline.handle(request("/dib/books", Some(&token))) {
            Decision::Forward {
                request,
                route_id,
                target,
            } => {
                assert_eq!(route_id, "DEV-ISSUE-BOOK");
                assert_eq!(target.to_string(), "http://localhost:8082/");
                assert_eq!(request.header("username"), Some("alice".to_string()));
            }
            Decision::Reject(status) => panic!("unexpected reject {}", status),
        }
    }

    #[test]
    fn test_public_route_runs_no_filters() {
        let pipeline = pipeline(Arc::new(RecordingForwarder::default()));

        match pipeline.handle(request("/status", None)) {
            Decision::Forward { target, .. } => assert!(target.is_service()),
            Decision::Reject(status) => panic!("unexpected reject {}", status),
        }
    }

    #[test]
    fn test_unregistered_filter_fails_closed() {
        let pipeline = GatewayPipeline::new(table(), Arc::new(RecordingForwarder::default()));
        let decision = pipeline.handle(request("/dib/books", Some(&token("alice"))));
        assert_eq!(decision.rejection(), Some(StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[tokio::test]
    async fn test_process_forwards_accepted_request() {
        let forwarder = Arc::new(RecordingForwarder::default());
        let pipeline = pipeline(forwarder.clone());

        let response = pipeline
            .process(request("/dib/books", Some(&token("alice"))))
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.route_id.as_deref(), Some("DEV-ISSUE-BOOK"));

        let seen = forwarder.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].1.header("username"), Some("alice".to_string()));
    }

    #[tokio::test]
    async fn test_process_rejection_has_empty_body() {
        let forwarder = Arc::new(RecordingForwarder::default());
        let pipeline = pipeline(forwarder.clone());

        let response = pipeline.process(request("/dib/books", None)).await.unwrap();

        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
        assert!(response.body.is_empty());
        assert!(response.route_id.is_none());
        assert!(forwarder.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_process_propagates_forward_errors() {
        let pipeline = pipeline(Arc::new(FailingForwarder));

        let err = pipeline
            .process(request("/authenticate/login", None))
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), 502);
    }

    #[tokio::test]
    async fn test_from_config_requires_secret() {
        assert!(GatewayPipeline::from_config(&GatewayConfig::default()).is_err());

        let mut config = GatewayConfig::default();
        config.auth.secret_key = Some("configured-secret".to_string());
        let pipeline = GatewayPipeline::from_config(&config).unwrap();
        assert_eq!(pipeline.routes().len(), 2);
    }
}
