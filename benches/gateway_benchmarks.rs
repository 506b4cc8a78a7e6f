use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use hmac::{Hmac, Mac};
use hyper::header::{HeaderValue, AUTHORIZATION};
use hyper::{HeaderMap, Method, StatusCode};
use jwt::SignWithKey;
use serde_json::json;
use sha2::Sha256;
use tokio::runtime::Runtime;

use edge_gateway::config::RouteDefinition;
use edge_gateway::middleware::auth::models::JwtAlgorithm;
use edge_gateway::utils::unix_now;
use edge_gateway::{
    AuthenticationFilter, ExclusionSet, FilterKind, Forwarder, GatewayError, GatewayPipeline,
    GatewayRequest, GatewayResponse, RouteTable, Target, TokenValidator,
};

const SECRET: &[u8] = b"benchmark-secret";

/// Forwarder that answers without any I/O so only the edge is measured
struct NullForwarder;

#[async_trait]
impl Forwarder for NullForwarder {
    async fn forward(
        &self,
        _target: &Target,
        _request: GatewayRequest,
    ) -> Result<GatewayResponse, GatewayError> {
        Ok(GatewayResponse::new(StatusCode::OK, HeaderMap::new(), Bytes::new()))
    }
}

fn route_table(extra_routes: usize) -> RouteTable {
    let mut definitions: Vec<RouteDefinition> = (0..extra_routes)
        .map(|i| {
            RouteDefinition::new(
                &format!("SERVICE-{}", i),
                &format!("/service-{}/:id/**", i),
                "http://localhost:9000/".parse().unwrap(),
                vec![],
            )
        })
        .collect();

    definitions.push(RouteDefinition::new(
        "AUTH-SERVICE",
        "/authenticate/**",
        "http://localhost:8081/".parse().unwrap(),
        vec![FilterKind::Authentication],
    ));
    definitions.push(RouteDefinition::new(
        "DEV-ISSUE-BOOK",
        "/dib/**",
        "http://localhost:8082/".parse().unwrap(),
        vec![FilterKind::Authentication],
    ));

    RouteTable::from_definitions(&definitions).unwrap()
}

fn token() -> String {
    let key: Hmac<Sha256> = Hmac::new_from_slice(SECRET).unwrap();
    json!({ "username": "alice", "exp": unix_now() + 3600 })
        .sign_with_key(&key)
        .unwrap()
}

fn bench_route_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("route_resolution");

    for size in [0usize, 10, 100] {
        let table = route_table(size);
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("last_route", size), &table, |b, table| {
            b.iter(|| table.resolve(black_box("/dib/books/5")).unwrap())
        });
        group.bench_with_input(BenchmarkId::new("no_match", size), &table, |b, table| {
            b.iter(|| table.resolve(black_box("/unknown/path")).is_err())
        });
    }

    group.finish();
}

fn bench_token_validation(c: &mut Criterion) {
    let validator = TokenValidator::new(SECRET, JwtAlgorithm::HS256).unwrap();
    let token = token();

    c.bench_function("token_validation/valid", |b| {
        b.iter(|| validator.validate(black_box(&token)).unwrap())
    });
    c.bench_function("token_validation/malformed", |b| {
        b.iter(|| validator.validate(black_box("not.a.token")).is_err())
    });
}

fn bench_pipeline(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let validator = Arc::new(TokenValidator::new(SECRET, JwtAlgorithm::HS256).unwrap());
    let exclusions = Arc::new(ExclusionSet::new(["/signup", "/login", "/refreshtoken"]));
    let pipeline = GatewayPipeline::new(Arc::new(route_table(10)), Arc::new(NullForwarder))
        .with_filter(
            FilterKind::Authentication,
            Arc::new(AuthenticationFilter::new(validator, exclusions)),
        );

    let authorization = HeaderValue::from_str(&format!("Bearer {}", token())).unwrap();
    let request = move |path: &'static str| {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, authorization.clone());
        GatewayRequest::new(
            Method::GET,
            path.parse().unwrap(),
            headers,
            Bytes::new(),
            None,
        )
    };

    c.bench_function("pipeline/authenticated", |b| {
        b.to_async(&rt)
            .iter(|| async { pipeline.process(request("/dib/books")).await.unwrap() })
    });
    c.bench_function("pipeline/excluded", |b| {
        b.to_async(&rt)
            .iter(|| async { pipeline.process(request("/authenticate/login")).await.unwrap() })
    });
}

criterion_group!(
    benches,
    bench_route_resolution,
    bench_token_validation,
    bench_pipeline
);
criterion_main!(benches);
