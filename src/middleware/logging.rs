use tracing::{Level, Span};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::config::LoggingConfig;
use crate::core::request::GatewayRequest;
use crate::error::GatewayError;

/// Filter used when `RUST_LOG` is unset
fn default_filter(level: &str) -> EnvFilter {
    match level {
        "trace" | "debug" | "info" | "warn" | "error" => EnvFilter::new(level),
        _ => EnvFilter::new("info"),
    }
}

/// Initialize the tracing system with structured logging.
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), GatewayError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(&config.level));

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_timer(ChronoUtc::rfc_3339())
        .with_span_events(FmtSpan::CLOSE);

    let result = if config.json_format {
        Registry::default()
            .with(env_filter)
            .with(fmt_layer.json())
            .try_init()
    } else {
        Registry::default().with(env_filter).with(fmt_layer).try_init()
    };

    result.map_err(|e| GatewayError::InternalError(format!("Failed to initialize tracing: {}", e)))?;

    tracing::info!(
        level = %config.level,
        json = config.json_format,
        "Tracing system initialized with structured logging"
    );
    Ok(())
}

/// Span covering one request as it moves through the gateway
pub fn request_span(request: &GatewayRequest) -> Span {
    tracing::span!(
        Level::INFO,
        "request",
        request_id = %request.request_id,
        method = %request.method,
        path = %request.path(),
        client_ip = ?request.client_ip,
        route_id = tracing::field::Empty,
        status = tracing::field::Empty,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use hyper::{HeaderMap, Method, Uri};

    #[test]
    fn test_default_filter_falls_back_to_info() {
        assert_eq!(default_filter("debug").to_string(), "debug");
        assert_eq!(default_filter("chatty").to_string(), "info");
    }

    #[test]
    fn test_request_span_builds_without_subscriber() {
        let request = GatewayRequest::new(
            Method::GET,
            Uri::from_static("/dib/books"),
            HeaderMap::new(),
            Bytes::new(),
            None,
        );

        let span = request_span(&request);
        span.record("route_id", "DEV-ISSUE-BOOK");
        span.record("status", 200u16);
    }
}
