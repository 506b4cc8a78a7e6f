pub mod auth;
pub mod load_balancer;
pub mod logging;

use hyper::StatusCode;

use crate::core::request::GatewayRequest;

/// Result of running one filter over a request
#[derive(Debug)]
pub enum FilterOutcome {
    /// Continue with the (possibly modified) request
    Forward(GatewayRequest),

    /// Stop here and answer with this status
    Reject(StatusCode),
}

impl FilterOutcome {
    pub fn is_forward(&self) -> bool {
        matches!(self, FilterOutcome::Forward(_))
    }

    /// Status of a rejection, `None` when forwarding
    pub fn rejection(&self) -> Option<StatusCode> {
        match self {
            FilterOutcome::Reject(status) => Some(*status),
            FilterOutcome::Forward(_) => None,
        }
    }
}

/// A per-route request filter.
///
/// Filters run synchronously: they only inspect and rewrite the request and
/// never perform I/O.
pub trait GatewayFilter: Send + Sync {
    /// Inspect the request and either pass it on or reject it
    fn apply(&self, request: GatewayRequest) -> FilterOutcome;

    /// Get the name of this filter
    fn name(&self) -> &str;
}
