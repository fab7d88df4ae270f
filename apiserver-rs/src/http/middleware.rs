use std::any::Any;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::HeaderName;
use axum::response::{IntoResponse, Response};
use axum::Router;
use thiserror::Error;
use tower_governor::{
    governor::GovernorConfigBuilder,
    key_extractor::GlobalKeyExtractor,
    GovernorLayer,
};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::config::MiddlewareConfig;

use super::error::ApiError;

const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Debug, Error)]
pub enum MiddlewareError {
    #[error("invalid rate limit: period_seconds={period_seconds}, burst_size={burst_size}")]
    InvalidRateLimit { period_seconds: u64, burst_size: u32 },
}

/// Wraps the router in the layers enabled by `config`. The body limit is
/// always applied.
pub fn with_middleware(
    router: Router,
    config: &MiddlewareConfig,
    max_body_bytes: usize,
) -> Result<Router, MiddlewareError> {
    let mut router = router.layer(DefaultBodyLimit::max(max_body_bytes));

    if config.recovery {
        router = router.layer(CatchPanicLayer::custom(recover));
    }

    if let Some(limit) = config.rate_limit {
        let governor_conf = Arc::new(
            GovernorConfigBuilder::default()
                .per_second(limit.period_seconds)
                .burst_size(limit.burst_size)
                .key_extractor(GlobalKeyExtractor)
                .finish()
                .ok_or(MiddlewareError::InvalidRateLimit {
                    period_seconds: limit.period_seconds,
                    burst_size: limit.burst_size,
                })?,
        );
        router = router.layer(GovernorLayer::new(governor_conf));
    }

    if config.request_id {
        // Set must wrap Propagate so the generated id is visible on the way back out.
        router = router
            .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                REQUEST_ID_HEADER,
            )))
            .layer(SetRequestIdLayer::new(
                HeaderName::from_static(REQUEST_ID_HEADER),
                MakeRequestUuid::default(),
            ));
    }

    if config.request_logging {
        router = router.layer(TraceLayer::new_for_http());
    }

    Ok(router)
}

fn recover(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        String::from("unknown panic payload")
    };
    error!(panic = %message, "handler panicked");
    ApiError::Internal.into_response()
}
