use async_trait::async_trait;
use axum::response::Response;

use super::request::RouteRequest;

/// One matched request in, one complete response out.
///
/// The router never inspects or rewrites what a handler returns.
#[async_trait]
pub trait RouteHandler: Send + Sync + 'static {
    async fn handle(&self, request: RouteRequest) -> Response;
}
