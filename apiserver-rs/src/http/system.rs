use async_trait::async_trait;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use super::handler::RouteHandler;
use super::request::RouteRequest;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Liveness check. Always answers `200 {"status":"ok"}`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemHandler;

impl SystemHandler {
    pub fn new() -> Self {
        Self
    }

    pub fn health(&self) -> Json<HealthResponse> {
        Json(HealthResponse { status: "ok" })
    }
}

#[async_trait]
impl RouteHandler for SystemHandler {
    async fn handle(&self, _request: RouteRequest) -> Response {
        self.health().into_response()
    }
}
