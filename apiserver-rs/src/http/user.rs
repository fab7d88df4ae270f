use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use axum::response::{IntoResponse, Response};
use tracing::debug;

use super::error::ApiError;
use super::handler::RouteHandler;
use super::request::RouteRequest;

/// User-management operations. Storage, validation and error responses all
/// belong to the implementation; the router only dispatches.
#[async_trait]
pub trait UserHandler: Send + Sync + 'static {
    async fn get_users(&self, request: RouteRequest) -> Response;

    /// `request.param("id")` is always present.
    async fn get_user_by_id(&self, request: RouteRequest) -> Response;

    /// Create-or-update from `request.body`.
    async fn edit_user(&self, request: RouteRequest) -> Response;

    /// `request.param("id")` is always present.
    async fn delete_user(&self, request: RouteRequest) -> Response;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserOperation {
    List,
    Get,
    Edit,
    Delete,
}

impl UserOperation {
    pub fn name(self) -> &'static str {
        match self {
            UserOperation::List => "get_users",
            UserOperation::Get => "get_user_by_id",
            UserOperation::Edit => "edit_user",
            UserOperation::Delete => "delete_user",
        }
    }
}

/// Binds one [`UserOperation`] of a shared [`UserHandler`] to a route.
#[derive(Clone)]
pub struct UserRoute {
    handler: Arc<dyn UserHandler>,
    operation: UserOperation,
}

impl UserRoute {
    pub fn new(handler: Arc<dyn UserHandler>, operation: UserOperation) -> Self {
        Self { handler, operation }
    }
}

impl fmt::Debug for UserRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserRoute")
            .field("operation", &self.operation)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl RouteHandler for UserRoute {
    async fn handle(&self, request: RouteRequest) -> Response {
        debug!(
            operation = self.operation.name(),
            params = ?request.params,
            "dispatching user operation"
        );
        match self.operation {
            UserOperation::List => self.handler.get_users(request).await,
            UserOperation::Get => self.handler.get_user_by_id(request).await,
            UserOperation::Edit => self.handler.edit_user(request).await,
            UserOperation::Delete => self.handler.delete_user(request).await,
        }
    }
}

/// Placeholder used until a real user store is plugged in: every operation
/// answers `501 Not Implemented`.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnimplementedUsers;

#[async_trait]
impl UserHandler for UnimplementedUsers {
    async fn get_users(&self, _request: RouteRequest) -> Response {
        ApiError::NotImplemented.into_response()
    }

    async fn get_user_by_id(&self, _request: RouteRequest) -> Response {
        ApiError::NotImplemented.into_response()
    }

    async fn edit_user(&self, _request: RouteRequest) -> Response {
        ApiError::NotImplemented.into_response()
    }

    async fn delete_user(&self, _request: RouteRequest) -> Response {
        ApiError::NotImplemented.into_response()
    }
}
