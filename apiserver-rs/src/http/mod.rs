//! HTTP layer: route table, handler units, middleware and the request context
//! handed to handlers.
//!
//! Routes are declared as [`RouteRegistration`]s inside a [`RouteGroup`],
//! frozen into a [`RouteTable`] and only then turned into an axum `Router`.

mod error;
mod handler;
mod middleware;
mod request;
mod routes;
mod system;
mod user;


pub use error::ApiError;
pub use handler::RouteHandler;
pub use request::RouteRequest;
pub use routes::{RouteError, RouteGroup, RouteRegistration, RouteTable};
pub use system::{HealthResponse, SystemHandler};
pub use user::{UnimplementedUsers, UserHandler, UserOperation, UserRoute};
pub use middleware::{with_middleware, MiddlewareError};
