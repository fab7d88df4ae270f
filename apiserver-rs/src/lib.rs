//! # apiserver-rs
//!
//! Minimal versioned HTTP API server.
//!
//! ## Architecture
//!
//! - **Server**: builds the engine from an explicit [`MiddlewareConfig`], registers the
//!   `/v1` route groups and serves until a [`CancellationToken`](tokio_util::sync::CancellationToken)
//!   is cancelled
//! - **System handler**: `GET /v1/health` liveness check
//! - **User handler**: pluggable [`UserHandler`] behind `GET /v1`, `GET /v1/:id`,
//!   `POST /v1` and `DELETE /v1/:id`

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod config;
pub mod http;
pub mod server;

pub use config::{AppConfig, Cli, MiddlewareConfig, RateLimitConfig};
pub use http::{RouteHandler, RouteRequest, UserHandler};
pub use server::{Server, ServerError, ServerState, LATEST_VERSION};
