//! Server bootstrap: registers the versioned route groups, builds the engine
//! and runs the serve loop until the shutdown token is cancelled.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::http::{
    with_middleware, MiddlewareError, RouteError, RouteGroup, RouteHandler, RouteTable,
    SystemHandler, UnimplementedUsers, UserHandler, UserOperation, UserRoute,
};

/// Prefix every route is registered under.
pub const LATEST_VERSION: &str = "v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Unstarted,
    Running,
    Stopped,
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },
    #[error("server exited with error: {0}")]
    Serve(#[source] std::io::Error),
    #[error(transparent)]
    Routes(#[from] RouteError),
    #[error(transparent)]
    Middleware(#[from] MiddlewareError),
    #[error("server has already been started")]
    AlreadyStarted,
}

pub struct Server {
    config: AppConfig,
    system: Arc<SystemHandler>,
    users: Arc<dyn UserHandler>,
    state: ServerState,
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

impl Server {
    pub fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    pub fn with_config(config: AppConfig) -> Self {
        Self {
            config,
            system: Arc::new(SystemHandler::new()),
            users: Arc::new(UnimplementedUsers),
            state: ServerState::Unstarted,
        }
    }

    pub fn with_user_handler(mut self, users: Arc<dyn UserHandler>) -> Self {
        self.users = users;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    /// The health group and the user group, both under `/v1`.
    pub fn routes(&self) -> Result<RouteTable, RouteError> {
        let mut system = RouteGroup::new(LATEST_VERSION);
        system.get("/health", "health", self.system.clone())?;

        let mut users = RouteGroup::new(LATEST_VERSION);
        users
            .get(
                "",
                UserOperation::List.name(),
                self.user_route(UserOperation::List),
            )?
            .get(
                "/:id",
                UserOperation::Get.name(),
                self.user_route(UserOperation::Get),
            )?
            .post(
                "",
                UserOperation::Edit.name(),
                self.user_route(UserOperation::Edit),
            )?
            .delete(
                "/:id",
                UserOperation::Delete.name(),
                self.user_route(UserOperation::Delete),
            )?;

        RouteTable::from_groups([system, users])
    }

    /// Route table plus the configured middleware, ready to serve.
    pub fn router(&self) -> Result<Router, ServerError> {
        let table = self.routes()?;
        for route in table.routes() {
            debug!(
                method = %route.method,
                path = %route.path,
                operation = route.operation,
                "route registered"
            );
        }
        let router = with_middleware(
            table.into_router(),
            &self.config.middleware,
            self.config.max_body_bytes,
        )?;
        Ok(router)
    }

    /// Binds `config.bind` and serves until `shutdown` is cancelled.
    pub async fn run(&mut self, shutdown: CancellationToken) -> Result<(), ServerError> {
        if self.state != ServerState::Unstarted {
            return Err(ServerError::AlreadyStarted);
        }

        let addr = self.config.bind;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;

        if addr.ip().is_loopback() {
            warn!(
                bind = %addr,
                "binding to loopback; use --bind 0.0.0.0:8080 for external access"
            );
        }

        self.run_on(listener, shutdown).await
    }

    /// Serves on an already bound listener. In-flight requests are drained
    /// before this returns after cancellation.
    pub async fn run_on(
        &mut self,
        listener: TcpListener,
        shutdown: CancellationToken,
    ) -> Result<(), ServerError> {
        if self.state != ServerState::Unstarted {
            return Err(ServerError::AlreadyStarted);
        }

        let app = self.router()?;
        let local_addr = listener.local_addr().map_err(ServerError::Serve)?;

        self.state = ServerState::Running;
        info!(addr = %local_addr, version = LATEST_VERSION, "apiserver-rs listening");

        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
                info!("shutting down gracefully");
            })
            .await;

        self.state = ServerState::Stopped;
        result.map_err(ServerError::Serve)
    }

    fn user_route(&self, operation: UserOperation) -> Arc<dyn RouteHandler> {
        Arc::new(UserRoute::new(Arc::clone(&self.users), operation))
    }
}
