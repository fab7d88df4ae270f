use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use axum::extract::Request;
use axum::http::Method;
use axum::response::{IntoResponse, Response};
use axum::routing::{MethodFilter, MethodRouter};
use axum::Router;
use thiserror::Error;
use tower::ServiceExt;

use super::error::ApiError;
use super::handler::RouteHandler;
use super::request::RouteRequest;

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("route {method} {path} is already registered")]
    Duplicate { method: Method, path: String },
    #[error("method {method} cannot be routed")]
    UnsupportedMethod { method: Method },
}

/// A single `(method, path, handler)` entry. `path` includes the group prefix
/// and uses `:name` for captures, e.g. `/v1/:id`.
#[derive(Clone)]
pub struct RouteRegistration {
    pub method: Method,
    pub path: String,
    pub operation: &'static str,
    filter: MethodFilter,
    handler: Arc<dyn RouteHandler>,
}

impl fmt::Debug for RouteRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteRegistration")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("operation", &self.operation)
            .finish_non_exhaustive()
    }
}

/// Routes sharing a path prefix such as `/v1`.
#[derive(Debug)]
pub struct RouteGroup {
    prefix: String,
    routes: Vec<RouteRegistration>,
}

impl RouteGroup {
    pub fn new(prefix: &str) -> Self {
        let trimmed = prefix.trim_matches('/');
        let prefix = if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{trimmed}")
        };
        Self {
            prefix,
            routes: Vec::new(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn register(
        &mut self,
        method: Method,
        path: &str,
        operation: &'static str,
        handler: Arc<dyn RouteHandler>,
    ) -> Result<&mut Self, RouteError> {
        let filter = MethodFilter::try_from(method.clone())
            .map_err(|_| RouteError::UnsupportedMethod {
                method: method.clone(),
            })?;
        let path = join_path(&self.prefix, path);

        if self
            .routes
            .iter()
            .any(|route| route.method == method && route.path == path)
        {
            return Err(RouteError::Duplicate { method, path });
        }

        self.routes.push(RouteRegistration {
            method,
            path,
            operation,
            filter,
            handler,
        });
        Ok(self)
    }

    pub fn get(
        &mut self,
        path: &str,
        operation: &'static str,
        handler: Arc<dyn RouteHandler>,
    ) -> Result<&mut Self, RouteError> {
        self.register(Method::GET, path, operation, handler)
    }

    pub fn post(
        &mut self,
        path: &str,
        operation: &'static str,
        handler: Arc<dyn RouteHandler>,
    ) -> Result<&mut Self, RouteError> {
        self.register(Method::POST, path, operation, handler)
    }

    pub fn delete(
        &mut self,
        path: &str,
        operation: &'static str,
        handler: Arc<dyn RouteHandler>,
    ) -> Result<&mut Self, RouteError> {
        self.register(Method::DELETE, path, operation, handler)
    }
}

/// Frozen set of registrations. Built once before serving; there is no way to
/// add or remove routes afterwards.
#[derive(Debug)]
pub struct RouteTable {
    routes: Vec<RouteRegistration>,
}

impl RouteTable {
    pub fn from_groups(groups: impl IntoIterator<Item = RouteGroup>) -> Result<Self, RouteError> {
        let mut seen = HashSet::new();
        let mut routes = Vec::new();

        for group in groups {
            for route in group.routes {
                if !seen.insert((route.method.clone(), route.path.clone())) {
                    return Err(RouteError::Duplicate {
                        method: route.method,
                        path: route.path,
                    });
                }
                routes.push(route);
            }
        }

        Ok(Self { routes })
    }

    pub fn routes(&self) -> &[RouteRegistration] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn find(&self, method: &Method, path: &str) -> Option<&RouteRegistration> {
        self.routes
            .iter()
            .find(|route| &route.method == method && route.path == path)
    }

    /// Builds the axum router. Each method gets its own router, so a static
    /// segment registered for one method never shadows a capture registered
    /// for another (`GET /v1/health` next to `DELETE /v1/:id`). Unknown paths
    /// and unregistered methods answer `404`.
    pub fn into_router(self) -> Router {
        let mut by_method: HashMap<Method, BTreeMap<String, MethodRouter>> = HashMap::new();

        for route in self.routes {
            let handler = route.handler;
            let endpoint = move |request: RouteRequest| {
                let handler = Arc::clone(&handler);
                async move { handler.handle(request).await }
            };

            let path = to_axum_path(&route.path);
            let paths = by_method.entry(route.method).or_default();
            let method_router = paths.remove(&path).unwrap_or_else(MethodRouter::new);
            paths.insert(path, method_router.on(route.filter, endpoint));
        }

        let routers: HashMap<Method, Router> = by_method
            .into_iter()
            .map(|(method, paths)| {
                let router = paths
                    .into_iter()
                    .fold(Router::new(), |router, (path, method_router)| {
                        router.route(&path, method_router.fallback(not_found))
                    })
                    .fallback(not_found);
                (method, router)
            })
            .collect();
        let routers = Arc::new(routers);

        Router::new().fallback(move |request: Request| {
            let routers = Arc::clone(&routers);
            async move { dispatch(&routers, request).await }
        })
    }
}

async fn dispatch(routers: &HashMap<Method, Router>, request: Request) -> Response {
    // HEAD is answered by the GET routes.
    let method = if *request.method() == Method::HEAD {
        Method::GET
    } else {
        request.method().clone()
    };

    let Some(router) = routers.get(&method) else {
        return ApiError::NotFound.into_response();
    };

    match router.clone().oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    }
}

async fn not_found() -> ApiError {
    ApiError::NotFound
}

fn join_path(prefix: &str, path: &str) -> String {
    let path = path.trim_matches('/');
    let joined = if path.is_empty() {
        prefix.to_string()
    } else {
        format!("{prefix}/{path}")
    };

    if joined.is_empty() {
        String::from("/")
    } else {
        joined
    }
}

/// `/v1/:id` -> `/v1/{id}`, `/files/*rest` -> `/files/{*rest}`.
fn to_axum_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if let Some(name) = segment.strip_prefix(':') {
                format!("{{{name}}}")
            } else if let Some(name) = segment.strip_prefix('*') {
                format!("{{*{name}}}")
            } else {
                segment.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use async_trait::async_trait;

    use super::*;

    struct Noop;

    #[async_trait]
    impl RouteHandler for Noop {
        async fn handle(&self, _request: RouteRequest) -> Response {
            ().into_response()
        }
    }

    #[test]
    fn join_path_handles_empty_and_nested_segments() {
        assert_eq!(join_path("/v1", ""), "/v1");
        assert_eq!(join_path("/v1", "/"), "/v1");
        assert_eq!(join_path("/v1", "/health"), "/v1/health");
        assert_eq!(join_path("/v1", ":id"), "/v1/:id");
        assert_eq!(join_path("", ""), "/");
    }

    #[test]
    fn group_prefix_is_normalized() {
        assert_eq!(RouteGroup::new("v1").prefix(), "/v1");
        assert_eq!(RouteGroup::new("/v1/").prefix(), "/v1");
        assert_eq!(RouteGroup::new("/").prefix(), "");
    }

    #[test]
    fn to_axum_path_translates_captures() {
        assert_eq!(to_axum_path("/v1/:id"), "/v1/{id}");
        assert_eq!(to_axum_path("/v1/health"), "/v1/health");
        assert_eq!(to_axum_path("/files/*rest"), "/files/{*rest}");
    }

    #[test]
    fn same_path_with_different_methods_is_allowed() {
        let mut group = RouteGroup::new("/v1");
        group.get("/:id", "get", Arc::new(Noop)).unwrap();
        group.delete("/:id", "delete", Arc::new(Noop)).unwrap();

        let table = RouteTable::from_groups([group]).unwrap();
        assert_eq!(table.len(), 2);
        assert!(table.find(&Method::DELETE, "/v1/:id").is_some());
        assert!(table.find(&Method::POST, "/v1/:id").is_none());
    }

    #[test]
    fn duplicate_registration_in_group_is_rejected() {
        let mut group = RouteGroup::new("/v1");
        group.get("/health", "health", Arc::new(Noop)).unwrap();

        let err = group.get("health/", "health", Arc::new(Noop)).unwrap_err();
        assert!(matches!(
            err,
            RouteError::Duplicate { ref method, ref path } if *method == Method::GET && path == "/v1/health"
        ));
    }

    #[test]
    fn duplicate_registration_across_groups_is_rejected() {
        let mut first = RouteGroup::new("/v1");
        first.get("/health", "health", Arc::new(Noop)).unwrap();
        let mut second = RouteGroup::new("v1");
        second.get("/health", "health", Arc::new(Noop)).unwrap();

        let err = RouteTable::from_groups([first, second]).unwrap_err();
        assert!(matches!(err, RouteError::Duplicate { .. }));
    }

    #[test]
    fn extension_methods_are_rejected() {
        let mut group = RouteGroup::new("/v1");
        let method = Method::from_bytes(b"PURGE").unwrap();

        let err = group
            .register(method, "/", "purge", Arc::new(Noop))
            .unwrap_err();
        assert!(matches!(err, RouteError::UnsupportedMethod { .. }));
    }
}
