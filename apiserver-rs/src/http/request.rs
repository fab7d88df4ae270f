use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::{FromRequest, MatchedPath, Request};
use axum::http::{HeaderMap, Method, Uri};
use axum::response::{IntoResponse, Response};
use percent_encoding::percent_decode_str;
use serde::de::DeserializeOwned;
use tracing::debug;

/// Request context handed to a [`RouteHandler`](super::RouteHandler).
///
/// The body is buffered up front, bounded by the configured body limit.
/// Path captures are percent-decoded lossily and never rejected here;
/// a malformed id is the handler's to judge.
#[derive(Debug, Clone)]
pub struct RouteRequest {
    pub method: Method,
    pub uri: Uri,
    pub params: HashMap<String, String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RouteRequest {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

impl<S> FromRequest<S> for RouteRequest
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let (parts, body) = request.into_parts();

        let params = parts
            .extensions
            .get::<MatchedPath>()
            .map(|matched| capture_params(matched.as_str(), parts.uri.path()))
            .unwrap_or_default();

        let method = parts.method.clone();
        let uri = parts.uri.clone();
        let headers = parts.headers.clone();

        let body = Bytes::from_request(Request::from_parts(parts, body), state)
            .await
            .map_err(|rejection| {
                debug!(status = %rejection.status(), "request body rejected");
                rejection.into_response()
            })?;

        Ok(Self {
            method,
            uri,
            params,
            headers,
            body,
        })
    }
}

/// Pairs `{name}` / `{*name}` segments of the matched route with the raw
/// request path.
fn capture_params(matched: &str, path: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    let mut segments = path.split('/');

    for pattern in matched.split('/') {
        let Some(segment) = segments.next() else {
            break;
        };

        let Some(capture) = pattern.strip_prefix('{').and_then(|p| p.strip_suffix('}')) else {
            continue;
        };

        if let Some(name) = capture.strip_prefix('*') {
            let rest: Vec<&str> = std::iter::once(segment).chain(segments.by_ref()).collect();
            params.insert(name.to_string(), decode_segment(&rest.join("/")));
            break;
        }
        params.insert(capture.to_string(), decode_segment(segment));
    }

    params
}

fn decode_segment(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_params_pairs_named_segments() {
        let params = capture_params("/v1/{id}", "/v1/42");
        assert_eq!(params.len(), 1);
        assert_eq!(params.get("id").map(String::as_str), Some("42"));
    }

    #[test]
    fn capture_params_ignores_static_routes() {
        assert!(capture_params("/v1/health", "/v1/health").is_empty());
        assert!(capture_params("/v1", "/v1").is_empty());
    }

    #[test]
    fn capture_params_decodes_lossily() {
        let params = capture_params("/v1/{id}", "/v1/%FF");
        assert_eq!(params.get("id").map(String::as_str), Some("\u{FFFD}"));

        let params = capture_params("/v1/{id}", "/v1/a%2Fb");
        assert_eq!(params.get("id").map(String::as_str), Some("a/b"));
    }

    #[test]
    fn capture_params_collects_wildcard_tail() {
        let params = capture_params("/files/{*rest}", "/files/a/b%20c");
        assert_eq!(params.get("rest").map(String::as_str), Some("a/b c"));
    }
}
