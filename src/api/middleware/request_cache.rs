//! Per-request memoization storage
//!
//! Creates a [`RequestCache`] for every request and exposes it to handlers as
//! an `Extension<RequestCache>`. The cache is dropped together with the request.

use axum::{body::Body, http::Request, middleware::Next, response::Response};
use tracing::debug;
use uuid::Uuid;

use crate::domain::RequestCache;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

pub async fn request_cache_middleware(mut request: Request<Body>, next: Next) -> Response {
    let cache = RequestCache::with_id(extract_request_id(&request));
    request.extensions_mut().insert(cache.clone());

    let response = next.run(request).await;

    if !cache.is_empty() {
        debug!(
            request_id = %cache.id(),
            caches = ?cache.snapshot(),
            "Request cache released"
        );
    }

    response
}

/// Reuses a well-formed `x-request-id`, otherwise generates one
fn extract_request_id(request: &Request<Body>) -> Uuid {
    request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_request_id_from_header() {
        let id = Uuid::new_v4();
        let request = Request::builder()
            .header(REQUEST_ID_HEADER, id.to_string())
            .body(Body::empty())
            .unwrap();

        assert_eq!(extract_request_id(&request), id);
    }

    #[test]
    fn test_extract_request_id_ignores_malformed_header() {
        let request = Request::builder()
            .header(REQUEST_ID_HEADER, "not-a-uuid")
            .body(Body::empty())
            .unwrap();

        assert_ne!(extract_request_id(&request).to_string(), "not-a-uuid");
    }
}
