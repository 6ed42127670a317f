//! Request correlation for logs and error bodies.
//!
//! Every request gets a [`RequestId`] (taken from `x-request-id` when the
//! client sends one). The id is scoped in a task-local so that code deep in a
//! handler, such as [`crate::errors::ServiceError`]'s response conversion, can
//! read it without threading it through every call.

use axum::http::Request;
use std::{cell::RefCell, fmt, future::Future};
use tower_http::trace::MakeSpan;
use uuid::Uuid;

/// Request ID tracking information
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestId(pub String);

impl Default for RequestId {
    fn default() -> Self {
        RequestId(Uuid::new_v4().to_string())
    }
}

impl RequestId {
    /// Accepts client supplied ids only when they are short visible ASCII; otherwise a fresh id is used.
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.is_empty()
            || value.len() > 128
            || !value.bytes().all(|b| b.is_ascii_graphic())
        {
            return RequestId::default();
        }
        RequestId(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

tokio::task_local! {
    static CURRENT_REQUEST_ID: RefCell<Option<RequestId>>;
}

pub async fn scope_request_id<Fut, R>(request_id: RequestId, future: Fut) -> R
where
    Fut: Future<Output = R>,
{
    CURRENT_REQUEST_ID
        .scope(RefCell::new(Some(request_id)), future)
        .await
}

pub fn current_request_id() -> Option<RequestId> {
    CURRENT_REQUEST_ID
        .try_with(|cell| cell.borrow().clone())
        .ok()
        .flatten()
}

/// Span factory for `TraceLayer` carrying the request id
#[derive(Clone, Default)]
pub struct RequestSpanMaker;

impl<B> MakeSpan<B> for RequestSpanMaker {
    fn make_span(&mut self, request: &Request<B>) -> tracing::Span {
        let request_id = request
            .extensions()
            .get::<RequestId>()
            .cloned()
            .or_else(|| {
                request
                    .headers()
                    .get(crate::middleware_helpers::request_id::REQUEST_ID_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .map(RequestId::new)
            })
            .unwrap_or_default();

        tracing::info_span!(
            "http.request",
            request_id = %request_id.as_str(),
            method = %request.method(),
            uri = %request.uri(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_header_unsafe_ids() {
        let id = RequestId::new("bad id\n");
        assert_ne!(id.as_str(), "bad id\n");
        assert_eq!(RequestId::new("req-42").as_str(), "req-42");
    }

    #[tokio::test]
    async fn current_id_is_visible_inside_scope_only() {
        assert!(current_request_id().is_none());
        let seen = scope_request_id(RequestId::new("req-7"), async { current_request_id() }).await;
        assert_eq!(seen, Some(RequestId::new("req-7")));
    }
}
