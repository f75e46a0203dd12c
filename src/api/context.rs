//! Request Context
//!
//! The mutable record one dispatched request carries through the pipeline:
//! the outgoing request being assembled, the resolved response, and the
//! side-effect actions accumulated along the way.

use crate::store::Action;
use reqwest::header::HeaderMap;
use reqwest::Method;
use serde_json::Value;

/// Outgoing request under construction. `url` starts as the route's
/// interpolated path and becomes absolute once the URL-builder stage runs.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<String>,
}

impl Default for ApiRequest {
    fn default() -> Self {
        Self {
            method: Method::GET,
            url: String::new(),
            headers: HeaderMap::new(),
            body: None,
        }
    }
}

/// Resolved outcome of the fetch stage. Transport and HTTP failures both land
/// here as `ok: false` with an error payload; the fetcher never bubbles them
/// up as errors.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub ok: bool,
    pub status: Option<u16>,
    pub data: Value,
}

impl ApiResponse {
    /// Message to surface for a failed response, taken from the body's
    /// `message` field when present.
    pub fn error_message(&self) -> String {
        self.data
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| "request failed".to_string())
    }
}

/// Per-request pipeline context. Created at dispatch, discarded after the
/// terminal stage returns.
#[derive(Debug, Default)]
pub struct ApiCtx {
    /// Route key this dispatch targets, e.g. `"GET /apps/:id"`.
    pub name: String,
    /// Caller-supplied parameters; also the source for path interpolation.
    pub payload: Value,
    /// Elevated-auth flag, honored only by the auth pipeline.
    pub elevated: bool,
    pub request: ApiRequest,
    pub response: Option<ApiResponse>,
    pub actions: Vec<Action>,
}

impl ApiCtx {
    pub fn new(name: &str, payload: Value) -> Self {
        Self {
            name: name.to_string(),
            payload,
            ..Self::default()
        }
    }

    /// Whether the fetch stage completed with a success status.
    pub fn is_ok(&self) -> bool {
        self.response.as_ref().map(|r| r.ok).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_message_prefers_body_message() {
        let response = ApiResponse {
            ok: false,
            status: Some(401),
            data: json!({"message": "boom"}),
        };
        assert_eq!(response.error_message(), "boom");

        let response = ApiResponse {
            ok: false,
            status: Some(500),
            data: json!({}),
        };
        assert_eq!(response.error_message(), "request failed");
    }

    #[test]
    fn test_ctx_is_ok_requires_response() {
        let ctx = ApiCtx::new("GET /apps", Value::Null);
        assert!(!ctx.is_ok());
    }
}
