//! Environment Configuration
//!
//! Base URLs for the platform's API families and the URL resolution used by
//! the request pipeline.

use serde::{Deserialize, Serialize};

/// Logical endpoint category a request is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    Auth,
    Api,
    Billing,
}

/// Environment configuration (read-only after construction).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Env {
    #[serde(default)]
    pub auth_url: String,
    #[serde(default)]
    pub api_url: String,
    #[serde(default)]
    pub billing_url: String,
}

impl Env {
    pub fn new(auth_url: &str, api_url: &str, billing_url: &str) -> Self {
        Self {
            auth_url: auth_url.to_string(),
            api_url: api_url.to_string(),
            billing_url: billing_url.to_string(),
        }
    }

    /// Read base URLs from process environment variables
    /// (`HALYARD_AUTH_URL`, `HALYARD_API_URL`, `HALYARD_BILLING_URL`).
    /// Missing variables yield empty base URLs; validating them is the
    /// caller's responsibility.
    pub fn from_env() -> Self {
        Self {
            auth_url: std::env::var("HALYARD_AUTH_URL").unwrap_or_default(),
            api_url: std::env::var("HALYARD_API_URL").unwrap_or_default(),
            billing_url: std::env::var("HALYARD_BILLING_URL").unwrap_or_default(),
        }
    }

    /// Base URL for an endpoint category.
    pub fn base_url(&self, endpoint: EndpointKind) -> &str {
        match endpoint {
            EndpointKind::Auth => &self.auth_url,
            EndpointKind::Api => &self.api_url,
            EndpointKind::Billing => &self.billing_url,
        }
    }

    /// Resolve a request path against an endpoint category.
    ///
    /// Paths that already carry a scheme are used unmodified; everything else
    /// is concatenated onto the category's base URL.
    pub fn resolve(&self, endpoint: EndpointKind, path: &str) -> String {
        if path.starts_with("http") {
            return path.to_string();
        }
        format!("{}{}", self.base_url(endpoint), path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_env() -> Env {
        Env::new(
            "https://auth.test",
            "https://api.test",
            "https://billing.test",
        )
    }

    #[test]
    fn test_resolve_relative_path() {
        let env = test_env();
        assert_eq!(
            env.resolve(EndpointKind::Api, "/widgets"),
            "https://api.test/widgets"
        );
        assert_eq!(
            env.resolve(EndpointKind::Auth, "/tokens"),
            "https://auth.test/tokens"
        );
        assert_eq!(
            env.resolve(EndpointKind::Billing, "/invoices"),
            "https://billing.test/invoices"
        );
    }

    #[test]
    fn test_resolve_absolute_url_passes_through() {
        let env = test_env();
        assert_eq!(env.resolve(EndpointKind::Api, "https://x/y"), "https://x/y");
    }

    #[test]
    fn test_missing_base_url_is_empty() {
        let env = Env::default();
        assert_eq!(env.resolve(EndpointKind::Api, "/widgets"), "/widgets");
    }
}
