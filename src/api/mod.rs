//! Request Pipeline
//!
//! Composable middleware pipeline that turns dispatched actions into HTTP
//! requests against the platform's APIs.
//!
//! # Module Structure
//!
//! - [`middleware`] - the typed `(ctx, next)` middleware seam
//! - [`context`] - per-request context, request and response records
//! - [`routes`] - route registration and path-parameter binding
//! - [`stages`] - the fixed pipeline stages
//!
//! Two pipeline instances exist side by side: the default one for the `api`
//! endpoint category and an auth one that also supports elevated tokens.
//! Stage order is fixed at construction:
//!
//! ```text
//! monitor -> routes -> entity parser -> url builder -> token attach
//!         -> [elevated token attach]  -> fetcher
//! ```

pub mod context;
pub mod middleware;
pub mod routes;
pub mod stages;

pub use context::{ApiCtx, ApiRequest, ApiResponse};
pub use middleware::{Middleware, Next, Stack};
pub use routes::{interpolate_path, route_name, RouteTable};

use crate::env::{Env, EndpointKind};
use crate::hal::EntityRegistry;
use crate::store::Store;
use crate::token::TokenProvider;
use anyhow::{Context, Result};
use reqwest::{Client, Method};
use serde_json::Value;
use std::sync::Arc;

use routes::RouteDispatch;
use stages::{ElevatedTokenAttach, EntityParser, Fetcher, RequestMonitor, TokenAttach, UrlBuilder};

/// A request pipeline bound to one endpoint category.
pub struct Api {
    stack: Stack<ApiCtx>,
    routes: Arc<RouteTable>,
}

impl Api {
    /// Assemble a pipeline. The elevated-token stage is only present on the
    /// auth pipeline; the other categories ignore the `elevated` flag.
    pub fn new(
        endpoint: EndpointKind,
        env: Env,
        tokens: Arc<dyn TokenProvider>,
        registry: Arc<EntityRegistry>,
        store: Arc<Store>,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("halyard/", env!("CARGO_PKG_VERSION")))
            .cookie_store(true)
            .build()
            .context("Failed to create HTTP client")?;

        let routes = Arc::new(RouteTable::new());

        let mut stack: Stack<ApiCtx> = vec![
            Arc::new(RequestMonitor::new(store)),
            Arc::new(RouteDispatch::new(routes.clone())),
            Arc::new(EntityParser::new(registry)),
            Arc::new(UrlBuilder::new(env, endpoint)),
            Arc::new(TokenAttach::new(tokens.clone())),
        ];
        if endpoint == EndpointKind::Auth {
            stack.push(Arc::new(ElevatedTokenAttach::new(tokens)));
        }
        stack.push(Arc::new(Fetcher::new(client)));

        Ok(Self { stack, routes })
    }

    /// Register a GET endpoint. Returns the route key used to dispatch it.
    pub async fn get(&self, template: &str) -> String {
        self.routes.insert(Method::GET, template, None).await
    }

    pub async fn post(&self, template: &str) -> String {
        self.routes.insert(Method::POST, template, None).await
    }

    pub async fn delete(&self, template: &str) -> String {
        self.routes.insert(Method::DELETE, template, None).await
    }

    pub async fn put(&self, template: &str) -> String {
        self.routes.insert(Method::PUT, template, None).await
    }

    /// Register an endpoint with a route-level middleware wrapped around the
    /// downstream stages.
    pub async fn register(
        &self,
        method: Method,
        template: &str,
        handler: Arc<dyn Middleware<ApiCtx>>,
    ) -> String {
        self.routes.insert(method, template, Some(handler)).await
    }

    /// Dispatch a registered endpoint through the pipeline and hand back the
    /// finished context. HTTP failures live in `ctx.response`; an `Err` here
    /// means a programming error such as an unregistered route.
    pub async fn dispatch(&self, name: &str, payload: Value) -> Result<ApiCtx> {
        let mut ctx = ApiCtx::new(name, payload);
        Next::new(&self.stack).run(&mut ctx).await?;
        Ok(ctx)
    }
}
