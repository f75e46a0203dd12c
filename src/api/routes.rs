//! Route Dispatch
//!
//! Maps a dispatched action's route key onto its registered method, path
//! template, and optional per-route middleware, and binds path parameters
//! from the payload.

use super::context::ApiCtx;
use super::middleware::{Middleware, Next};
use anyhow::Result;
use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A registered endpoint.
#[derive(Clone)]
pub struct Route {
    pub method: Method,
    pub template: String,
    /// Optional route-level middleware, wrapped around the remaining stages
    /// (URL builder, token attach, fetcher).
    pub handler: Option<Arc<dyn Middleware<ApiCtx>>>,
}

/// Route key as stored in the table, e.g. `"POST /tokens"`.
pub fn route_name(method: &Method, template: &str) -> String {
    format!("{method} {template}")
}

/// Registered path-template -> route map, shared between a pipeline and its
/// registration surface.
#[derive(Default)]
pub struct RouteTable {
    routes: RwLock<HashMap<String, Route>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(
        &self,
        method: Method,
        template: &str,
        handler: Option<Arc<dyn Middleware<ApiCtx>>>,
    ) -> String {
        let name = route_name(&method, template);
        let mut routes = self.routes.write().await;
        routes.insert(
            name.clone(),
            Route {
                method,
                template: template.to_string(),
                handler,
            },
        );
        name
    }

    pub async fn get(&self, name: &str) -> Option<Route> {
        let routes = self.routes.read().await;
        routes.get(name).cloned()
    }
}

/// Bind `:param` placeholders in a path template from the payload's fields.
/// Unbound placeholders are left in place; a bare `:` (scheme separators in
/// absolute URLs) passes through untouched.
pub fn interpolate_path(template: &str, payload: &Value) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c != ':' {
            out.push(c);
            continue;
        }

        let mut name = String::new();
        while let Some(&peeked) = chars.peek() {
            if peeked.is_ascii_alphanumeric() || peeked == '_' {
                name.push(peeked);
                chars.next();
            } else {
                break;
            }
        }

        if name.is_empty() {
            out.push(':');
            continue;
        }

        match payload.get(&name) {
            Some(Value::String(s)) => out.push_str(s),
            Some(Value::Number(n)) => out.push_str(&n.to_string()),
            _ => {
                out.push(':');
                out.push_str(&name);
            }
        }
    }

    out
}

/// Pipeline stage that resolves the dispatched route and runs its handler
/// around the downstream stages.
pub struct RouteDispatch {
    table: Arc<RouteTable>,
}

impl RouteDispatch {
    pub fn new(table: Arc<RouteTable>) -> Self {
        Self { table }
    }
}

#[async_trait]
impl Middleware<ApiCtx> for RouteDispatch {
    async fn handle(&self, ctx: &mut ApiCtx, next: Next<'_, ApiCtx>) -> Result<()> {
        let Some(route) = self.table.get(&ctx.name).await else {
            anyhow::bail!("unknown route: {}", ctx.name);
        };

        ctx.request.method = route.method.clone();
        ctx.request.url = interpolate_path(&route.template, &ctx.payload);

        match route.handler {
            Some(handler) => handler.handle(ctx, next).await,
            None => next.run(ctx).await,
        }
    }
}
