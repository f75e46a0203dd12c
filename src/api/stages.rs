//! Pipeline Stages
//!
//! The fixed stages of the request pipeline: observability wrapper, entity
//! parsing, URL building, token attachment, and the terminal fetch stage.

use super::context::{ApiCtx, ApiResponse};
use super::middleware::{Middleware, Next};
use crate::env::{Env, EndpointKind};
use crate::hal::{parse_embedded, EntityRegistry};
use crate::store::Store;
use crate::token::TokenProvider;
use anyhow::Result;
use async_trait::async_trait;
use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Sanitize response body for logging
/// Truncates long responses and masks potentially sensitive patterns
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        format!(
            "{}... [truncated, {} bytes total]",
            &body[..MAX_LOG_BODY_LENGTH],
            body.len()
        )
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// Outermost stage: logs timing and outcome, then dispatches every action the
/// inner stages accumulated as one batch.
pub struct RequestMonitor {
    store: Arc<Store>,
}

impl RequestMonitor {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Middleware<ApiCtx> for RequestMonitor {
    async fn handle(&self, ctx: &mut ApiCtx, next: Next<'_, ApiCtx>) -> Result<()> {
        let request_id = Uuid::new_v4();
        let started = Instant::now();
        tracing::debug!(%request_id, route = %ctx.name, "dispatching");

        let result = next.run(ctx).await;

        let actions = std::mem::take(&mut ctx.actions);
        self.store.dispatch_all(actions).await;

        let elapsed = started.elapsed();
        match &ctx.response {
            Some(response) if response.ok => {
                tracing::debug!(
                    %request_id,
                    route = %ctx.name,
                    status = ?response.status,
                    ?elapsed,
                    "completed"
                );
            }
            Some(response) => {
                tracing::error!(
                    %request_id,
                    route = %ctx.name,
                    status = ?response.status,
                    ?elapsed,
                    body = %sanitize_for_log(&response.data.to_string()),
                    "request failed"
                );
            }
            None => {
                tracing::debug!(%request_id, route = %ctx.name, ?elapsed, "no response");
            }
        }

        result
    }
}

/// Post-response stage: walks the embedded tree of a successful response and
/// appends one batched save action per entity type found.
pub struct EntityParser {
    registry: Arc<EntityRegistry>,
}

impl EntityParser {
    pub fn new(registry: Arc<EntityRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Middleware<ApiCtx> for EntityParser {
    async fn handle(&self, ctx: &mut ApiCtx, next: Next<'_, ApiCtx>) -> Result<()> {
        next.run(ctx).await?;

        let Some(response) = &ctx.response else {
            return Ok(());
        };
        if !response.ok {
            return Ok(());
        }

        let actions = parse_embedded(&response.data, &self.registry);
        ctx.actions.extend(actions);
        Ok(())
    }
}

/// Resolves the full request URL for the pipeline's endpoint category and
/// pins the content type the platform's APIs speak.
pub struct UrlBuilder {
    env: Env,
    endpoint: EndpointKind,
}

impl UrlBuilder {
    pub fn new(env: Env, endpoint: EndpointKind) -> Self {
        Self { env, endpoint }
    }
}

#[async_trait]
impl Middleware<ApiCtx> for UrlBuilder {
    async fn handle(&self, ctx: &mut ApiCtx, next: Next<'_, ApiCtx>) -> Result<()> {
        ctx.request.url = self.env.resolve(self.endpoint, &ctx.request.url);
        ctx.request
            .headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/hal+json"));
        next.run(ctx).await
    }
}

/// Best-effort bearer-token attachment: an absent token means the request
/// goes out unauthenticated, it never fails the dispatch.
pub struct TokenAttach {
    tokens: Arc<dyn TokenProvider>,
}

impl TokenAttach {
    pub fn new(tokens: Arc<dyn TokenProvider>) -> Self {
        Self { tokens }
    }
}

fn attach_bearer(ctx: &mut ApiCtx, token: &str) {
    match HeaderValue::from_str(&format!("Bearer {token}")) {
        Ok(value) => {
            ctx.request.headers.insert(AUTHORIZATION, value);
        }
        Err(_) => {
            tracing::debug!(route = %ctx.name, "token not header-safe, skipping");
        }
    }
}

#[async_trait]
impl Middleware<ApiCtx> for TokenAttach {
    async fn handle(&self, ctx: &mut ApiCtx, next: Next<'_, ApiCtx>) -> Result<()> {
        if let Some(token) = self.tokens.current_token().await {
            attach_bearer(ctx, &token);
        }
        next.run(ctx).await
    }
}

/// Auth-pipeline-only stage: swaps in the elevated token when the context is
/// flagged elevated. The provider is not consulted otherwise.
pub struct ElevatedTokenAttach {
    tokens: Arc<dyn TokenProvider>,
}

impl ElevatedTokenAttach {
    pub fn new(tokens: Arc<dyn TokenProvider>) -> Self {
        Self { tokens }
    }
}

#[async_trait]
impl Middleware<ApiCtx> for ElevatedTokenAttach {
    async fn handle(&self, ctx: &mut ApiCtx, next: Next<'_, ApiCtx>) -> Result<()> {
        if !ctx.elevated {
            return next.run(ctx).await;
        }

        if let Some(token) = self.tokens.elevated_token().await {
            attach_bearer(ctx, &token);
        }
        next.run(ctx).await
    }
}

/// Terminal stage: performs the network call. Transport and HTTP failures are
/// resolved into `ok: false` responses with an error payload, never raised.
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Middleware<ApiCtx> for Fetcher {
    async fn handle(&self, ctx: &mut ApiCtx, next: Next<'_, ApiCtx>) -> Result<()> {
        let mut request = self
            .client
            .request(ctx.request.method.clone(), &ctx.request.url)
            .headers(ctx.request.headers.clone());

        if let Some(body) = &ctx.request.body {
            request = request.body(body.clone());
        }

        ctx.response = Some(match request.send().await {
            Ok(response) => {
                let status = response.status();
                match response.text().await {
                    Ok(text) => build_response(status.as_u16(), status.is_success(), &text),
                    Err(err) => transport_failure(&err),
                }
            }
            Err(err) => transport_failure(&err),
        });

        next.run(ctx).await
    }
}

fn build_response(status: u16, mut ok: bool, body: &str) -> ApiResponse {
    let data = if body.is_empty() {
        Value::Null
    } else {
        match serde_json::from_str(body) {
            Ok(value) => value,
            Err(err) => {
                ok = false;
                json!({ "message": format!("invalid JSON response: {err}") })
            }
        }
    };

    ApiResponse {
        ok,
        status: Some(status),
        data,
    }
}

fn transport_failure(err: &reqwest::Error) -> ApiResponse {
    tracing::debug!(error = %err, "transport failure");
    ApiResponse {
        ok: false,
        status: None,
        data: json!({ "message": err.to_string() }),
    }
}
