//! Auth Flows
//!
//! Token endpoints on the auth pipeline plus the elevation thunk. Elevation
//! exchanges the session credentials for a short-lived higher-privilege
//! token; the endpoint runs with the context flagged elevated so the
//! elevated-token stage takes over header attachment.

use crate::api::{Api, ApiCtx, Middleware, Next};
use crate::loader::LoaderStore;
use crate::store::Action;
use crate::thunk::{Task, ThunkCtx};
use crate::token::Token;
use anyhow::Result;
use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use std::sync::Arc;

/// Loader id shared by the auth flows.
pub const AUTH_LOADER_ID: &str = "auth";

pub const FETCH_CURRENT_TOKEN: &str = "GET /current_token";
pub const CREATE_TOKEN: &str = "POST /tokens";
pub const ELEVATE_TOKEN: &str = "POST /tokens#elevate";
pub const LOGOUT: &str = "DELETE /tokens/:id";

/// Thunk name for the elevation flow.
pub const ELEVATE: &str = "elevate";

#[derive(Debug, Clone, Deserialize, Default)]
struct TokenResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    access_token: String,
}

fn token_from_response(ctx: &ApiCtx) -> Option<Token> {
    let response = ctx.response.as_ref()?;
    if !response.ok {
        return None;
    }
    let parsed: TokenResponse = serde_json::from_value(response.data.clone()).ok()?;
    if parsed.access_token.is_empty() {
        return None;
    }
    Some(Token::new(&parsed.id, &parsed.access_token))
}

/// Route middleware for the token-issuing endpoints: sends the payload as the
/// request body and saves the returned token on success.
struct TokenRoute {
    elevated: bool,
    send_payload: bool,
}

#[async_trait]
impl Middleware<ApiCtx> for TokenRoute {
    async fn handle(&self, ctx: &mut ApiCtx, next: Next<'_, ApiCtx>) -> Result<()> {
        if self.elevated {
            ctx.elevated = true;
        }
        if self.send_payload {
            ctx.request.body = Some(ctx.payload.to_string());
        }

        next.run(ctx).await?;

        if let Some(token) = token_from_response(ctx) {
            let action = if self.elevated {
                Action::SetElevatedToken(token)
            } else {
                Action::SetToken(token)
            };
            ctx.actions.push(action);
        }
        Ok(())
    }
}

/// Route middleware for logout: the local session is reset once the server
/// has seen the delete.
struct LogoutRoute;

#[async_trait]
impl Middleware<ApiCtx> for LogoutRoute {
    async fn handle(&self, ctx: &mut ApiCtx, next: Next<'_, ApiCtx>) -> Result<()> {
        next.run(ctx).await?;
        ctx.actions.push(Action::ResetToken);
        Ok(())
    }
}

/// Register the auth endpoints on the auth pipeline.
pub async fn register_routes(auth_api: &Api) {
    auth_api
        .register(
            Method::GET,
            "/current_token",
            Arc::new(TokenRoute {
                elevated: false,
                send_payload: false,
            }),
        )
        .await;
    auth_api
        .register(
            Method::POST,
            "/tokens",
            Arc::new(TokenRoute {
                elevated: false,
                send_payload: true,
            }),
        )
        .await;
    auth_api
        .register(
            Method::POST,
            "/tokens#elevate",
            Arc::new(TokenRoute {
                elevated: true,
                send_payload: true,
            }),
        )
        .await;
    auth_api
        .register(Method::DELETE, "/tokens/:id", Arc::new(LogoutRoute))
        .await;
}

/// Elevation thunk: loader start, token exchange, loader error or success.
pub struct ElevateTask {
    pub auth_api: Arc<Api>,
    pub loaders: Arc<LoaderStore>,
}

#[async_trait]
impl Task for ElevateTask {
    async fn run(&self, ctx: &mut ThunkCtx) -> Result<()> {
        self.loaders.start(AUTH_LOADER_ID).await;

        let token_ctx = self
            .auth_api
            .dispatch(ELEVATE_TOKEN, ctx.payload.clone())
            .await?;

        match token_ctx.response {
            Some(response) if response.ok => {
                self.loaders.success(AUTH_LOADER_ID).await;
            }
            Some(response) => {
                self.loaders
                    .error(AUTH_LOADER_ID, &response.error_message())
                    .await;
            }
            None => {
                self.loaders.error(AUTH_LOADER_ID, "request failed").await;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_token_from_response_requires_ok() {
        let mut ctx = ApiCtx::new(CREATE_TOKEN, json!({}));
        assert!(token_from_response(&ctx).is_none());

        ctx.response = Some(crate::api::ApiResponse {
            ok: false,
            status: Some(401),
            data: json!({"id": "1", "access_token": "abc"}),
        });
        assert!(token_from_response(&ctx).is_none());

        ctx.response = Some(crate::api::ApiResponse {
            ok: true,
            status: Some(200),
            data: json!({"id": "1", "access_token": "abc", "_type": "token"}),
        });
        let token = token_from_response(&ctx).unwrap();
        assert_eq!(token.access_token, "abc");
    }
}
