//! Bootstrap Sequencing
//!
//! First-load orchestration: wait for the persisted store to rehydrate,
//! restore the session token, and only then fan out the initial resource
//! fetches. An unauthenticated session stops after the token check.

use crate::api::Api;
use crate::auth;
use crate::loader::LoaderStore;
use crate::resource::{app, database};
use crate::thunk::{Task, ThunkCtx};
use crate::token::TokenStore;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;

/// Thunk name for the bootstrap flow.
pub const BOOTUP: &str = "bootup";

pub struct BootupTask {
    pub auth_api: Arc<Api>,
    pub api: Arc<Api>,
    pub tokens: Arc<TokenStore>,
    pub loaders: Arc<LoaderStore>,
    pub rehydrated: watch::Receiver<bool>,
}

#[async_trait]
impl Task for BootupTask {
    async fn run(&self, _ctx: &mut ThunkCtx) -> Result<()> {
        let mut rehydrated = self.rehydrated.clone();
        rehydrated
            .wait_for(|done| *done)
            .await
            .context("rehydration signal dropped")?;

        self.auth_api
            .dispatch(auth::FETCH_CURRENT_TOKEN, Value::Null)
            .await?;
        if self.tokens.current().await.is_none() {
            tracing::debug!("no session token, skipping initial fetches");
            return Ok(());
        }

        let apps = app::fetch_all_apps(&self.api, &self.loaders);
        let databases = database::fetch_all_databases(&self.api, &self.loaders);
        let (apps, databases) = tokio::join!(apps, databases);
        apps?;
        databases?;
        Ok(())
    }
}
