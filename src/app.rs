//! Application Assembly
//!
//! Wires the stores, registries, pipelines, and tasks into one client. The
//! entity registry is built once here and handed to both pipelines; tasks
//! are registered with the handles they capture at construction.

use crate::api::Api;
use crate::auth::{self, ElevateTask};
use crate::bootup::{self, BootupTask};
use crate::env::{EndpointKind, Env};
use crate::hal::EntityRegistry;
use crate::loader::LoaderStore;
use crate::resource::{
    self,
    app::{FetchAllAppsTask, FETCH_ALL_APPS},
    certificate::{FetchAllCertificatesTask, FETCH_ALL_CERTIFICATES},
    database::{FetchAllDatabasesTask, FETCH_ALL_DATABASES},
    operation::{PollHandle, PollServiceOperationsTask, POLL_INTERVAL, POLL_SERVICE_OPERATIONS},
};
use crate::store::Store;
use crate::thunk::{ThunkCtx, Thunks};
use crate::token::TokenStore;
use anyhow::Result;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Throttle window for the certificate fetch-all thunk.
const CERTS_THROTTLE: Duration = Duration::from_secs(5);

/// The assembled client: stores, both request pipelines, and the thunk
/// pipeline with every task registered.
pub struct App {
    pub env: Env,
    pub tokens: Arc<TokenStore>,
    pub store: Arc<Store>,
    pub loaders: Arc<LoaderStore>,
    pub api: Arc<Api>,
    pub auth_api: Arc<Api>,
    pub thunks: Arc<Thunks>,
    pub poll: Arc<PollHandle>,
    rehydrated: watch::Sender<bool>,
}

impl App {
    pub async fn new(env: Env) -> Result<Self> {
        let tokens = TokenStore::new();
        let store = Store::new(tokens.clone());
        let loaders = Arc::new(LoaderStore::new());

        let mut registry = EntityRegistry::new();
        registry.register_all(resource::entities());
        let registry = Arc::new(registry);

        let api = Arc::new(Api::new(
            EndpointKind::Api,
            env.clone(),
            tokens.clone(),
            registry.clone(),
            store.clone(),
        )?);
        let auth_api = Arc::new(Api::new(
            EndpointKind::Auth,
            env.clone(),
            tokens.clone(),
            registry,
            store.clone(),
        )?);

        resource::register_routes(&api).await;
        auth::register_routes(&auth_api).await;

        let thunks = Arc::new(Thunks::new(store.clone(), loaders.clone()));
        let poll = PollHandle::new();
        let (rehydrated, rehydrated_rx) = watch::channel(false);

        thunks
            .create(
                auth::ELEVATE,
                Arc::new(ElevateTask {
                    auth_api: auth_api.clone(),
                    loaders: loaders.clone(),
                }),
            )
            .await;
        thunks
            .create(
                bootup::BOOTUP,
                Arc::new(BootupTask {
                    auth_api: auth_api.clone(),
                    api: api.clone(),
                    tokens: tokens.clone(),
                    loaders: loaders.clone(),
                    rehydrated: rehydrated_rx,
                }),
            )
            .await;
        thunks
            .create(
                FETCH_ALL_APPS,
                Arc::new(FetchAllAppsTask {
                    api: api.clone(),
                    loaders: loaders.clone(),
                }),
            )
            .await;
        thunks
            .create(
                FETCH_ALL_DATABASES,
                Arc::new(FetchAllDatabasesTask {
                    api: api.clone(),
                    loaders: loaders.clone(),
                }),
            )
            .await;
        thunks
            .create_throttled(
                FETCH_ALL_CERTIFICATES,
                CERTS_THROTTLE,
                Arc::new(FetchAllCertificatesTask {
                    api: api.clone(),
                    loaders: loaders.clone(),
                }),
            )
            .await;
        thunks
            .create(
                POLL_SERVICE_OPERATIONS,
                Arc::new(PollServiceOperationsTask {
                    api: api.clone(),
                    poll: poll.clone(),
                    interval: POLL_INTERVAL,
                }),
            )
            .await;

        Ok(Self {
            env,
            tokens,
            store,
            loaders,
            api,
            auth_api,
            thunks,
            poll,
            rehydrated,
        })
    }

    /// Signal that persisted state has been restored. Bootup blocks on this.
    pub fn signal_rehydrated(&self) {
        let _ = self.rehydrated.send(true);
    }

    /// Run the bootstrap flow.
    pub async fn bootup(&self) -> Result<ThunkCtx> {
        self.thunks.run(bootup::BOOTUP, Value::Null).await
    }

    /// Stop the active operation poll loop.
    pub async fn cancel_poll(&self) {
        self.poll.cancel().await;
    }
}
