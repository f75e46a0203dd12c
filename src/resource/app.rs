//! App Resources

use crate::api::Api;
use crate::hal::{extract_id_from_link, EntityDescriptor, HalHref, NormalizedEntity};
use crate::loader::LoaderStore;
use crate::pagination::combine_pages;
use crate::thunk::{Task, ThunkCtx};
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

pub const APPS_TABLE: &str = "apps";

pub const FETCH_APPS: &str = "GET /apps?page=:page";
pub const FETCH_APP: &str = "GET /apps/:id";

/// Thunk and loader id for the paginated fetch-all flow.
pub const FETCH_ALL_APPS: &str = "fetch-all-apps";

#[derive(Debug, Clone, Deserialize, Default)]
struct AppResponseLinks {
    #[serde(default)]
    account: Option<HalHref>,
    #[serde(default)]
    current_configuration: Option<HalHref>,
}

#[derive(Debug, Clone, Deserialize)]
struct AppResponse {
    id: u64,
    #[serde(default)]
    handle: String,
    #[serde(default)]
    git_repo: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    created_at: String,
    #[serde(default)]
    updated_at: String,
    #[serde(default, rename = "_links")]
    links: AppResponseLinks,
}

/// Normalized app entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DeployApp {
    pub id: String,
    pub handle: String,
    pub git_repo: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
    pub environment_id: String,
    pub current_configuration_id: String,
}

pub fn deserialize_app(raw: &Value) -> Option<NormalizedEntity> {
    let response: AppResponse = serde_json::from_value(raw.clone()).ok()?;
    let app = DeployApp {
        id: response.id.to_string(),
        handle: response.handle,
        git_repo: response.git_repo,
        status: response.status,
        created_at: response.created_at,
        updated_at: response.updated_at,
        environment_id: extract_id_from_link(response.links.account.as_ref()),
        current_configuration_id: extract_id_from_link(
            response.links.current_configuration.as_ref(),
        ),
    };
    NormalizedEntity::from_serialize(&app.id, &app)
}

pub fn entities() -> Vec<EntityDescriptor> {
    vec![EntityDescriptor::new("app", APPS_TABLE, deserialize_app)]
}

pub async fn register_routes(api: &Api) {
    api.get("/apps?page=:page").await;
    api.get("/apps/:id").await;
}

/// Fetch every page of apps.
pub async fn fetch_all_apps(api: &Api, loaders: &LoaderStore) -> Result<()> {
    combine_pages(loaders, FETCH_ALL_APPS, |page| {
        api.dispatch(FETCH_APPS, json!({ "page": page }))
    })
    .await
}

/// Thunk wrapper around [`fetch_all_apps`].
pub struct FetchAllAppsTask {
    pub api: Arc<Api>,
    pub loaders: Arc<LoaderStore>,
}

#[async_trait]
impl Task for FetchAllAppsTask {
    async fn run(&self, _ctx: &mut ThunkCtx) -> Result<()> {
        fetch_all_apps(&self.api, &self.loaders).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_app_extracts_links() {
        let raw = json!({
            "id": 7,
            "handle": "web",
            "git_repo": "git@example.com:web.git",
            "status": "provisioned",
            "created_at": "2023-01-15T10:30:00Z",
            "updated_at": "2023-01-16T10:30:00Z",
            "_links": {
                "account": {"href": "https://api.test/accounts/42"},
                "current_configuration": {"href": "https://api.test/configurations/9"}
            },
            "_type": "app"
        });

        let entity = deserialize_app(&raw).unwrap();
        assert_eq!(entity.id, "7");
        assert_eq!(entity.value["environment_id"], "42");
        assert_eq!(entity.value["current_configuration_id"], "9");
        assert_eq!(entity.value["handle"], "web");
    }

    #[test]
    fn test_deserialize_app_without_links() {
        let raw = json!({"id": 7, "handle": "web"});
        let entity = deserialize_app(&raw).unwrap();
        assert_eq!(entity.value["environment_id"], "");
    }

    #[test]
    fn test_deserialize_app_requires_id() {
        assert!(deserialize_app(&json!({"handle": "web"})).is_none());
    }
}
