//! Database Resources

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

pub const DATABASES_TABLE: &str = "databases";

pub const FETCH_DATABASES: &str = "GET /databases?page=:page";
pub const FETCH_DATABASE: &str = "GET /databases/:id";

pub const FETCH_ALL_DATABASES: &str = "fetch-all-databases";

#[derive(Debug, Clone, Deserialize, Default)]
struct DatabaseResponseLinks {
    #[serde(default)]
    account: Option<HalHref>,
    #[serde(default)]
    service: Option<HalHref>,
}

#[derive(Debug, Clone, Deserialize)]
struct DatabaseResponse {
    id: u64,
    #[serde(default)]
    handle: String,
    #[serde(default, rename = "type")]
    database_type: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    created_at: String,
    #[serde(default)]
    updated_at: String,
    #[serde(default, rename = "_links")]
    links: DatabaseResponseLinks,
}

/// Normalized database entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DeployDatabase {
    pub id: String,
    pub handle: String,
    pub database_type: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
    pub environment_id: String,
    pub service_id: String,
}

pub fn deserialize_database(raw: &Value) -> Option<NormalizedEntity> {
    let response: DatabaseResponse = serde_json::from_value(raw.clone()).ok()?;
    let database = DeployDatabase {
        id: response.id.to_string(),
        handle: response.handle,
        database_type: response.database_type,
        status: response.status,
        created_at: response.created_at,
        updated_at: response.updated_at,
        environment_id: extract_id_from_link(response.links.account.as_ref()),
        service_id: extract_id_from_link(response.links.service.as_ref()),
    };
    NormalizedEntity::from_serialize(&database.id, &database)
}

pub fn entities() -> Vec<EntityDescriptor> {
    vec![EntityDescriptor::new(
        "database",
        DATABASES_TABLE,
        deserialize_database,
    )]
}

pub async fn register_routes(api: &Api) {
    api.get("/databases?page=:page").await;
    api.get("/databases/:id").await;
}

/// Fetch every page of databases.
pub async fn fetch_all_databases(api: &Api, loaders: &LoaderStore) -> Result<()> {
    combine_pages(loaders, FETCH_ALL_DATABASES, |page| {
        api.dispatch(FETCH_DATABASES, json!({ "page": page }))
    })
    .await
}

/// Thunk wrapper around [`fetch_all_databases`].
pub struct FetchAllDatabasesTask {
    pub api: Arc<Api>,
    pub loaders: Arc<LoaderStore>,
}

#[async_trait]
impl Task for FetchAllDatabasesTask {
    async fn run(&self, _ctx: &mut ThunkCtx) -> Result<()> {
        fetch_all_databases(&self.api, &self.loaders).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_database() {
        let raw = json!({
            "id": 10,
            "handle": "primary-db",
            "type": "postgresql",
            "status": "provisioned",
            "_links": {
                "account": {"href": "https://api.test/accounts/42"},
                "service": {"href": "https://api.test/services/5"}
            },
            "_type": "database"
        });

        let entity = deserialize_database(&raw).unwrap();
        assert_eq!(entity.id, "10");
        assert_eq!(entity.value["database_type"], "postgresql");
        assert_eq!(entity.value["environment_id"], "42");
        assert_eq!(entity.value["service_id"], "5");
    }
}
