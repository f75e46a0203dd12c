//! App Configuration Resources

use crate::api::Api;
use crate::hal::{extract_id_from_link, EntityDescriptor, HalHref, NormalizedEntity};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub const APP_CONFIGS_TABLE: &str = "app_configs";

pub const FETCH_CONFIGURATION: &str = "GET /configurations/:id";

#[derive(Debug, Clone, Deserialize, Default)]
struct ConfigurationResponseLinks {
    #[serde(default)]
    resource: Option<HalHref>,
}

#[derive(Debug, Clone, Deserialize)]
struct ConfigurationResponse {
    id: u64,
    /// The variable map; values may be explicitly null, which is how the
    /// server expresses removal.
    #[serde(default)]
    env: Option<BTreeMap<String, Option<String>>>,
    #[serde(default, rename = "_links")]
    links: ConfigurationResponseLinks,
}

/// Normalized app configuration entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DeployAppConfig {
    pub id: String,
    pub env: BTreeMap<String, Option<String>>,
    pub app_id: String,
}

pub fn deserialize_app_config(raw: &Value) -> Option<NormalizedEntity> {
    let response: ConfigurationResponse = serde_json::from_value(raw.clone()).ok()?;
    let config = DeployAppConfig {
        id: response.id.to_string(),
        env: response.env.unwrap_or_default(),
        app_id: extract_id_from_link(response.links.resource.as_ref()),
    };
    NormalizedEntity::from_serialize(&config.id, &config)
}

pub fn entities() -> Vec<EntityDescriptor> {
    vec![EntityDescriptor::new(
        "configuration",
        APP_CONFIGS_TABLE,
        deserialize_app_config,
    )]
}

pub async fn register_routes(api: &Api) {
    api.get("/configurations/:id").await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_config_links_app() {
        let raw = json!({
            "id": 9,
            "env": {"DATABASE_URL": "postgres://db", "REMOVED": null},
            "_links": {
                "resource": {"href": "https://api.test/apps/7"}
            },
            "_type": "configuration"
        });

        let entity = deserialize_app_config(&raw).unwrap();
        assert_eq!(entity.id, "9");
        assert_eq!(entity.value["app_id"], "7");
        assert_eq!(entity.value["env"]["DATABASE_URL"], "postgres://db");
        assert_eq!(entity.value["env"]["REMOVED"], Value::Null);
    }

    #[test]
    fn test_deserialize_config_null_env_defaults_empty() {
        let raw = json!({"id": 9, "env": null});
        let entity = deserialize_app_config(&raw).unwrap();
        assert_eq!(entity.value["env"], json!({}));
    }
}
