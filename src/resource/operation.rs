//! Operation Resources
//!
//! Long-running platform operations (scale, restart, provision) and the
//! cooperative poll loop that keeps their status fresh. Cancelling a poll
//! stops future iterations; an in-flight request is always allowed to finish.

use crate::api::Api;
use crate::hal::{
    extract_id_from_link, extract_resource_name_from_link, EntityDescriptor, HalHref,
    NormalizedEntity,
};
use crate::thunk::{Task, ThunkCtx};
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

pub const OPERATIONS_TABLE: &str = "operations";

pub const FETCH_OPERATION: &str = "GET /operations/:id";
pub const FETCH_SERVICE_OPERATIONS: &str = "GET /services/:id/operations?page=:page";

/// Thunk name for the service-operation poll loop.
pub const POLL_SERVICE_OPERATIONS: &str = "poll-service-operations";

/// Interval between poll iterations.
pub const POLL_INTERVAL: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Deserialize, Default)]
struct OperationResponseLinks {
    #[serde(default)]
    resource: Option<HalHref>,
    #[serde(default)]
    account: Option<HalHref>,
}

#[derive(Debug, Clone, Deserialize)]
struct OperationResponse {
    id: u64,
    #[serde(default, rename = "type")]
    operation_type: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    created_at: String,
    #[serde(default)]
    updated_at: String,
    #[serde(default, rename = "_links")]
    links: OperationResponseLinks,
}

/// Normalized operation entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DeployOperation {
    pub id: String,
    pub operation_type: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
    pub resource_id: String,
    pub resource_type: String,
    pub environment_id: String,
}

pub fn deserialize_operation(raw: &Value) -> Option<NormalizedEntity> {
    let response: OperationResponse = serde_json::from_value(raw.clone()).ok()?;
    let operation = DeployOperation {
        id: response.id.to_string(),
        operation_type: response.operation_type,
        status: response.status,
        created_at: response.created_at,
        updated_at: response.updated_at,
        resource_id: extract_id_from_link(response.links.resource.as_ref()),
        resource_type: extract_resource_name_from_link(response.links.resource.as_ref()),
        environment_id: extract_id_from_link(response.links.account.as_ref()),
    };
    NormalizedEntity::from_serialize(&operation.id, &operation)
}

pub fn entities() -> Vec<EntityDescriptor> {
    vec![EntityDescriptor::new(
        "operation",
        OPERATIONS_TABLE,
        deserialize_operation,
    )]
}

pub async fn register_routes(api: &Api) {
    api.get("/operations/:id").await;
    api.get("/services/:id/operations?page=:page").await;
}

/// Externally triggerable cancellation for the poll family. Each poll run
/// takes a fresh token; `cancel` stops the run currently holding it.
#[derive(Default)]
pub struct PollHandle {
    token: RwLock<CancellationToken>,
}

impl PollHandle {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Cancel the active poll loop.
    pub async fn cancel(&self) {
        self.token.read().await.cancel();
    }

    /// Replace the token for a new poll run and return it.
    pub async fn reset(&self) -> CancellationToken {
        let fresh = CancellationToken::new();
        let mut token = self.token.write().await;
        *token = fresh.clone();
        fresh
    }
}

/// Repeatedly fetch the first page of a service's operations until cancelled.
/// Cancellation is checked between iterations only.
pub async fn poll_service_operations(
    api: &Api,
    service_id: &str,
    interval: Duration,
    cancel: CancellationToken,
) -> Result<()> {
    loop {
        if cancel.is_cancelled() {
            break;
        }

        api.dispatch(
            FETCH_SERVICE_OPERATIONS,
            json!({ "id": service_id, "page": 1 }),
        )
        .await?;

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }

    tracing::debug!(service_id, "operation poll stopped");
    Ok(())
}

/// Thunk wrapper around [`poll_service_operations`]; payload carries the
/// service id.
pub struct PollServiceOperationsTask {
    pub api: Arc<Api>,
    pub poll: Arc<PollHandle>,
    pub interval: Duration,
}

#[async_trait]
impl Task for PollServiceOperationsTask {
    async fn run(&self, ctx: &mut ThunkCtx) -> Result<()> {
        let service_id = ctx
            .payload
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let cancel = self.poll.reset().await;
        poll_service_operations(&self.api, &service_id, self.interval, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_operation_resource_links() {
        let raw = json!({
            "id": 101,
            "type": "scale",
            "status": "queued",
            "_links": {
                "resource": {"href": "https://api.test/services/5"},
                "account": {"href": "https://api.test/accounts/42"}
            },
            "_type": "operation"
        });

        let entity = deserialize_operation(&raw).unwrap();
        assert_eq!(entity.id, "101");
        assert_eq!(entity.value["operation_type"], "scale");
        assert_eq!(entity.value["resource_id"], "5");
        assert_eq!(entity.value["resource_type"], "services");
        assert_eq!(entity.value["environment_id"], "42");
    }

    #[tokio::test]
    async fn test_poll_handle_reset_detaches_old_token() {
        let handle = PollHandle::new();
        let first = handle.reset().await;
        handle.cancel().await;
        assert!(first.is_cancelled());

        let second = handle.reset().await;
        assert!(!second.is_cancelled());
    }
}
