//! Normalized Entity Store
//!
//! Flat per-type tables of entities keyed by id. The store is never mutated
//! directly: the pipelines accumulate [`Action`]s on their context and a
//! dispatch stage applies the whole batch serially, so writers are
//! effectively single-file.

use crate::token::{Token, TokenStore};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

/// A store mutation produced by a pipeline stage or a task.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Upsert a batch of entities into one table. One action per entity type
    /// per response, not one per entity.
    SaveEntities {
        table: String,
        entities: BTreeMap<String, Value>,
    },
    SetToken(Token),
    SetElevatedToken(Token),
    ResetToken,
}

/// Application state container: entity tables plus the token slice.
pub struct Store {
    tables: RwLock<HashMap<String, BTreeMap<String, Value>>>,
    tokens: Arc<TokenStore>,
}

impl Store {
    pub fn new(tokens: Arc<TokenStore>) -> Arc<Self> {
        Arc::new(Self {
            tables: RwLock::new(HashMap::new()),
            tokens,
        })
    }

    /// Apply a batch of actions. Entity writes for the whole batch happen
    /// under a single write lock.
    pub async fn dispatch_all(&self, actions: Vec<Action>) {
        if actions.is_empty() {
            return;
        }

        let mut tables = self.tables.write().await;
        for action in actions {
            match action {
                Action::SaveEntities { table, entities } => {
                    tracing::debug!("save {} entities into {}", entities.len(), table);
                    tables.entry(table).or_default().extend(entities);
                }
                Action::SetToken(token) => self.tokens.set_current(token).await,
                Action::SetElevatedToken(token) => self.tokens.set_elevated(token).await,
                Action::ResetToken => self.tokens.reset().await,
            }
        }
    }

    /// Snapshot of one entity table.
    pub async fn table(&self, name: &str) -> BTreeMap<String, Value> {
        let tables = self.tables.read().await;
        tables.get(name).cloned().unwrap_or_default()
    }

    pub async fn find_by_id(&self, table: &str, id: &str) -> Option<Value> {
        let tables = self.tables.read().await;
        tables.get(table).and_then(|t| t.get(id)).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_save_entities_batches_into_table() {
        let store = Store::new(TokenStore::new());

        let mut entities = BTreeMap::new();
        entities.insert("1".to_string(), json!({"id": "1", "handle": "web"}));
        entities.insert("2".to_string(), json!({"id": "2", "handle": "worker"}));

        store
            .dispatch_all(vec![Action::SaveEntities {
                table: "apps".to_string(),
                entities,
            }])
            .await;

        assert_eq!(store.table("apps").await.len(), 2);
        assert_eq!(
            store.find_by_id("apps", "1").await.unwrap()["handle"],
            "web"
        );
    }

    #[tokio::test]
    async fn test_save_overwrites_existing_ids() {
        let store = Store::new(TokenStore::new());

        let mut first = BTreeMap::new();
        first.insert("1".to_string(), json!({"id": "1", "handle": "old"}));
        let mut second = BTreeMap::new();
        second.insert("1".to_string(), json!({"id": "1", "handle": "new"}));

        store
            .dispatch_all(vec![Action::SaveEntities {
                table: "apps".to_string(),
                entities: first,
            }])
            .await;
        store
            .dispatch_all(vec![Action::SaveEntities {
                table: "apps".to_string(),
                entities: second,
            }])
            .await;

        assert_eq!(store.table("apps").await.len(), 1);
        assert_eq!(
            store.find_by_id("apps", "1").await.unwrap()["handle"],
            "new"
        );
    }

    #[tokio::test]
    async fn test_token_actions_route_to_token_store() {
        let tokens = TokenStore::new();
        let store = Store::new(tokens.clone());

        store
            .dispatch_all(vec![Action::SetToken(Token::new("1", "abc"))])
            .await;
        assert_eq!(tokens.current().await.unwrap().access_token, "abc");

        store.dispatch_all(vec![Action::ResetToken]).await;
        assert!(tokens.current().await.is_none());
    }
}
