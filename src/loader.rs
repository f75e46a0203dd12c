//! Loader State
//!
//! Tracks per-id loading state for UI loader widgets and keeps a bounded
//! history of emitted events. Failures reach the UI exclusively through
//! loader messages, never as raw errors.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use tokio::sync::RwLock;

/// Maximum loader events to keep in history
const MAX_HISTORY: usize = 100;

/// Status of a tracked loader
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoaderStatus {
    #[default]
    Idle,
    Loading,
    Error(String),
    Success,
}

impl LoaderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Error(_))
    }
}

/// Current state of one loader id
#[derive(Debug, Clone, Default)]
pub struct LoaderState {
    pub status: LoaderStatus,
    pub last_run: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
}

/// A single emitted loader event (recent first in history)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderEvent {
    pub id: String,
    pub status: LoaderStatus,
    pub at: DateTime<Utc>,
}

/// Loader state store
#[derive(Default)]
pub struct LoaderStore {
    states: RwLock<HashMap<String, LoaderState>>,
    history: RwLock<VecDeque<LoaderEvent>>,
}

impl LoaderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn start(&self, id: &str) {
        self.transition(id, LoaderStatus::Loading).await;
    }

    pub async fn error(&self, id: &str, message: &str) {
        self.transition(id, LoaderStatus::Error(message.to_string()))
            .await;
    }

    pub async fn success(&self, id: &str) {
        self.transition(id, LoaderStatus::Success).await;
    }

    pub async fn get(&self, id: &str) -> LoaderState {
        let states = self.states.read().await;
        states.get(id).cloned().unwrap_or_default()
    }

    /// Events recorded for one loader id, oldest first.
    pub async fn events_for(&self, id: &str) -> Vec<LoaderEvent> {
        let history = self.history.read().await;
        history.iter().filter(|e| e.id == id).cloned().collect()
    }

    async fn transition(&self, id: &str, status: LoaderStatus) {
        let now = Utc::now();

        {
            let mut states = self.states.write().await;
            let state = states.entry(id.to_string()).or_default();
            if status == LoaderStatus::Loading {
                state.last_run = Some(now);
            }
            if status == LoaderStatus::Success {
                state.last_success = Some(now);
            }
            state.status = status.clone();
        }

        let mut history = self.history.write().await;
        history.push_back(LoaderEvent {
            id: id.to_string(),
            status,
            at: now,
        });
        while history.len() > MAX_HISTORY {
            history.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_loader_lifecycle() {
        let loaders = LoaderStore::new();

        assert_eq!(loaders.get("certs").await.status, LoaderStatus::Idle);

        loaders.start("certs").await;
        let state = loaders.get("certs").await;
        assert_eq!(state.status, LoaderStatus::Loading);
        assert!(state.last_run.is_some());
        assert!(state.last_success.is_none());

        loaders.success("certs").await;
        let state = loaders.get("certs").await;
        assert_eq!(state.status, LoaderStatus::Success);
        assert!(state.last_success.is_some());
    }

    #[tokio::test]
    async fn test_error_carries_message() {
        let loaders = LoaderStore::new();
        loaders.start("auth").await;
        loaders.error("auth", "boom").await;

        assert_eq!(
            loaders.get("auth").await.status,
            LoaderStatus::Error("boom".to_string())
        );
        let events = loaders.events_for("auth").await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].status, LoaderStatus::Error("boom".to_string()));
    }

    #[tokio::test]
    async fn test_history_is_bounded() {
        let loaders = LoaderStore::new();
        for i in 0..(MAX_HISTORY + 20) {
            loaders.start(&format!("id-{i}")).await;
        }
        let history = loaders.history.read().await;
        assert_eq!(history.len(), MAX_HISTORY);
    }
}
