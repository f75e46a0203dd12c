//! Thunk Pipeline
//!
//! A second, simpler middleware chain for multi-step orchestration that is
//! not itself an HTTP call: login elevation, bootstrap sequencing, polling.
//! Stage order is error boundary -> batched action dispatcher -> named-task
//! dispatch. A task runs to completion or early-returns; it may push actions
//! onto its context and await endpoint dispatches directly.

use crate::api::{Middleware, Next, Stack};
use crate::loader::LoaderStore;
use crate::store::{Action, Store};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Per-run task context.
#[derive(Debug, Default)]
pub struct ThunkCtx {
    pub name: String,
    pub payload: Value,
    pub actions: Vec<Action>,
}

impl ThunkCtx {
    pub fn new(name: &str, payload: Value) -> Self {
        Self {
            name: name.to_string(),
            payload,
            actions: Vec::new(),
        }
    }

    /// Queue an action for the dispatcher stage.
    pub fn put(&mut self, action: Action) {
        self.actions.push(action);
    }
}

/// A named orchestration task.
#[async_trait]
pub trait Task: Send + Sync {
    async fn run(&self, ctx: &mut ThunkCtx) -> Result<()>;
}

struct TaskEntry {
    task: Arc<dyn Task>,
    /// Minimum interval between runs; dispatches inside the window are
    /// skipped.
    throttle: Option<Duration>,
}

#[derive(Default)]
struct TaskTable {
    tasks: RwLock<HashMap<String, TaskEntry>>,
    last_runs: RwLock<HashMap<String, Instant>>,
}

/// Outermost stage: converts downstream task errors into loader-error events
/// instead of letting them propagate out of the pipeline.
struct ErrorBoundary {
    loaders: Arc<LoaderStore>,
}

#[async_trait]
impl Middleware<ThunkCtx> for ErrorBoundary {
    async fn handle(&self, ctx: &mut ThunkCtx, next: Next<'_, ThunkCtx>) -> Result<()> {
        match next.run(ctx).await {
            Ok(()) => Ok(()),
            Err(err) => {
                tracing::error!(task = %ctx.name, error = %err, "task failed");
                self.loaders.error(&ctx.name, &err.to_string()).await;
                Ok(())
            }
        }
    }
}

/// Dispatches everything the task accumulated as one batch, even when the
/// task itself errored part-way through.
struct ActionDispatcher {
    store: Arc<Store>,
}

#[async_trait]
impl Middleware<ThunkCtx> for ActionDispatcher {
    async fn handle(&self, ctx: &mut ThunkCtx, next: Next<'_, ThunkCtx>) -> Result<()> {
        let result = next.run(ctx).await;
        let actions = std::mem::take(&mut ctx.actions);
        self.store.dispatch_all(actions).await;
        result
    }
}

/// Terminal stage: looks up the named task and runs it, honoring its
/// throttle window.
struct TaskDispatch {
    table: Arc<TaskTable>,
}

#[async_trait]
impl Middleware<ThunkCtx> for TaskDispatch {
    async fn handle(&self, ctx: &mut ThunkCtx, _next: Next<'_, ThunkCtx>) -> Result<()> {
        let (task, throttle) = {
            let tasks = self.table.tasks.read().await;
            let Some(entry) = tasks.get(&ctx.name) else {
                anyhow::bail!("unknown thunk: {}", ctx.name);
            };
            (entry.task.clone(), entry.throttle)
        };

        if let Some(window) = throttle {
            let mut last_runs = self.table.last_runs.write().await;
            if let Some(last) = last_runs.get(&ctx.name) {
                if last.elapsed() < window {
                    tracing::debug!(task = %ctx.name, "throttled, skipping run");
                    return Ok(());
                }
            }
            last_runs.insert(ctx.name.clone(), Instant::now());
        }

        task.run(ctx).await
    }
}

/// The thunk pipeline and its task registry.
pub struct Thunks {
    stack: Stack<ThunkCtx>,
    table: Arc<TaskTable>,
}

impl Thunks {
    pub fn new(store: Arc<Store>, loaders: Arc<LoaderStore>) -> Self {
        let table = Arc::new(TaskTable::default());
        let stack: Stack<ThunkCtx> = vec![
            Arc::new(ErrorBoundary { loaders }),
            Arc::new(ActionDispatcher { store }),
            Arc::new(TaskDispatch {
                table: table.clone(),
            }),
        ];
        Self { stack, table }
    }

    /// Register a task under a name.
    pub async fn create(&self, name: &str, task: Arc<dyn Task>) {
        self.register(name, task, None).await;
    }

    /// Register a task that runs at most once per throttle window.
    pub async fn create_throttled(&self, name: &str, window: Duration, task: Arc<dyn Task>) {
        self.register(name, task, Some(window)).await;
    }

    async fn register(&self, name: &str, task: Arc<dyn Task>, throttle: Option<Duration>) {
        let mut tasks = self.table.tasks.write().await;
        tasks.insert(name.to_string(), TaskEntry { task, throttle });
    }

    /// Run a named task through the pipeline.
    pub async fn run(&self, name: &str, payload: Value) -> Result<ThunkCtx> {
        let mut ctx = ThunkCtx::new(name, payload);
        Next::new(&self.stack).run(&mut ctx).await?;
        Ok(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::LoaderStatus;
    use crate::token::{Token, TokenStore};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct PutToken;

    #[async_trait]
    impl Task for PutToken {
        async fn run(&self, ctx: &mut ThunkCtx) -> Result<()> {
            ctx.put(Action::SetToken(Token::new("1", "abc")));
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl Task for Failing {
        async fn run(&self, _ctx: &mut ThunkCtx) -> Result<()> {
            anyhow::bail!("task blew up")
        }
    }

    struct Counting {
        runs: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Task for Counting {
        async fn run(&self, _ctx: &mut ThunkCtx) -> Result<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn fixture() -> (Arc<TokenStore>, Arc<Store>, Arc<LoaderStore>, Thunks) {
        let tokens = TokenStore::new();
        let store = Store::new(tokens.clone());
        let loaders = Arc::new(LoaderStore::new());
        let thunks = Thunks::new(store.clone(), loaders.clone());
        (tokens, store, loaders, thunks)
    }

    #[tokio::test]
    async fn test_task_actions_are_dispatched() {
        let (tokens, _store, _loaders, thunks) = fixture();
        thunks.create("set-token", Arc::new(PutToken)).await;

        let ctx = thunks.run("set-token", Value::Null).await.unwrap();
        assert!(ctx.actions.is_empty(), "dispatcher drains the batch");
        assert_eq!(tokens.current().await.unwrap().access_token, "abc");
    }

    #[tokio::test]
    async fn test_error_becomes_loader_event() {
        let (_tokens, _store, loaders, thunks) = fixture();
        thunks.create("boom", Arc::new(Failing)).await;

        let result = thunks.run("boom", Value::Null).await;
        assert!(result.is_ok(), "boundary swallows the error");
        assert_eq!(
            loaders.get("boom").await.status,
            LoaderStatus::Error("task blew up".to_string())
        );
    }

    #[tokio::test]
    async fn test_unknown_thunk_reports_via_loader() {
        let (_tokens, _store, loaders, thunks) = fixture();
        thunks.run("missing", Value::Null).await.unwrap();
        assert!(matches!(
            loaders.get("missing").await.status,
            LoaderStatus::Error(_)
        ));
    }

    #[tokio::test]
    async fn test_throttle_skips_runs_inside_window() {
        let (_tokens, _store, _loaders, thunks) = fixture();
        let runs = Arc::new(AtomicUsize::new(0));
        thunks
            .create_throttled(
                "counted",
                Duration::from_secs(5),
                Arc::new(Counting { runs: runs.clone() }),
            )
            .await;

        for _ in 0..3 {
            thunks.run("counted", Value::Null).await.unwrap();
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }
}
