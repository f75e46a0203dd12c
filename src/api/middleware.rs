//! Middleware Chain
//!
//! The typed `(ctx, next) -> result` seam both pipelines are built on. Each
//! stage wraps everything declared after it: code before `next.run(ctx)` is
//! the request path, code after it sees the populated response.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// One stage in a pipeline over context type `C`.
#[async_trait]
pub trait Middleware<C>: Send + Sync
where
    C: Send + 'static,
{
    async fn handle(&self, ctx: &mut C, next: Next<'_, C>) -> Result<()>;
}

/// Ordered stage list for a pipeline.
pub type Stack<C> = Vec<Arc<dyn Middleware<C>>>;

/// Continuation over the remaining stages of a pipeline.
pub struct Next<'a, C> {
    stack: &'a [Arc<dyn Middleware<C>>],
}

impl<'a, C> Next<'a, C>
where
    C: Send + 'static,
{
    pub(crate) fn new(stack: &'a [Arc<dyn Middleware<C>>]) -> Self {
        Self { stack }
    }

    /// Run the rest of the chain. A stage that never calls this short-circuits
    /// everything downstream of it.
    pub async fn run(self, ctx: &mut C) -> Result<()> {
        match self.stack.split_first() {
            Some((head, rest)) => head.handle(ctx, Next { stack: rest }).await,
            None => Ok(()),
        }
    }
}
