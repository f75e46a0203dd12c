//! Pagination Combinator
//!
//! Drives the "fetch page 1, derive the page count, fetch the rest in
//! parallel" protocol on top of a single-page fetch, publishing loader state
//! around the whole run.

use crate::api::ApiCtx;
use crate::loader::LoaderStore;
use anyhow::Result;
use futures::future::join_all;
use serde_json::Value;
use std::future::Future;

/// Pagination metadata read from a page-1 response body. Only present when
/// the endpoint paginates (`current_page` in the body).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageMeta {
    pub current_page: u64,
    pub total_count: u64,
    pub per_page: u64,
}

impl PageMeta {
    pub fn from_response(data: &Value) -> Option<Self> {
        let current_page = data.get("current_page").and_then(Value::as_u64)?;
        Some(Self {
            current_page,
            total_count: data
                .get("total_count")
                .and_then(Value::as_u64)
                .unwrap_or(0),
            per_page: data.get("per_page").and_then(Value::as_u64).unwrap_or(0),
        })
    }

    /// Last page implied by the metadata. A zero or missing `per_page` means
    /// there is nothing further to compute, not a division by zero.
    pub fn last_page(&self) -> u64 {
        if self.per_page == 0 {
            self.current_page
        } else {
            self.total_count.div_ceil(self.per_page)
        }
    }
}

/// Fetch every page of a paginated endpoint.
///
/// Page 1 runs first and alone; when it fails, one loader error carrying the
/// body's message is emitted and no further pages are requested. Otherwise
/// pages `current_page + 1 ..= last_page` are fired concurrently and joined.
/// Individual page failures after the fan-out are not inspected: the contract
/// is fire-all, join-all, best effort.
pub async fn combine_pages<F, Fut>(
    loaders: &LoaderStore,
    loader_id: &str,
    fetch_page: F,
) -> Result<()>
where
    F: Fn(u64) -> Fut,
    Fut: Future<Output = Result<ApiCtx>>,
{
    loaders.start(loader_id).await;

    let first = fetch_page(1).await?;
    let Some(response) = first.response else {
        loaders.error(loader_id, "request failed").await;
        return Ok(());
    };
    if !response.ok {
        loaders.error(loader_id, &response.error_message()).await;
        return Ok(());
    }

    if let Some(meta) = PageMeta::from_response(&response.data) {
        let last_page = meta.last_page();
        if last_page > meta.current_page {
            let fetches = (meta.current_page + 1..=last_page).map(&fetch_page);
            let _ = join_all(fetches).await;
        }
    }

    loaders.success(loader_id).await;
    Ok(())
}
