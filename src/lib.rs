//! halyard - client engine for cloud deployment APIs
//!
//! The pieces a dashboard needs between "the user clicked fetch" and "the
//! entity tables are up to date": a composable HTTP middleware pipeline that
//! resolves URLs and attaches bearer tokens, a HAL `_embedded` parser that
//! normalizes response trees into flat per-type entity stores, a pagination
//! combinator that fans page fetches out in parallel, and a thunk pipeline
//! for multi-step orchestration (login elevation, bootstrap, polling).
//!
//! # Example
//!
//! ```ignore
//! use halyard::{App, Env};
//!
//! async fn example() -> anyhow::Result<()> {
//!     let app = App::new(Env::from_env()).await?;
//!     app.signal_rehydrated();
//!     app.bootup().await?;
//!     let apps = app.store.table("apps").await;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod app;
pub mod auth;
pub mod bootup;
pub mod env;
pub mod hal;
pub mod loader;
pub mod pagination;
pub mod resource;
pub mod store;
pub mod thunk;
pub mod token;

pub use app::App;
pub use env::{EndpointKind, Env};
