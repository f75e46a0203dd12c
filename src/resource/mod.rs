//! Deployment Resources
//!
//! Per-resource wire types, deserializers, and endpoints for the platform's
//! deployable resources.
//!
//! # Architecture
//!
//! - [`app`] - applications and their fetch endpoints
//! - [`database`] - managed databases
//! - [`certificate`] - TLS certificates per environment
//! - [`configuration`] - app configuration (environment variables)
//! - [`operation`] - long-running operations and the poll loop
//!
//! Each module owns its server response shape, the mapping into the
//! normalized entity stored in the entity tables, and the routes it registers
//! on the request pipeline. Foreign keys are extracted from HAL `_links`
//! trailing segments.

pub mod app;
pub mod certificate;
pub mod configuration;
pub mod database;
pub mod operation;

use crate::api::Api;
use crate::hal::EntityDescriptor;

/// Entity descriptors for every deployment resource, in registration order.
pub fn entities() -> Vec<EntityDescriptor> {
    let mut all = Vec::new();
    all.extend(app::entities());
    all.extend(database::entities());
    all.extend(certificate::entities());
    all.extend(configuration::entities());
    all.extend(operation::entities());
    all
}

/// Register every resource endpoint on the default pipeline.
pub async fn register_routes(api: &Api) {
    app::register_routes(api).await;
    database::register_routes(api).await;
    certificate::register_routes(api).await;
    configuration::register_routes(api).await;
    operation::register_routes(api).await;
}
