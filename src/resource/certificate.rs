//! Certificate Resources

use crate::api::{Api, ApiCtx, Middleware, Next};
use crate::hal::{extract_id_from_link, EntityDescriptor, HalHref, NormalizedEntity};
use crate::loader::LoaderStore;
use crate::pagination::combine_pages;
use crate::thunk::{Task, ThunkCtx};
use anyhow::Result;
use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

pub const CERTIFICATES_TABLE: &str = "certificates";

pub const FETCH_CERTIFICATES: &str = "GET /accounts/:id/certificates?page=:page";
pub const CREATE_CERTIFICATE: &str = "POST /accounts/:id/certificates";

/// Thunk and loader id; runs are throttled, see the registration in `App`.
pub const FETCH_ALL_CERTIFICATES: &str = "fetch-all-certs-by-env";

#[derive(Debug, Clone, Deserialize, Default)]
struct CertificateResponseLinks {
    #[serde(default)]
    account: Option<HalHref>,
}

#[derive(Debug, Clone, Deserialize)]
struct CertificateResponse {
    id: u64,
    #[serde(default)]
    common_name: String,
    #[serde(default)]
    certificate_body: String,
    #[serde(default)]
    not_before: String,
    #[serde(default)]
    not_after: String,
    #[serde(default)]
    issuer_organization: Option<String>,
    #[serde(default)]
    issuer_common_name: Option<String>,
    #[serde(default)]
    acme: bool,
    #[serde(default)]
    leaf_certificate: String,
    #[serde(default)]
    certificate_chain: String,
    #[serde(default)]
    sha256_fingerprint: String,
    #[serde(default)]
    trusted: bool,
    #[serde(default)]
    self_signed: bool,
    #[serde(default)]
    subject_alternative_names: Vec<String>,
    #[serde(default)]
    private_key_algorithm: String,
    #[serde(default)]
    created_at: String,
    #[serde(default)]
    updated_at: String,
    #[serde(default, rename = "_links")]
    links: CertificateResponseLinks,
}

/// Normalized certificate entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DeployCertificate {
    pub id: String,
    pub common_name: String,
    pub certificate_body: String,
    pub not_before: String,
    pub not_after: String,
    pub issuer_organization: Option<String>,
    pub issuer_common_name: Option<String>,
    pub acme: bool,
    pub leaf_certificate: String,
    pub certificate_chain: String,
    pub sha256_fingerprint: String,
    pub trusted: bool,
    pub self_signed: bool,
    pub subject_alternative_names: Vec<String>,
    pub private_key_algorithm: String,
    pub created_at: String,
    pub updated_at: String,
    pub environment_id: String,
}

pub fn deserialize_certificate(raw: &Value) -> Option<NormalizedEntity> {
    let response: CertificateResponse = serde_json::from_value(raw.clone()).ok()?;
    let certificate = DeployCertificate {
        id: response.id.to_string(),
        common_name: response.common_name,
        certificate_body: response.certificate_body,
        not_before: response.not_before,
        not_after: response.not_after,
        issuer_organization: response.issuer_organization,
        issuer_common_name: response.issuer_common_name,
        acme: response.acme,
        leaf_certificate: response.leaf_certificate,
        certificate_chain: response.certificate_chain,
        sha256_fingerprint: response.sha256_fingerprint,
        trusted: response.trusted,
        self_signed: response.self_signed,
        subject_alternative_names: response.subject_alternative_names,
        private_key_algorithm: response.private_key_algorithm,
        created_at: response.created_at,
        updated_at: response.updated_at,
        environment_id: extract_id_from_link(response.links.account.as_ref()),
    };
    NormalizedEntity::from_serialize(&certificate.id, &certificate)
}

pub fn entities() -> Vec<EntityDescriptor> {
    vec![EntityDescriptor::new(
        "certificate",
        CERTIFICATES_TABLE,
        deserialize_certificate,
    )]
}

/// Route middleware for certificate upload: the payload's PEM material
/// becomes the request body.
struct CreateCertificateRoute;

#[async_trait]
impl Middleware<ApiCtx> for CreateCertificateRoute {
    async fn handle(&self, ctx: &mut ApiCtx, next: Next<'_, ApiCtx>) -> Result<()> {
        let body = json!({
            "certificate_body": ctx.payload.get("cert").cloned().unwrap_or(Value::Null),
            "private_key": ctx.payload.get("priv_key").cloned().unwrap_or(Value::Null),
        });
        ctx.request.body = Some(body.to_string());
        next.run(ctx).await
    }
}

pub async fn register_routes(api: &Api) {
    api.get("/accounts/:id/certificates?page=:page").await;
    api.register(
        Method::POST,
        "/accounts/:id/certificates",
        Arc::new(CreateCertificateRoute),
    )
    .await;
}

/// Fetch every page of certificates for one environment.
pub async fn fetch_all_certificates(api: &Api, loaders: &LoaderStore, env_id: &str) -> Result<()> {
    combine_pages(loaders, FETCH_ALL_CERTIFICATES, |page| {
        api.dispatch(FETCH_CERTIFICATES, json!({ "id": env_id, "page": page }))
    })
    .await
}

/// Thunk wrapper around [`fetch_all_certificates`]; payload carries the
/// environment id.
pub struct FetchAllCertificatesTask {
    pub api: Arc<Api>,
    pub loaders: Arc<LoaderStore>,
}

#[async_trait]
impl Task for FetchAllCertificatesTask {
    async fn run(&self, ctx: &mut ThunkCtx) -> Result<()> {
        let env_id = ctx
            .payload
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        fetch_all_certificates(&self.api, &self.loaders, &env_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_certificate() {
        let raw = json!({
            "id": 3,
            "common_name": "example.com",
            "acme": true,
            "trusted": true,
            "self_signed": false,
            "sha256_fingerprint": "ab:cd",
            "subject_alternative_names": ["www.example.com"],
            "_links": {
                "account": {"href": "https://api.test/accounts/11"}
            },
            "_type": "certificate"
        });

        let entity = deserialize_certificate(&raw).unwrap();
        assert_eq!(entity.id, "3");
        assert_eq!(entity.value["common_name"], "example.com");
        assert_eq!(entity.value["environment_id"], "11");
        assert_eq!(entity.value["subject_alternative_names"][0], "www.example.com");
    }
}
