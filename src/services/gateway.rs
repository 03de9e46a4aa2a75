//! reqwest implementation of the service traits against the back-office
//! gateway.
//!
//! One pooled client per profile; every call carries a correlation id and
//! the profile's bearer token. The gateway speaks the `{status, payload}`
//! envelope decoded by [`TxResponse`]; this module never interprets payload
//! semantics beyond that envelope.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use uuid::Uuid;

use crate::config::GatewayProfile;
use crate::error::EngineError;
use crate::schema::{FormDesign, InputConfig};
use crate::services::models::{TxRequest, TxResponse, UploadOutcome};
use crate::services::traits::{FileStore, FormDesignService, OptionSource, TransactionRunner};

const FORM_DESIGN_PATH: &str = "/api/form-design/detail";
const RUN_FO_PATH: &str = "/api/tx/run-fo";
const RUN_FO_DYNAMIC_PATH: &str = "/api/tx/run-fo-dynamic";
const RUN_BO_DYNAMIC_PATH: &str = "/api/tx/run-bo-dynamic";
const CONFIG_DATA_PATH: &str = "/api/config-data";
const FILE_UPLOAD_PATH: &str = "/api/files";

/// Gateway client with connection pooling, shared by all service seams.
pub struct GatewayClient {
    profile: GatewayProfile,
    http: reqwest::Client,
}

impl GatewayClient {
    pub fn new(profile: GatewayProfile) -> anyhow::Result<GatewayClient> {
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(Duration::from_secs(profile.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("dynaform/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build gateway HTTP client")?;

        Ok(GatewayClient { profile, http })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.profile.base_url.trim_end_matches('/'), path)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.profile.session_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn post(&self, path: &str) -> (reqwest::RequestBuilder, Uuid) {
        let correlation = Uuid::new_v4();
        let builder = self
            .authorize(self.http.post(self.url(path)))
            .header("X-Correlation-Id", correlation.to_string());
        (builder, correlation)
    }

    async fn post_tx(&self, path: &str, request: &TxRequest) -> anyhow::Result<TxResponse> {
        let (builder, correlation) = self.post(path);
        log::debug!("POST {path} txcode={} [{correlation}]", request.txcode);

        let response = builder
            .json(request)
            .send()
            .await
            .with_context(|| format!("calling {path}"))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("gateway returned {status} for {path} [{correlation}]: {body}");
        }
        response
            .json::<TxResponse>()
            .await
            .with_context(|| format!("decoding the {path} response [{correlation}]"))
    }
}

#[async_trait]
impl FormDesignService for GatewayClient {
    async fn load_form(&self, language: &str, form_id: &str) -> anyhow::Result<FormDesign> {
        let (builder, correlation) = self.post(FORM_DESIGN_PATH);
        log::debug!("POST {FORM_DESIGN_PATH} formid={form_id} [{correlation}]");

        let response = builder
            .json(&json!({ "language": language, "formid": form_id }))
            .send()
            .await
            .with_context(|| format!("loading form design {form_id}"))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "gateway returned {status} loading form {form_id} [{correlation}]: {body}"
            );
        }
        let document: Value = response
            .json()
            .await
            .with_context(|| format!("decoding the design document of {form_id}"))?;
        FormDesign::from_value(document)
            .with_context(|| format!("parsing form design {form_id}"))
    }
}

#[async_trait]
impl TransactionRunner for GatewayClient {
    async fn run_fo(&self, request: TxRequest) -> anyhow::Result<TxResponse> {
        self.post_tx(RUN_FO_PATH, &request).await
    }

    async fn run_fo_dynamic(&self, request: TxRequest) -> anyhow::Result<TxResponse> {
        self.post_tx(RUN_FO_DYNAMIC_PATH, &request).await
    }

    async fn run_bo_dynamic(&self, request: TxRequest) -> anyhow::Result<TxResponse> {
        self.post_tx(RUN_BO_DYNAMIC_PATH, &request).await
    }
}

#[async_trait]
impl OptionSource for GatewayClient {
    async fn fetch_options(
        &self,
        config: &InputConfig,
        language: &str,
        params: &Map<String, Value>,
    ) -> anyhow::Result<Vec<Value>> {
        let (builder, correlation) = self.post(CONFIG_DATA_PATH);
        log::debug!("POST {CONFIG_DATA_PATH} params={} [{correlation}]", params.len());

        // The dictionary/table selector keys are designer-defined and ride
        // in the untyped remainder of the config map.
        let response = builder
            .json(&json!({
                "language": language,
                "config": Value::Object(config.extra.clone()),
                "params": params,
            }))
            .send()
            .await
            .context("fetching option data")?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("gateway returned {status} for option data [{correlation}]: {body}");
        }
        let tx: TxResponse = response
            .json()
            .await
            .with_context(|| format!("decoding the option data response [{correlation}]"))?;
        let items = tx
            .dataresponse()
            .and_then(|data| data.get("data"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        Ok(items)
    }
}

#[async_trait]
impl FileStore for GatewayClient {
    async fn upload(
        &self,
        folder: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> anyhow::Result<UploadOutcome> {
        let (builder, correlation) = self.post(&format!("{FILE_UPLOAD_PATH}/{folder}"));
        log::debug!(
            "POST {FILE_UPLOAD_PATH}/{folder} file={file_name} size={} [{correlation}]",
            bytes.len()
        );

        let response = builder
            .query(&[("filename", file_name)])
            .body(bytes)
            .send()
            .await
            .with_context(|| format!("uploading {file_name}"))?;
        let status = response.status();
        if status == reqwest::StatusCode::CONFLICT {
            // The store refuses names already claimed by another record.
            return Err(EngineError::FileAlreadyUsed(file_name.to_string()).into());
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "gateway returned {status} uploading {file_name} [{correlation}]: {body}"
            );
        }
        response
            .json::<UploadOutcome>()
            .await
            .with_context(|| format!("decoding the upload result of {file_name}"))
    }

    async fn remove(&self, file_url: &str) -> anyhow::Result<()> {
        let correlation = Uuid::new_v4();
        log::debug!("DELETE {file_url} [{correlation}]");

        let response = self
            .authorize(self.http.delete(file_url))
            .header("X-Correlation-Id", correlation.to_string())
            .send()
            .await
            .with_context(|| format!("removing {file_url}"))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("gateway returned {status} removing {file_url} [{correlation}]: {body}");
        }
        Ok(())
    }
}
