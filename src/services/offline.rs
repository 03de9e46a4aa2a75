//! File-backed and static collaborators for offline inspection.
//!
//! The CLI composes forms without a gateway: designs come from JSON files
//! on disk, transactions answer with empty-but-well-formed envelopes, and
//! the role table is whatever the invocation configured.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use serde_json::{Map, Value, json};

use crate::schema::{FormDesign, InputConfig};
use crate::services::models::{InstallFlags, TxRequest, TxResponse, UploadOutcome};
use crate::services::traits::{
    FileStore, FormDesignService, OptionSource, RoleAuthority, Services, TransactionRunner,
};

/// Loads form designs from `<root>/<form_id>.json`. Lookup targets resolve
/// against the same directory, so a schema and the forms it calls can sit
/// side by side.
pub struct FileDesignService {
    root: PathBuf,
}

impl FileDesignService {
    pub fn new(root: impl Into<PathBuf>) -> FileDesignService {
        FileDesignService { root: root.into() }
    }

    /// Service rooted at the directory containing `schema_path`.
    pub fn sibling_of(schema_path: &Path) -> FileDesignService {
        let root = schema_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        FileDesignService { root }
    }
}

#[async_trait]
impl FormDesignService for FileDesignService {
    async fn load_form(&self, _language: &str, form_id: &str) -> anyhow::Result<FormDesign> {
        let mut path = self.root.join(form_id);
        if path.extension().is_none() {
            path.set_extension("json");
        }
        log::debug!("loading form design from {path:?}");
        let raw = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading form design {path:?}"))?;
        FormDesign::from_json_str(&raw).with_context(|| format!("parsing form design {path:?}"))
    }
}

/// Answers every transaction with an empty, well-formed envelope so control
/// value resolution and searches degrade quietly offline.
pub struct OfflineTransactionRunner;

#[async_trait]
impl TransactionRunner for OfflineTransactionRunner {
    async fn run_fo(&self, request: TxRequest) -> anyhow::Result<TxResponse> {
        log::debug!("offline run_fo {}", request.txcode);
        Ok(TxResponse::new(
            200,
            json!({ "dataresponse": { "input": {}, "error": [] } }),
        ))
    }

    async fn run_fo_dynamic(&self, request: TxRequest) -> anyhow::Result<TxResponse> {
        log::debug!("offline run_fo_dynamic {}", request.txcode);
        Ok(TxResponse::new(
            200,
            json!({ "dataresponse": { "data": [], "error": [] } }),
        ))
    }

    async fn run_bo_dynamic(&self, request: TxRequest) -> anyhow::Result<TxResponse> {
        log::debug!("offline run_bo_dynamic {}", request.txcode);
        Ok(TxResponse::new(
            200,
            json!({ "dataresponse": { "data": [], "error": [] } }),
        ))
    }
}

/// Serves only the inline `data_value` items a config already carries.
pub struct InlineOptionSource;

#[async_trait]
impl OptionSource for InlineOptionSource {
    async fn fetch_options(
        &self,
        config: &InputConfig,
        _language: &str,
        _params: &Map<String, Value>,
    ) -> anyhow::Result<Vec<Value>> {
        Ok(config.data_value.clone())
    }
}

/// Refuses uploads; removal is a no-op.
pub struct NullFileStore;

#[async_trait]
impl FileStore for NullFileStore {
    async fn upload(&self, _: &str, file_name: &str, _: Vec<u8>) -> anyhow::Result<UploadOutcome> {
        anyhow::bail!("no file store configured, cannot upload {file_name}")
    }

    async fn remove(&self, _: &str) -> anyhow::Result<()> {
        Ok(())
    }
}

/// In-memory role decision table.
#[derive(Default)]
pub struct StaticRoleAuthority {
    roles: Vec<String>,
    table: HashMap<(String, String), InstallFlags>,
}

impl StaticRoleAuthority {
    pub fn new(roles: Vec<String>) -> StaticRoleAuthority {
        StaticRoleAuthority { roles, table: HashMap::new() }
    }

    pub fn set_flags(&mut self, role_id: &str, code_hidden: &str, flags: InstallFlags) {
        self.table
            .insert((role_id.to_string(), code_hidden.to_string()), flags);
    }
}

impl RoleAuthority for StaticRoleAuthority {
    fn role_ids(&self) -> Vec<String> {
        self.roles.clone()
    }

    fn install_flags(&self, role_id: &str, code_hidden: &str) -> Option<InstallFlags> {
        self.table
            .get(&(role_id.to_string(), code_hidden.to_string()))
            .copied()
    }
}

/// Service bundle for offline composition, rooted at a schema directory.
pub fn offline_services(schema_dir: impl Into<PathBuf>, roles: Vec<String>) -> Services {
    Services {
        forms: Arc::new(FileDesignService::new(schema_dir)),
        transactions: Arc::new(OfflineTransactionRunner),
        options: Arc::new(InlineOptionSource),
        files: Arc::new(NullFileStore),
        roles: Arc::new(StaticRoleAuthority::new(roles)),
    }
}
