//! The engine's external collaborators, as trait objects.
//!
//! The form engine owns no wire format and no session handling; everything
//! it needs from the outside world comes through these five seams. Sessions
//! hold them behind [`Services`] so sub-forms inherit the same collaborators
//! without re-plumbing.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::schema::{FormDesign, InputConfig};
use crate::services::models::{InstallFlags, TxRequest, TxResponse, UploadOutcome};

/// Source of form designs, the sole origin of layouts and rules.
#[async_trait]
pub trait FormDesignService: Send + Sync {
    async fn load_form(&self, language: &str, form_id: &str) -> anyhow::Result<FormDesign>;
}

/// Executes backend FO/BO transactions. The engine never interprets the
/// business meaning of a payload beyond extracting named fields.
#[async_trait]
pub trait TransactionRunner: Send + Sync {
    async fn run_fo(&self, request: TxRequest) -> anyhow::Result<TxResponse>;
    async fn run_fo_dynamic(&self, request: TxRequest) -> anyhow::Result<TxResponse>;
    async fn run_bo_dynamic(&self, request: TxRequest) -> anyhow::Result<TxResponse>;
}

/// Remote option lists for selects and checkbox groups.
#[async_trait]
pub trait OptionSource: Send + Sync {
    async fn fetch_options(
        &self,
        config: &InputConfig,
        language: &str,
        params: &Map<String, Value>,
    ) -> anyhow::Result<Vec<Value>>;
}

/// CDN-style file storage for image inputs. Upload conflicts surface as
/// [`crate::EngineError::FileAlreadyUsed`] inside the anyhow chain.
#[async_trait]
pub trait FileStore: Send + Sync {
    async fn upload(
        &self,
        folder: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> anyhow::Result<UploadOutcome>;

    async fn remove(&self, file_url: &str) -> anyhow::Result<()>;
}

/// The RBAC decision table. The engine only reads it.
pub trait RoleAuthority: Send + Sync {
    /// Roles active for the current session.
    fn role_ids(&self) -> Vec<String>;

    /// Install switches for one role and one `codeHidden` key. `None` when
    /// the table has no entry, which renders as installed.
    fn install_flags(&self, role_id: &str, code_hidden: &str) -> Option<InstallFlags>;
}

/// Bundle of collaborators one session carries; cloning shares them.
#[derive(Clone)]
pub struct Services {
    pub forms: Arc<dyn FormDesignService>,
    pub transactions: Arc<dyn TransactionRunner>,
    pub options: Arc<dyn OptionSource>,
    pub files: Arc<dyn FileStore>,
    pub roles: Arc<dyn RoleAuthority>,
}
