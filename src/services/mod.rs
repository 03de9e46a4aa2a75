//! External collaborators: trait seams, wire models, and the two stock
//! implementations (gateway-backed and offline).

pub mod gateway;
pub mod models;
pub mod offline;
pub mod traits;

pub use gateway::GatewayClient;
pub use models::{InstallFlags, TxRequest, TxResponse, UploadOutcome};
pub use offline::{
    FileDesignService, InlineOptionSource, NullFileStore, OfflineTransactionRunner,
    StaticRoleAuthority, offline_services,
};
pub use traits::{
    FileStore, FormDesignService, OptionSource, RoleAuthority, Services, TransactionRunner,
};
