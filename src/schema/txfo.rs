//! Parsed form of the `txFo` mini-language.
//!
//! `txFo` arrives as a JSON *string* embedded in rule and input config,
//! encoding one or more transaction descriptors. It is decoded exactly once
//! here; a payload that fails to decode is kept as [`TxFoSource::Malformed`]
//! so the error surfaces when the rule is exercised, not as a silent `""`.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::EngineError;

/// Transaction category tag, dispatched on by the value resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxCode {
    /// Remote lookup: run the FO and pull the field out of its echoed input.
    FoGetInfo,
    /// Local generation: produce a random string, no network involved.
    FoGetDefaultString,
    /// Anything else. Exercising it is a user-facing error.
    Other(String),
}

impl TxCode {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "fo-get-info" => TxCode::FoGetInfo,
            "fo-get-default-string" => TxCode::FoGetDefaultString,
            other => TxCode::Other(other.to_string()),
        }
    }

    pub fn as_tag(&self) -> &str {
        match self {
            TxCode::FoGetInfo => "fo-get-info",
            TxCode::FoGetDefaultString => "fo-get-default-string",
            TxCode::Other(tag) => tag,
        }
    }
}

/// One decoded transaction descriptor.
#[derive(Debug, Clone)]
pub struct TxDescriptor {
    pub code: TxCode,
    /// Workflow identifier the gateway routes on, when the descriptor names one.
    pub workflow: Option<String>,
    /// Field map sent with the transaction.
    pub input: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct RawDescriptor {
    txcode: String,
    #[serde(default)]
    workflow: Option<String>,
    #[serde(default)]
    input: Map<String, Value>,
}

impl From<RawDescriptor> for TxDescriptor {
    fn from(raw: RawDescriptor) -> Self {
        TxDescriptor {
            code: TxCode::from_tag(&raw.txcode),
            workflow: raw.workflow,
            input: raw.input,
        }
    }
}

/// Result of decoding a `txFo` string, decode errors retained.
#[derive(Debug, Clone)]
pub enum TxFoSource {
    Parsed(Vec<TxDescriptor>),
    Malformed { raw: String, detail: String },
}

impl TxFoSource {
    /// Decode a `txFo` payload. Accepts either a single descriptor object or
    /// an array of them, matching what the form-design service emits.
    pub fn parse(raw: &str) -> TxFoSource {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return TxFoSource::Parsed(Vec::new());
        }
        let result: Result<Vec<RawDescriptor>, _> = if trimmed.starts_with('[') {
            serde_json::from_str::<Vec<RawDescriptor>>(trimmed)
        } else {
            serde_json::from_str::<RawDescriptor>(trimmed).map(|d| vec![d])
        };
        match result {
            Ok(raw_descriptors) => {
                TxFoSource::Parsed(raw_descriptors.into_iter().map(Into::into).collect())
            }
            Err(err) => TxFoSource::Malformed {
                raw: raw.to_string(),
                detail: err.to_string(),
            },
        }
    }

    /// The decoded descriptors, or the retained decode error attributed to
    /// `subject` (the rule target or field the payload belongs to).
    pub fn descriptors(&self, subject: &str) -> Result<&[TxDescriptor], EngineError> {
        match self {
            TxFoSource::Parsed(descriptors) => Ok(descriptors),
            TxFoSource::Malformed { detail, .. } => Err(EngineError::MalformedTxFo {
                subject: subject.to_string(),
                detail: detail.clone(),
            }),
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, TxFoSource::Malformed { .. })
    }
}
