//! Request/response shapes shared by the gateway collaborators.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::schema::{PageData, TxDescriptor};

/// One backend FO/BO transaction call.
#[derive(Debug, Clone, Serialize)]
pub struct TxRequest {
    pub txcode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow: Option<String>,
    pub input: Map<String, Value>,
}

impl TxRequest {
    /// Build a request from a parsed descriptor, merging in derived
    /// parameters. Parameters computed from live field values override the
    /// descriptor's static input of the same name.
    pub fn from_descriptor(descriptor: &TxDescriptor, params: Map<String, Value>) -> TxRequest {
        let mut input = descriptor.input.clone();
        for (key, value) in params {
            input.insert(key, value);
        }
        TxRequest {
            txcode: descriptor.code.as_tag().to_string(),
            workflow: descriptor.workflow.clone(),
            input,
        }
    }
}

/// The gateway envelope: `{status, payload: {dataresponse: ...}}`.
#[derive(Debug, Clone, Deserialize)]
pub struct TxResponse {
    #[serde(default)]
    pub status: u16,
    #[serde(default)]
    pub payload: Value,
}

impl TxResponse {
    pub fn new(status: u16, payload: Value) -> TxResponse {
        TxResponse { status, payload }
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200 && self.errors().is_empty()
    }

    pub fn dataresponse(&self) -> Option<&Value> {
        self.payload.get("dataresponse")
    }

    /// Backend-reported error strings; empty on success.
    pub fn errors(&self) -> Vec<&str> {
        self.dataresponse()
            .and_then(|data| data.get("error"))
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// Named field of the response's `input` object. This is the extraction
    /// path control-value resolution uses.
    pub fn input_field(&self, column_key: &str) -> Option<&Value> {
        self.dataresponse()?.get("input")?.get(column_key)
    }

    /// Row-shaped `data` as a page envelope (search transactions). A bare
    /// array decodes as one complete page.
    pub fn page(&self) -> Option<PageData<Value>> {
        let data = self.dataresponse()?.get("data")?;
        PageData::from_json(data.clone()).ok()
    }

    /// First record of a detail fetch, whichever envelope shape it used.
    pub fn first_record(&self) -> Option<Map<String, Value>> {
        if let Some(page) = self.page() {
            if let Some(Value::Object(record)) = page.items.first() {
                return Some(record.clone());
            }
        }
        match self.dataresponse()?.get("data") {
            Some(Value::Object(record)) => Some(record.clone()),
            _ => None,
        }
    }
}

/// Result of a successful CDN upload.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadOutcome {
    #[serde(rename = "fileUrl")]
    pub file_url: String,
}

/// Per-element install switches from the role decision table.
#[derive(Debug, Clone, Copy)]
pub struct InstallFlags {
    pub component: bool,
    pub layout: bool,
    pub view: bool,
}

impl Default for InstallFlags {
    fn default() -> Self {
        // Absent table entries mean "installed".
        InstallFlags { component: true, layout: true, view: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn params_override_descriptor_input() {
        let descriptor = TxDescriptor {
            code: crate::schema::TxCode::FoGetInfo,
            workflow: Some("wf_credential".into()),
            input: json!({ "scope": "openapi", "ci_type": "static" })
                .as_object()
                .unwrap()
                .clone(),
        };
        let mut params = Map::new();
        params.insert("ci_type".into(), json!("TLS"));
        let request = TxRequest::from_descriptor(&descriptor, params);
        assert_eq!(request.txcode, "fo-get-info");
        assert_eq!(request.input["scope"], "openapi");
        assert_eq!(request.input["ci_type"], "TLS");
    }

    #[test]
    fn response_extraction_paths() {
        let response = TxResponse::new(
            200,
            json!({
                "dataresponse": {
                    "input": { "ci_serial": "SN-001" },
                    "data": [{ "ci_name": "edge-cert" }],
                    "error": []
                }
            }),
        );
        assert!(response.is_ok());
        assert_eq!(response.input_field("ci_serial"), Some(&json!("SN-001")));
        assert_eq!(response.page().unwrap().items.len(), 1);
        assert_eq!(response.first_record().unwrap()["ci_name"], "edge-cert");
    }

    #[test]
    fn backend_errors_mark_the_response_failed() {
        let response = TxResponse::new(
            200,
            json!({ "dataresponse": { "error": ["TX-419 expired"] } }),
        );
        assert!(!response.is_ok());
        assert_eq!(response.errors(), vec!["TX-419 expired"]);
    }
}
