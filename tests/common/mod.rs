//! Shared harness for the integration suites: fixture loading plus a
//! scripted transaction runner.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};

use dynaform::engine::FormSignal;
use dynaform::schema::FormDesign;
use dynaform::services::{
    FileDesignService, InlineOptionSource, NullFileStore, Services, StaticRoleAuthority,
    TransactionRunner, TxRequest, TxResponse,
};

pub fn testdata_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("testdata")
}

pub fn credential_design() -> FormDesign {
    load_design("credential_form.json")
}

pub fn load_design(file_name: &str) -> FormDesign {
    let path = testdata_dir().join(file_name);
    let raw = std::fs::read_to_string(&path)
        .unwrap_or_else(|err| panic!("reading fixture {path:?}: {err}"));
    FormDesign::from_json_str(&raw).expect("fixture decodes")
}

/// Records every transaction request and plays back scripted responses in
/// order. When the script runs dry it answers with an empty success
/// envelope, so bootstrap traffic stays quiet.
pub struct RecordingRunner {
    requests: Mutex<Vec<TxRequest>>,
    script: Mutex<VecDeque<TxResponse>>,
}

impl RecordingRunner {
    pub fn new() -> Arc<RecordingRunner> {
        Arc::new(RecordingRunner {
            requests: Mutex::new(Vec::new()),
            script: Mutex::new(VecDeque::new()),
        })
    }

    pub fn push_response(&self, response: TxResponse) {
        self.script.lock().unwrap().push_back(response);
    }

    pub fn requests(&self) -> Vec<TxRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_for(&self, txcode: &str) -> Option<TxRequest> {
        self.requests()
            .into_iter()
            .find(|request| request.txcode == txcode)
    }

    fn answer(&self, request: TxRequest) -> TxResponse {
        self.requests.lock().unwrap().push(request);
        self.script.lock().unwrap().pop_front().unwrap_or_else(|| {
            TxResponse::new(
                200,
                json!({ "dataresponse": { "input": {}, "data": [], "error": [] } }),
            )
        })
    }
}

#[async_trait]
impl TransactionRunner for RecordingRunner {
    async fn run_fo(&self, request: TxRequest) -> anyhow::Result<TxResponse> {
        Ok(self.answer(request))
    }
    async fn run_fo_dynamic(&self, request: TxRequest) -> anyhow::Result<TxResponse> {
        Ok(self.answer(request))
    }
    async fn run_bo_dynamic(&self, request: TxRequest) -> anyhow::Result<TxResponse> {
        Ok(self.answer(request))
    }
}

/// Services wired for tests: scripted transactions, designs resolved from
/// `testdata/`, inline options only, no file store.
pub fn scripted_services(runner: Arc<RecordingRunner>, roles: &[&str]) -> Services {
    Services {
        forms: Arc::new(FileDesignService::new(testdata_dir())),
        transactions: runner,
        options: Arc::new(InlineOptionSource),
        files: Arc::new(NullFileStore),
        roles: Arc::new(StaticRoleAuthority::new(
            roles.iter().map(|role| role.to_string()).collect(),
        )),
    }
}

pub fn alerts(signals: &[FormSignal]) -> Vec<String> {
    signals
        .iter()
        .filter_map(|signal| match signal {
            FormSignal::Alert(text) => Some(text.clone()),
            _ => None,
        })
        .collect()
}

pub fn value_changes(signals: &[FormSignal]) -> Vec<(String, Value)> {
    signals
        .iter()
        .filter_map(|signal| match signal {
            FormSignal::ValueChanged { column_key, value } => {
                Some((column_key.clone(), value.clone()))
            }
            _ => None,
        })
        .collect()
}

pub fn submitted_payload(signals: &[FormSignal]) -> Option<serde_json::Map<String, Value>> {
    signals.iter().find_map(|signal| match signal {
        FormSignal::Submitted { payload } => Some(payload.clone()),
        _ => None,
    })
}
