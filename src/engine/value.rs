//! Dynamic value resolution: control values from `runFo` rules, schema
//! default expressions, and filter parameters for dependent option fetches.

use anyhow::bail;
use chrono::Local;
use rand::Rng;
use serde_json::{Map, Value};

use crate::engine::values::ValueMap;
use crate::error::EngineError;
use crate::schema::{DefaultExpr, RuleSet, TxCode};
use crate::services::models::TxRequest;
use crate::services::traits::TransactionRunner;

/// Length of locally generated default strings.
const DEFAULT_STRING_LEN: usize = 16;

pub fn random_string(len: usize) -> String {
    rand::rng()
        .sample_iter(&rand::distr::Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Resolve the control value for `column_key` from its `runFo` rule, if one
/// exists.
///
/// `Ok(None)` is the silent-degrade path: no rule, no descriptors, or a
/// response that lacks the field. Malformed `txFo` and unknown transaction
/// codes are real errors the caller surfaces to the user; transport
/// failures come back as plain anyhow errors the caller logs.
pub async fn generate_control_value(
    runner: &dyn TransactionRunner,
    rules: &RuleSet,
    column_key: &str,
) -> anyhow::Result<Option<Value>> {
    let Some(rule) = rules.run_fo_for(column_key) else {
        return Ok(None);
    };
    let Some(tx) = &rule.tx else {
        return Ok(None);
    };
    let Some(descriptor) = tx.descriptors(column_key)?.first() else {
        return Ok(None);
    };

    match &descriptor.code {
        TxCode::FoGetDefaultString => {
            Ok(Some(Value::String(random_string(DEFAULT_STRING_LEN))))
        }
        TxCode::FoGetInfo => {
            let request = TxRequest::from_descriptor(descriptor, Map::new());
            let response = runner.run_fo(request).await?;
            if !response.is_ok() {
                bail!(
                    "fo-get-info for {column_key:?} failed: {}",
                    response.errors().join("; ")
                );
            }
            match response.input_field(column_key) {
                Some(value) => Ok(Some(value.clone())),
                None => {
                    log::warn!("fo-get-info response carries no {column_key:?} field");
                    Ok(None)
                }
            }
        }
        TxCode::Other(tag) => Err(EngineError::UnknownTxCode(tag.clone()).into()),
    }
}

/// Evaluate a schema default expression to a concrete value.
pub fn evaluate_default(expr: &DefaultExpr) -> Value {
    match expr {
        DefaultExpr::Literal(text) => Value::String(text.clone()),
        DefaultExpr::Today => {
            Value::String(Local::now().format("%Y-%m-%d").to_string())
        }
        DefaultExpr::Now => {
            Value::String(Local::now().format("%Y-%m-%d %H:%M:%S").to_string())
        }
        DefaultExpr::Random { len } => Value::String(random_string(*len)),
    }
}

/// Build fetch parameters from sibling field values. Filter keys with no
/// current value are skipped rather than sent as null.
pub fn generate_params(col_filter: &[String], values: &ValueMap) -> Map<String, Value> {
    let mut params = Map::new();
    for key in col_filter {
        if let Some(value) = values.get(key) {
            params.insert(key.clone(), value.clone());
        }
    }
    params
}
