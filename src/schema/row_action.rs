//! Row-activation actions for search-result tables.
//!
//! `config.actionFo_RowSelect` declares what a double-clicked result row
//! does. The free-form `useAction` tag becomes a tagged union here so the
//! session reducer dispatches on variants instead of strings.

use serde::Deserialize;
use serde_json::Value;

use super::txfo::TxFoSource;

/// What activating a search-result row does.
#[derive(Debug, Clone)]
pub enum RowAction {
    /// `viewttablerecord`: copy the row's fields into the form. When a
    /// prefix is set, only prefixed fields are copied, with the prefix
    /// stripped.
    CopyRecord { prefix: Option<String> },
    /// `viewdetail`: open a generated URL outside the form. `{field}`
    /// placeholders in the template resolve from the activated row.
    OpenDetail { url_template: String },
    /// `designform`: navigate in place to another form design.
    DesignForm { form_id: String },
    /// Anything else: fetch a detail record through the declared transaction
    /// and populate the form with it.
    FetchDetail { tx: Option<TxFoSource> },
}

#[derive(Debug, Deserialize)]
struct RawRowAction {
    #[serde(rename = "useAction", default)]
    use_action: Option<String>,
    #[serde(default)]
    prefix: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    formid: Option<String>,
    #[serde(rename = "txFo", default)]
    tx_fo: Option<String>,
}

impl RowAction {
    /// Decode an `actionFo_RowSelect` value. Undecodable descriptors fall
    /// back to the default fetch-detail action with no transaction, which
    /// degrades to a no-op at dispatch time.
    pub fn parse(raw: &Value) -> RowAction {
        let raw_action: RawRowAction = match serde_json::from_value(raw.clone()) {
            Ok(parsed) => parsed,
            Err(err) => {
                log::warn!("undecodable actionFo_RowSelect, using fetch-detail: {err}");
                return RowAction::FetchDetail { tx: None };
            }
        };
        match raw_action.use_action.as_deref() {
            Some("viewttablerecord") => RowAction::CopyRecord {
                prefix: raw_action.prefix.filter(|p| !p.is_empty()),
            },
            Some("viewdetail") => RowAction::OpenDetail {
                url_template: raw_action.url.unwrap_or_default(),
            },
            Some("designform") => RowAction::DesignForm {
                form_id: raw_action.formid.unwrap_or_default(),
            },
            _ => RowAction::FetchDetail {
                tx: raw_action.tx_fo.as_deref().map(TxFoSource::parse),
            },
        }
    }
}

/// Fill `{field}` placeholders in a detail-URL template from a result row.
pub fn expand_url_template(template: &str, row: &Value) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                let field = &after[..close];
                match row.get(field) {
                    Some(Value::String(s)) => out.push_str(s),
                    Some(other) if !other.is_null() => out.push_str(&other.to_string()),
                    _ => {}
                }
                rest = &after[close + 1..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}
