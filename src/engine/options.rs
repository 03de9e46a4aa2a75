//! Option-list mapping for select and checkbox-group inputs.
//!
//! Source items come either inline from the schema (`data_value`) or from
//! the remote option provider. Whatever the source, a choice's value is
//! only ever drawn from the item itself, looked up under the configured
//! key first and the conventional dictionary fields after. Items carrying
//! none of those fields are dropped, never given synthesized values.

use serde_json::Value;

use crate::engine::node::Choice;
use crate::schema::InputConfig;

/// Dotted-path lookup into an option item.
fn lookup<'a>(item: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = item;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn choice_of(config: &InputConfig, item: &Value) -> Option<Choice> {
    let value = config
        .key_selected
        .as_deref()
        .and_then(|key| lookup(item, key))
        .or_else(|| lookup(item, "c_cdlist.cdid"))
        .or_else(|| lookup(item, "codeid"))
        .and_then(scalar)?;

    let label = config
        .key_display
        .as_deref()
        .and_then(|key| lookup(item, key))
        .or_else(|| lookup(item, "c_cdlist.cdname"))
        .or_else(|| lookup(item, "codename"))
        .and_then(scalar)
        .unwrap_or_else(|| value.clone());

    Some(Choice { value, label })
}

/// Map source items to choices under the configured keys.
pub fn map_choices(config: &InputConfig, items: &[Value]) -> Vec<Choice> {
    items
        .iter()
        .filter_map(|item| choice_of(config, item))
        .collect()
}

/// Choices declared inline in the schema.
pub fn inline_choices(config: &InputConfig) -> Vec<Choice> {
    map_choices(config, &config.data_value)
}

/// Whether the input needs a remote option fetch at all.
pub fn needs_fetch(config: &InputConfig) -> bool {
    config.data_value.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(key_selected: Option<&str>, key_display: Option<&str>) -> InputConfig {
        InputConfig {
            key_selected: key_selected.map(str::to_string),
            key_display: key_display.map(str::to_string),
            ..InputConfig::default()
        }
    }

    #[test]
    fn configured_keys_win_over_dictionary_fields() {
        let items = vec![json!({
            "ci_code": "TLS",
            "ci_label": "TLS client certificate",
            "codeid": "wrong",
            "codename": "also wrong"
        })];
        let choices = map_choices(&config(Some("ci_code"), Some("ci_label")), &items);
        assert_eq!(
            choices,
            vec![Choice { value: "TLS".into(), label: "TLS client certificate".into() }]
        );
    }

    #[test]
    fn dictionary_fallback_order() {
        let nested = vec![json!({ "c_cdlist": { "cdid": "01", "cdname": "HMAC" } })];
        let flat = vec![json!({ "codeid": 2, "codename": "RSA" })];
        let cfg = config(None, None);
        assert_eq!(
            map_choices(&cfg, &nested),
            vec![Choice { value: "01".into(), label: "HMAC".into() }]
        );
        assert_eq!(
            map_choices(&cfg, &flat),
            vec![Choice { value: "2".into(), label: "RSA".into() }]
        );
    }

    #[test]
    fn items_without_a_value_field_are_dropped() {
        let items = vec![
            json!({ "codeid": "keep" }),
            json!({ "unrelated": "drop me" }),
            json!("not even an object"),
        ];
        let choices = map_choices(&config(None, None), &items);
        assert_eq!(choices.len(), 1);
        assert_eq!(choices[0].value, "keep");
        // Label falls back to the value, never to invented text.
        assert_eq!(choices[0].label, "keep");
    }

    #[test]
    fn inline_options_bypass_fetching() {
        let mut cfg = config(None, None);
        cfg.data_value = vec![json!({ "codeid": "A", "codename": "Alpha" })];
        assert!(!needs_fetch(&cfg));
        assert_eq!(inline_choices(&cfg).len(), 1);
        assert!(needs_fetch(&config(None, None)));
    }
}
