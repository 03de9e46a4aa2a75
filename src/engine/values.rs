//! Per-session field values keyed by column key.
//!
//! Every write carries a provenance level so the layered fallback chain
//! (schema default, resolver-produced control value, loaded record, user
//! edit) becomes one ordered rule instead of per-renderer precedence
//! accidents: a write lands only if its level is at least the level that
//! produced the current value.

use std::collections::HashMap;

use serde_json::{Map, Value};

/// Provenance of a field value, in ascending precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ValueSource {
    /// Schema `data_default` evaluated at bootstrap.
    Default,
    /// Resolver-produced control value (`runFo` result or generated string).
    Control,
    /// A loaded backend record, including row-select population.
    Record,
    /// Direct user edit. Always wins.
    User,
}

#[derive(Debug, Clone)]
struct Slot {
    value: Value,
    source: ValueSource,
}

/// Current field values of one form session.
#[derive(Debug, Clone, Default)]
pub struct ValueMap {
    slots: HashMap<String, Slot>,
}

impl ValueMap {
    pub fn new() -> ValueMap {
        ValueMap::default()
    }

    pub fn get(&self, column_key: &str) -> Option<&Value> {
        self.slots.get(column_key).map(|slot| &slot.value)
    }

    pub fn get_str(&self, column_key: &str) -> Option<&str> {
        self.get(column_key).and_then(Value::as_str)
    }

    pub fn source(&self, column_key: &str) -> Option<ValueSource> {
        self.slots.get(column_key).map(|slot| slot.source)
    }

    /// Write `value` under `column_key` if `source` outranks (or equals)
    /// whatever produced the current value. Returns whether the map changed.
    pub fn apply(&mut self, column_key: &str, value: Value, source: ValueSource) -> bool {
        match self.slots.get_mut(column_key) {
            Some(slot) if source < slot.source => false,
            Some(slot) => {
                let changed = slot.value != value || slot.source != source;
                slot.value = value;
                slot.source = source;
                changed
            }
            None => {
                self.slots.insert(column_key.to_string(), Slot { value, source });
                true
            }
        }
    }

    /// Populate many fields at once from a loaded record.
    pub fn apply_record(&mut self, record: &Map<String, Value>) -> usize {
        let mut applied = 0;
        for (key, value) in record {
            if self.apply(key, value.clone(), ValueSource::Record) {
                applied += 1;
            }
        }
        applied
    }

    pub fn remove(&mut self, column_key: &str) -> Option<Value> {
        self.slots.remove(column_key).map(|slot| slot.value)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.slots
            .iter()
            .map(|(key, slot)| (key.as_str(), &slot.value))
    }

    /// Flat snapshot for transaction parameters and submission payloads.
    pub fn snapshot(&self) -> Map<String, Value> {
        let mut map = Map::new();
        for (key, slot) in &self.slots {
            map.insert(key.clone(), slot.value.clone());
        }
        map
    }
}
