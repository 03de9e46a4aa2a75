//! Row management for dynamic table inputs.
//!
//! Rows are never removed from the backing array: deletion flips a flag so
//! indices stay stable for controls already bound to later rows, and the
//! backend still sees deleted rows at submission time. Main-key rows are
//! declared in the schema, injected when missing, and protected from both
//! deletion and renaming.

use serde_json::{Map, Value, json};

/// Lifecycle of one dynamic-table row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowLifecycle {
    /// Present in the loaded record.
    Persisted,
    /// Added in this session, unknown to the backend.
    Added,
    /// Soft-deleted; hidden from display, retained for submission.
    Deleted,
}

/// One row of a dynamic table.
#[derive(Debug, Clone)]
pub struct DynamicRow {
    /// Value of the key column (`configKey` on the wire).
    pub key: String,
    /// Remaining cells keyed by column.
    pub values: Map<String, Value>,
    pub is_main_key: bool,
    lifecycle: RowLifecycle,
}

impl DynamicRow {
    pub fn lifecycle(&self) -> RowLifecycle {
        self.lifecycle
    }

    pub fn is_deleted(&self) -> bool {
        self.lifecycle == RowLifecycle::Deleted
    }
}

/// The row array of one dynamic table input.
#[derive(Debug, Clone, Default)]
pub struct RowSet {
    rows: Vec<DynamicRow>,
}

const KEY_COLUMN: &str = "configKey";
const MAIN_KEY_FLAG: &str = "ismainkey";
const DELETED_FLAG: &str = "isdeleted";

impl RowSet {
    /// Build the row set from a loaded value array plus the schema-declared
    /// main keys. Every main key ends up present exactly once, flagged and
    /// visible, whatever state the loaded data arrived in.
    pub fn from_schema(main_keys: &[String], existing: &[Value]) -> RowSet {
        let mut rows: Vec<DynamicRow> = existing
            .iter()
            .filter_map(Value::as_object)
            .map(|row| {
                let key = row
                    .get(KEY_COLUMN)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let deleted = row
                    .get(DELETED_FLAG)
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                let flagged_main = row
                    .get(MAIN_KEY_FLAG)
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                let mut values = row.clone();
                values.remove(KEY_COLUMN);
                values.remove(MAIN_KEY_FLAG);
                values.remove(DELETED_FLAG);
                DynamicRow {
                    is_main_key: flagged_main || main_keys.iter().any(|main| *main == key),
                    key,
                    values,
                    lifecycle: if deleted { RowLifecycle::Deleted } else { RowLifecycle::Persisted },
                }
            })
            .collect();

        for row in &mut rows {
            // Loaded data cannot override the non-deletable invariant.
            if row.is_main_key && row.lifecycle == RowLifecycle::Deleted {
                row.lifecycle = RowLifecycle::Persisted;
            }
        }

        for main in main_keys {
            if !rows.iter().any(|row| row.key == *main) {
                rows.push(DynamicRow {
                    key: main.clone(),
                    values: Map::new(),
                    is_main_key: true,
                    lifecycle: RowLifecycle::Persisted,
                });
            }
        }

        RowSet { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[DynamicRow] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&DynamicRow> {
        self.rows.get(index)
    }

    /// Displayable rows with their stable storage indices.
    pub fn visible(&self) -> impl Iterator<Item = (usize, &DynamicRow)> {
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, row)| !row.is_deleted())
    }

    pub fn visible_len(&self) -> usize {
        self.visible().count()
    }

    /// Append a user row. Returns its storage index.
    pub fn add_row(&mut self, key: impl Into<String>, values: Map<String, Value>) -> usize {
        self.rows.push(DynamicRow {
            key: key.into(),
            values,
            is_main_key: false,
            lifecycle: RowLifecycle::Added,
        });
        self.rows.len() - 1
    }

    /// Soft-delete the row at `index`. A no-op on main-key rows and on rows
    /// already deleted; returns whether anything changed.
    pub fn soft_delete(&mut self, index: usize) -> bool {
        match self.rows.get_mut(index) {
            Some(row) if !row.is_main_key && !row.is_deleted() => {
                row.lifecycle = RowLifecycle::Deleted;
                true
            }
            _ => false,
        }
    }

    /// Rename the key column of a row. Main-key rows are locked.
    pub fn rename_key(&mut self, index: usize, new_key: impl Into<String>) -> bool {
        match self.rows.get_mut(index) {
            Some(row) if !row.is_main_key => {
                row.key = new_key.into();
                true
            }
            _ => false,
        }
    }

    pub fn set_cell(&mut self, index: usize, column: &str, value: Value) -> bool {
        match self.rows.get_mut(index) {
            Some(row) => {
                row.values.insert(column.to_string(), value);
                true
            }
            None => false,
        }
    }

    /// Serialize back to the field-value shape, deleted rows included.
    pub fn to_value(&self) -> Value {
        Value::Array(
            self.rows
                .iter()
                .map(|row| {
                    let mut object = row.values.clone();
                    object.insert(KEY_COLUMN.to_string(), json!(row.key));
                    object.insert(MAIN_KEY_FLAG.to_string(), json!(row.is_main_key));
                    object.insert(DELETED_FLAG.to_string(), json!(row.is_deleted()));
                    Value::Object(object)
                })
                .collect(),
        )
    }
}
