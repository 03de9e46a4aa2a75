//! Mutable state of one form session.
//!
//! Everything the original render tree threaded through as individually
//! named props lives here as one owned struct: values, search, pagination,
//! option caches, upload progress, table rows. Only the reducer mutates it;
//! composition reads it.

use std::collections::HashMap;

use serde_json::Value;

use crate::engine::node::{Choice, UploadState};
use crate::engine::rules::FormMode;
use crate::engine::table::RowSet;
use crate::engine::values::ValueMap;
use crate::schema::PageData;

/// Fetched options of one select-type field.
#[derive(Debug, Clone, Default)]
pub struct ChoiceState {
    pub choices: Vec<Choice>,
    pub loading: bool,
    /// Set after the first fetch completes. Dependent selects evaluate
    /// their filter once; changing the filtering field later does not
    /// refetch. Kept that way on purpose.
    pub fetched: bool,
}

#[derive(Debug, Default)]
pub struct SessionState {
    pub mode: FormMode,
    pub values: ValueMap,
    /// Active tab index per layout id.
    pub active_tabs: HashMap<String, usize>,
    pub search_text: String,
    pub search_results: Option<PageData<Value>>,
    pub searching: bool,
    pub advanced_open: bool,
    /// Option state per column key.
    pub choices: HashMap<String, ChoiceState>,
    /// Upload progress per column key.
    pub uploads: HashMap<String, UploadState>,
    /// Inline errors per column key.
    pub field_errors: HashMap<String, String>,
    /// Click-time button toggles, overriding render-time evaluation.
    pub button_disabled: HashMap<String, bool>,
    /// Row sets per dynamic-table column key.
    pub tables: HashMap<String, RowSet>,
    /// One flag for the whole session: control-value resolution runs for
    /// the first rule-bearing field only, then this latches. Fields after
    /// the first never resolve. A known limitation carried over intact.
    pub control_value_fetched: bool,
    generation: u64,
    search_seq: u64,
}

impl SessionState {
    pub fn new(mode: FormMode) -> SessionState {
        SessionState { mode, ..SessionState::default() }
    }

    /// Stamp for in-flight async work. Results tagged with an older stamp
    /// are dropped when they arrive.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn bump_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }

    /// Sequence number of the latest search. Each new search supersedes
    /// in-flight ones; their results are dropped on arrival.
    pub fn bump_search(&mut self) -> u64 {
        self.search_seq += 1;
        self.search_seq
    }

    pub fn is_current_search(&self, seq: u64) -> bool {
        self.search_seq == seq
    }

    pub fn active_tab(&self, layout_id: &str) -> usize {
        self.active_tabs.get(layout_id).copied().unwrap_or(0)
    }

    /// Current value rendered as text, the way text-like widgets show it.
    pub fn value_text(&self, column_key: &str) -> String {
        match self.values.get(column_key) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Bool(b)) => b.to_string(),
            _ => String::new(),
        }
    }

    /// Current value read as a checkbox state.
    pub fn value_bool(&self, column_key: &str) -> bool {
        match self.values.get(column_key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s == "true" || s == "1",
            Some(Value::Number(n)) => n.as_i64() == Some(1),
            _ => false,
        }
    }

    pub fn choice_state(&self, column_key: &str) -> Option<&ChoiceState> {
        self.choices.get(column_key)
    }

    pub fn table(&self, column_key: &str) -> Option<&RowSet> {
        self.tables.get(column_key)
    }
}
