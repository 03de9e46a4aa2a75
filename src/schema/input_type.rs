//! The `inputtype` discriminator tag.

use serde::{Deserialize, Deserializer};

/// Every input tag the dispatcher understands, plus the explicit
/// `Unsupported` seam for tags added server-side before the engine learns
/// them. Adding a widget means adding a variant and a registry entry, not
/// touching existing arms.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InputType {
    TextInput,
    /// Text input with a function trigger; carries a lookup when the config
    /// names a `callform`.
    TextInputFunc,
    /// The free-text search box driving the result table.
    TextInputSearch,
    DateTime,
    TimeSheet,
    Image,
    Currency,
    Select,
    CheckBox,
    Button,
    /// Paginated search-result table.
    TableSearch,
    /// Editable key/value row table with soft delete and main keys.
    TableDynamic,
    Unsupported(String),
}

impl InputType {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "cTextInput" => InputType::TextInput,
            "cTextInputFunc" => InputType::TextInputFunc,
            "cTextInputSearch" => InputType::TextInputSearch,
            "jInputDateTime" => InputType::DateTime,
            "jInputTimeSheet" => InputType::TimeSheet,
            "cImage" => InputType::Image,
            "jCurrency" => InputType::Currency,
            "jSelect" => InputType::Select,
            "cCheckBox" => InputType::CheckBox,
            "cButton" => InputType::Button,
            "jTableSearch" => InputType::TableSearch,
            "cTableDynamic" => InputType::TableDynamic,
            other => InputType::Unsupported(other.to_string()),
        }
    }

    pub fn as_tag(&self) -> &str {
        match self {
            InputType::TextInput => "cTextInput",
            InputType::TextInputFunc => "cTextInputFunc",
            InputType::TextInputSearch => "cTextInputSearch",
            InputType::DateTime => "jInputDateTime",
            InputType::TimeSheet => "jInputTimeSheet",
            InputType::Image => "cImage",
            InputType::Currency => "jCurrency",
            InputType::Select => "jSelect",
            InputType::CheckBox => "cCheckBox",
            InputType::Button => "cButton",
            InputType::TableSearch => "jTableSearch",
            InputType::TableDynamic => "cTableDynamic",
            InputType::Unsupported(tag) => tag,
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, InputType::Unsupported(_))
    }

    /// Whether this input binds a value under its column key. Buttons,
    /// search boxes, and search tables have behavior but no bound value.
    pub fn binds_value(&self) -> bool {
        !matches!(
            self,
            InputType::Button
                | InputType::TextInputSearch
                | InputType::TableSearch
                | InputType::Unsupported(_)
        )
    }
}

impl<'de> Deserialize<'de> for InputType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let tag = String::deserialize(deserializer)?;
        Ok(InputType::from_tag(&tag))
    }
}
