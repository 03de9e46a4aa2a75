//! Wire-format decoding: everything stringly in the form-design JSON is
//! parsed exactly once here into typed structures the engine consumes.

pub mod form;
pub mod input_type;
pub mod integrity;
pub mod page;
pub mod row_action;
pub mod rules;
pub mod txfo;

pub use form::{DefaultExpr, FormDesign, FormInput, FormLayout, FormView, InputConfig, InputDefault, LocaleText, ValidateSpec};
pub use input_type::InputType;
pub use integrity::{Finding, IntegrityReport, Severity};
pub use page::PageData;
pub use row_action::RowAction;
pub use rules::{FieldKeySet, Rule, RuleCode, RuleEvent, RuleSet};
pub use txfo::{TxCode, TxDescriptor, TxFoSource};
