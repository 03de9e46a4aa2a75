use thiserror::Error;

/// Errors the engine core can produce while interpreting a form schema.
///
/// Most rule/config gaps deliberately do NOT error — missing data degrades to
/// the most permissive decision (visible, enabled, not required). The
/// variants here are the cases that must keep their identity so callers can
/// route them: user-facing alerts vs. inline field errors vs. log-only
/// diagnostics.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A rule's `txFo` payload was not valid JSON. Detected at schema parse
    /// time but surfaced when the rule is exercised.
    #[error("malformed txFo on rule for '{subject}': {detail}")]
    MalformedTxFo { subject: String, detail: String },

    /// A transaction descriptor carried a `txcode` the engine does not know.
    /// Always user-facing, never a silent fallback.
    #[error("unknown transaction code '{0}'")]
    UnknownTxCode(String),

    /// Sub-form recursion went past the defensive depth bound.
    #[error("sub-form nesting exceeds the maximum depth of {max}")]
    SubFormDepthExceeded { max: usize },

    /// A transaction completed but its response carried no usable payload
    /// for the requested field.
    #[error("transaction '{txcode}' returned no value for field '{field}'")]
    EmptyTxResult { txcode: String, field: String },

    /// The gateway rejected an upload because the file is already in use
    /// elsewhere (HTTP 409). A domain conflict, not a transport failure.
    #[error("file '{0}' is already used")]
    FileAlreadyUsed(String),

    /// The schema failed a hard integrity check and cannot be interpreted.
    #[error("schema integrity: {0}")]
    Integrity(String),
}

impl EngineError {
    /// Whether this error should be raised as a blocking alert to the user,
    /// as opposed to an inline field error or a log-only diagnostic.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            EngineError::UnknownTxCode(_)
                | EngineError::MalformedTxFo { .. }
                | EngineError::SubFormDepthExceeded { .. }
        )
    }
}
