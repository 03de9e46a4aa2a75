//! Effects returned by the session reducer.
//!
//! `update()` never performs I/O; it describes what should happen as an
//! [`Effect`] and the host (or the built-in driver) executes it. Async work
//! comes back into the reducer as another event, outward notifications
//! leave as [`FormSignal`]s.

use std::future::Future;
use std::pin::Pin;

use serde_json::{Map, Value};

/// Outward notification to the hosting application.
#[derive(Debug, Clone, PartialEq)]
pub enum FormSignal {
    /// A field value changed; hosts mirror this to their own handlers.
    ValueChanged { column_key: String, value: Value },
    /// Open an external URL (row actions of kind "view detail").
    OpenUrl(String),
    /// Navigate the host to another form in place.
    NavigateForm(String),
    /// Blocking user-facing alert.
    Alert(String),
    /// Submission payload assembled and ready for the backend.
    Submitted { payload: Map<String, Value> },
}

/// A side effect requested by the reducer.
pub enum Effect<E> {
    None,
    Batch(Vec<Effect<E>>),
    /// Run an async operation and feed its result back as an event.
    Perform(Pin<Box<dyn Future<Output = E> + Send>>),
    Signal(FormSignal),
}

impl<E> Effect<E> {
    /// Wrap an async operation, mapping its output into an event.
    pub fn perform<F, T>(future: F, to_event: impl FnOnce(T) -> E + Send + 'static) -> Self
    where
        F: Future<Output = T> + Send + 'static,
        E: Send + 'static,
    {
        Effect::Perform(Box::pin(async move {
            let result = future.await;
            to_event(result)
        }))
    }

    pub fn batch(effects: Vec<Effect<E>>) -> Self {
        Effect::Batch(effects)
    }

    pub fn signal(signal: FormSignal) -> Self {
        Effect::Signal(signal)
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Effect::None)
    }

    /// Flatten nested batches into leaf effects, dropping `None`s.
    pub fn into_leaves(self) -> Vec<Effect<E>> {
        match self {
            Effect::None => Vec::new(),
            Effect::Batch(effects) => effects
                .into_iter()
                .flat_map(Effect::into_leaves)
                .collect(),
            leaf => vec![leaf],
        }
    }
}

impl<E> Default for Effect<E> {
    fn default() -> Self {
        Effect::None
    }
}

impl<E> std::fmt::Debug for Effect<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Effect::None => write!(f, "None"),
            Effect::Batch(effects) => f.debug_tuple("Batch").field(effects).finish(),
            Effect::Perform(_) => write!(f, "Perform(..)"),
            Effect::Signal(signal) => f.debug_tuple("Signal").field(signal).finish(),
        }
    }
}
