//! Headless rendering engine for metadata-driven forms.
//!
//! A gateway describes each screen as a JSON form design: inputs, layout
//! blocks, and string-encoded rules. This crate decodes that document once
//! into typed structures ([`schema`]), evaluates the rules and dynamic
//! values ([`engine`]), and drives the whole thing through an event-loop
//! session ([`engine::FormSession`]) that any frontend can sit on top of.
//! The [`cli`] binary is one such frontend used for inspection.

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod schema;
pub mod services;

pub use engine::{Effect, FormEvent, FormMode, FormSession, FormSignal};
pub use error::EngineError;
pub use schema::FormDesign;
pub use services::Services;
