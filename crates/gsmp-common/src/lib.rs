//! GSMP reduction common types and errors.
//!
//! This crate provides the vocabulary shared by the configuration and core
//! crates:
//! - State and event identifiers
//! - The unified error type with stable codes

pub mod error;
pub mod id;

pub use error::{Error, ErrorCategory, Result, StructuredError, SuggestedAction};
pub use id::{EventId, StateId};
