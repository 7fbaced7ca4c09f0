//! Error types for the reactive engine.
//!
//! Mutations are the only fallible operations. Reads never fail: a missing
//! property simply reads as [`Value::Undefined`](crate::Value::Undefined).

use thiserror::Error;

use crate::data::Key;

/// Errors reported by writes through observation wrappers and raw targets.
#[derive(Debug, Error)]
pub enum ReactiveError {
    /// A write was attempted through a readonly wrapper. Nothing was mutated.
    #[error("cannot set key `{key}` on readonly target {target}")]
    ReadonlyWrite {
        /// JSON rendering of the target.
        target: String,
        key: Key,
    },

    /// `length` was set to something other than a non-negative integer.
    #[error("invalid array length: {0}")]
    InvalidArrayLength(String),

    /// An array index past the largest array length was written.
    #[error("array index {index} is out of range")]
    IndexOutOfRange { index: usize },

    /// Arrays only own indices and `length`.
    #[error("key `{key}` is not supported on arrays")]
    UnsupportedKey { key: Key },

    /// An array-only operation was used on an object.
    #[error("target is not an array")]
    NotAnArray,

    /// Nested triggers went deeper than the configured limit. The write that
    /// hit the limit was applied, but its dependents were not rerun.
    #[error("trigger depth limit of {limit} exceeded while setting `{key}`")]
    TriggerDepthExceeded { limit: usize, key: Key },

    #[error("invalid engine config: {0}")]
    Config(#[from] serde_json::Error),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ReactiveError>;
