//! Engine Configuration
//!
//! Settings are plain data so embedders can load them alongside the rest of
//! their configuration:
//!
//! ```rust
//! use ripple_core::EngineConfig;
//!
//! let config = EngineConfig::from_json(r#"{ "max_trigger_depth": 16 }"#).unwrap();
//! assert_eq!(config.max_trigger_depth, Some(16));
//! assert!(config.warn_on_readonly_write);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Default limit on nested triggers.
pub const DEFAULT_MAX_TRIGGER_DEPTH: usize = 100;

/// Configuration for an [`Engine`](crate::Engine).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// How many triggers may be nested inside one another before the engine
    /// refuses to rerun effects. `None` disables the guard, in which case an
    /// effect that retriggers itself recurses until the stack overflows.
    pub max_trigger_depth: Option<usize>,

    /// Emit a `tracing` warning when a readonly wrapper rejects a write.
    pub warn_on_readonly_write: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_trigger_depth: Some(DEFAULT_MAX_TRIGGER_DEPTH),
            warn_on_readonly_write: true,
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_max_trigger_depth(mut self, depth: usize) -> Self {
        self.max_trigger_depth = Some(depth);
        self
    }

    /// Disable the trigger depth guard.
    pub fn unbounded(mut self) -> Self {
        self.max_trigger_depth = None;
        self
    }

    pub fn with_readonly_warnings(mut self, enabled: bool) -> Self {
        self.warn_on_readonly_write = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReactiveError;

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_trigger_depth, Some(DEFAULT_MAX_TRIGGER_DEPTH));
        assert!(config.warn_on_readonly_write);
    }

    #[test]
    fn parses_partial_json() {
        let config = EngineConfig::from_json(r#"{"warn_on_readonly_write": false}"#).unwrap();
        assert_eq!(config.max_trigger_depth, Some(DEFAULT_MAX_TRIGGER_DEPTH));
        assert!(!config.warn_on_readonly_write);

        let config = EngineConfig::from_json(r#"{"max_trigger_depth": null}"#).unwrap();
        assert_eq!(config.max_trigger_depth, None);
    }

    #[test]
    fn rejects_unknown_fields() {
        let err = EngineConfig::from_json(r#"{"batching": true}"#).unwrap_err();
        assert!(matches!(err, ReactiveError::Config(_)));
    }

    #[test]
    fn builders() {
        let config = EngineConfig::default()
            .with_max_trigger_depth(4)
            .with_readonly_warnings(false);
        assert_eq!(config.max_trigger_depth, Some(4));
        assert!(!config.warn_on_readonly_write);
        assert_eq!(config.unbounded().max_trigger_depth, None);
    }
}
