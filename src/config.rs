//! Configuration for analyses and modules.
//!
//! [`AnalysisConfig`] holds the orchestrator-wide policies. [`ModuleConfig`]
//! is the static per-descriptor configuration a spec hands to one module,
//! for example overriding a shared module's cast efficiency. The core does
//! not interpret module config; it is passed through to the constructor.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How the event stream handles timestamps that go backwards.
///
/// Equal timestamps are always accepted and keep their arrival order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamPolicy {
    /// Stable-sort out-of-order events by timestamp and log a warning.
    #[default]
    Sort,
    /// Reject the stream at the first out-of-order event.
    Strict,
}

/// Orchestrator-wide settings.
///
/// # Examples
///
/// ```rust
/// use combatlog::{AnalysisConfig, StreamPolicy};
///
/// let config: AnalysisConfig =
///     serde_json::from_str(r#"{"stream_policy": "strict"}"#).unwrap();
///
/// assert_eq!(config.stream_policy, StreamPolicy::Strict);
/// assert!(config.isolate_panics);
/// assert!(!config.clip_to_fight);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub stream_policy: StreamPolicy,
    /// Catch listener panics and treat them like listener errors.
    pub isolate_panics: bool,
    /// Drop events outside the fight window before replay.
    pub clip_to_fight: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            stream_policy: StreamPolicy::Sort,
            isolate_panics: true,
            clip_to_fight: false,
        }
    }
}

/// Static key/value configuration attached to one module descriptor.
///
/// # Examples
///
/// ```rust
/// use combatlog::ModuleConfig;
///
/// let mut config = ModuleConfig::new();
/// config.set("cast_efficiency", Option::<f64>::None);
/// config.set("min_uptime", 0.9);
///
/// assert!(config.is_null("cast_efficiency"));
/// assert_eq!(config.get::<f64>("min_uptime"), Some(0.9));
/// assert_eq!(config.get::<f64>("missing"), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleConfig {
    data: HashMap<String, serde_json::Value>,
}

impl ModuleConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a config value.
    ///
    /// The value must be serializable. If serialization fails, the value
    /// is silently not added.
    pub fn set(&mut self, key: impl Into<String>, value: impl Serialize) {
        if let Ok(json_value) = serde_json::to_value(value) {
            self.data.insert(key.into(), json_value);
        }
    }

    /// Builder form of [`set`](Self::set).
    pub fn with(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        self.set(key, value);
        self
    }

    /// Get a config value.
    ///
    /// Returns `None` if the key doesn't exist or if the value
    /// cannot be deserialized to the requested type.
    pub fn get<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Whether `key` is explicitly set to `null`, the conventional way of
    /// switching a shared behavior off.
    pub fn is_null(&self, key: &str) -> bool {
        matches!(self.data.get(key), Some(serde_json::Value::Null))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_set_get() {
        let config = ModuleConfig::new().with("threshold", 5);
        assert_eq!(config.get::<i32>("threshold"), Some(5));
        assert!(config.contains_key("threshold"));
        assert!(!config.is_null("threshold"));
    }

    #[test]
    fn test_config_wrong_type() {
        let config = ModuleConfig::new().with("name", "focus");
        assert_eq!(config.get::<i32>("name"), None);
    }

    #[test]
    fn test_analysis_config_defaults() {
        let config: AnalysisConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, AnalysisConfig::default());
        assert_eq!(config.stream_policy, StreamPolicy::Sort);
    }

    #[test]
    fn test_module_config_is_plain_object() {
        let config: ModuleConfig =
            serde_json::from_str(r#"{"cast_efficiency": null}"#).unwrap();
        assert!(config.is_null("cast_efficiency"));
    }
}
