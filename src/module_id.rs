//! Module identifier module.
//!
//! Provides the `ModuleId` type, the explicit name under which an analyzer
//! is registered and by which other analyzers declare it as a dependency.
//! Uses `Arc<str>` so ids are cheap to clone into graphs, listeners and
//! report entries.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Borrow;
use std::sync::Arc;

/// Interned string identifier for analyzer modules.
///
/// # Examples
///
/// ```rust
/// use combatlog::ModuleId;
///
/// let tracker = ModuleId::new("abilityTracker");
/// let same: ModuleId = "abilityTracker".into();
///
/// assert_eq!(tracker, same);
/// assert_eq!(tracker.as_str(), "abilityTracker");
/// ```
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct ModuleId(Arc<str>);

impl Serialize for ModuleId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.as_ref().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ModuleId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(ModuleId::from(s))
    }
}

impl ModuleId {
    /// Create a new `ModuleId` from a string slice.
    pub fn new(name: &str) -> Self {
        Self(Arc::from(name))
    }

    /// Get the string representation of this `ModuleId`.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Lets maps keyed by `ModuleId` be queried with a plain `&str`.
impl Borrow<str> for ModuleId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ModuleId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ModuleId {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl From<&ModuleId> for ModuleId {
    fn from(id: &ModuleId) -> Self {
        id.clone()
    }
}

impl std::fmt::Display for ModuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_id_equality() {
        let a = ModuleId::new("buffs");
        let b: ModuleId = String::from("buffs").into();
        assert_eq!(a, b);
    }

    #[test]
    fn test_module_id_serde_is_plain_string() {
        let id = ModuleId::new("deathTracker");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"deathTracker\"");

        let back: ModuleId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_module_id_display() {
        assert_eq!(ModuleId::new("focusTracker").to_string(), "focusTracker");
    }
}
