//! Error types for module resolution, event streams and analysis.
//!
//! Configuration problems (`ConfigError`) are fatal and detected before any
//! event is replayed. Failures raised by a single module while it handles an
//! event (`ModuleError`) are recovered by the bus. Stream problems
//! (`StreamError`) follow the configured [`StreamPolicy`](crate::StreamPolicy).

use crate::event::{EventType, Timestamp};
use crate::module_id::ModuleId;
use crate::parser::AnalysisState;
use thiserror::Error;

/// Format a cycle path as a readable string.
fn format_cycle_path(path: &[ModuleId]) -> String {
    if path.is_empty() {
        return String::from("(empty cycle)");
    }
    path.iter()
        .map(|id| id.as_str())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Fatal configuration errors of a module descriptor map.
///
/// # Examples
///
/// ```rust
/// use combatlog::{ConfigError, ModuleId};
///
/// let err = ConfigError::MissingDependency {
///     module: ModuleId::new("scentOfBlood"),
///     dependency: ModuleId::new("spellUsable"),
/// };
/// assert_eq!(
///     err.to_string(),
///     "Module scentOfBlood depends on spellUsable, which is not registered"
/// );
/// ```
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    /// A dependency cycle was detected in the module graph.
    ///
    /// If A depends on B, B on C and C on A, the path is `[A, B, C, A]`.
    #[error("Cycle detected: {}", format_cycle_path(.path))]
    Cycle { path: Vec<ModuleId> },

    /// A module declared a dependency that is not in the descriptor map.
    #[error("Module {module} depends on {dependency}, which is not registered")]
    MissingDependency {
        module: ModuleId,
        dependency: ModuleId,
    },

    /// The same module name was registered twice.
    #[error("Duplicate module: {0}")]
    DuplicateModule(ModuleId),

    /// A module registered a filter with an invalid predicate combination.
    #[error("Module {module} registered an invalid filter: {source}")]
    InvalidFilter {
        module: ModuleId,
        #[source]
        source: FilterError,
    },

    /// A module constructor failed.
    #[error("Failed to construct module {module}: {source}")]
    Construction {
        module: ModuleId,
        #[source]
        source: ModuleError,
    },

    /// A listener was registered after the bus started replaying.
    #[error("Module {0} registered a listener after replay started")]
    LateRegistration(ModuleId),
}

/// Invalid filter definitions, reported when the filter is registered.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FilterError {
    /// A kind-specific predicate was applied to a kind that lacks the field.
    #[error("{predicate} cannot be applied to {event_type} events")]
    UnsupportedPredicate {
        predicate: &'static str,
        event_type: EventType,
    },

    /// A kind-specific predicate was applied to a filter matching any kind.
    #[error("{0} requires a filter on a specific event type")]
    UntypedPredicate(&'static str),

    /// The filter refers to the selected player but the roster has none.
    #[error("Filter refers to the selected player, but the roster has none")]
    NoSelectedPlayer,

    /// The filter lists an empty ability set and can never match.
    #[error("Filter ability set is empty")]
    EmptyAbilitySet,
}

/// Errors raised by module code: constructors and event listeners.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModuleError {
    #[error("{0}")]
    Message(String),

    /// A dependency was not declared or has a different concrete type.
    #[error("Dependency {0} is not declared or has an unexpected type")]
    Dependency(ModuleId),

    #[error(transparent)]
    Filter(#[from] FilterError),

    /// The event bus is sealed and accepts no more listeners.
    #[error("Event bus is sealed")]
    BusSealed,

    /// A listener panicked; the payload message is kept when it was a string.
    #[error("Listener panicked: {0}")]
    Panicked(String),
}

impl ModuleError {
    /// Create a free-form module error.
    pub fn msg(message: impl Into<String>) -> Self {
        ModuleError::Message(message.into())
    }
}

/// Malformed input streams.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StreamError {
    /// Timestamps went backwards under the strict policy.
    #[error("Event {index} at {timestamp}ms precedes the previous event at {previous}ms")]
    OutOfOrder {
        index: usize,
        timestamp: Timestamp,
        previous: Timestamp,
    },

    /// The stream could not be decoded (unknown event type, missing field).
    #[error("Malformed event stream: {0}")]
    Malformed(String),
}

impl From<serde_json::Error> for StreamError {
    fn from(err: serde_json::Error) -> Self {
        StreamError::Malformed(err.to_string())
    }
}

/// Errors that stop an analysis.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AnalysisError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Stream(#[from] StreamError),

    /// Replay was cancelled at an event boundary.
    #[error("Analysis cancelled before the event at {timestamp}ms")]
    Cancelled { timestamp: Timestamp },

    /// An operation was attempted in the wrong orchestrator state.
    #[error("Cannot {action} while the parser is {state}")]
    InvalidState {
        action: &'static str,
        state: AnalysisState,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_error_display() {
        let a = ModuleId::new("A");
        let b = ModuleId::new("B");
        let err = ConfigError::Cycle {
            path: vec![a.clone(), b.clone(), a.clone()],
        };
        assert_eq!(err.to_string(), "Cycle detected: A -> B -> A");
    }

    #[test]
    fn test_empty_cycle_display() {
        let err = ConfigError::Cycle { path: Vec::new() };
        assert!(err.to_string().contains("(empty cycle)"));
    }

    #[test]
    fn test_filter_error_display() {
        let err = FilterError::UnsupportedPredicate {
            predicate: "hit_type",
            event_type: EventType::Cast,
        };
        assert_eq!(err.to_string(), "hit_type cannot be applied to cast events");
    }

    #[test]
    fn test_construction_error_names_module() {
        let err = ConfigError::Construction {
            module: ModuleId::new("resurgence"),
            source: ModuleError::msg("mana pool unknown"),
        };
        let display = err.to_string();
        assert!(display.contains("resurgence"));
        assert!(display.contains("mana pool unknown"));
    }

    #[test]
    fn test_stream_error_from_json() {
        let err: StreamError = serde_json::from_str::<u32>("\"x\"").unwrap_err().into();
        assert!(matches!(err, StreamError::Malformed(_)));
    }
}
