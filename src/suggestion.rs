//! Suggestion thresholds.
//!
//! A [`Threshold`] pairs an observed value with three tiers. The severity
//! of a suggestion is the highest tier the value crosses, and the minor
//! tier is what the suggestion recommends:
//!
//! ```rust
//! use combatlog::suggestion::{Severity, Threshold, ThresholdStyle};
//!
//! // Furious Slash uptime of 70%, with 90/80/70% tiers.
//! let uptime = Threshold::is_less_than(0.70, 0.90, 0.80, 0.70)
//!     .style(ThresholdStyle::Percentage);
//!
//! assert_eq!(uptime.severity(), Some(Severity::Average));
//! assert_eq!(uptime.format_recommended(), "90.00%");
//! ```

use crate::event::AbilityId;
use crate::format::{format_duration, format_number, format_percentage, format_thousands};
use crate::module_id::ModuleId;
use serde::{Deserialize, Serialize};

/// How bad a finding is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Minor,
    Average,
    Major,
}

/// How the actual and recommended values of a threshold are rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdStyle {
    /// A ratio rendered as `45.67%`.
    Percentage,
    /// Abbreviated with [`format_number`].
    #[default]
    Number,
    Thousands,
    Decimal,
    /// A duration in seconds rendered as `m:ss`.
    Seconds,
}

impl ThresholdStyle {
    pub fn format(self, value: f64) -> String {
        match self {
            ThresholdStyle::Percentage => format!("{}%", format_percentage(value)),
            ThresholdStyle::Number => format_number(value),
            ThresholdStyle::Thousands => format_thousands(value),
            ThresholdStyle::Decimal => format!("{:.2}", value),
            ThresholdStyle::Seconds => format_duration(value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Comparison {
    GreaterThan { minor: f64, average: f64, major: f64 },
    LessThan { minor: f64, average: f64, major: f64 },
    Equal(f64),
}

/// An observed value checked against severity tiers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Threshold {
    actual: f64,
    comparison: Comparison,
    style: ThresholdStyle,
}

impl Threshold {
    /// Flag values above the tiers, for things that should stay low
    /// (wasted resources, downtime).
    pub fn is_greater_than(actual: f64, minor: f64, average: f64, major: f64) -> Self {
        Self {
            actual,
            comparison: Comparison::GreaterThan {
                minor,
                average,
                major,
            },
            style: ThresholdStyle::default(),
        }
    }

    /// Flag values below the tiers, for things that should stay high
    /// (uptime, cast efficiency).
    pub fn is_less_than(actual: f64, minor: f64, average: f64, major: f64) -> Self {
        Self {
            actual,
            comparison: Comparison::LessThan {
                minor,
                average,
                major,
            },
            style: ThresholdStyle::default(),
        }
    }

    /// Flag any value different from `expected` as a major issue.
    pub fn is_equal(actual: f64, expected: f64) -> Self {
        Self {
            actual,
            comparison: Comparison::Equal(expected),
            style: ThresholdStyle::default(),
        }
    }

    pub fn style(mut self, style: ThresholdStyle) -> Self {
        self.style = style;
        self
    }

    pub fn actual(&self) -> f64 {
        self.actual
    }

    /// The value a player should aim for: the minor tier.
    pub fn recommended(&self) -> f64 {
        match self.comparison {
            Comparison::GreaterThan { minor, .. } | Comparison::LessThan { minor, .. } => minor,
            Comparison::Equal(expected) => expected,
        }
    }

    /// The highest tier crossed, `None` when the value is fine.
    pub fn severity(&self) -> Option<Severity> {
        let actual = self.actual;
        match self.comparison {
            Comparison::GreaterThan {
                minor,
                average,
                major,
            } => {
                if actual > major {
                    Some(Severity::Major)
                } else if actual > average {
                    Some(Severity::Average)
                } else if actual > minor {
                    Some(Severity::Minor)
                } else {
                    None
                }
            }
            Comparison::LessThan {
                minor,
                average,
                major,
            } => {
                if actual < major {
                    Some(Severity::Major)
                } else if actual < average {
                    Some(Severity::Average)
                } else if actual < minor {
                    Some(Severity::Minor)
                } else {
                    None
                }
            }
            Comparison::Equal(expected) => (actual != expected).then_some(Severity::Major),
        }
    }

    pub fn format_actual(&self) -> String {
        self.style.format(self.actual)
    }

    pub fn format_recommended(&self) -> String {
        self.style.format(self.recommended())
    }
}

/// One actionable finding in the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub module: ModuleId,
    pub severity: Severity,
    pub message: String,
    pub actual: String,
    pub recommended: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ability: Option<AbilityId>,
}

/// The text of a suggestion, before its severity is known.
///
/// Actual and recommended texts default to the threshold's formatted
/// values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SuggestionDraft {
    message: String,
    ability: Option<AbilityId>,
    actual: Option<String>,
    recommended: Option<String>,
}

impl SuggestionDraft {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    /// The ability the suggestion is about, used by renderers for icons.
    pub fn ability(mut self, ability: impl Into<AbilityId>) -> Self {
        self.ability = Some(ability.into());
        self
    }

    pub fn actual(mut self, text: impl Into<String>) -> Self {
        self.actual = Some(text.into());
        self
    }

    pub fn recommended(mut self, text: impl Into<String>) -> Self {
        self.recommended = Some(text.into());
        self
    }

    pub(crate) fn finish(
        self,
        module: ModuleId,
        severity: Severity,
        threshold: &Threshold,
    ) -> Suggestion {
        Suggestion {
            module,
            severity,
            message: self.message,
            actual: self.actual.unwrap_or_else(|| threshold.format_actual()),
            recommended: self
                .recommended
                .unwrap_or_else(|| format!("{} is recommended", threshold.format_recommended())),
            ability: self.ability,
        }
    }
}
