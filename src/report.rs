//! The analysis report.
//!
//! Active modules contribute to the report after replay, in resolution
//! order, through a [`ReportBuilder`] scoped to the contributing module.
//! Contribution order is kept; renderers that want the conventional
//! layout use [`Report::statistics_by_position`].

use crate::encounter::Fight;
use crate::error::ModuleError;
use crate::event::Timestamp;
use crate::module_id::ModuleId;
use crate::suggestion::{Suggestion, SuggestionDraft, Threshold};
use serde::{Deserialize, Serialize};

/// Where a statistic box is placed. Lower ranks come first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "tier", content = "index")]
pub enum StatisticOrder {
    /// The handful of numbers every player of the spec looks at.
    Core(u32),
    Optional(u32),
    Unimportant(u32),
}

impl StatisticOrder {
    pub fn rank(self) -> u32 {
        match self {
            StatisticOrder::Core(i) => i,
            StatisticOrder::Optional(i) => 1000 + i,
            StatisticOrder::Unimportant(i) => 2000 + i,
        }
    }
}

impl Default for StatisticOrder {
    fn default() -> Self {
        StatisticOrder::Optional(0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatisticCategory {
    #[default]
    General,
    Talents,
    Covenants,
    Items,
    Theorycraft,
}

/// A statistic box: an opaque payload for the renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistic {
    pub module: ModuleId,
    pub category: StatisticCategory,
    pub position: StatisticOrder,
    pub payload: serde_json::Value,
}

/// A named number, for checklists and comparisons between reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub module: ModuleId,
    pub name: String,
    pub value: f64,
}

/// A module whose listeners or contribution failed at least once.
///
/// Its results may be incomplete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DegradedModule {
    pub module: ModuleId,
    pub failures: u32,
    pub first_error: String,
    /// Timestamp of the first failing event, `None` when the module failed
    /// while contributing.
    pub first_timestamp: Option<Timestamp>,
}

/// The frozen result of one analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub suggestions: Vec<Suggestion>,
    pub statistics: Vec<Statistic>,
    pub summaries: Vec<Summary>,
    pub degraded: Vec<DegradedModule>,
}

impl Report {
    /// Statistics sorted by position. Ties keep contribution order.
    pub fn statistics_by_position(&self) -> Vec<&Statistic> {
        let mut sorted: Vec<&Statistic> = self.statistics.iter().collect();
        sorted.sort_by_key(|s| s.position.rank());
        sorted
    }

    pub fn summary(&self, module: &str, name: &str) -> Option<f64> {
        self.summaries
            .iter()
            .find(|s| s.module.as_str() == module && s.name == name)
            .map(|s| s.value)
    }

    pub fn suggestions_from<'a>(&'a self, module: &'a str) -> impl Iterator<Item = &'a Suggestion> {
        self.suggestions
            .iter()
            .filter(move |s| s.module.as_str() == module)
    }

    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }
}

/// Write access to the report for one module.
pub struct ReportBuilder<'a> {
    module: &'a ModuleId,
    fight: &'a Fight,
    report: &'a mut Report,
}

impl<'a> ReportBuilder<'a> {
    pub(crate) fn new(module: &'a ModuleId, fight: &'a Fight, report: &'a mut Report) -> Self {
        Self {
            module,
            fight,
            report,
        }
    }

    pub fn module(&self) -> &ModuleId {
        self.module
    }

    pub fn fight(&self) -> &Fight {
        self.fight
    }

    /// Fight duration in milliseconds.
    pub fn fight_duration(&self) -> Timestamp {
        self.fight.duration()
    }

    /// Add a statistic box.
    ///
    /// Fails if `payload` cannot be represented as JSON.
    pub fn statistic(
        &mut self,
        category: StatisticCategory,
        position: StatisticOrder,
        payload: impl Serialize,
    ) -> Result<(), ModuleError> {
        let payload = serde_json::to_value(payload)
            .map_err(|e| ModuleError::msg(format!("statistic payload: {e}")))?;
        self.report.statistics.push(Statistic {
            module: self.module.clone(),
            category,
            position,
            payload,
        });
        Ok(())
    }

    pub fn summary(&mut self, name: impl Into<String>, value: f64) {
        self.report.summaries.push(Summary {
            module: self.module.clone(),
            name: name.into(),
            value,
        });
    }

    /// Start a suggestion that is only added if `threshold` is crossed.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use combatlog::report::ReportBuilder;
    /// use combatlog::suggestion::{SuggestionDraft, Threshold};
    /// use combatlog::format::format_number;
    ///
    /// fn suggest_drops(report: &mut ReportBuilder<'_>, drops: f64) {
    ///     report
    ///         .when(Threshold::is_greater_than(drops, 0.0, 1.0, 3.0))
    ///         .add_suggestion(|actual, recommended| {
    ///             SuggestionDraft::new("You let Furious Slash drop during the fight.")
    ///                 .ability(100130)
    ///                 .actual(format!("{} times dropped", format_number(actual)))
    ///                 .recommended(format!("{} is recommended", format_number(recommended)))
    ///         });
    /// }
    /// ```
    pub fn when(&mut self, threshold: Threshold) -> When<'_, 'a> {
        When {
            builder: self,
            threshold,
        }
    }
}

/// A pending suggestion, see [`ReportBuilder::when`].
pub struct When<'b, 'a> {
    builder: &'b mut ReportBuilder<'a>,
    threshold: Threshold,
}

impl When<'_, '_> {
    /// Build and add the suggestion if the threshold is crossed.
    ///
    /// `build` receives the actual and recommended values and is not
    /// called when no tier is crossed.
    pub fn add_suggestion<F>(self, build: F)
    where
        F: FnOnce(f64, f64) -> SuggestionDraft,
    {
        let Some(severity) = self.threshold.severity() else {
            return;
        };
        let draft = build(self.threshold.actual(), self.threshold.recommended());
        let suggestion = draft.finish(self.builder.module.clone(), severity, &self.threshold);
        self.builder.report.suggestions.push(suggestion);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suggestion::Severity;

    #[test]
    fn test_suggestion_only_when_crossed() {
        let module = ModuleId::new("uptime");
        let fight = Fight::new(0, 60_000, 1);
        let mut report = Report::default();
        let mut builder = ReportBuilder::new(&module, &fight, &mut report);

        builder
            .when(Threshold::is_less_than(0.99, 0.95, 0.9, 0.8))
            .add_suggestion(|_, _| panic!("threshold not crossed"));
        builder
            .when(Threshold::is_less_than(0.5, 0.95, 0.9, 0.8))
            .add_suggestion(|_, recommended| {
                assert_eq!(recommended, 0.95);
                SuggestionDraft::new("Keep it up")
            });

        assert_eq!(report.suggestions.len(), 1);
        assert_eq!(report.suggestions[0].severity, Severity::Major);
        assert_eq!(report.suggestions[0].module, module);
    }

    #[test]
    fn test_statistics_by_position_is_stable() {
        let module = ModuleId::new("m");
        let fight = Fight::new(0, 1, 1);
        let mut report = Report::default();
        let mut builder = ReportBuilder::new(&module, &fight, &mut report);
        builder
            .statistic(StatisticCategory::General, StatisticOrder::Optional(1), "late")
            .unwrap();
        builder
            .statistic(StatisticCategory::General, StatisticOrder::Core(5), "first")
            .unwrap();
        builder
            .statistic(StatisticCategory::Talents, StatisticOrder::Optional(1), "later")
            .unwrap();
        builder
            .statistic(StatisticCategory::General, StatisticOrder::Unimportant(0), "last")
            .unwrap();

        let payloads: Vec<&str> = report
            .statistics_by_position()
            .iter()
            .filter_map(|s| s.payload.as_str())
            .collect();
        assert_eq!(payloads, vec!["first", "late", "later", "last"]);
    }

    #[test]
    fn test_summary_lookup() {
        let module = ModuleId::new("abilityTracker");
        let fight = Fight::new(0, 1, 1);
        let mut report = Report::default();
        ReportBuilder::new(&module, &fight, &mut report).summary("casts", 12.0);

        assert_eq!(report.summary("abilityTracker", "casts"), Some(12.0));
        assert_eq!(report.summary("abilityTracker", "hits"), None);
        assert!(!report.is_degraded());
    }

    #[test]
    fn test_report_serializes() {
        let json = serde_json::to_value(Report::default()).unwrap();
        assert!(json["suggestions"].as_array().unwrap().is_empty());
        assert!(json["degraded"].as_array().unwrap().is_empty());
    }
}
