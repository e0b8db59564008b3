//! Deaths and resurrections of the selected player.

use crate::encounter::{Combatant, Fight};
use crate::error::ModuleError;
use crate::event::{Event, Timestamp};
use crate::filter::{Events, SELECTED_PLAYER};
use crate::format::format_duration;
use crate::module::{Analyzer, AnalyzerModule, Dependencies, ModuleContext};
use crate::report::ReportBuilder;
use crate::suggestion::{SuggestionDraft, Threshold, ThresholdStyle};

/// Deaths and resurrections of the selected player.
#[derive(Debug)]
pub struct DeathTracker {
    fight_end: Timestamp,
    deaths: Vec<Timestamp>,
    resurrections: Vec<Timestamp>,
    dead_since: Option<Timestamp>,
    time_dead: Timestamp,
}

impl DeathTracker {
    fn on_death(&mut self, event: &Event, _deps: &Dependencies<'_>) -> Result<(), ModuleError> {
        self.deaths.push(event.timestamp);
        self.dead_since.get_or_insert(event.timestamp);
        Ok(())
    }

    fn on_resurrect(&mut self, event: &Event, _deps: &Dependencies<'_>) -> Result<(), ModuleError> {
        self.resurrections.push(event.timestamp);
        if let Some(since) = self.dead_since.take() {
            self.time_dead += event.timestamp.saturating_sub(since);
        }
        Ok(())
    }

    pub fn deaths(&self) -> &[Timestamp] {
        &self.deaths
    }

    pub fn resurrections(&self) -> &[Timestamp] {
        &self.resurrections
    }

    pub fn is_alive(&self) -> bool {
        self.dead_since.is_none()
    }

    /// Milliseconds spent dead, counting an unresolved death until the end
    /// of the fight.
    pub fn time_dead(&self) -> Timestamp {
        let open = self
            .dead_since
            .map_or(0, |since| self.fight_end.saturating_sub(since));
        self.time_dead + open
    }
}

impl Analyzer for DeathTracker {
    fn contribute(
        &self,
        report: &mut ReportBuilder<'_>,
        _deps: &Dependencies<'_>,
    ) -> Result<(), ModuleError> {
        let deaths = self.deaths.len() as f64;
        let time_dead = self.time_dead();
        report.summary("deaths", deaths);
        report.summary("time_dead", time_dead as f64);

        report
            .when(Threshold::is_greater_than(deaths, 0.0, 0.0, 0.0).style(ThresholdStyle::Number))
            .add_suggestion(|actual, _| {
                SuggestionDraft::new(
                    "You died during the fight. Avoidable damage and defensive cooldowns are \
                     worth reviewing.",
                )
                .actual(format!(
                    "{} death(s), {} spent dead",
                    actual,
                    format_duration(time_dead as f64 / 1000.0)
                ))
                .recommended("0 deaths is recommended")
            });
        Ok(())
    }
}

impl AnalyzerModule for DeathTracker {
    fn is_active(_combatant: &Combatant, _fight: &Fight) -> bool {
        true
    }

    fn new(ctx: &mut ModuleContext<'_, Self>) -> Result<Self, ModuleError> {
        ctx.on(Events::death().to(SELECTED_PLAYER), Self::on_death)?;
        ctx.on(Events::resurrect().to(SELECTED_PLAYER), Self::on_resurrect)?;
        Ok(Self {
            fight_end: ctx.fight().end_time,
            deaths: Vec::new(),
            resurrections: Vec::new(),
            dead_since: None,
            time_dead: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::ActorId;
    use crate::event::EventKind;
    use crate::parser::CombatLogParser;
    use crate::registry::{ModuleDescriptor, ModuleMap};
    use crate::suggestion::Severity;

    fn death(ts: Timestamp, target: i64) -> Event {
        Event::new(ts, ActorId(99), EventKind::Death).with_target(ActorId(target))
    }

    fn resurrect(ts: Timestamp) -> Event {
        Event::new(ts, ActorId(2), EventKind::Resurrect).with_target(ActorId(1))
    }

    fn map() -> ModuleMap {
        ModuleMap::new().with(ModuleDescriptor::of::<DeathTracker>("deaths"))
    }

    #[test]
    fn test_time_dead_and_suggestion() {
        let mut parser = CombatLogParser::new(map(), crate::modules::test_encounter());
        let report = parser
            .run(vec![death(10_000, 1), resurrect(40_000), death(70_000, 1), death(75_000, 2)])
            .unwrap();

        let tracker = parser.module::<DeathTracker>("deaths").unwrap();
        assert_eq!(tracker.deaths(), &[10_000, 70_000]);
        assert!(!tracker.is_alive());
        // 30s before the resurrect, 30s until the fight ends
        assert_eq!(tracker.time_dead(), 60_000);

        assert_eq!(report.summary("deaths", "deaths"), Some(2.0));
        let suggestions: Vec<_> = report.suggestions_from("deaths").collect();
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].severity, Severity::Major);
        assert_eq!(suggestions[0].actual, "2 death(s), 1:00 spent dead");
    }

    #[test]
    fn test_no_deaths_no_suggestion() {
        let mut parser = CombatLogParser::new(map(), crate::modules::test_encounter());
        let report = parser.run(vec![death(10_000, 2)]).unwrap();

        assert!(report.suggestions.is_empty());
        assert_eq!(report.summary("deaths", "time_dead"), Some(0.0));
    }
}
