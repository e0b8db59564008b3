//! Analysis orchestrator.
//!
//! [`CombatLogParser`] drives one analysis through its states:
//!
//! ```text
//! Idle -> Resolving -> Replaying -> Aggregating -> Done
//!            \             \             \
//!             +-------------+-------------+--> Failed
//! ```
//!
//! A parser analyzes one fight once. Listener failures never prevent
//! `Done`: they are flagged in the report instead.

use crate::bus::{panic_message, CancellationToken, EventBus, ReplayStats};
use crate::config::AnalysisConfig;
use crate::encounter::Encounter;
use crate::error::{AnalysisError, ConfigError, ModuleError};
use crate::event::Event;
use crate::module::Analyzer;
use crate::module_id::ModuleId;
use crate::registry::{ModuleMap, ModuleSet};
use crate::report::{DegradedModule, Report, ReportBuilder};
use crate::stream::EventStream;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Lifecycle of a [`CombatLogParser`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnalysisState {
    Idle,
    Resolving,
    Replaying,
    Aggregating,
    Done,
    Failed,
}

impl AnalysisState {
    pub fn is_terminal(self) -> bool {
        matches!(self, AnalysisState::Done | AnalysisState::Failed)
    }
}

impl fmt::Display for AnalysisState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AnalysisState::Idle => "idle",
            AnalysisState::Resolving => "resolving",
            AnalysisState::Replaying => "replaying",
            AnalysisState::Aggregating => "aggregating",
            AnalysisState::Done => "done",
            AnalysisState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A fatal error, with the state the parser was in when it happened.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("Analysis failed while {state}: {error}")]
pub struct AnalysisFailure {
    pub state: AnalysisState,
    #[source]
    pub error: AnalysisError,
}

impl AnalysisFailure {
    /// The module responsible, when the failure is tied to one.
    pub fn module(&self) -> Option<&ModuleId> {
        match &self.error {
            AnalysisError::Config(
                ConfigError::MissingDependency { module, .. }
                | ConfigError::InvalidFilter { module, .. }
                | ConfigError::Construction { module, .. }
                | ConfigError::DuplicateModule(module)
                | ConfigError::LateRegistration(module),
            ) => Some(module),
            AnalysisError::Config(ConfigError::Cycle { path }) => path.first(),
            _ => None,
        }
    }
}

/// Runs one analysis of one fight.
///
/// # Examples
///
/// ```rust
/// use combatlog::modules::core_modules;
/// use combatlog::parser::{AnalysisState, CombatLogParser};
/// use combatlog::{Actor, ActorId, ActorRole, Combatant, Encounter, Event, EventKind, Fight, Roster};
///
/// let encounter = Encounter::new(
///     Fight::new(0, 60_000, 2407),
///     Roster::new([Actor::new(ActorId(1), "Warrior", ActorRole::SelectedPlayer)]),
///     Combatant::new(ActorId(1), 72),
/// );
/// let events = vec![
///     Event::new(1_000, ActorId(1), EventKind::Cast).with_ability(100130),
///     Event::new(1_000, ActorId(1), EventKind::damage(5_000))
///         .with_target(ActorId(99))
///         .with_ability(100130),
/// ];
///
/// let mut parser = CombatLogParser::new(core_modules(), encounter);
/// let report = parser.run(events).unwrap();
///
/// assert_eq!(parser.state(), AnalysisState::Done);
/// assert_eq!(report.summary("abilityTracker", "casts"), Some(1.0));
/// ```
pub struct CombatLogParser {
    modules: ModuleMap,
    encounter: Encounter,
    config: AnalysisConfig,
    state: AnalysisState,
    cancel: CancellationToken,
    resolved: Option<(ModuleSet, EventBus)>,
    stats: ReplayStats,
}

impl CombatLogParser {
    pub fn new(modules: ModuleMap, encounter: Encounter) -> Self {
        Self {
            modules,
            encounter,
            config: AnalysisConfig::default(),
            state: AnalysisState::Idle,
            cancel: CancellationToken::new(),
            resolved: None,
            stats: ReplayStats::default(),
        }
    }

    pub fn with_config(mut self, config: AnalysisConfig) -> Self {
        self.config = config;
        self
    }

    pub fn state(&self) -> AnalysisState {
        self.state
    }

    pub fn encounter(&self) -> &Encounter {
        &self.encounter
    }

    /// A handle that cancels the replay from another thread.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Counters of the replay, zero until one ran.
    pub fn replay_stats(&self) -> ReplayStats {
        self.stats
    }

    /// The constructed modules, once resolution succeeded.
    pub fn modules(&self) -> Option<&ModuleSet> {
        self.resolved.as_ref().map(|(modules, _)| modules)
    }

    /// A constructed module as its concrete type.
    pub fn module<T: Analyzer>(&self, id: &str) -> Option<&T> {
        self.modules()?.get(id)
    }

    /// Modules whose listeners or contribution failed during the run.
    pub fn degraded(&self) -> Vec<DegradedModule> {
        self.modules().map(ModuleSet::degraded).unwrap_or_default()
    }

    /// Validate `events` under the configured stream policy and analyze them.
    pub fn run(&mut self, events: Vec<Event>) -> Result<Report, AnalysisFailure> {
        self.expect_idle("run")?;
        match EventStream::new(events, self.config.stream_policy) {
            Ok(stream) => self.analyze(stream),
            Err(error) => Err(self.fail(AnalysisState::Idle, error.into())),
        }
    }

    /// Analyze an already validated stream.
    pub fn run_stream(&mut self, stream: EventStream) -> Result<Report, AnalysisFailure> {
        self.expect_idle("run")?;
        self.analyze(stream)
    }

    fn expect_idle(&self, action: &'static str) -> Result<(), AnalysisFailure> {
        if self.state == AnalysisState::Idle {
            Ok(())
        } else {
            Err(AnalysisFailure {
                state: self.state,
                error: AnalysisError::InvalidState {
                    action,
                    state: self.state,
                },
            })
        }
    }

    fn fail(&mut self, state: AnalysisState, error: AnalysisError) -> AnalysisFailure {
        warn!(state = %state, error = %error, "Analysis failed");
        self.state = AnalysisState::Failed;
        AnalysisFailure { state, error }
    }

    fn analyze(&mut self, stream: EventStream) -> Result<Report, AnalysisFailure> {
        self.state = AnalysisState::Resolving;
        let (mut modules, mut bus) = match self.modules.resolve(&self.encounter) {
            Ok(resolved) => resolved,
            Err(error) => return Err(self.fail(AnalysisState::Resolving, error.into())),
        };

        self.state = AnalysisState::Replaying;
        let stream = if self.config.clip_to_fight {
            stream.clip_to(&self.encounter.fight)
        } else {
            stream
        };
        let replayed = bus.replay(
            &stream,
            &mut modules,
            &self.cancel,
            self.config.isolate_panics,
        );
        match replayed {
            Ok(stats) => self.stats = stats,
            Err(error) => {
                self.resolved = Some((modules, bus));
                return Err(self.fail(AnalysisState::Replaying, error));
            }
        }

        self.state = AnalysisState::Aggregating;
        let report = self.aggregate(&mut modules);
        self.resolved = Some((modules, bus));
        self.state = AnalysisState::Done;

        info!(
            modules = self.modules.len(),
            events = self.stats.events,
            suggestions = report.suggestions.len(),
            statistics = report.statistics.len(),
            degraded = report.degraded.len(),
            "Analysis complete"
        );
        Ok(report)
    }

    /// Ask every active module, in resolution order, to contribute.
    fn aggregate(&self, modules: &mut ModuleSet) -> Report {
        let mut report = Report::default();
        let mut failed = Vec::new();

        for idx in 0..modules.len() {
            let Some((slot, deps)) = modules.view_at(idx) else {
                continue;
            };
            if !slot.active {
                debug!(module = %slot.id, "Skipping inactive module");
                continue;
            }
            let mut builder = ReportBuilder::new(&slot.id, &self.encounter.fight, &mut report);
            let outcome = if self.config.isolate_panics {
                panic::catch_unwind(AssertUnwindSafe(|| {
                    slot.module.contribute(&mut builder, &deps)
                }))
                .unwrap_or_else(|payload| Err(ModuleError::Panicked(panic_message(payload))))
            } else {
                slot.module.contribute(&mut builder, &deps)
            };
            if let Err(error) = outcome {
                warn!(module = %slot.id, error = %error, "Module failed to contribute");
                failed.push((idx, error));
            }
        }

        for (idx, error) in &failed {
            modules.record_failure(*idx, None, error);
        }
        report.degraded = modules.degraded();
        report
    }
}

impl fmt::Debug for CombatLogParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CombatLogParser")
            .field("state", &self.state)
            .field("modules", &self.modules.len())
            .field("fight", &self.encounter.fight)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::{Actor, ActorId, ActorRole, Roster};
    use crate::config::StreamPolicy;
    use crate::encounter::{Combatant, Fight};
    use crate::error::StreamError;
    use crate::event::EventKind;
    use crate::filter::Events;
    use crate::module::{AnalyzerModule, Dependencies, ModuleContext};
    use crate::registry::ModuleDescriptor;

    #[derive(Default)]
    struct Counter {
        events: u32,
    }

    impl Analyzer for Counter {
        fn contribute(
            &self,
            report: &mut ReportBuilder<'_>,
            _deps: &Dependencies<'_>,
        ) -> Result<(), ModuleError> {
            report.summary("events", f64::from(self.events));
            Ok(())
        }
    }

    impl AnalyzerModule for Counter {
        fn is_active(_: &Combatant, _: &Fight) -> bool {
            true
        }

        fn new(ctx: &mut ModuleContext<'_, Self>) -> Result<Self, ModuleError> {
            ctx.on(Events::any(), |m: &mut Counter, _, _| {
                m.events += 1;
                Ok(())
            })?;
            Ok(Counter::default())
        }
    }

    struct BrokenReport;

    impl Analyzer for BrokenReport {
        fn contribute(
            &self,
            _report: &mut ReportBuilder<'_>,
            _deps: &Dependencies<'_>,
        ) -> Result<(), ModuleError> {
            Err(ModuleError::msg("nothing to report"))
        }
    }

    impl AnalyzerModule for BrokenReport {
        fn is_active(_: &Combatant, _: &Fight) -> bool {
            true
        }

        fn new(_ctx: &mut ModuleContext<'_, Self>) -> Result<Self, ModuleError> {
            Ok(BrokenReport)
        }
    }

    struct PanickingReport;

    impl Analyzer for PanickingReport {
        fn contribute(
            &self,
            _report: &mut ReportBuilder<'_>,
            _deps: &Dependencies<'_>,
        ) -> Result<(), ModuleError> {
            panic!("report exploded")
        }
    }

    impl AnalyzerModule for PanickingReport {
        fn is_active(_: &Combatant, _: &Fight) -> bool {
            true
        }

        fn new(_ctx: &mut ModuleContext<'_, Self>) -> Result<Self, ModuleError> {
            Ok(PanickingReport)
        }
    }

    fn encounter() -> Encounter {
        Encounter::new(
            Fight::new(100, 200, 1),
            Roster::new([Actor::new(ActorId(1), "Player", ActorRole::SelectedPlayer)]),
            Combatant::new(ActorId(1), 72),
        )
    }

    fn cast(ts: u64) -> Event {
        Event::new(ts, ActorId(1), EventKind::Cast)
    }

    fn counter_map() -> ModuleMap {
        ModuleMap::new().with(ModuleDescriptor::of::<Counter>("counter"))
    }

    #[test]
    fn test_run_reaches_done() {
        let mut parser = CombatLogParser::new(counter_map(), encounter());
        assert_eq!(parser.state(), AnalysisState::Idle);

        let report = parser.run(vec![cast(100), cast(150)]).unwrap();
        assert_eq!(parser.state(), AnalysisState::Done);
        assert_eq!(report.summary("counter", "events"), Some(2.0));
        assert_eq!(parser.module::<Counter>("counter").unwrap().events, 2);
        assert_eq!(parser.replay_stats().events, 2);
    }

    #[test]
    fn test_parser_is_not_reusable() {
        let mut parser = CombatLogParser::new(counter_map(), encounter());
        parser.run(vec![cast(100)]).unwrap();

        let failure = parser.run(vec![cast(100)]).unwrap_err();
        assert_eq!(
            failure.error,
            AnalysisError::InvalidState {
                action: "run",
                state: AnalysisState::Done
            }
        );
        assert_eq!(parser.state(), AnalysisState::Done);
    }

    #[test]
    fn test_strict_stream_fails_before_resolution() {
        let config = AnalysisConfig {
            stream_policy: StreamPolicy::Strict,
            ..AnalysisConfig::default()
        };
        let mut parser = CombatLogParser::new(counter_map(), encounter()).with_config(config);

        let failure = parser.run(vec![cast(150), cast(120)]).unwrap_err();
        assert!(matches!(
            failure.error,
            AnalysisError::Stream(StreamError::OutOfOrder { index: 1, .. })
        ));
        assert_eq!(parser.state(), AnalysisState::Failed);
        assert!(parser.modules().is_none());
    }

    #[test]
    fn test_missing_dependency_names_module() {
        let map = counter_map()
            .with(ModuleDescriptor::of::<Counter>("dependent").depends_on(["absent"]));
        let mut parser = CombatLogParser::new(map, encounter());

        let failure = parser.run(vec![cast(100)]).unwrap_err();
        assert_eq!(failure.state, AnalysisState::Resolving);
        assert_eq!(failure.module().map(ModuleId::as_str), Some("dependent"));
        assert!(failure.to_string().contains("absent"));
    }

    #[test]
    fn test_cancelled_before_replay() {
        let mut parser = CombatLogParser::new(counter_map(), encounter());
        parser.cancellation_token().cancel();

        let failure = parser.run(vec![cast(100)]).unwrap_err();
        assert_eq!(failure.state, AnalysisState::Replaying);
        assert_eq!(failure.error, AnalysisError::Cancelled { timestamp: 100 });
        assert_eq!(parser.state(), AnalysisState::Failed);
    }

    #[test]
    fn test_clip_to_fight() {
        let config = AnalysisConfig {
            clip_to_fight: true,
            ..AnalysisConfig::default()
        };
        let mut parser = CombatLogParser::new(counter_map(), encounter()).with_config(config);

        let report = parser.run(vec![cast(50), cast(150), cast(250)]).unwrap();
        assert_eq!(report.summary("counter", "events"), Some(1.0));
    }

    #[test]
    fn test_contribution_failure_degrades_module() {
        let map = counter_map().with(ModuleDescriptor::of::<BrokenReport>("broken"));
        let mut parser = CombatLogParser::new(map, encounter());

        let report = parser.run(vec![cast(100)]).unwrap();
        assert_eq!(report.degraded.len(), 1);
        assert_eq!(report.degraded[0].module.as_str(), "broken");
        assert_eq!(report.degraded[0].first_timestamp, None);
        assert_eq!(report.summary("counter", "events"), Some(1.0));
        assert_eq!(parser.degraded(), report.degraded);
    }

    #[test]
    fn test_contribution_panic_degrades_module() {
        let map = ModuleMap::new()
            .with(ModuleDescriptor::of::<PanickingReport>("panicking"))
            .with(ModuleDescriptor::of::<Counter>("counter"));
        let mut parser = CombatLogParser::new(map, encounter());

        let report = parser.run(vec![cast(100), cast(120)]).unwrap();
        assert_eq!(parser.state(), AnalysisState::Done);
        assert_eq!(report.summary("counter", "events"), Some(2.0));
        assert_eq!(report.degraded.len(), 1);
        assert_eq!(report.degraded[0].module.as_str(), "panicking");
        assert_eq!(report.degraded[0].first_timestamp, None);
        assert!(report.degraded[0].first_error.contains("report exploded"));
    }
}
