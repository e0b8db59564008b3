//! # combatlog - Deterministic Combat Log Analysis Core
//!
//! An event-replay engine for MMORPG combat logs that provides:
//! - **Deterministic** replay (same events and modules → same report)
//! - **Module-agnostic** design (no built-in knowledge of classes or specs)
//! - **Dependency-ordered** construction of analyzer modules
//! - **Fault-isolated** listeners (one failing module never stops a replay)
//!
//! ## Core Concepts
//!
//! ### Analysis Pipeline
//!
//! ```text
//! [ModuleMap] → resolve → [ModuleSet + EventBus] → replay [EventStream] → aggregate → [Report]
//! ```
//!
//! 1. **Modules** are declared by name with their dependencies
//! 2. **Resolution** constructs them in dependency order; each registers
//!    filtered listeners on the bus
//! 3. **Replay** delivers every event, in order, to every matching listener
//! 4. **Aggregation** asks each active module for suggestions and statistics
//!
//! ## Example
//!
//! ```rust
//! use combatlog::module::{Analyzer, AnalyzerModule, Dependencies, ModuleContext};
//! use combatlog::modules::{core_modules, BuffTracker, BUFF_TRACKER};
//! use combatlog::registry::{ModuleDescriptor, ModuleMap};
//! use combatlog::report::ReportBuilder;
//! use combatlog::suggestion::{SuggestionDraft, Threshold, ThresholdStyle};
//! use combatlog::*;
//!
//! const ENRAGE: u32 = 184362;
//!
//! struct EnrageUptime;
//!
//! impl Analyzer for EnrageUptime {
//!     fn contribute(
//!         &self,
//!         report: &mut ReportBuilder<'_>,
//!         deps: &Dependencies<'_>,
//!     ) -> Result<(), ModuleError> {
//!         let buffs = deps.require::<BuffTracker>(BUFF_TRACKER)?;
//!         let threshold = Threshold::is_less_than(buffs.uptime_ratio(ENRAGE), 0.9, 0.8, 0.7)
//!             .style(ThresholdStyle::Percentage);
//!         report
//!             .when(threshold)
//!             .add_suggestion(|_, _| SuggestionDraft::new("Keep Enrage up").ability(ENRAGE));
//!         Ok(())
//!     }
//! }
//!
//! impl AnalyzerModule for EnrageUptime {
//!     fn is_active(combatant: &Combatant, _fight: &Fight) -> bool {
//!         combatant.spec == 72
//!     }
//!
//!     fn new(_ctx: &mut ModuleContext<'_, Self>) -> Result<Self, ModuleError> {
//!         Ok(EnrageUptime)
//!     }
//! }
//!
//! let modules = core_modules().merge(ModuleMap::new().with(
//!     ModuleDescriptor::of::<EnrageUptime>("enrageUptime").depends_on([BUFF_TRACKER]),
//! ));
//! let encounter = Encounter::new(
//!     Fight::new(0, 10_000, 2407),
//!     Roster::new([Actor::new(ActorId(1), "Warrior", ActorRole::SelectedPlayer)]),
//!     Combatant::new(ActorId(1), 72),
//! );
//! let events = vec![
//!     Event::new(0, ActorId(1), EventKind::ApplyBuff).with_target(ActorId(1)).with_ability(ENRAGE),
//!     Event::new(5_000, ActorId(1), EventKind::RemoveBuff).with_target(ActorId(1)).with_ability(ENRAGE),
//! ];
//!
//! let mut parser = CombatLogParser::new(modules, encounter);
//! let report = parser.run(events).unwrap();
//!
//! assert_eq!(report.suggestions.len(), 1);
//! assert_eq!(report.suggestions[0].actual, "50.00%");
//! ```
//!
//! ## Modules
//!
//! - [`event`] - Events, event kinds and game enumerations
//! - [`actor`] - Actors and the encounter roster
//! - [`encounter`] - Fight and combatant metadata
//! - [`stream`] - Validated event streams
//! - [`filter`] - Event filter DSL
//! - [`module`] - The analyzer module contract
//! - [`registry`] - Module descriptors and dependency resolution
//! - [`graph`] - Dependency graph management
//! - [`bus`] - Listener dispatch and replay
//! - [`parser`] - The analysis orchestrator
//! - [`report`] - Report, statistics and summaries
//! - [`suggestion`] - Suggestion thresholds
//! - [`format`] - Number formatting helpers
//! - [`modules`] - Shared trackers
//! - [`config`] - Analysis and module configuration
//! - [`error`] - Error types
//!
//! ## Logging
//!
//! The crate emits [`tracing`] events and never installs a subscriber.

pub mod actor;
pub mod bus;
pub mod config;
pub mod encounter;
pub mod error;
pub mod event;
pub mod filter;
pub mod format;
pub mod graph;
pub mod module;
pub mod module_id;
pub mod modules;
pub mod parser;
pub mod registry;
pub mod report;
pub mod stream;
pub mod suggestion;

// Re-export main types for convenience
pub use actor::{Actor, ActorId, ActorRole, Roster};
pub use config::{AnalysisConfig, ModuleConfig, StreamPolicy};
pub use encounter::{Combatant, Covenant, Encounter, Fight};
pub use error::{AnalysisError, ConfigError, FilterError, ModuleError, StreamError};
pub use event::{AbilityId, Event, EventKind, EventType, HitType, ResourceType, Timestamp};
pub use module_id::ModuleId;
pub use parser::{AnalysisFailure, AnalysisState, CombatLogParser};
pub use report::Report;
pub use stream::EventStream;
