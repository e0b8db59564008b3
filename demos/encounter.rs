//! Encounter example: analyzing a short Fury Warrior log
//!
//! This example demonstrates:
//! - Loading an event stream from JSON
//! - Layering a spec module on top of the core trackers
//! - Reading a dependency from inside a listener
//! - Suggestions, statistics and summaries in the report
//!
//! Run with `RUST_LOG=combatlog=debug` to see resolution and replay logs.

use combatlog::filter::{Events, SELECTED_PLAYER};
use combatlog::module::{Analyzer, AnalyzerModule, Dependencies, ModuleContext};
use combatlog::modules::{core_modules, BuffTracker, BUFF_TRACKER, DEATH_TRACKER};
use combatlog::registry::{ModuleDescriptor, ModuleMap};
use combatlog::report::{ReportBuilder, StatisticCategory, StatisticOrder};
use combatlog::suggestion::{SuggestionDraft, Threshold, ThresholdStyle};
use combatlog::*;
use serde_json::json;
use tracing_subscriber::EnvFilter;

const FURY: u32 = 72;
const ENRAGE: u32 = 184362;
const RAMPAGE: u32 = 184367;

const LOG: &str = r#"[
    {"timestamp": 0, "type": "applybuff", "sourceID": 1, "targetID": 1, "ability": {"guid": 184362, "name": "Enrage"}},
    {"timestamp": 500, "type": "cast", "sourceID": 1, "ability": {"guid": 184367, "name": "Rampage"}},
    {"timestamp": 500, "type": "damage", "sourceID": 1, "targetID": 99, "ability": {"guid": 184367}, "amount": 24000, "hitType": 2},
    {"timestamp": 4000, "type": "removebuff", "sourceID": 1, "targetID": 1, "ability": {"guid": 184362}},
    {"timestamp": 6000, "type": "energize", "sourceID": 1, "targetID": 1, "ability": {"guid": 23881}, "resourceType": 1, "resourceChange": 8, "waste": 2},
    {"timestamp": 7500, "type": "cast", "sourceID": 1, "ability": {"guid": 184367}},
    {"timestamp": 7500, "type": "damage", "sourceID": 1, "targetID": 99, "ability": {"guid": 184367}, "amount": 18000},
    {"timestamp": 8000, "type": "applybuff", "sourceID": 1, "targetID": 1, "ability": {"guid": 184362}},
    {"timestamp": 9000, "type": "removebuff", "sourceID": 1, "targetID": 1, "ability": {"guid": 184362}}
]"#;

/// Enrage uptime, and Rampages cast while not enraged.
struct EnrageUptime {
    unenraged_rampages: u32,
    min_uptime: f64,
}

impl EnrageUptime {
    fn on_rampage(&mut self, _event: &Event, deps: &Dependencies<'_>) -> Result<(), ModuleError> {
        let buffs = deps.require::<BuffTracker>(BUFF_TRACKER)?;
        if !buffs.has_buff(ENRAGE) {
            self.unenraged_rampages += 1;
        }
        Ok(())
    }
}

impl Analyzer for EnrageUptime {
    fn contribute(
        &self,
        report: &mut ReportBuilder<'_>,
        deps: &Dependencies<'_>,
    ) -> Result<(), ModuleError> {
        let buffs = deps.require::<BuffTracker>(BUFF_TRACKER)?;
        let uptime = buffs.uptime_ratio(ENRAGE);

        let threshold = Threshold::is_less_than(
            uptime,
            self.min_uptime,
            self.min_uptime - 0.05,
            self.min_uptime - 0.15,
        )
        .style(ThresholdStyle::Percentage);
        report.when(threshold).add_suggestion(|_, _| {
            SuggestionDraft::new("Your Enrage uptime can be improved.").ability(ENRAGE)
        });

        report.statistic(
            StatisticCategory::General,
            StatisticOrder::Core(2),
            json!({
                "ability": ENRAGE,
                "uptime": uptime,
                "unenragedRampages": self.unenraged_rampages,
            }),
        )?;
        report.summary("uptime", uptime);
        Ok(())
    }
}

impl AnalyzerModule for EnrageUptime {
    fn is_active(combatant: &Combatant, _fight: &Fight) -> bool {
        combatant.spec == FURY
    }

    fn new(ctx: &mut ModuleContext<'_, Self>) -> Result<Self, ModuleError> {
        let min_uptime = ctx.config().get::<f64>("min_uptime").unwrap_or(0.9);
        ctx.on(
            Events::cast().by(SELECTED_PLAYER).spell(RAMPAGE),
            Self::on_rampage,
        )?;
        Ok(Self {
            unenraged_rampages: 0,
            min_uptime,
        })
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("combatlog=info")),
        )
        .init();

    println!("=== Encounter Analysis Demo ===\n");

    // ===== Encounter =====
    let encounter = Encounter::new(
        Fight::new(0, 10_000, 2407),
        Roster::new([
            Actor::new(ActorId(1), "Warrior", ActorRole::SelectedPlayer),
            Actor::new(ActorId(99), "Sire Denathrius", ActorRole::Enemy),
        ]),
        Combatant::new(ActorId(1), FURY).with_covenant(Covenant::Venthyr),
    );

    // ===== Modules =====
    let spec_modules = ModuleMap::new().with(
        ModuleDescriptor::of::<EnrageUptime>("enrageUptime")
            .depends_on([BUFF_TRACKER, DEATH_TRACKER])
            .with_config(ModuleConfig::new().with("min_uptime", 0.85)),
    );
    let modules = core_modules().merge(spec_modules);

    let order = modules.resolution_order()?;
    println!("Resolution order:");
    for id in &order {
        println!("  {}", id);
    }
    println!();

    // ===== Replay =====
    let stream = EventStream::from_json(LOG, StreamPolicy::Strict)?;
    println!("Loaded {} events\n", stream.len());

    let mut parser = CombatLogParser::new(modules, encounter);
    let report = parser.run_stream(stream)?;

    println!("Replay: {:?}\n", parser.replay_stats());

    if let Some(rampages) = parser.module::<EnrageUptime>("enrageUptime") {
        println!("Rampages cast while not enraged: {}", rampages.unenraged_rampages);
    }
    if let Some(uptime) = report.summary("enrageUptime", "uptime") {
        println!("Enrage uptime: {}%\n", combatlog::format::format_percentage(uptime));
    }

    // ===== Report =====
    println!("Report:");
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
