//! Per-ability casts, hits, damage and healing of the selected player.

use crate::encounter::{Combatant, Fight};
use crate::error::ModuleError;
use crate::event::{AbilityId, Event, EventKind, HitType};
use crate::filter::{Events, SELECTED_PLAYER};
use crate::module::{Analyzer, AnalyzerModule, Dependencies, ModuleContext};
use crate::report::{ReportBuilder, StatisticCategory, StatisticOrder};
use serde::Serialize;
use std::collections::BTreeMap;

/// Per-ability totals of the selected player.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AbilityStats {
    pub casts: u32,
    pub hits: u32,
    pub crits: u32,
    pub damage: u64,
    pub healing: u64,
    pub overhealing: u64,
    pub absorbed: u64,
}

/// Counts casts, hits, damage and healing of the selected player by ability.
#[derive(Debug, Default)]
pub struct AbilityTracker {
    abilities: BTreeMap<AbilityId, AbilityStats>,
}

impl AbilityTracker {
    fn entry(&mut self, event: &Event) -> Option<&mut AbilityStats> {
        let ability = event.ability?;
        Some(self.abilities.entry(ability).or_default())
    }

    fn on_cast(&mut self, event: &Event, _deps: &Dependencies<'_>) -> Result<(), ModuleError> {
        if let Some(stats) = self.entry(event) {
            stats.casts += 1;
        }
        Ok(())
    }

    fn on_damage(&mut self, event: &Event, _deps: &Dependencies<'_>) -> Result<(), ModuleError> {
        let EventKind::Damage {
            amount,
            absorbed,
            hit_type,
            ..
        } = event.kind
        else {
            return Ok(());
        };
        if let Some(stats) = self.entry(event) {
            stats.hits += 1;
            stats.crits += u32::from(is_crit(hit_type));
            stats.damage += amount;
            stats.absorbed += absorbed;
        }
        Ok(())
    }

    fn on_heal(&mut self, event: &Event, _deps: &Dependencies<'_>) -> Result<(), ModuleError> {
        let EventKind::Heal {
            amount,
            overheal,
            absorbed,
            hit_type,
            ..
        } = event.kind
        else {
            return Ok(());
        };
        if let Some(stats) = self.entry(event) {
            stats.hits += 1;
            stats.crits += u32::from(is_crit(hit_type));
            stats.healing += amount;
            stats.overhealing += overheal;
            stats.absorbed += absorbed;
        }
        Ok(())
    }

    pub fn get(&self, ability: impl Into<AbilityId>) -> Option<&AbilityStats> {
        self.abilities.get(&ability.into())
    }

    pub fn casts(&self, ability: impl Into<AbilityId>) -> u32 {
        self.get(ability).map_or(0, |stats| stats.casts)
    }

    /// Abilities in id order.
    pub fn abilities(&self) -> impl Iterator<Item = (AbilityId, &AbilityStats)> {
        self.abilities.iter().map(|(id, stats)| (*id, stats))
    }

    pub fn total_casts(&self) -> u32 {
        self.abilities.values().map(|s| s.casts).sum()
    }

    pub fn total_damage(&self) -> u64 {
        self.abilities.values().map(|s| s.damage).sum()
    }

    pub fn total_healing(&self) -> u64 {
        self.abilities.values().map(|s| s.healing).sum()
    }
}

fn is_crit(hit_type: HitType) -> bool {
    matches!(hit_type, HitType::Crit | HitType::BlockedCrit)
}

impl Analyzer for AbilityTracker {
    fn contribute(
        &self,
        report: &mut ReportBuilder<'_>,
        _deps: &Dependencies<'_>,
    ) -> Result<(), ModuleError> {
        report.summary("casts", f64::from(self.total_casts()));
        report.summary("damage", self.total_damage() as f64);
        report.summary("healing", self.total_healing() as f64);
        if !self.abilities.is_empty() {
            report.statistic(
                StatisticCategory::General,
                StatisticOrder::Unimportant(100),
                &self.abilities,
            )?;
        }
        Ok(())
    }
}

impl AnalyzerModule for AbilityTracker {
    fn is_active(_combatant: &Combatant, _fight: &Fight) -> bool {
        true
    }

    fn new(ctx: &mut ModuleContext<'_, Self>) -> Result<Self, ModuleError> {
        ctx.on(Events::cast().by(SELECTED_PLAYER), Self::on_cast)?;
        ctx.on(Events::damage().by(SELECTED_PLAYER), Self::on_damage)?;
        ctx.on(Events::heal().by(SELECTED_PLAYER), Self::on_heal)?;
        Ok(Self::default())
    }
}
