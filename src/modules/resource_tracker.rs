//! Resource generation and waste from energize events.

use crate::encounter::{Combatant, Fight};
use crate::error::ModuleError;
use crate::event::{AbilityId, Event, EventKind, ResourceType};
use crate::filter::{Events, SELECTED_PLAYER};
use crate::module::{Analyzer, AnalyzerModule, Dependencies, ModuleContext};
use crate::report::ReportBuilder;
use serde::Serialize;
use std::collections::BTreeMap;

/// Resource gains of one resource type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResourceStats {
    /// Total change, waste included.
    pub generated: i64,
    /// Part of the change lost to the resource cap.
    pub wasted: i64,
    pub events: u32,
}

/// Energize gains and waste of the selected player.
///
/// The optional `resource` config key (a resource code) restricts the
/// tracker to one resource type, which is how spec configurations build a
/// dedicated mana or rage tracker from it.
#[derive(Debug, Default)]
pub struct ResourceTracker {
    by_resource: BTreeMap<u8, ResourceStats>,
    by_ability: BTreeMap<AbilityId, i64>,
}

impl ResourceTracker {
    fn on_energize(&mut self, event: &Event, _deps: &Dependencies<'_>) -> Result<(), ModuleError> {
        let EventKind::Energize {
            resource_type,
            resource_change,
            waste,
        } = event.kind
        else {
            return Ok(());
        };
        let stats = self.by_resource.entry(u8::from(resource_type)).or_default();
        stats.generated += resource_change;
        stats.wasted += waste;
        stats.events += 1;
        if let Some(ability) = event.ability {
            *self.by_ability.entry(ability).or_default() += resource_change - waste;
        }
        Ok(())
    }

    pub fn get(&self, resource: ResourceType) -> Option<&ResourceStats> {
        self.by_resource.get(&u8::from(resource))
    }

    pub fn generated(&self, resource: ResourceType) -> i64 {
        self.get(resource).map_or(0, |stats| stats.generated)
    }

    pub fn wasted(&self, resource: ResourceType) -> i64 {
        self.get(resource).map_or(0, |stats| stats.wasted)
    }

    /// Fraction of the generated amount that was wasted.
    pub fn waste_ratio(&self, resource: ResourceType) -> f64 {
        match self.get(resource) {
            Some(stats) if stats.generated > 0 => stats.wasted as f64 / stats.generated as f64,
            _ => 0.0,
        }
    }

    /// Effective gain, without waste, from one ability across all resources.
    pub fn generated_by(&self, ability: impl Into<AbilityId>) -> i64 {
        self.by_ability.get(&ability.into()).copied().unwrap_or(0)
    }

    /// Resource types seen during the fight.
    pub fn resources(&self) -> impl Iterator<Item = ResourceType> + '_ {
        self.by_resource.keys().map(|&code| ResourceType::from(code))
    }
}

fn label(resource: ResourceType) -> String {
    let name = match resource {
        ResourceType::Mana => "mana",
        ResourceType::Rage => "rage",
        ResourceType::Focus => "focus",
        ResourceType::Energy => "energy",
        ResourceType::ComboPoints => "combo_points",
        ResourceType::Runes => "runes",
        ResourceType::RunicPower => "runic_power",
        ResourceType::SoulShards => "soul_shards",
        ResourceType::AstralPower => "astral_power",
        ResourceType::HolyPower => "holy_power",
        ResourceType::Maelstrom => "maelstrom",
        ResourceType::Chi => "chi",
        ResourceType::Insanity => "insanity",
        ResourceType::ArcaneCharges => "arcane_charges",
        ResourceType::Fury => "fury",
        ResourceType::Pain => "pain",
        ResourceType::Other(code) => return format!("resource_{code}"),
    };
    name.to_string()
}

impl Analyzer for ResourceTracker {
    fn contribute(
        &self,
        report: &mut ReportBuilder<'_>,
        _deps: &Dependencies<'_>,
    ) -> Result<(), ModuleError> {
        for (&code, stats) in &self.by_resource {
            let name = label(ResourceType::from(code));
            report.summary(format!("{name}_generated"), stats.generated as f64);
            report.summary(format!("{name}_wasted"), stats.wasted as f64);
        }
        Ok(())
    }
}

impl AnalyzerModule for ResourceTracker {
    fn is_active(_combatant: &Combatant, _fight: &Fight) -> bool {
        true
    }

    fn new(ctx: &mut ModuleContext<'_, Self>) -> Result<Self, ModuleError> {
        let mut filter = Events::energize().to(SELECTED_PLAYER);
        if let Some(code) = ctx.config().get::<u8>("resource") {
            filter = filter.resource(ResourceType::from(code));
        }
        ctx.on(filter, Self::on_energize)?;
        Ok(Self::default())
    }
}
