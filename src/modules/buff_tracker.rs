//! Buff uptime tracking.
//!
//! Windows are built from apply, refresh, stack and remove events on the
//! selected player and clipped to the fight.

use crate::encounter::{Combatant, Fight};
use crate::error::ModuleError;
use crate::event::{AbilityId, Event, EventKind, Timestamp};
use crate::filter::{Events, SELECTED_PLAYER};
use crate::module::{Analyzer, AnalyzerModule, Dependencies, ModuleContext};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
struct BuffHistory {
    windows: Vec<(Timestamp, Timestamp)>,
    open: Option<Timestamp>,
    stacks: u32,
    applications: u32,
}

impl BuffHistory {
    /// Nothing seen yet, so a buff event means it was up since the pull.
    fn is_untouched(&self) -> bool {
        self.open.is_none() && self.windows.is_empty() && self.applications == 0
    }

    /// Mark the buff as up, from the pull if this is the first sighting.
    fn reopen(&mut self, timestamp: Timestamp, fight_start: Timestamp) {
        if self.open.is_none() {
            let start = if self.is_untouched() {
                fight_start
            } else {
                timestamp
            };
            self.open = Some(start);
        }
    }
}

/// Buff uptime on the selected player.
///
/// A buff removed or refreshed without a matching apply was up since the
/// pull. A buff still up when the log ends counts until the end of the
/// fight.
#[derive(Debug)]
pub struct BuffTracker {
    fight_start: Timestamp,
    fight_end: Timestamp,
    buffs: BTreeMap<AbilityId, BuffHistory>,
}

impl BuffTracker {
    fn history(&mut self, event: &Event) -> Option<&mut BuffHistory> {
        let ability = event.ability?;
        Some(self.buffs.entry(ability).or_default())
    }

    fn on_apply(&mut self, event: &Event, _deps: &Dependencies<'_>) -> Result<(), ModuleError> {
        if let Some(buff) = self.history(event) {
            buff.applications += 1;
            buff.stacks = 1;
            buff.open.get_or_insert(event.timestamp);
        }
        Ok(())
    }

    fn on_remove(&mut self, event: &Event, _deps: &Dependencies<'_>) -> Result<(), ModuleError> {
        let fight_start = self.fight_start;
        if let Some(buff) = self.history(event) {
            let start = match buff.open.take() {
                Some(start) => Some(start),
                None if buff.is_untouched() => Some(fight_start),
                // already down
                None => None,
            };
            if let Some(start) = start {
                buff.windows.push((start, event.timestamp));
            }
            buff.stacks = 0;
        }
        Ok(())
    }

    fn on_refresh(&mut self, event: &Event, _deps: &Dependencies<'_>) -> Result<(), ModuleError> {
        let fight_start = self.fight_start;
        if let Some(buff) = self.history(event) {
            buff.reopen(event.timestamp, fight_start);
            buff.stacks = buff.stacks.max(1);
        }
        Ok(())
    }

    fn on_stack(&mut self, event: &Event, _deps: &Dependencies<'_>) -> Result<(), ModuleError> {
        let stack = match event.kind {
            EventKind::ApplyBuffStack { stack } | EventKind::RemoveBuffStack { stack } => stack,
            _ => return Ok(()),
        };
        let fight_start = self.fight_start;
        if let Some(buff) = self.history(event) {
            buff.reopen(event.timestamp, fight_start);
            buff.stacks = stack;
        }
        Ok(())
    }

    /// Whether the buff is up right now. Meaningful during replay, for
    /// dependents reading the tracker from their listeners.
    pub fn has_buff(&self, ability: impl Into<AbilityId>) -> bool {
        self.buffs
            .get(&ability.into())
            .map_or(false, |buff| buff.open.is_some())
    }

    /// Current stack count, zero when the buff is down.
    pub fn stacks(&self, ability: impl Into<AbilityId>) -> u32 {
        self.buffs
            .get(&ability.into())
            .map_or(0, |buff| if buff.open.is_some() { buff.stacks } else { 0 })
    }

    pub fn applications(&self, ability: impl Into<AbilityId>) -> u32 {
        self.buffs
            .get(&ability.into())
            .map_or(0, |buff| buff.applications)
    }

    /// Milliseconds the buff was up within the fight.
    pub fn uptime(&self, ability: impl Into<AbilityId>) -> Timestamp {
        let Some(buff) = self.buffs.get(&ability.into()) else {
            return 0;
        };
        let open = buff.open.map(|start| (start, self.fight_end));
        buff.windows
            .iter()
            .copied()
            .chain(open)
            .map(|(start, end)| {
                let start = start.max(self.fight_start);
                let end = end.min(self.fight_end);
                end.saturating_sub(start)
            })
            .sum()
    }

    /// Uptime as a fraction of the fight duration.
    pub fn uptime_ratio(&self, ability: impl Into<AbilityId>) -> f64 {
        let duration = self.fight_end.saturating_sub(self.fight_start);
        if duration == 0 {
            return 0.0;
        }
        self.uptime(ability) as f64 / duration as f64
    }

    /// Buffs seen during the fight, in id order.
    pub fn buffs(&self) -> impl Iterator<Item = AbilityId> + '_ {
        self.buffs.keys().copied()
    }
}

impl Analyzer for BuffTracker {}

impl AnalyzerModule for BuffTracker {
    fn is_active(_combatant: &Combatant, _fight: &Fight) -> bool {
        true
    }

    fn new(ctx: &mut ModuleContext<'_, Self>) -> Result<Self, ModuleError> {
        ctx.on(Events::applybuff().to(SELECTED_PLAYER), Self::on_apply)?;
        ctx.on(Events::refreshbuff().to(SELECTED_PLAYER), Self::on_refresh)?;
        ctx.on(Events::removebuff().to(SELECTED_PLAYER), Self::on_remove)?;
        ctx.on(Events::applybuffstack().to(SELECTED_PLAYER), Self::on_stack)?;
        ctx.on(Events::removebuffstack().to(SELECTED_PLAYER), Self::on_stack)?;
        Ok(Self {
            fight_start: ctx.fight().start_time,
            fight_end: ctx.fight().end_time,
            buffs: BTreeMap::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::ActorId;
    use crate::parser::CombatLogParser;
    use crate::registry::{ModuleDescriptor, ModuleMap};

    const ENRAGE: u32 = 184362;
    const WHIRLWIND: u32 = 85739;

    fn buff(ts: Timestamp, kind: EventKind, ability: u32) -> Event {
        Event::new(ts, ActorId(1), kind)
            .with_target(ActorId(1))
            .with_ability(ability)
    }

    fn run(events: Vec<Event>) -> CombatLogParser {
        let map = ModuleMap::new().with(ModuleDescriptor::of::<BuffTracker>("buffs"));
        let mut parser = CombatLogParser::new(map, crate::modules::test_encounter());
        parser.run(events).unwrap();
        parser
    }

    #[test]
    fn test_uptime_windows() {
        let parser = run(vec![
            buff(10_000, EventKind::ApplyBuff, ENRAGE),
            buff(14_000, EventKind::RemoveBuff, ENRAGE),
            buff(20_000, EventKind::ApplyBuff, ENRAGE),
            buff(20_500, EventKind::RefreshBuff, ENRAGE),
            buff(26_000, EventKind::RemoveBuff, ENRAGE),
        ]);
        let tracker = parser.module::<BuffTracker>("buffs").unwrap();

        assert_eq!(tracker.uptime(ENRAGE), 10_000);
        assert_eq!(tracker.applications(ENRAGE), 2);
        assert!((tracker.uptime_ratio(ENRAGE) - 0.1).abs() < 1e-9);
        assert!(!tracker.has_buff(ENRAGE));
    }

    #[test]
    fn test_prepull_and_open_buffs() {
        let parser = run(vec![
            // applied before the pull
            buff(5_000, EventKind::RemoveBuff, ENRAGE),
            // still up when the fight ends
            buff(90_000, EventKind::ApplyBuff, WHIRLWIND),
        ]);
        let tracker = parser.module::<BuffTracker>("buffs").unwrap();

        assert_eq!(tracker.uptime(ENRAGE), 5_000);
        assert_eq!(tracker.uptime(WHIRLWIND), 10_000);
        assert!(tracker.has_buff(WHIRLWIND));
        assert_eq!(tracker.buffs().count(), 2);
    }

    #[test]
    fn test_refresh_of_prepull_buff() {
        let parser = run(vec![
            buff(30_000, EventKind::RefreshBuff, ENRAGE),
            buff(40_000, EventKind::RemoveBuff, ENRAGE),
        ]);
        let tracker = parser.module::<BuffTracker>("buffs").unwrap();

        assert_eq!(tracker.uptime(ENRAGE), 40_000);
        assert_eq!(tracker.applications(ENRAGE), 0);
    }

    #[test]
    fn test_duplicate_remove_is_ignored() {
        let parser = run(vec![
            buff(10_000, EventKind::ApplyBuff, ENRAGE),
            buff(20_000, EventKind::RemoveBuff, ENRAGE),
            buff(90_000, EventKind::RemoveBuff, ENRAGE),
        ]);
        let tracker = parser.module::<BuffTracker>("buffs").unwrap();

        assert_eq!(tracker.uptime(ENRAGE), 10_000);
        assert!((tracker.uptime_ratio(ENRAGE) - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_refresh_after_remove_reopens_at_event() {
        let parser = run(vec![
            buff(10_000, EventKind::ApplyBuff, ENRAGE),
            buff(20_000, EventKind::RemoveBuff, ENRAGE),
            buff(50_000, EventKind::RefreshBuff, ENRAGE),
            buff(60_000, EventKind::RemoveBuff, ENRAGE),
        ]);
        let tracker = parser.module::<BuffTracker>("buffs").unwrap();

        assert_eq!(tracker.uptime(ENRAGE), 20_000);
    }

    #[test]
    fn test_stack_after_remove_reopens_at_event() {
        let parser = run(vec![
            buff(10_000, EventKind::ApplyBuff, WHIRLWIND),
            buff(20_000, EventKind::RemoveBuff, WHIRLWIND),
            buff(70_000, EventKind::ApplyBuffStack { stack: 2 }, WHIRLWIND),
        ]);
        let tracker = parser.module::<BuffTracker>("buffs").unwrap();

        // 10s before the remove, then 70s..100s until the fight ends
        assert_eq!(tracker.uptime(WHIRLWIND), 40_000);
        assert_eq!(tracker.stacks(WHIRLWIND), 2);
    }

    #[test]
    fn test_stacks() {
        let parser = run(vec![
            buff(1_000, EventKind::ApplyBuff, WHIRLWIND),
            buff(2_000, EventKind::ApplyBuffStack { stack: 2 }, WHIRLWIND),
            buff(3_000, EventKind::RemoveBuffStack { stack: 1 }, WHIRLWIND),
        ]);
        let tracker = parser.module::<BuffTracker>("buffs").unwrap();
        assert_eq!(tracker.stacks(WHIRLWIND), 1);
        assert_eq!(tracker.stacks(ENRAGE), 0);
    }

    #[test]
    fn test_buffs_on_others_are_ignored() {
        let parser = run(vec![Event::new(1_000, ActorId(2), EventKind::ApplyBuff)
            .with_target(ActorId(2))
            .with_ability(ENRAGE)]);
        let tracker = parser.module::<BuffTracker>("buffs").unwrap();
        assert_eq!(tracker.buffs().count(), 0);
    }
}
