//! Shared trackers.
//!
//! Every spec configuration starts from [`core_modules`] and layers its own
//! analyzers on top, declaring these trackers as dependencies by name.

mod ability_tracker;
mod buff_tracker;
mod death_tracker;
mod resource_tracker;

pub use ability_tracker::{AbilityStats, AbilityTracker};
pub use buff_tracker::BuffTracker;
pub use death_tracker::DeathTracker;
pub use resource_tracker::{ResourceStats, ResourceTracker};

use crate::registry::{ModuleDescriptor, ModuleMap};

pub const ABILITY_TRACKER: &str = "abilityTracker";
pub const BUFF_TRACKER: &str = "buffTracker";
pub const DEATH_TRACKER: &str = "deathTracker";
pub const RESOURCE_TRACKER: &str = "resourceTracker";

/// The shared trackers, in their conventional order.
///
/// ```rust
/// use combatlog::modules::core_modules;
///
/// let map = core_modules();
/// let names: Vec<&str> = map.ids().map(|id| id.as_str()).collect();
/// assert_eq!(
///     names,
///     vec!["abilityTracker", "buffTracker", "deathTracker", "resourceTracker"]
/// );
/// ```
pub fn core_modules() -> ModuleMap {
    ModuleMap::new()
        .with(ModuleDescriptor::of::<AbilityTracker>(ABILITY_TRACKER))
        .with(ModuleDescriptor::of::<BuffTracker>(BUFF_TRACKER))
        .with(ModuleDescriptor::of::<DeathTracker>(DEATH_TRACKER))
        .with(ModuleDescriptor::of::<ResourceTracker>(RESOURCE_TRACKER))
}

#[cfg(test)]
fn test_encounter() -> crate::encounter::Encounter {
    use crate::actor::{Actor, ActorId, ActorRole, Roster};
    use crate::encounter::{Combatant, Encounter, Fight};

    Encounter::new(
        Fight::new(0, 100_000, 2407),
        Roster::new([
            Actor::new(ActorId(1), "Player", ActorRole::SelectedPlayer),
            Actor::new(ActorId(2), "Healer", ActorRole::Friendly),
            Actor::new(ActorId(3), "Wolf", ActorRole::Friendly).owned_by(ActorId(1)),
            Actor::new(ActorId(99), "Boss", ActorRole::Enemy),
        ]),
        Combatant::new(ActorId(1), 72),
    )
}
