//! Encounter metadata and the selected combatant.
//!
//! [`Fight`] carries the encounter bounds and boss information; [`Combatant`]
//! carries the static character data of the player being analyzed. Both are
//! read by module activation predicates, so they are plain data with cheap
//! query helpers.

use crate::actor::{ActorId, Roster};
use crate::event::{AbilityId, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// One continuous combat segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fight {
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub boss: u32,
    #[serde(default)]
    pub difficulty: u32,
}

impl Fight {
    pub fn new(start_time: Timestamp, end_time: Timestamp, boss: u32) -> Self {
        Self {
            start_time,
            end_time,
            boss,
            difficulty: 0,
        }
    }

    pub fn with_difficulty(mut self, difficulty: u32) -> Self {
        self.difficulty = difficulty;
        self
    }

    /// Length of the fight in milliseconds.
    pub fn duration(&self) -> Timestamp {
        self.end_time.saturating_sub(self.start_time)
    }

    /// Whether `timestamp` falls inside the fight window (inclusive).
    pub fn contains(&self, timestamp: Timestamp) -> bool {
        timestamp >= self.start_time && timestamp <= self.end_time
    }
}

/// Covenant choice of the selected player.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Covenant {
    Kyrian,
    Venthyr,
    NightFae,
    Necrolord,
}

/// Static character data of the player being analyzed.
///
/// # Examples
///
/// ```rust
/// use combatlog::{AbilityId, ActorId, Combatant, Covenant};
///
/// let combatant = Combatant::new(ActorId(1), 254)
///     .with_talent(AbilityId(260240))
///     .with_covenant(Covenant::Kyrian)
///     .with_conduit(AbilityId(340033), 7);
///
/// assert!(combatant.has_talent(AbilityId(260240)));
/// assert!(combatant.has_covenant(Covenant::Kyrian));
/// assert_eq!(combatant.conduit_rank(AbilityId(340033)), Some(7));
/// assert_eq!(combatant.conduit_rank(AbilityId(1)), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Combatant {
    pub id: ActorId,
    pub spec: u32,
    #[serde(default)]
    pub talents: HashSet<AbilityId>,
    #[serde(default)]
    pub covenant: Option<Covenant>,
    #[serde(default)]
    pub conduits: HashMap<AbilityId, u32>,
    #[serde(default)]
    pub items: HashSet<u32>,
}

impl Combatant {
    pub fn new(id: ActorId, spec: u32) -> Self {
        Self {
            id,
            spec,
            ..Self::default()
        }
    }

    pub fn with_talent(mut self, talent: AbilityId) -> Self {
        self.talents.insert(talent);
        self
    }

    pub fn with_covenant(mut self, covenant: Covenant) -> Self {
        self.covenant = Some(covenant);
        self
    }

    pub fn with_conduit(mut self, conduit: AbilityId, rank: u32) -> Self {
        self.conduits.insert(conduit, rank);
        self
    }

    pub fn with_item(mut self, item: u32) -> Self {
        self.items.insert(item);
        self
    }

    pub fn has_talent(&self, talent: AbilityId) -> bool {
        self.talents.contains(&talent)
    }

    pub fn has_covenant(&self, covenant: Covenant) -> bool {
        self.covenant == Some(covenant)
    }

    /// Rank of a soulbind conduit, `None` when not socketed.
    pub fn conduit_rank(&self, conduit: AbilityId) -> Option<u32> {
        self.conduits.get(&conduit).copied().filter(|&rank| rank > 0)
    }

    pub fn has_item(&self, item: u32) -> bool {
        self.items.contains(&item)
    }
}

/// Everything a module may read about the analyzed fight.
///
/// Shared read-only by every module for the duration of one analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Encounter {
    pub fight: Fight,
    pub roster: Roster,
    pub combatant: Combatant,
}

impl Encounter {
    pub fn new(fight: Fight, roster: Roster, combatant: Combatant) -> Self {
        Self {
            fight,
            roster,
            combatant,
        }
    }
}
