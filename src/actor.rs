//! Actors and the encounter roster.
//!
//! Every participant that can be the source or target of an event is an
//! [`Actor`]. The [`Roster`] is resolved once per encounter by the external
//! normalizer and stays fixed for the lifetime of one analysis.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Stable identifier of an actor within one report.
#[derive(Debug, Clone, Copy, Default, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(pub i64);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How an actor relates to the player being analyzed.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    SelectedPlayer,
    Friendly,
    Enemy,
}

/// A participant in the encounter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub name: String,
    pub role: ActorRole,
    /// Owning actor for pets and guardians.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pet_owner: Option<ActorId>,
}

impl Actor {
    pub fn new(id: ActorId, name: impl Into<String>, role: ActorRole) -> Self {
        Self {
            id,
            name: name.into(),
            role,
            pet_owner: None,
        }
    }

    /// Mark this actor as a pet of `owner`.
    pub fn owned_by(mut self, owner: ActorId) -> Self {
        self.pet_owner = Some(owner);
        self
    }

    pub fn is_friendly(&self) -> bool {
        matches!(self.role, ActorRole::SelectedPlayer | ActorRole::Friendly)
    }
}

/// All actors of one encounter, indexed by id.
///
/// Exactly one actor carries [`ActorRole::SelectedPlayer`]; inserting a
/// second one replaces the selection.
///
/// # Examples
///
/// ```rust
/// use combatlog::{Actor, ActorId, ActorRole, Roster};
///
/// let roster = Roster::new(vec![
///     Actor::new(ActorId(1), "Hunter", ActorRole::SelectedPlayer),
///     Actor::new(ActorId(2), "Cat", ActorRole::Friendly).owned_by(ActorId(1)),
///     Actor::new(ActorId(100), "Boss", ActorRole::Enemy),
/// ]);
///
/// assert_eq!(roster.selected_player(), Some(ActorId(1)));
/// assert!(roster.is_pet_of(ActorId(2), ActorId(1)));
/// assert!(roster.is_enemy(ActorId(100)));
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Actor>", into = "Vec<Actor>")]
pub struct Roster {
    actors: Vec<Actor>,
    by_id: HashMap<ActorId, usize>,
    selected: Option<ActorId>,
}

impl Roster {
    pub fn new(actors: impl IntoIterator<Item = Actor>) -> Self {
        let mut roster = Self::default();
        for actor in actors {
            roster.insert(actor);
        }
        roster
    }

    /// Insert or replace an actor.
    pub fn insert(&mut self, actor: Actor) {
        if actor.role == ActorRole::SelectedPlayer {
            if let Some(previous) = self.selected.take() {
                if let Some(&idx) = self.by_id.get(&previous) {
                    self.actors[idx].role = ActorRole::Friendly;
                }
            }
            self.selected = Some(actor.id);
        } else if self.selected == Some(actor.id) {
            self.selected = None;
        }
        match self.by_id.get(&actor.id) {
            Some(&idx) => self.actors[idx] = actor,
            None => {
                self.by_id.insert(actor.id, self.actors.len());
                self.actors.push(actor);
            }
        }
    }

    pub fn get(&self, id: ActorId) -> Option<&Actor> {
        self.by_id.get(&id).map(|&idx| &self.actors[idx])
    }

    pub fn selected_player(&self) -> Option<ActorId> {
        self.selected
    }

    pub fn is_friendly(&self, id: ActorId) -> bool {
        self.get(id).map_or(false, Actor::is_friendly)
    }

    pub fn is_enemy(&self, id: ActorId) -> bool {
        self.get(id).map_or(false, |a| a.role == ActorRole::Enemy)
    }

    pub fn is_pet_of(&self, pet: ActorId, owner: ActorId) -> bool {
        self.get(pet).and_then(|a| a.pet_owner) == Some(owner)
    }

    /// Ids of every pet owned by `owner`.
    pub fn pets_of(&self, owner: ActorId) -> impl Iterator<Item = ActorId> + '_ {
        self.actors
            .iter()
            .filter(move |a| a.pet_owner == Some(owner))
            .map(|a| a.id)
    }

    /// Actors in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Actor> {
        self.actors.iter()
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }
}

impl From<Vec<Actor>> for Roster {
    fn from(actors: Vec<Actor>) -> Self {
        Roster::new(actors)
    }
}

impl From<Roster> for Vec<Actor> {
    fn from(roster: Roster) -> Self {
        roster.actors
    }
}
