//! Event filter DSL.
//!
//! Modules describe the events they want with a fluent builder instead of
//! re-implementing filtering in every listener:
//!
//! ```rust
//! use combatlog::filter::{Events, SELECTED_PLAYER};
//! use combatlog::{AbilityId, HitType};
//!
//! let crit_heals = Events::heal()
//!     .by(SELECTED_PLAYER)
//!     .spells([AbilityId(8004), AbilityId(77472)])
//!     .hit_type(HitType::Crit);
//! ```
//!
//! An [`EventFilter`] is a declaration. Registering it compiles it against
//! the encounter roster into a [`CompiledFilter`]: actor classes become id
//! sets and ability lists become hash sets, so matching an event is a few
//! O(1) checks. Invalid combinations, like a hit-type predicate on a cast
//! filter, fail compilation with a [`FilterError`].

use crate::actor::{ActorId, Roster};
use crate::error::FilterError;
use crate::event::{AbilityId, Event, EventType, HitType, ResourceType};
use ahash::AHashSet;

/// Which actors a filter accepts as source or target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ActorSelector {
    #[default]
    Any,
    SelectedPlayer,
    /// Any pet or guardian owned by the selected player.
    SelectedPlayerPet,
    Actor(ActorId),
    Friendly,
    Enemy,
}

/// The player being analyzed.
pub const SELECTED_PLAYER: ActorSelector = ActorSelector::SelectedPlayer;

/// Pets and guardians of the player being analyzed.
pub const SELECTED_PLAYER_PET: ActorSelector = ActorSelector::SelectedPlayerPet;

impl From<ActorId> for ActorSelector {
    fn from(id: ActorId) -> Self {
        ActorSelector::Actor(id)
    }
}

/// Entry points of the filter DSL, one per event type.
pub struct Events;

impl Events {
    /// A filter on one event type.
    pub fn of(event_type: EventType) -> EventFilter {
        EventFilter::new(Some(event_type))
    }

    /// A filter matching events of every type.
    pub fn any() -> EventFilter {
        EventFilter::new(None)
    }

    pub fn damage() -> EventFilter {
        Self::of(EventType::Damage)
    }

    pub fn heal() -> EventFilter {
        Self::of(EventType::Heal)
    }

    pub fn absorbed() -> EventFilter {
        Self::of(EventType::Absorbed)
    }

    pub fn cast() -> EventFilter {
        Self::of(EventType::Cast)
    }

    pub fn begincast() -> EventFilter {
        Self::of(EventType::BeginCast)
    }

    pub fn applybuff() -> EventFilter {
        Self::of(EventType::ApplyBuff)
    }

    pub fn removebuff() -> EventFilter {
        Self::of(EventType::RemoveBuff)
    }

    pub fn refreshbuff() -> EventFilter {
        Self::of(EventType::RefreshBuff)
    }

    pub fn applybuffstack() -> EventFilter {
        Self::of(EventType::ApplyBuffStack)
    }

    pub fn removebuffstack() -> EventFilter {
        Self::of(EventType::RemoveBuffStack)
    }

    pub fn applydebuff() -> EventFilter {
        Self::of(EventType::ApplyDebuff)
    }

    pub fn removedebuff() -> EventFilter {
        Self::of(EventType::RemoveDebuff)
    }

    pub fn refreshdebuff() -> EventFilter {
        Self::of(EventType::RefreshDebuff)
    }

    pub fn energize() -> EventFilter {
        Self::of(EventType::Energize)
    }

    pub fn death() -> EventFilter {
        Self::of(EventType::Death)
    }

    pub fn resurrect() -> EventFilter {
        Self::of(EventType::Resurrect)
    }

    pub fn summon() -> EventFilter {
        Self::of(EventType::Summon)
    }
}

/// Declarative description of the events a listener wants.
#[derive(Debug, Clone, PartialEq)]
pub struct EventFilter {
    event_type: Option<EventType>,
    source: ActorSelector,
    target: ActorSelector,
    abilities: Option<Vec<AbilityId>>,
    hit_types: Vec<HitType>,
    tick: Option<bool>,
    resource: Option<ResourceType>,
}

impl EventFilter {
    fn new(event_type: Option<EventType>) -> Self {
        Self {
            event_type,
            source: ActorSelector::Any,
            target: ActorSelector::Any,
            abilities: None,
            hit_types: Vec::new(),
            tick: None,
            resource: None,
        }
    }

    /// Only events whose source matches `selector`.
    pub fn by(mut self, selector: impl Into<ActorSelector>) -> Self {
        self.source = selector.into();
        self
    }

    /// Only events whose target matches `selector`.
    pub fn to(mut self, selector: impl Into<ActorSelector>) -> Self {
        self.target = selector.into();
        self
    }

    /// Only events of `ability`. Repeated calls widen the set.
    pub fn spell(self, ability: impl Into<AbilityId>) -> Self {
        self.spells([ability.into()])
    }

    /// Only events of any of `abilities`. Repeated calls widen the set.
    pub fn spells<I, A>(mut self, abilities: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<AbilityId>,
    {
        self.abilities
            .get_or_insert_with(Vec::new)
            .extend(abilities.into_iter().map(Into::into));
        self
    }

    /// Only damage/heal events with this hit type. Repeated calls widen the set.
    pub fn hit_type(mut self, hit_type: HitType) -> Self {
        self.hit_types.push(hit_type);
        self
    }

    /// Only periodic (`true`) or direct (`false`) damage/heal events.
    pub fn tick(mut self, tick: bool) -> Self {
        self.tick = Some(tick);
        self
    }

    /// Only energize events of this resource type.
    pub fn resource(mut self, resource: ResourceType) -> Self {
        self.resource = Some(resource);
        self
    }

    pub fn event_type(&self) -> Option<EventType> {
        self.event_type
    }

    fn check_sub_predicate(
        &self,
        predicate: &'static str,
        supported: fn(EventType) -> bool,
    ) -> Result<(), FilterError> {
        match self.event_type {
            None => Err(FilterError::UntypedPredicate(predicate)),
            Some(event_type) if !supported(event_type) => Err(FilterError::UnsupportedPredicate {
                predicate,
                event_type,
            }),
            Some(_) => Ok(()),
        }
    }

    /// Validate the filter and resolve it against `roster`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use combatlog::filter::{Events, SELECTED_PLAYER};
    /// use combatlog::{Actor, ActorId, ActorRole, Event, EventKind, HitType, Roster};
    ///
    /// let roster = Roster::new(vec![Actor::new(ActorId(1), "Me", ActorRole::SelectedPlayer)]);
    ///
    /// let filter = Events::damage().by(SELECTED_PLAYER).compile(&roster).unwrap();
    /// assert!(filter.matches(&Event::new(0, ActorId(1), EventKind::damage(10))));
    /// assert!(!filter.matches(&Event::new(0, ActorId(2), EventKind::damage(10))));
    ///
    /// // Casts have no hit type.
    /// assert!(Events::cast().hit_type(HitType::Crit).compile(&roster).is_err());
    /// ```
    pub fn compile(&self, roster: &Roster) -> Result<CompiledFilter, FilterError> {
        if !self.hit_types.is_empty() {
            self.check_sub_predicate("hit_type", EventType::has_hit_type)?;
        }
        if self.tick.is_some() {
            self.check_sub_predicate("tick", EventType::has_hit_type)?;
        }
        if self.resource.is_some() {
            self.check_sub_predicate("resource", EventType::has_resource)?;
        }

        let abilities = match &self.abilities {
            Some(list) if list.is_empty() => return Err(FilterError::EmptyAbilitySet),
            Some(list) => Some(list.iter().copied().collect()),
            None => None,
        };
        let hit_types = if self.hit_types.is_empty() {
            None
        } else {
            Some(self.hit_types.iter().copied().collect())
        };

        Ok(CompiledFilter {
            event_type: self.event_type,
            source: ActorMatch::resolve(self.source, roster)?,
            target: ActorMatch::resolve(self.target, roster)?,
            abilities,
            hit_types,
            tick: self.tick,
            resource: self.resource,
        })
    }
}

/// Actor selector resolved against a roster.
#[derive(Debug, Clone)]
enum ActorMatch {
    Any,
    Is(ActorId),
    OneOf(AHashSet<ActorId>),
}

impl ActorMatch {
    fn resolve(selector: ActorSelector, roster: &Roster) -> Result<Self, FilterError> {
        let selected = || roster.selected_player().ok_or(FilterError::NoSelectedPlayer);
        Ok(match selector {
            ActorSelector::Any => ActorMatch::Any,
            ActorSelector::Actor(id) => ActorMatch::Is(id),
            ActorSelector::SelectedPlayer => ActorMatch::Is(selected()?),
            ActorSelector::SelectedPlayerPet => {
                ActorMatch::OneOf(roster.pets_of(selected()?).collect())
            }
            ActorSelector::Friendly => ActorMatch::OneOf(
                roster
                    .iter()
                    .filter(|a| a.is_friendly())
                    .map(|a| a.id)
                    .collect(),
            ),
            ActorSelector::Enemy => ActorMatch::OneOf(
                roster
                    .iter()
                    .filter(|a| !a.is_friendly())
                    .map(|a| a.id)
                    .collect(),
            ),
        })
    }

    fn matches(&self, actor: Option<ActorId>) -> bool {
        match (self, actor) {
            (ActorMatch::Any, _) => true,
            (_, None) => false,
            (ActorMatch::Is(id), Some(actor)) => *id == actor,
            (ActorMatch::OneOf(ids), Some(actor)) => ids.contains(&actor),
        }
    }
}

/// A validated filter, ready to be evaluated once per event.
#[derive(Debug, Clone)]
pub struct CompiledFilter {
    event_type: Option<EventType>,
    source: ActorMatch,
    target: ActorMatch,
    abilities: Option<AHashSet<AbilityId>>,
    hit_types: Option<AHashSet<HitType>>,
    tick: Option<bool>,
    resource: Option<ResourceType>,
}

impl CompiledFilter {
    /// The event type this filter is restricted to, `None` for any type.
    pub fn event_type(&self) -> Option<EventType> {
        self.event_type
    }

    /// Evaluate the filter. Pure: never touches the event or any state.
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(event_type) = self.event_type {
            if event.event_type() != event_type {
                return false;
            }
        }
        if !self.source.matches(Some(event.source)) || !self.target.matches(event.target) {
            return false;
        }
        if let Some(abilities) = &self.abilities {
            match event.ability {
                Some(ability) if abilities.contains(&ability) => {}
                _ => return false,
            }
        }
        if let Some(hit_types) = &self.hit_types {
            match event.hit_type() {
                Some(hit) if hit_types.contains(&hit) => {}
                _ => return false,
            }
        }
        if let Some(tick) = self.tick {
            if event.tick() != Some(tick) {
                return false;
            }
        }
        if let Some(resource) = self.resource {
            if event.resource_type() != Some(resource) {
                return false;
            }
        }
        true
    }
}
