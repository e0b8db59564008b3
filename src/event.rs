//! Combat log event model.
//!
//! An [`Event`] is one normalized combat-log line: a timestamp, the acting
//! and receiving actors, an optional ability and a kind-specific payload
//! carried by the closed [`EventKind`] sum type. Events are produced by an
//! external normalizer and are never mutated afterwards; listeners only ever
//! see `&Event`.
//!
//! The serde representation follows the normalized JSON format used by the
//! log host: a lowercase `type` tag, `sourceID` / `targetID`, and the ability
//! nested as `{"guid": ..}`.

use crate::actor::ActorId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Milliseconds since the start of the encounter.
pub type Timestamp = u64;

/// Identifier of a spell, ability, buff or item effect.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AbilityId(pub u32);

impl fmt::Display for AbilityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for AbilityId {
    fn from(id: u32) -> Self {
        AbilityId(id)
    }
}

/// Outcome of a damage or heal hit, using the log host's numeric codes.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum HitType {
    Miss,
    Normal,
    Crit,
    Absorb,
    Block,
    BlockedCrit,
    Glancing,
    Dodge,
    Parry,
    Immune,
    Resist,
    /// A code this crate does not name.
    Other(u8),
}

impl From<u8> for HitType {
    fn from(code: u8) -> Self {
        match code {
            0 => HitType::Miss,
            1 => HitType::Normal,
            2 => HitType::Crit,
            3 => HitType::Absorb,
            4 => HitType::Block,
            5 => HitType::BlockedCrit,
            6 => HitType::Glancing,
            7 => HitType::Dodge,
            8 => HitType::Parry,
            10 => HitType::Immune,
            14 => HitType::Resist,
            other => HitType::Other(other),
        }
    }
}

impl From<HitType> for u8 {
    fn from(hit: HitType) -> Self {
        match hit {
            HitType::Miss => 0,
            HitType::Normal => 1,
            HitType::Crit => 2,
            HitType::Absorb => 3,
            HitType::Block => 4,
            HitType::BlockedCrit => 5,
            HitType::Glancing => 6,
            HitType::Dodge => 7,
            HitType::Parry => 8,
            HitType::Immune => 10,
            HitType::Resist => 14,
            HitType::Other(code) => code,
        }
    }
}

/// Resource type of an energize event, using the log host's numeric codes.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum ResourceType {
    Mana,
    Rage,
    Focus,
    Energy,
    ComboPoints,
    Runes,
    RunicPower,
    SoulShards,
    AstralPower,
    HolyPower,
    Maelstrom,
    Chi,
    Insanity,
    ArcaneCharges,
    Fury,
    Pain,
    Other(u8),
}

impl From<u8> for ResourceType {
    fn from(code: u8) -> Self {
        match code {
            0 => ResourceType::Mana,
            1 => ResourceType::Rage,
            2 => ResourceType::Focus,
            3 => ResourceType::Energy,
            4 => ResourceType::ComboPoints,
            5 => ResourceType::Runes,
            6 => ResourceType::RunicPower,
            7 => ResourceType::SoulShards,
            8 => ResourceType::AstralPower,
            9 => ResourceType::HolyPower,
            11 => ResourceType::Maelstrom,
            12 => ResourceType::Chi,
            13 => ResourceType::Insanity,
            16 => ResourceType::ArcaneCharges,
            17 => ResourceType::Fury,
            18 => ResourceType::Pain,
            other => ResourceType::Other(other),
        }
    }
}

impl From<ResourceType> for u8 {
    fn from(resource: ResourceType) -> Self {
        match resource {
            ResourceType::Mana => 0,
            ResourceType::Rage => 1,
            ResourceType::Focus => 2,
            ResourceType::Energy => 3,
            ResourceType::ComboPoints => 4,
            ResourceType::Runes => 5,
            ResourceType::RunicPower => 6,
            ResourceType::SoulShards => 7,
            ResourceType::AstralPower => 8,
            ResourceType::HolyPower => 9,
            ResourceType::Maelstrom => 11,
            ResourceType::Chi => 12,
            ResourceType::Insanity => 13,
            ResourceType::ArcaneCharges => 16,
            ResourceType::Fury => 17,
            ResourceType::Pain => 18,
            ResourceType::Other(code) => code,
        }
    }
}

/// Kind-specific payload of an event.
///
/// Serialized as an internally tagged enum so that it can be flattened into
/// [`Event`] next to the common fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EventKind {
    #[serde(rename_all = "camelCase")]
    Damage {
        amount: u64,
        #[serde(default)]
        overkill: u64,
        #[serde(default = "normal_hit")]
        hit_type: HitType,
        #[serde(default)]
        absorbed: u64,
        #[serde(default)]
        tick: bool,
    },
    #[serde(rename_all = "camelCase")]
    Heal {
        amount: u64,
        #[serde(default)]
        overheal: u64,
        #[serde(default)]
        absorbed: u64,
        #[serde(default = "normal_hit")]
        hit_type: HitType,
        #[serde(default)]
        tick: bool,
    },
    Absorbed {
        amount: u64,
    },
    Cast,
    BeginCast,
    ApplyBuff,
    RemoveBuff,
    RefreshBuff,
    ApplyBuffStack {
        stack: u32,
    },
    RemoveBuffStack {
        stack: u32,
    },
    ApplyDebuff,
    RemoveDebuff,
    RefreshDebuff,
    #[serde(rename_all = "camelCase")]
    Energize {
        resource_type: ResourceType,
        resource_change: i64,
        #[serde(default)]
        waste: i64,
    },
    Death,
    Resurrect,
    Summon,
}

fn normal_hit() -> HitType {
    HitType::Normal
}

impl EventKind {
    /// A non-periodic damage payload with a normal hit.
    pub fn damage(amount: u64) -> Self {
        EventKind::Damage {
            amount,
            overkill: 0,
            hit_type: HitType::Normal,
            absorbed: 0,
            tick: false,
        }
    }

    /// A non-periodic heal payload with a normal hit.
    pub fn heal(amount: u64) -> Self {
        EventKind::Heal {
            amount,
            overheal: 0,
            absorbed: 0,
            hit_type: HitType::Normal,
            tick: false,
        }
    }

    /// An energize payload with no waste.
    pub fn energize(resource_type: ResourceType, resource_change: i64) -> Self {
        EventKind::Energize {
            resource_type,
            resource_change,
            waste: 0,
        }
    }

    /// The payload-free discriminant of this kind.
    pub fn event_type(&self) -> EventType {
        match self {
            EventKind::Damage { .. } => EventType::Damage,
            EventKind::Heal { .. } => EventType::Heal,
            EventKind::Absorbed { .. } => EventType::Absorbed,
            EventKind::Cast => EventType::Cast,
            EventKind::BeginCast => EventType::BeginCast,
            EventKind::ApplyBuff => EventType::ApplyBuff,
            EventKind::RemoveBuff => EventType::RemoveBuff,
            EventKind::RefreshBuff => EventType::RefreshBuff,
            EventKind::ApplyBuffStack { .. } => EventType::ApplyBuffStack,
            EventKind::RemoveBuffStack { .. } => EventType::RemoveBuffStack,
            EventKind::ApplyDebuff => EventType::ApplyDebuff,
            EventKind::RemoveDebuff => EventType::RemoveDebuff,
            EventKind::RefreshDebuff => EventType::RefreshDebuff,
            EventKind::Energize { .. } => EventType::Energize,
            EventKind::Death => EventType::Death,
            EventKind::Resurrect => EventType::Resurrect,
            EventKind::Summon => EventType::Summon,
        }
    }
}

/// Payload-free event discriminant, used by filters and the bus index.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Damage,
    Heal,
    Absorbed,
    Cast,
    BeginCast,
    ApplyBuff,
    RemoveBuff,
    RefreshBuff,
    ApplyBuffStack,
    RemoveBuffStack,
    ApplyDebuff,
    RemoveDebuff,
    RefreshDebuff,
    Energize,
    Death,
    Resurrect,
    Summon,
}

impl EventType {
    /// Every event type, in declaration order.
    pub const ALL: [EventType; 17] = [
        EventType::Damage,
        EventType::Heal,
        EventType::Absorbed,
        EventType::Cast,
        EventType::BeginCast,
        EventType::ApplyBuff,
        EventType::RemoveBuff,
        EventType::RefreshBuff,
        EventType::ApplyBuffStack,
        EventType::RemoveBuffStack,
        EventType::ApplyDebuff,
        EventType::RemoveDebuff,
        EventType::RefreshDebuff,
        EventType::Energize,
        EventType::Death,
        EventType::Resurrect,
        EventType::Summon,
    ];

    /// Number of event types.
    pub const COUNT: usize = Self::ALL.len();

    /// Dense index of this type, `0..COUNT`.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Whether events of this type carry a hit type and a tick flag.
    pub fn has_hit_type(self) -> bool {
        matches!(self, EventType::Damage | EventType::Heal)
    }

    /// Whether events of this type carry a resource type.
    pub fn has_resource(self) -> bool {
        matches!(self, EventType::Energize)
    }

    /// Lowercase name as it appears in the log format.
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::Damage => "damage",
            EventType::Heal => "heal",
            EventType::Absorbed => "absorbed",
            EventType::Cast => "cast",
            EventType::BeginCast => "begincast",
            EventType::ApplyBuff => "applybuff",
            EventType::RemoveBuff => "removebuff",
            EventType::RefreshBuff => "refreshbuff",
            EventType::ApplyBuffStack => "applybuffstack",
            EventType::RemoveBuffStack => "removebuffstack",
            EventType::ApplyDebuff => "applydebuff",
            EventType::RemoveDebuff => "removedebuff",
            EventType::RefreshDebuff => "refreshdebuff",
            EventType::Energize => "energize",
            EventType::Death => "death",
            EventType::Resurrect => "resurrect",
            EventType::Summon => "summon",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single normalized combat log event.
///
/// # Examples
///
/// ```rust
/// use combatlog::{ActorId, AbilityId, Event, EventKind, EventType};
///
/// let event = Event::new(1_500, ActorId(1), EventKind::damage(12_000))
///     .with_target(ActorId(100))
///     .with_ability(AbilityId(19434));
///
/// assert_eq!(event.event_type(), EventType::Damage);
/// assert_eq!(event.target, Some(ActorId(100)));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub timestamp: Timestamp,
    #[serde(rename = "sourceID")]
    pub source: ActorId,
    #[serde(rename = "targetID", default, skip_serializing_if = "Option::is_none")]
    pub target: Option<ActorId>,
    #[serde(
        default,
        with = "ability_ref",
        skip_serializing_if = "Option::is_none"
    )]
    pub ability: Option<AbilityId>,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl Event {
    /// Create an event with no target and no ability.
    pub fn new(timestamp: Timestamp, source: ActorId, kind: EventKind) -> Self {
        Self {
            timestamp,
            source,
            target: None,
            ability: None,
            kind,
        }
    }

    /// Set the target actor.
    pub fn with_target(mut self, target: ActorId) -> Self {
        self.target = Some(target);
        self
    }

    /// Set the ability.
    pub fn with_ability(mut self, ability: impl Into<AbilityId>) -> Self {
        self.ability = Some(ability.into());
        self
    }

    pub fn event_type(&self) -> EventType {
        self.kind.event_type()
    }

    /// Hit type of a damage or heal event.
    pub fn hit_type(&self) -> Option<HitType> {
        match self.kind {
            EventKind::Damage { hit_type, .. } | EventKind::Heal { hit_type, .. } => Some(hit_type),
            _ => None,
        }
    }

    /// Periodic flag of a damage or heal event.
    pub fn tick(&self) -> Option<bool> {
        match self.kind {
            EventKind::Damage { tick, .. } | EventKind::Heal { tick, .. } => Some(tick),
            _ => None,
        }
    }

    /// Resource type of an energize event.
    pub fn resource_type(&self) -> Option<ResourceType> {
        match self.kind {
            EventKind::Energize { resource_type, .. } => Some(resource_type),
            _ => None,
        }
    }
}

/// The log format nests the ability as `{"guid": id, "name": ..}`.
mod ability_ref {
    use super::AbilityId;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    struct AbilityRef {
        guid: u32,
    }

    pub fn serialize<S>(ability: &Option<AbilityId>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        ability
            .map(|id| AbilityRef { guid: id.0 })
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<AbilityId>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ability = Option::<AbilityRef>::deserialize(deserializer)?;
        Ok(ability.map(|a| AbilityId(a.guid)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_indices_are_dense() {
        for (i, ty) in EventType::ALL.iter().enumerate() {
            assert_eq!(ty.index(), i);
        }
    }

    #[test]
    fn test_deserialize_log_format() {
        let json = r#"{
            "timestamp": 4200,
            "type": "damage",
            "sourceID": 7,
            "targetID": 99,
            "ability": {"guid": 185358, "name": "Arcane Shot"},
            "amount": 5300,
            "hitType": 2,
            "absorbed": 120
        }"#;
        let event: Event = serde_json::from_str(json).unwrap();

        assert_eq!(event.timestamp, 4200);
        assert_eq!(event.source, ActorId(7));
        assert_eq!(event.target, Some(ActorId(99)));
        assert_eq!(event.ability, Some(AbilityId(185358)));
        assert_eq!(event.hit_type(), Some(HitType::Crit));
        assert_eq!(event.tick(), Some(false));
        match event.kind {
            EventKind::Damage { amount, absorbed, overkill, .. } => {
                assert_eq!(amount, 5300);
                assert_eq!(absorbed, 120);
                assert_eq!(overkill, 0);
            }
            other => panic!("expected damage, got {:?}", other),
        }
    }

    #[test]
    fn test_deserialize_energize() {
        let json = r#"{"timestamp": 10, "type": "energize", "sourceID": 7, "targetID": 7,
            "ability": {"guid": 101033}, "resourceType": 0, "resourceChange": 1600}"#;
        let event: Event = serde_json::from_str(json).unwrap();

        assert_eq!(event.resource_type(), Some(ResourceType::Mana));
        assert_eq!(event.hit_type(), None);
    }

    #[test]
    fn test_unknown_event_type_is_rejected() {
        let json = r#"{"timestamp": 10, "type": "teleport", "sourceID": 7}"#;
        assert!(serde_json::from_str::<Event>(json).is_err());
    }

    #[test]
    fn test_unknown_codes_are_preserved() {
        assert_eq!(HitType::from(42), HitType::Other(42));
        assert_eq!(u8::from(HitType::Other(42)), 42);
        assert_eq!(u8::from(ResourceType::from(17)), 17);
    }

    #[test]
    fn test_payload_free_kinds() {
        let event = Event::new(0, ActorId(1), EventKind::Cast).with_ability(AbilityId(5));
        assert_eq!(event.event_type(), EventType::Cast);
        assert_eq!(event.tick(), None);
        assert_eq!(event.resource_type(), None);
    }
}
