//! Analyzer modules.
//!
//! An analyzer module is a self-contained unit of analysis: it registers
//! listeners on the event bus while it is constructed, accumulates private
//! state during replay, and contributes suggestions and statistics to the
//! report afterwards.
//!
//! ```rust
//! use combatlog::filter::{Events, SELECTED_PLAYER};
//! use combatlog::module::{Analyzer, AnalyzerModule, Dependencies, ModuleContext};
//! use combatlog::report::{ReportBuilder, StatisticCategory, StatisticOrder};
//! use combatlog::{Combatant, Event, Fight, ModuleError};
//!
//! #[derive(Default)]
//! struct CastCounter {
//!     casts: u32,
//! }
//!
//! impl CastCounter {
//!     fn on_cast(&mut self, _event: &Event, _deps: &Dependencies<'_>) -> Result<(), ModuleError> {
//!         self.casts += 1;
//!         Ok(())
//!     }
//! }
//!
//! impl Analyzer for CastCounter {
//!     fn contribute(
//!         &self,
//!         report: &mut ReportBuilder<'_>,
//!         _deps: &Dependencies<'_>,
//!     ) -> Result<(), ModuleError> {
//!         report.statistic(StatisticCategory::General, StatisticOrder::Core(1), self.casts)
//!     }
//! }
//!
//! impl AnalyzerModule for CastCounter {
//!     fn is_active(_combatant: &Combatant, _fight: &Fight) -> bool {
//!         true
//!     }
//!
//!     fn new(ctx: &mut ModuleContext<'_, Self>) -> Result<Self, ModuleError> {
//!         ctx.on(Events::cast().by(SELECTED_PLAYER), Self::on_cast)?;
//!         Ok(Self::default())
//!     }
//! }
//! ```

use crate::actor::Roster;
use crate::bus::{EventBus, Listener};
use crate::config::ModuleConfig;
use crate::encounter::{Combatant, Encounter, Fight};
use crate::error::ModuleError;
use crate::event::Event;
use crate::filter::EventFilter;
use crate::module_id::ModuleId;
use crate::registry::ModuleSlot;
use crate::report::ReportBuilder;
use std::any::Any;
use std::marker::PhantomData;

/// Upcast to [`Any`] so type-erased modules can be handed back as their
/// concrete type.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// The object-safe half of a module, used after construction.
pub trait Analyzer: AsAny + Send {
    /// Add this module's results to the report.
    ///
    /// Only called for active modules, once, after replay.
    fn contribute(
        &self,
        _report: &mut ReportBuilder<'_>,
        _deps: &Dependencies<'_>,
    ) -> Result<(), ModuleError> {
        Ok(())
    }
}

/// A module type that the registry can construct.
pub trait AnalyzerModule: Analyzer + Sized {
    /// Whether the module applies to this combatant and fight.
    ///
    /// Evaluated once, before construction. Must not depend on anything but
    /// its arguments. An inactive module is still constructed, but its
    /// listeners never fire and it is not asked to contribute.
    fn is_active(combatant: &Combatant, fight: &Fight) -> bool;

    /// Build the module and register its listeners.
    fn new(ctx: &mut ModuleContext<'_, Self>) -> Result<Self, ModuleError>;
}

/// Read-only access to the declared dependencies of one module.
///
/// Dependencies are always resolved before their dependents, so during
/// replay they are borrowed immutably while the dependent is borrowed
/// mutably.
#[derive(Clone, Copy)]
pub struct Dependencies<'a> {
    slots: &'a [ModuleSlot],
    declared: &'a [(ModuleId, usize)],
}

impl<'a> Dependencies<'a> {
    pub(crate) fn new(slots: &'a [ModuleSlot], declared: &'a [(ModuleId, usize)]) -> Self {
        Self { slots, declared }
    }

    fn slot(&self, name: &str) -> Option<&'a ModuleSlot> {
        self.declared
            .iter()
            .find(|(id, _)| id.as_str() == name)
            .and_then(|&(_, idx)| self.slots.get(idx))
    }

    /// The dependency `name` as its concrete type.
    ///
    /// Returns `None` if `name` was not declared or is a different type.
    pub fn get<T: Analyzer>(&self, name: &str) -> Option<&'a T> {
        self.slot(name)?.module.as_ref().as_any().downcast_ref::<T>()
    }

    /// Like [`get`](Self::get), with an error naming the dependency.
    pub fn require<T: Analyzer>(&self, name: &str) -> Result<&'a T, ModuleError> {
        self.get(name)
            .ok_or_else(|| ModuleError::Dependency(ModuleId::new(name)))
    }

    /// Whether a declared dependency is active. Inactive dependencies keep
    /// their constructed state but never receive events.
    pub fn is_active(&self, name: &str) -> bool {
        self.slot(name).map_or(false, |slot| slot.active)
    }

    pub fn len(&self) -> usize {
        self.declared.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declared.is_empty()
    }
}

/// The pieces the registry lends to one module constructor.
pub(crate) struct ContextParts<'a> {
    pub(crate) id: &'a ModuleId,
    pub(crate) owner: usize,
    pub(crate) active: bool,
    pub(crate) encounter: &'a Encounter,
    pub(crate) config: &'a ModuleConfig,
    pub(crate) deps: Dependencies<'a>,
    pub(crate) bus: &'a mut EventBus,
}

/// Everything a module constructor may use.
///
/// There is no handle back to the orchestrator: a module sees the
/// encounter, its static config, its declared dependencies and the
/// listener registration, and nothing else.
pub struct ModuleContext<'a, M> {
    parts: ContextParts<'a>,
    _module: PhantomData<fn(&mut M)>,
}

impl<'a, M: AnalyzerModule> ModuleContext<'a, M> {
    pub(crate) fn new(parts: ContextParts<'a>) -> Self {
        Self {
            parts,
            _module: PhantomData,
        }
    }

    pub fn id(&self) -> &ModuleId {
        self.parts.id
    }

    /// Result of [`AnalyzerModule::is_active`] for this module.
    pub fn is_active(&self) -> bool {
        self.parts.active
    }

    pub fn roster(&self) -> &Roster {
        &self.parts.encounter.roster
    }

    pub fn fight(&self) -> &Fight {
        &self.parts.encounter.fight
    }

    pub fn combatant(&self) -> &Combatant {
        &self.parts.encounter.combatant
    }

    pub fn config(&self) -> &ModuleConfig {
        self.parts.config
    }

    pub fn dependencies(&self) -> Dependencies<'a> {
        self.parts.deps
    }

    /// A declared dependency as its concrete type.
    pub fn dependency<T: Analyzer>(&self, name: &str) -> Result<&'a T, ModuleError> {
        self.parts.deps.require(name)
    }

    /// Register `listener` for events matching `filter`.
    ///
    /// The filter is compiled against the roster now, so an invalid
    /// predicate combination fails construction. Listeners fire in the
    /// order they were registered, across all modules.
    pub fn on<F>(&mut self, filter: EventFilter, mut listener: F) -> Result<(), ModuleError>
    where
        F: FnMut(&mut M, &Event, &Dependencies<'_>) -> Result<(), ModuleError> + Send + 'static,
    {
        let compiled = filter.compile(&self.parts.encounter.roster)?;
        let erased: Listener = Box::new(
            move |module: &mut dyn Analyzer, event: &Event, deps: &Dependencies<'_>| {
                match module.as_any_mut().downcast_mut::<M>() {
                    Some(module) => listener(module, event, deps),
                    None => Err(ModuleError::msg("listener owner has an unexpected type")),
                }
            },
        );
        self.parts
            .bus
            .register(self.parts.owner, self.parts.active, compiled, erased)
    }
}
