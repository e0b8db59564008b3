//! Module registry and dependency resolver.
//!
//! A [`ModuleMap`] is the ordered set of module descriptors a spec
//! configuration hands to the parser. Resolving it:
//! 1. Builds the dependency graph in declaration order
//! 2. Rejects missing dependencies and cycles
//! 3. Constructs every module in dependency order, evaluating its
//!    activation predicate first
//!
//! Steps 1 and 2 complete before any constructor runs, so a broken map
//! never leaves half-built modules behind.

use crate::bus::EventBus;
use crate::config::ModuleConfig;
use crate::encounter::{Combatant, Encounter, Fight};
use crate::error::{ConfigError, ModuleError};
use crate::event::Timestamp;
use crate::graph::ModuleGraph;
use crate::module::{Analyzer, AnalyzerModule, ContextParts, Dependencies, ModuleContext};
use crate::module_id::ModuleId;
use crate::report::DegradedModule;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

type ActivationFn = fn(&Combatant, &Fight) -> bool;
type BuildFn = fn(ContextParts<'_>) -> Result<Box<dyn Analyzer>, ModuleError>;

fn build_module<M: AnalyzerModule>(parts: ContextParts<'_>) -> Result<Box<dyn Analyzer>, ModuleError> {
    let mut ctx = ModuleContext::<M>::new(parts);
    let module = M::new(&mut ctx)?;
    Ok(Box::new(module))
}

/// How to build one module: its name, type, dependencies and static config.
///
/// # Examples
///
/// ```rust
/// use combatlog::modules::BuffTracker;
/// use combatlog::registry::ModuleDescriptor;
///
/// let tracker = ModuleDescriptor::of::<BuffTracker>("buffs").depends_on(["abilities"]);
/// assert_eq!(tracker.id().as_str(), "buffs");
/// assert_eq!(tracker.dependencies()[0].as_str(), "abilities");
/// ```
#[derive(Clone)]
pub struct ModuleDescriptor {
    id: ModuleId,
    dependencies: Vec<ModuleId>,
    config: ModuleConfig,
    type_name: &'static str,
    is_active: ActivationFn,
    build: BuildFn,
}

impl ModuleDescriptor {
    pub fn of<M: AnalyzerModule>(id: impl Into<ModuleId>) -> Self {
        Self {
            id: id.into(),
            dependencies: Vec::new(),
            config: ModuleConfig::new(),
            type_name: std::any::type_name::<M>(),
            is_active: M::is_active,
            build: build_module::<M>,
        }
    }

    /// Declare dependencies. Repeated names are kept once.
    pub fn depends_on<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ModuleId>,
    {
        for dependency in dependencies {
            let dependency = dependency.into();
            if !self.dependencies.contains(&dependency) {
                self.dependencies.push(dependency);
            }
        }
        self
    }

    pub fn with_config(mut self, config: ModuleConfig) -> Self {
        self.config = config;
        self
    }

    pub fn id(&self) -> &ModuleId {
        &self.id
    }

    pub fn dependencies(&self) -> &[ModuleId] {
        &self.dependencies
    }

    pub fn config(&self) -> &ModuleConfig {
        &self.config
    }
}

impl fmt::Debug for ModuleDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleDescriptor")
            .field("id", &self.id)
            .field("type", &self.type_name)
            .field("dependencies", &self.dependencies)
            .field("config", &self.config)
            .finish()
    }
}

/// Ordered module descriptors keyed by name.
///
/// Declaration order matters: it breaks ties in the resolution order.
///
/// # Examples
///
/// ```rust
/// use combatlog::modules::{AbilityTracker, BuffTracker};
/// use combatlog::registry::{ModuleDescriptor, ModuleMap};
///
/// let core = ModuleMap::new()
///     .with(ModuleDescriptor::of::<AbilityTracker>("abilities"))
///     .with(ModuleDescriptor::of::<BuffTracker>("buffs"));
///
/// // A spec configuration replaces a core module in place.
/// let spec = ModuleMap::new().with(ModuleDescriptor::of::<BuffTracker>("abilities"));
/// let merged = core.merge(spec);
///
/// let names: Vec<&str> = merged.ids().map(|id| id.as_str()).collect();
/// assert_eq!(names, vec!["abilities", "buffs"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ModuleMap {
    descriptors: Vec<ModuleDescriptor>,
    index: HashMap<ModuleId, usize>,
}

impl ModuleMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a descriptor, rejecting a name that is already taken.
    pub fn insert(&mut self, descriptor: ModuleDescriptor) -> Result<(), ConfigError> {
        if self.index.contains_key(&descriptor.id) {
            return Err(ConfigError::DuplicateModule(descriptor.id));
        }
        self.index
            .insert(descriptor.id.clone(), self.descriptors.len());
        self.descriptors.push(descriptor);
        Ok(())
    }

    /// Add a descriptor, replacing one with the same name in place.
    pub fn replace(&mut self, descriptor: ModuleDescriptor) {
        match self.index.get(&descriptor.id) {
            Some(&idx) => self.descriptors[idx] = descriptor,
            None => {
                self.index
                    .insert(descriptor.id.clone(), self.descriptors.len());
                self.descriptors.push(descriptor);
            }
        }
    }

    /// Builder form of [`replace`](Self::replace).
    pub fn with(mut self, descriptor: ModuleDescriptor) -> Self {
        self.replace(descriptor);
        self
    }

    /// Layer `overrides` on top of this map.
    ///
    /// Overridden modules keep their original position; new ones are
    /// appended.
    pub fn merge(mut self, overrides: ModuleMap) -> Self {
        for descriptor in overrides.descriptors {
            self.replace(descriptor);
        }
        self
    }

    pub fn get(&self, id: &str) -> Option<&ModuleDescriptor> {
        self.index
            .get(id)
            .and_then(|&idx| self.descriptors.get(idx))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Names in declaration order.
    pub fn ids(&self) -> impl Iterator<Item = &ModuleId> {
        self.descriptors.iter().map(|d| &d.id)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Build the dependency graph, rejecting undeclared dependencies.
    pub fn graph(&self) -> Result<ModuleGraph, ConfigError> {
        let mut graph = ModuleGraph::new();
        for descriptor in &self.descriptors {
            graph.add_node(descriptor.id.clone());
        }
        for descriptor in &self.descriptors {
            for dependency in &descriptor.dependencies {
                if !self.index.contains_key(dependency) {
                    return Err(ConfigError::MissingDependency {
                        module: descriptor.id.clone(),
                        dependency: dependency.clone(),
                    });
                }
                graph.add_edge(&descriptor.id, dependency);
            }
        }
        Ok(graph)
    }

    /// The construction order: dependencies first, declaration order
    /// among modules that are ready at the same time.
    pub fn resolution_order(&self) -> Result<Vec<ModuleId>, ConfigError> {
        self.graph()?.topological_sort()
    }

    /// Construct every module for `encounter`.
    ///
    /// Returns the module set and the event bus holding their listeners.
    pub fn resolve(&self, encounter: &Encounter) -> Result<(ModuleSet, EventBus), ConfigError> {
        let order = self.resolution_order()?;
        debug!(
            modules = order.len(),
            order = %order.iter().map(ModuleId::as_str).collect::<Vec<_>>().join(", "),
            "Resolved module order"
        );

        let mut slots: Vec<ModuleSlot> = Vec::with_capacity(order.len());
        let mut slot_of: HashMap<ModuleId, usize> = HashMap::with_capacity(order.len());
        let mut bus = EventBus::new();

        for id in order {
            let Some(descriptor) = self.get(id.as_str()) else {
                continue;
            };
            let dependencies = descriptor
                .dependencies
                .iter()
                .map(|dependency| {
                    slot_of
                        .get(dependency)
                        .map(|&idx| (dependency.clone(), idx))
                        .ok_or_else(|| ConfigError::MissingDependency {
                            module: id.clone(),
                            dependency: dependency.clone(),
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;

            let active = (descriptor.is_active)(&encounter.combatant, &encounter.fight);
            if !active {
                debug!(module = %id, "Module inactive for this combatant");
            }

            let owner = slots.len();
            let parts = ContextParts {
                id: &id,
                owner,
                active,
                encounter,
                config: &descriptor.config,
                deps: Dependencies::new(&slots, &dependencies),
                bus: &mut bus,
            };
            let module = (descriptor.build)(parts).map_err(|source| match source {
                ModuleError::Filter(source) => ConfigError::InvalidFilter {
                    module: id.clone(),
                    source,
                },
                ModuleError::BusSealed => ConfigError::LateRegistration(id.clone()),
                source => ConfigError::Construction {
                    module: id.clone(),
                    source,
                },
            })?;

            slot_of.insert(id.clone(), owner);
            slots.push(ModuleSlot {
                id,
                active,
                dependencies,
                module,
                failures: 0,
                first_failure: None,
            });
        }

        Ok((ModuleSet { slots, slot_of }, bus))
    }
}

struct Failure {
    timestamp: Option<Timestamp>,
    error: ModuleError,
}

/// A constructed module and its bookkeeping.
pub(crate) struct ModuleSlot {
    pub(crate) id: ModuleId,
    pub(crate) active: bool,
    pub(crate) dependencies: Vec<(ModuleId, usize)>,
    pub(crate) module: Box<dyn Analyzer>,
    failures: u32,
    first_failure: Option<Failure>,
}

/// The constructed modules of one analysis, in resolution order.
///
/// Every dependency sits at a lower index than its dependents.
pub struct ModuleSet {
    slots: Vec<ModuleSlot>,
    slot_of: HashMap<ModuleId, usize>,
}

impl ModuleSet {
    /// A module as its concrete type.
    pub fn get<T: Analyzer>(&self, id: &str) -> Option<&T> {
        let slot = self.slots.get(*self.slot_of.get(id)?)?;
        slot.module.as_ref().as_any().downcast_ref::<T>()
    }

    pub fn is_active(&self, id: &str) -> Option<bool> {
        let idx = *self.slot_of.get(id)?;
        self.slots.get(idx).map(|slot| slot.active)
    }

    /// Names in resolution order.
    pub fn ids(&self) -> impl Iterator<Item = &ModuleId> {
        self.slots.iter().map(|slot| &slot.id)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.active).count()
    }

    pub(crate) fn id_at(&self, idx: usize) -> Option<&ModuleId> {
        self.slots.get(idx).map(|slot| &slot.id)
    }

    /// The module at `idx`, mutably, with read access to its dependencies.
    pub(crate) fn dispatch_target(
        &mut self,
        idx: usize,
    ) -> Option<(&mut dyn Analyzer, Dependencies<'_>)> {
        if idx >= self.slots.len() {
            return None;
        }
        let (before, rest) = self.slots.split_at_mut(idx);
        let ModuleSlot {
            module,
            dependencies,
            ..
        } = rest.first_mut()?;
        let module: &mut dyn Analyzer = module.as_mut();
        Some((module, Dependencies::new(before, dependencies)))
    }

    /// Shared access to the module at `idx` and its dependencies.
    pub(crate) fn view_at(&self, idx: usize) -> Option<(&ModuleSlot, Dependencies<'_>)> {
        if idx >= self.slots.len() {
            return None;
        }
        let (before, rest) = self.slots.split_at(idx);
        let slot = rest.first()?;
        Some((slot, Dependencies::new(before, &slot.dependencies)))
    }

    /// Record a failure of the module at `idx` and return its failure count.
    pub(crate) fn record_failure(
        &mut self,
        idx: usize,
        timestamp: Option<Timestamp>,
        error: &ModuleError,
    ) -> u32 {
        let Some(slot) = self.slots.get_mut(idx) else {
            return 0;
        };
        slot.failures += 1;
        if slot.first_failure.is_none() {
            slot.first_failure = Some(Failure {
                timestamp,
                error: error.clone(),
            });
        }
        slot.failures
    }

    /// Modules that failed at least once, in resolution order.
    pub fn degraded(&self) -> Vec<DegradedModule> {
        self.slots
            .iter()
            .filter_map(|slot| {
                let failure = slot.first_failure.as_ref()?;
                Some(DegradedModule {
                    module: slot.id.clone(),
                    failures: slot.failures,
                    first_error: failure.error.to_string(),
                    first_timestamp: failure.timestamp,
                })
            })
            .collect()
    }
}

impl fmt::Debug for ModuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.ids()).finish()
    }
}
