//! Event bus.
//!
//! The bus owns every listener registration and replays an event stream
//! through them exactly once. For each event, every matching listener is
//! invoked in registration order before the next event is delivered.
//!
//! Registrations are indexed by event type. A registration that accepts any
//! type is indexed under every type, and each index list is kept in
//! registration order, so the global order is preserved.
//!
//! A listener that returns an error or panics does not stop the replay:
//! the failure is logged, its module is marked degraded, and delivery
//! continues with the next listener.

use crate::error::{AnalysisError, ModuleError};
use crate::event::{Event, EventType};
use crate::filter::CompiledFilter;
use crate::module::{Analyzer, Dependencies};
use crate::registry::ModuleSet;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// A type-erased listener. The concrete module type is recovered by
/// downcasting the first argument.
pub(crate) type Listener = Box<
    dyn FnMut(&mut dyn Analyzer, &Event, &Dependencies<'_>) -> Result<(), ModuleError> + Send,
>;

struct Registration {
    owner: usize,
    filter: CompiledFilter,
    listener: Listener,
}

/// Cooperative cancellation, checked once per event.
///
/// # Examples
///
/// ```rust
/// use combatlog::bus::CancellationToken;
///
/// let token = CancellationToken::new();
/// let handle = token.clone();
///
/// handle.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Counters of one replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub events: usize,
    /// Listener invocations.
    pub invocations: u64,
    /// Invocations that returned an error or panicked.
    pub failures: u64,
}

/// Listener registrations and the replay loop.
pub struct EventBus {
    registrations: Vec<Registration>,
    by_type: [Vec<usize>; EventType::COUNT],
    inert: usize,
    sealed: bool,
}

impl EventBus {
    pub(crate) fn new() -> Self {
        Self {
            registrations: Vec::new(),
            by_type: std::array::from_fn(|_| Vec::new()),
            inert: 0,
            sealed: false,
        }
    }

    /// Add a registration for the module at slot `owner`.
    ///
    /// Registrations of inactive modules are counted and dropped.
    pub(crate) fn register(
        &mut self,
        owner: usize,
        active: bool,
        filter: CompiledFilter,
        listener: Listener,
    ) -> Result<(), ModuleError> {
        if self.sealed {
            return Err(ModuleError::BusSealed);
        }
        if !active {
            self.inert += 1;
            return Ok(());
        }

        let idx = self.registrations.len();
        match filter.event_type() {
            Some(event_type) => self.by_type[event_type.index()].push(idx),
            None => {
                for list in self.by_type.iter_mut() {
                    list.push(idx);
                }
            }
        }
        self.registrations.push(Registration {
            owner,
            filter,
            listener,
        });
        Ok(())
    }

    /// Stop accepting registrations.
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Live registrations.
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Registrations dropped because their module is inactive.
    pub fn inert(&self) -> usize {
        self.inert
    }

    /// Deliver `events` to the listeners, in order.
    ///
    /// Seals the bus. With `isolate_panics`, a panicking listener is treated
    /// like one that returned an error; otherwise the panic propagates.
    pub fn replay(
        &mut self,
        events: &[Event],
        modules: &mut ModuleSet,
        cancel: &CancellationToken,
        isolate_panics: bool,
    ) -> Result<ReplayStats, AnalysisError> {
        self.seal();
        debug!(
            events = events.len(),
            listeners = self.registrations.len(),
            inert = self.inert,
            "Starting replay"
        );

        let mut stats = ReplayStats::default();
        for event in events {
            if cancel.is_cancelled() {
                return Err(AnalysisError::Cancelled {
                    timestamp: event.timestamp,
                });
            }
            stats.events += 1;

            let event_type = event.event_type();
            for &idx in &self.by_type[event_type.index()] {
                let registration = &mut self.registrations[idx];
                if !registration.filter.matches(event) {
                    continue;
                }
                let Some((module, deps)) = modules.dispatch_target(registration.owner) else {
                    continue;
                };
                stats.invocations += 1;

                let listener = &mut registration.listener;
                let outcome = if isolate_panics {
                    panic::catch_unwind(AssertUnwindSafe(|| listener(module, event, &deps)))
                        .unwrap_or_else(|payload| Err(ModuleError::Panicked(panic_message(payload))))
                } else {
                    listener(module, event, &deps)
                };

                if let Err(error) = outcome {
                    stats.failures += 1;
                    let failures =
                        modules.record_failure(registration.owner, Some(event.timestamp), &error);
                    let module = modules
                        .id_at(registration.owner)
                        .map(|id| id.as_str())
                        .unwrap_or_default();
                    if failures == 1 {
                        warn!(
                            module,
                            event = %event_type,
                            timestamp = event.timestamp,
                            error = %error,
                            "Listener failed, continuing replay"
                        );
                    } else {
                        debug!(
                            module,
                            event = %event_type,
                            timestamp = event.timestamp,
                            error = %error,
                            failures,
                            "Listener failed again"
                        );
                    }
                }
            }
        }

        debug!(
            events = stats.events,
            invocations = stats.invocations,
            failures = stats.failures,
            "Replay finished"
        );
        Ok(stats)
    }
}

pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        String::from("non-string panic payload")
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("registrations", &self.registrations.len())
            .field("inert", &self.inert)
            .field("sealed", &self.sealed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::{Actor, ActorId, ActorRole, Roster};
    use crate::encounter::{Combatant, Encounter, Fight};
    use crate::event::EventKind;
    use crate::filter::{Events, SELECTED_PLAYER};
    use crate::module::{AnalyzerModule, ModuleContext};
    use crate::registry::{ModuleDescriptor, ModuleMap};
    use std::sync::Mutex;

    /// Calls recorded as (module, label, timestamp).
    static CALLS: Mutex<Vec<(&'static str, &'static str, u64)>> = Mutex::new(Vec::new());

    fn calls_of(test: &'static str) -> Vec<(&'static str, &'static str, u64)> {
        CALLS
            .lock()
            .unwrap()
            .iter()
            .filter(|(module, _, _)| module.starts_with(test))
            .cloned()
            .collect()
    }

    fn record(module: &'static str, label: &'static str, event: &Event) {
        CALLS.lock().unwrap().push((module, label, event.timestamp));
    }

    struct First;

    impl Analyzer for First {}

    impl AnalyzerModule for First {
        fn is_active(_: &Combatant, _: &Fight) -> bool {
            true
        }

        fn new(ctx: &mut ModuleContext<'_, Self>) -> Result<Self, ModuleError> {
            ctx.on(Events::any(), |_, e, _| {
                record("order.first", "any", e);
                Ok(())
            })?;
            ctx.on(Events::cast(), |_, e, _| {
                record("order.first", "cast", e);
                Ok(())
            })?;
            Ok(First)
        }
    }

    struct Second;

    impl Analyzer for Second {}

    impl AnalyzerModule for Second {
        fn is_active(_: &Combatant, _: &Fight) -> bool {
            true
        }

        fn new(ctx: &mut ModuleContext<'_, Self>) -> Result<Self, ModuleError> {
            ctx.on(Events::cast().by(SELECTED_PLAYER), |_, e, _| {
                record("order.second", "cast", e);
                Ok(())
            })?;
            Ok(Second)
        }
    }

    #[derive(Default)]
    struct Faulty {
        seen: u32,
    }

    impl Analyzer for Faulty {}

    impl AnalyzerModule for Faulty {
        fn is_active(_: &Combatant, _: &Fight) -> bool {
            true
        }

        fn new(ctx: &mut ModuleContext<'_, Self>) -> Result<Self, ModuleError> {
            ctx.on(Events::cast(), |m: &mut Faulty, e, _| {
                m.seen += 1;
                match e.timestamp {
                    10 => Err(ModuleError::msg("bad cast")),
                    20 => panic!("boom"),
                    _ => Ok(()),
                }
            })?;
            Ok(Faulty::default())
        }
    }

    #[derive(Default)]
    struct Healthy {
        seen: u32,
    }

    impl Analyzer for Healthy {}

    impl AnalyzerModule for Healthy {
        fn is_active(_: &Combatant, _: &Fight) -> bool {
            true
        }

        fn new(ctx: &mut ModuleContext<'_, Self>) -> Result<Self, ModuleError> {
            ctx.on(Events::cast(), |m: &mut Healthy, _, _| {
                m.seen += 1;
                Ok(())
            })?;
            Ok(Healthy::default())
        }
    }

    fn encounter() -> Encounter {
        Encounter::new(
            Fight::new(0, 100, 1),
            Roster::new([
                Actor::new(ActorId(1), "Player", ActorRole::SelectedPlayer),
                Actor::new(ActorId(2), "Boss", ActorRole::Enemy),
            ]),
            Combatant::new(ActorId(1), 72),
        )
    }

    fn cast(ts: u64, source: i64) -> Event {
        Event::new(ts, ActorId(source), EventKind::Cast)
    }

    #[test]
    fn test_listeners_fire_in_registration_order() {
        let map = ModuleMap::new()
            .with(ModuleDescriptor::of::<First>("first"))
            .with(ModuleDescriptor::of::<Second>("second"));
        let (mut modules, mut bus) = map.resolve(&encounter()).unwrap();
        assert_eq!(bus.len(), 3);

        let events = vec![cast(1, 1), Event::new(2, ActorId(2), EventKind::Death), cast(3, 2)];
        let stats = bus
            .replay(&events, &mut modules, &CancellationToken::new(), true)
            .unwrap();

        assert_eq!(
            calls_of("order"),
            vec![
                ("order.first", "any", 1),
                ("order.first", "cast", 1),
                ("order.second", "cast", 1),
                ("order.first", "any", 2),
                ("order.first", "any", 3),
                ("order.first", "cast", 3),
            ]
        );
        assert_eq!(stats.events, 3);
        assert_eq!(stats.invocations, 6);
        assert!(bus.is_sealed());
    }

    #[test]
    fn test_failures_are_isolated() {
        let map = ModuleMap::new()
            .with(ModuleDescriptor::of::<Faulty>("faulty"))
            .with(ModuleDescriptor::of::<Healthy>("healthy"));
        let (mut modules, mut bus) = map.resolve(&encounter()).unwrap();

        let events = vec![cast(10, 1), cast(20, 1), cast(30, 1)];
        let stats = bus
            .replay(&events, &mut modules, &CancellationToken::new(), true)
            .unwrap();

        assert_eq!(stats.failures, 2);
        assert_eq!(modules.get::<Faulty>("faulty").unwrap().seen, 3);
        assert_eq!(modules.get::<Healthy>("healthy").unwrap().seen, 3);

        let degraded = modules.degraded();
        assert_eq!(degraded.len(), 1);
        assert_eq!(degraded[0].module.as_str(), "faulty");
        assert_eq!(degraded[0].failures, 2);
        assert_eq!(degraded[0].first_timestamp, Some(10));
        assert_eq!(degraded[0].first_error, "bad cast");
    }

    #[test]
    fn test_cancellation_stops_at_event_boundary() {
        let map = ModuleMap::new().with(ModuleDescriptor::of::<Healthy>("healthy"));
        let (mut modules, mut bus) = map.resolve(&encounter()).unwrap();
        let token = CancellationToken::new();
        token.cancel();

        let err = bus
            .replay(&[cast(5, 1)], &mut modules, &token, true)
            .unwrap_err();
        assert_eq!(err, AnalysisError::Cancelled { timestamp: 5 });
        assert_eq!(modules.get::<Healthy>("healthy").unwrap().seen, 0);
    }

    #[test]
    fn test_sealed_bus_rejects_registration() {
        let mut bus = EventBus::new();
        bus.seal();
        let filter = Events::cast().compile(&Roster::default()).unwrap();
        let listener: Listener = Box::new(
            |_: &mut dyn Analyzer, _: &Event, _: &Dependencies<'_>| Ok::<(), ModuleError>(()),
        );
        let result = bus.register(0, true, filter, listener);
        assert_eq!(result, Err(ModuleError::BusSealed));
    }

    #[test]
    fn test_panic_message() {
        assert_eq!(panic_message(Box::new("static")), "static");
        assert_eq!(panic_message(Box::new(String::from("owned"))), "owned");
        assert_eq!(panic_message(Box::new(7_u8)), "non-string panic payload");
    }
}
