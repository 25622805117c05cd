//! Observable boolean predicates with edge-triggered notification.
//!
//! A [`TriggerableCondition`] is a boolean value plus an observer list.
//! Observers are notified only on value edges (old != new), never on no-op
//! re-evaluation. Conditions are created already evaluated once -- the
//! initial snapshot fires no notification. `subscribe`/`unsubscribe` form
//! an explicit activation lifecycle: an inactive condition holds its last
//! value but is detached from its event sources.
//!
//! [`ConditionEvent`] models "this event just happened" as a pulse: when
//! its event fires it goes true then immediately false within the same
//! synchronous dispatch. An AND composite over two pulsing children
//! therefore only observes both true when one pulse is nested inside the
//! other's notification chain. That is deliberate and pinned by tests;
//! do not "fix" it into general AND-of-independent-events semantics.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::event::{EventArgs, EventBus, EventId, Handler};

// ---------------------------------------------------------------------------
// Edge observers
// ---------------------------------------------------------------------------

/// A pair of optional callbacks, one per edge kind. Identity is the
/// allocation, so the same `Rc` clone detaches what it attached.
pub struct EdgeObserver {
    pub on_true: Option<Rc<dyn Fn()>>,
    pub on_false: Option<Rc<dyn Fn()>>,
}

pub type ObserverRef = Rc<EdgeObserver>;

impl EdgeObserver {
    pub fn new(on_true: Option<Rc<dyn Fn()>>, on_false: Option<Rc<dyn Fn()>>) -> ObserverRef {
        Rc::new(Self { on_true, on_false })
    }

    /// An observer that only cares about false -> true edges.
    pub fn on_true(callback: impl Fn() + 'static) -> ObserverRef {
        Self::new(Some(Rc::new(callback)), None)
    }
}

// ---------------------------------------------------------------------------
// Flag: the shared subject
// ---------------------------------------------------------------------------

/// Current value plus observer list. Notifies on edges only, iterating a
/// snapshot of the observers so they may attach/detach mid-notification.
struct Flag {
    value: Cell<bool>,
    observers: RefCell<Vec<ObserverRef>>,
}

impl Flag {
    fn new(initial: bool) -> Self {
        Self {
            value: Cell::new(initial),
            observers: RefCell::new(Vec::new()),
        }
    }

    fn get(&self) -> bool {
        self.value.get()
    }

    fn set(&self, value: bool) {
        if self.value.get() == value {
            return;
        }
        self.value.set(value);
        let snapshot: Vec<ObserverRef> = self.observers.borrow().clone();
        for observer in snapshot {
            let callback = if value {
                &observer.on_true
            } else {
                &observer.on_false
            };
            if let Some(callback) = callback {
                callback();
            }
        }
    }

    fn attach(&self, observer: ObserverRef) {
        self.observers.borrow_mut().push(observer);
    }

    fn detach(&self, observer: &ObserverRef) {
        let mut observers = self.observers.borrow_mut();
        if let Some(pos) = observers.iter().position(|o| Rc::ptr_eq(o, observer)) {
            observers.remove(pos);
        }
    }
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// An observable boolean predicate.
pub trait TriggerableCondition {
    /// The current value.
    fn is_passed(&self) -> bool;

    /// Activate: attach to event sources and take a fresh snapshot.
    fn subscribe(&self);

    /// Deactivate: detach from event sources. The last value is kept.
    fn unsubscribe(&self);

    /// Attach an edge observer.
    fn watch(&self, observer: ObserverRef);

    /// Detach an edge observer; no-op when absent.
    fn unwatch(&self, observer: &ObserverRef);
}

/// A shared, dynamically typed condition handle.
pub type ConditionRef = Rc<dyn TriggerableCondition>;

// ---------------------------------------------------------------------------
// ConditionAlwaysTrue
// ---------------------------------------------------------------------------

/// Constant true. There is nothing to attach, so the activation lifecycle
/// is a no-op and observers are never called.
pub struct ConditionAlwaysTrue {
    flag: Flag,
}

impl ConditionAlwaysTrue {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            flag: Flag::new(true),
        })
    }
}

impl TriggerableCondition for ConditionAlwaysTrue {
    fn is_passed(&self) -> bool {
        self.flag.get()
    }

    fn subscribe(&self) {}

    fn unsubscribe(&self) {}

    fn watch(&self, observer: ObserverRef) {
        self.flag.attach(observer);
    }

    fn unwatch(&self, observer: &ObserverRef) {
        self.flag.detach(observer);
    }
}

// ---------------------------------------------------------------------------
// ConditionEvent
// ---------------------------------------------------------------------------

/// True for the duration of one event dispatch: when the watched event
/// fires, the condition pulses true then false back-to-back, producing
/// two edge notifications within the same synchronous call.
pub struct ConditionEvent {
    flag: Flag,
    bus: Weak<EventBus>,
    event_id: EventId,
    handler: RefCell<Option<Handler>>,
}

impl ConditionEvent {
    pub fn new(bus: &Rc<EventBus>, event_id: EventId) -> Rc<Self> {
        let condition = Rc::new(Self {
            flag: Flag::new(false),
            bus: Rc::downgrade(bus),
            event_id,
            handler: RefCell::new(None),
        });
        let weak = Rc::downgrade(&condition);
        let handler: Handler = Rc::new(move |_args: &EventArgs| {
            if let Some(condition) = weak.upgrade() {
                condition.flag.set(true);
                condition.flag.set(false);
            }
        });
        *condition.handler.borrow_mut() = Some(handler);
        condition
    }
}

impl TriggerableCondition for ConditionEvent {
    fn is_passed(&self) -> bool {
        self.flag.get()
    }

    fn subscribe(&self) {
        // Outside a pulse the condition is false by definition.
        self.flag.set(false);
        if let (Some(bus), Some(handler)) = (self.bus.upgrade(), self.handler.borrow().clone()) {
            bus.subscribe(self.event_id, handler, 0);
        }
    }

    fn unsubscribe(&self) {
        if let (Some(bus), Some(handler)) = (self.bus.upgrade(), self.handler.borrow().clone()) {
            bus.unsubscribe(self.event_id, &handler, 0);
        }
    }

    fn watch(&self, observer: ObserverRef) {
        self.flag.attach(observer);
    }

    fn unwatch(&self, observer: &ObserverRef) {
        self.flag.detach(observer);
    }
}

// ---------------------------------------------------------------------------
// ConditionAll
// ---------------------------------------------------------------------------

/// True iff every child is currently true. Absent (`None`) children count
/// as always-true. A child's true-edge triggers a re-check of all cached
/// child values; a child's false-edge forces this condition false
/// immediately, short-circuiting the re-check.
pub struct ConditionAll {
    flag: Flag,
    children: Vec<Option<ConditionRef>>,
    hooks: RefCell<Vec<ObserverRef>>,
}

impl ConditionAll {
    pub fn new(children: Vec<Option<ConditionRef>>) -> Rc<Self> {
        let initial = all_passed(&children);
        let condition = Rc::new(Self {
            flag: Flag::new(initial),
            children,
            hooks: RefCell::new(Vec::new()),
        });
        let hooks = condition
            .children
            .iter()
            .map(|_| {
                let on_recheck = Rc::downgrade(&condition);
                let on_drop = Rc::downgrade(&condition);
                EdgeObserver::new(
                    Some(Rc::new(move || {
                        if let Some(c) = on_recheck.upgrade() {
                            c.recheck();
                        }
                    })),
                    Some(Rc::new(move || {
                        if let Some(c) = on_drop.upgrade() {
                            c.flag.set(false);
                        }
                    })),
                )
            })
            .collect();
        *condition.hooks.borrow_mut() = hooks;
        condition
    }

    fn recheck(&self) {
        self.flag.set(all_passed(&self.children));
    }
}

impl TriggerableCondition for ConditionAll {
    fn is_passed(&self) -> bool {
        self.flag.get()
    }

    fn subscribe(&self) {
        self.recheck();
        // Activation cascades: attaching to a child also activates it, so
        // composites over event conditions reach the bus.
        for (child, hook) in self.children.iter().zip(self.hooks.borrow().iter()) {
            if let Some(child) = child {
                child.watch(Rc::clone(hook));
                child.subscribe();
            }
        }
    }

    fn unsubscribe(&self) {
        for (child, hook) in self.children.iter().zip(self.hooks.borrow().iter()) {
            if let Some(child) = child {
                child.unwatch(hook);
                child.unsubscribe();
            }
        }
    }

    fn watch(&self, observer: ObserverRef) {
        self.flag.attach(observer);
    }

    fn unwatch(&self, observer: &ObserverRef) {
        self.flag.detach(observer);
    }
}

// ---------------------------------------------------------------------------
// ConditionAny
// ---------------------------------------------------------------------------

/// True iff at least one child is currently true -- the mirror image of
/// [`ConditionAll`]: a child's true-edge forces this condition true
/// immediately; a child's false-edge triggers an all-false re-check.
/// Absent children count as always-true, so an `Any` with an absent child
/// is constantly true.
pub struct ConditionAny {
    flag: Flag,
    children: Vec<Option<ConditionRef>>,
    hooks: RefCell<Vec<ObserverRef>>,
}

impl ConditionAny {
    pub fn new(children: Vec<Option<ConditionRef>>) -> Rc<Self> {
        let initial = any_passed(&children);
        let condition = Rc::new(Self {
            flag: Flag::new(initial),
            children,
            hooks: RefCell::new(Vec::new()),
        });
        let hooks = condition
            .children
            .iter()
            .map(|_| {
                let on_raise = Rc::downgrade(&condition);
                let on_recheck = Rc::downgrade(&condition);
                EdgeObserver::new(
                    Some(Rc::new(move || {
                        if let Some(c) = on_raise.upgrade() {
                            c.flag.set(true);
                        }
                    })),
                    Some(Rc::new(move || {
                        if let Some(c) = on_recheck.upgrade() {
                            c.recheck();
                        }
                    })),
                )
            })
            .collect();
        *condition.hooks.borrow_mut() = hooks;
        condition
    }

    fn recheck(&self) {
        self.flag.set(any_passed(&self.children));
    }
}

impl TriggerableCondition for ConditionAny {
    fn is_passed(&self) -> bool {
        self.flag.get()
    }

    fn subscribe(&self) {
        self.recheck();
        for (child, hook) in self.children.iter().zip(self.hooks.borrow().iter()) {
            if let Some(child) = child {
                child.watch(Rc::clone(hook));
                child.subscribe();
            }
        }
    }

    fn unsubscribe(&self) {
        for (child, hook) in self.children.iter().zip(self.hooks.borrow().iter()) {
            if let Some(child) = child {
                child.unwatch(hook);
                child.unsubscribe();
            }
        }
    }

    fn watch(&self, observer: ObserverRef) {
        self.flag.attach(observer);
    }

    fn unwatch(&self, observer: &ObserverRef) {
        self.flag.detach(observer);
    }
}

fn all_passed(children: &[Option<ConditionRef>]) -> bool {
    children
        .iter()
        .all(|child| child.as_ref().map_or(true, |c| c.is_passed()))
}

fn any_passed(children: &[Option<ConditionRef>]) -> bool {
    children
        .iter()
        .any(|child| child.as_ref().map_or(true, |c| c.is_passed()))
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventArgs, Sender};
    use std::cell::RefCell;

    fn edge_log(condition: &dyn TriggerableCondition) -> Rc<RefCell<Vec<bool>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let log_true = Rc::clone(&log);
        let log_false = Rc::clone(&log);
        condition.watch(EdgeObserver::new(
            Some(Rc::new(move || log_true.borrow_mut().push(true))),
            Some(Rc::new(move || log_false.borrow_mut().push(false))),
        ));
        log
    }

    // -----------------------------------------------------------------------
    // Basics
    // -----------------------------------------------------------------------

    #[test]
    fn always_true_is_true_and_silent() {
        let condition = ConditionAlwaysTrue::new();
        let log = edge_log(condition.as_ref());
        condition.subscribe();
        condition.unsubscribe();
        assert!(condition.is_passed());
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn construction_takes_a_snapshot_without_notifying() {
        let bus = Rc::new(EventBus::new());
        let condition = ConditionEvent::new(&bus, EventId::Pickup);
        let log = edge_log(condition.as_ref());
        assert!(!condition.is_passed());
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn event_condition_pulses_true_then_false() {
        let bus = Rc::new(EventBus::new());
        let condition = ConditionEvent::new(&bus, EventId::Pickup);
        condition.subscribe();
        let log = edge_log(condition.as_ref());

        bus.fire(EventId::Pickup, EventArgs::empty(Sender::Field));
        assert_eq!(*log.borrow(), vec![true, false]);
        // Back at rest after the dispatch.
        assert!(!condition.is_passed());
    }

    #[test]
    fn unsubscribed_event_condition_ignores_the_bus() {
        let bus = Rc::new(EventBus::new());
        let condition = ConditionEvent::new(&bus, EventId::Pickup);
        condition.subscribe();
        condition.unsubscribe();
        let log = edge_log(condition.as_ref());

        bus.fire(EventId::Pickup, EventArgs::empty(Sender::Field));
        assert!(log.borrow().is_empty());
        assert_eq!(bus.handler_count(EventId::Pickup), 0);
    }

    // -----------------------------------------------------------------------
    // Composites
    // -----------------------------------------------------------------------

    #[test]
    fn all_with_only_absent_children_is_true() {
        let condition = ConditionAll::new(vec![None, None]);
        condition.subscribe();
        assert!(condition.is_passed());
    }

    #[test]
    fn all_tracks_both_children() {
        let bus = Rc::new(EventBus::new());
        let left = ConditionEvent::new(&bus, EventId::Pickup);
        let right = ConditionAlwaysTrue::new();
        let all = ConditionAll::new(vec![
            Some(left.clone() as ConditionRef),
            Some(right as ConditionRef),
        ]);
        all.subscribe();
        assert!(!all.is_passed());

        let log = edge_log(all.as_ref());
        bus.fire(EventId::Pickup, EventArgs::empty(Sender::Field));
        // The pulse passes straight through the AND: up when both children
        // hold, down again when the pulse ends.
        assert_eq!(*log.borrow(), vec![true, false]);
    }

    #[test]
    fn any_raises_on_one_child() {
        let bus = Rc::new(EventBus::new());
        let left = ConditionEvent::new(&bus, EventId::Pickup);
        let right = ConditionEvent::new(&bus, EventId::Crossway);
        let any = ConditionAny::new(vec![
            Some(left as ConditionRef),
            Some(right as ConditionRef),
        ]);
        any.subscribe();
        assert!(!any.is_passed());

        let log = edge_log(any.as_ref());
        bus.fire(EventId::Pickup, EventArgs::empty(Sender::Field));
        assert_eq!(*log.borrow(), vec![true, false]);
    }

    // -----------------------------------------------------------------------
    // The simultaneity edge case. An AND over two pulsing children is NOT
    // a general "both events happened" latch: it only observes both true
    // when the pulses nest inside one synchronous dispatch.
    // -----------------------------------------------------------------------

    #[test]
    fn and_over_sequential_pulses_never_latches() {
        let bus = Rc::new(EventBus::new());
        let left = ConditionEvent::new(&bus, EventId::Pickup);
        let right = ConditionEvent::new(&bus, EventId::Crossway);
        let all = ConditionAll::new(vec![
            Some(left as ConditionRef),
            Some(right as ConditionRef),
        ]);
        all.subscribe();
        let log = edge_log(all.as_ref());

        // Two independent dispatches: each pulse has already returned to
        // false before the other event fires, so the AND never goes true.
        bus.fire(EventId::Pickup, EventArgs::empty(Sender::Field));
        bus.fire(EventId::Crossway, EventArgs::empty(Sender::Field));
        assert!(log.borrow().is_empty());
        assert!(!all.is_passed());
    }

    #[test]
    fn and_latches_when_pulses_nest() {
        let bus = Rc::new(EventBus::new());
        let left = ConditionEvent::new(&bus, EventId::Pickup);
        let right = ConditionEvent::new(&bus, EventId::Crossway);
        let all = ConditionAll::new(vec![
            Some(left.clone() as ConditionRef),
            Some(right as ConditionRef),
        ]);
        all.subscribe();
        let log = edge_log(all.as_ref());

        // The second event fires as a side effect of the first pulse's
        // true-edge: while Pickup is still true, Crossway pulses inside
        // its notification chain, and the AND sees both -- true then
        // false within the inner dispatch. (A plain second bus handler
        // would be too late: the Pickup pulse has already collapsed by
        // the time it runs.)
        let bus_inner = Rc::clone(&bus);
        left.watch(EdgeObserver::on_true(move || {
            bus_inner.fire(EventId::Crossway, EventArgs::empty(Sender::Field));
        }));
        bus.fire(EventId::Pickup, EventArgs::empty(Sender::Field));
        assert_eq!(*log.borrow(), vec![true, false]);
        assert!(!all.is_passed());
    }

    #[test]
    fn false_edge_short_circuits_all() {
        // A child dropping to false forces the composite false without a
        // full re-check of the other children.
        let bus = Rc::new(EventBus::new());
        let pulsing = ConditionEvent::new(&bus, EventId::Pickup);
        let all = ConditionAll::new(vec![Some(pulsing as ConditionRef), None]);
        all.subscribe();

        let log = edge_log(all.as_ref());
        bus.fire(EventId::Pickup, EventArgs::empty(Sender::Field));
        assert_eq!(*log.borrow(), vec![true, false]);
    }

    #[test]
    fn unwatch_detaches_a_single_observer() {
        let bus = Rc::new(EventBus::new());
        let condition = ConditionEvent::new(&bus, EventId::Pickup);
        condition.subscribe();

        let count = Rc::new(Cell::new(0u32));
        let count_inner = Rc::clone(&count);
        let observer = EdgeObserver::on_true(move || count_inner.set(count_inner.get() + 1));
        condition.watch(Rc::clone(&observer));

        bus.fire(EventId::Pickup, EventArgs::empty(Sender::Field));
        assert_eq!(count.get(), 1);

        condition.unwatch(&observer);
        bus.fire(EventId::Pickup, EventArgs::empty(Sender::Field));
        assert_eq!(count.get(), 1);

        // Detaching again is a no-op.
        condition.unwatch(&observer);
    }
}
