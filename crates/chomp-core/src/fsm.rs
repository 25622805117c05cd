//! Orthogonal finite-state machines driven by the event bus.
//!
//! An actor is modeled by two or three independent [`StateDriver`] axes;
//! its effective mode is the tuple of the axis states, recomputed on read
//! and used as a lookup key (speed tables, animation selection).
//!
//! Transitions are never called directly: each `add_transition` registers
//! a bus handler that checks the admissible source states and an optional
//! guard, then moves the state and emits MODE_CHANGE. Disposal flips a
//! flag read inside every handler -- handlers stay subscribed, which keeps
//! teardown idempotent and safe even when a driver is disposed in the
//! middle of a dispatch it participates in.
//!
//! [`BehaviorMachine`] is the condition-graph flavor of the same idea:
//! transitions advance on true-edges of composed
//! [`TriggerableCondition`]s instead of raw bus events.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::condition::{ConditionAll, ConditionEvent, ConditionRef, EdgeObserver, ObserverRef};
use crate::event::{EventArgs, EventBus, EventId, Handler, Payload, Sender};
use crate::id::ActorTag;

// ---------------------------------------------------------------------------
// Axis states
// ---------------------------------------------------------------------------

/// One state tag of one axis. The wire name is the stable spelling used
/// in MODE_CHANGE payloads and save files.
pub trait AxisState: Copy + Eq + std::hash::Hash + std::fmt::Debug + 'static {
    fn name(self) -> &'static str;
}

/// A guard over the event payload. Guards are plain boolean functions
/// evaluated synchronously at dispatch time; they are not observable
/// conditions.
pub type Guard = Rc<dyn Fn(&EventArgs) -> bool>;

// ---------------------------------------------------------------------------
// StateDriver
// ---------------------------------------------------------------------------

/// One axis of an actor's behavior: a current state and a set of
/// event-triggered, guarded transitions.
pub struct StateDriver<S: AxisState> {
    bus: Weak<EventBus>,
    actor: ActorTag,
    state: Rc<Cell<S>>,
    disposed: Rc<Cell<bool>>,
}

impl<S: AxisState> StateDriver<S> {
    pub fn new(bus: &Rc<EventBus>, initial: S, actor: ActorTag) -> Self {
        Self {
            bus: Rc::downgrade(bus),
            actor,
            state: Rc::new(Cell::new(initial)),
            disposed: Rc::new(Cell::new(false)),
        }
    }

    /// The current state of this axis.
    pub fn current(&self) -> S {
        self.state.get()
    }

    /// Register a transition: on `event_id`, if the current state is in
    /// `from` and the guard (when present) passes, move to `to` and fire
    /// MODE_CHANGE carrying (actor, from-name, to-name).
    pub fn add_transition(&self, event_id: EventId, from: &[S], to: S, guard: Option<Guard>) {
        let Some(bus) = self.bus.upgrade() else {
            return;
        };
        let state = Rc::clone(&self.state);
        let disposed = Rc::clone(&self.disposed);
        let bus_weak = Rc::downgrade(&bus);
        let actor = self.actor;
        let from = from.to_vec();
        let handler: Handler = Rc::new(move |args| {
            if disposed.get() {
                return;
            }
            if !from.contains(&state.get()) {
                return;
            }
            if let Some(guard) = &guard {
                if !guard(args) {
                    return;
                }
            }
            let old = state.get();
            state.set(to);
            if let Some(bus) = bus_weak.upgrade() {
                bus.fire(
                    EventId::ModeChange,
                    EventArgs::new(
                        Sender::Actor(actor),
                        Payload::ModeChange {
                            actor,
                            from: old.name(),
                            to: to.name(),
                        },
                    ),
                );
            }
        });
        bus.subscribe(event_id, handler, 0);
    }

    /// Register a two-way switch: on `event_id`, swap between the two
    /// states (a no-op in any other state). Declared as one handler so a
    /// single event cannot flip the axis twice within one dispatch, which
    /// a pair of opposing `add_transition` calls would do.
    pub fn add_toggle(&self, event_id: EventId, a: S, b: S) {
        let Some(bus) = self.bus.upgrade() else {
            return;
        };
        let state = Rc::clone(&self.state);
        let disposed = Rc::clone(&self.disposed);
        let bus_weak = Rc::downgrade(&bus);
        let actor = self.actor;
        let handler: Handler = Rc::new(move |_args| {
            if disposed.get() {
                return;
            }
            let old = state.get();
            let to = if old == a {
                b
            } else if old == b {
                a
            } else {
                return;
            };
            state.set(to);
            if let Some(bus) = bus_weak.upgrade() {
                bus.fire(
                    EventId::ModeChange,
                    EventArgs::new(
                        Sender::Actor(actor),
                        Payload::ModeChange {
                            actor,
                            from: old.name(),
                            to: to.name(),
                        },
                    ),
                );
            }
        });
        bus.subscribe(event_id, handler, 0);
    }

    /// Dispose: every pending and future transition handler becomes a
    /// permanent no-op. Idempotent. Handlers are deliberately not
    /// unsubscribed one by one -- some drivers outlive the unsubscribe
    /// call during an in-flight dispatch.
    pub fn reset(&self) {
        self.disposed.set(true);
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.get()
    }
}

// ---------------------------------------------------------------------------
// BehaviorMachine
// ---------------------------------------------------------------------------

struct TransitionSlot {
    condition: ConditionRef,
    hook: ObserverRef,
}

/// A condition-driven automaton: each transition watches a composed
/// condition and advances on its true-edge when the machine sits in the
/// transition's source state.
pub struct BehaviorMachine<S: AxisState> {
    initial: S,
    current: Cell<S>,
    slots: RefCell<Vec<TransitionSlot>>,
    observers: RefCell<Vec<Rc<dyn Fn(S, S)>>>,
    weak_self: RefCell<Weak<BehaviorMachine<S>>>,
}

impl<S: AxisState> BehaviorMachine<S> {
    pub fn new(initial: S) -> Rc<Self> {
        let machine = Rc::new(Self {
            initial,
            current: Cell::new(initial),
            slots: RefCell::new(Vec::new()),
            observers: RefCell::new(Vec::new()),
            weak_self: RefCell::new(Weak::new()),
        });
        *machine.weak_self.borrow_mut() = Rc::downgrade(&machine);
        machine
    }

    pub fn current(&self) -> S {
        self.current.get()
    }

    /// Observe transitions; called with (from, to) after each move.
    pub fn on_transition(&self, observer: Rc<dyn Fn(S, S)>) {
        self.observers.borrow_mut().push(observer);
    }

    /// Watch `condition` and move `from -> to` on its true-edge. The
    /// condition is activated here.
    pub fn add_transition(&self, from: S, to: S, condition: ConditionRef) {
        let weak = self.weak_self.borrow().clone();
        let hook = EdgeObserver::on_true(move || {
            if let Some(machine) = weak.upgrade() {
                if machine.current.get() == from {
                    machine.go(to);
                }
            }
        });
        condition.watch(Rc::clone(&hook));
        condition.subscribe();
        self.slots.borrow_mut().push(TransitionSlot { condition, hook });
    }

    /// Convenience: move `from -> to` when `event_id` fires while the
    /// optional extra condition holds, composed as
    /// `ConditionAll(extra, ConditionEvent(event_id))`.
    pub fn add_event_transition(
        &self,
        bus: &Rc<EventBus>,
        event_id: EventId,
        from: S,
        to: S,
        extra: Option<ConditionRef>,
    ) {
        let pulse: ConditionRef = ConditionEvent::new(bus, event_id);
        self.add_transition(from, to, ConditionAll::new(vec![extra, Some(pulse)]));
    }

    fn go(&self, to: S) {
        let old = self.current.get();
        self.current.set(to);
        let observers: Vec<Rc<dyn Fn(S, S)>> = self.observers.borrow().clone();
        for observer in observers {
            observer(old, to);
        }
    }

    /// Return to the initial state without touching the transition table.
    pub fn reset(&self) {
        self.current.set(self.initial);
    }

    /// Detach and deactivate every transition condition.
    pub fn terminate(&self) {
        for slot in self.slots.borrow_mut().drain(..) {
            slot.condition.unwatch(&slot.hook);
            slot.condition.unsubscribe();
        }
        self.observers.borrow_mut().clear();
    }
}

// ===========================================================================
// Tests
// ===========================================================================
