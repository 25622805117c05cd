//! Synchronous priority-ordered publish/subscribe hub.
//!
//! Everything in the simulation communicates through this bus: the tick
//! source fires TICK, the scheduler flushes due events, state drivers
//! listen for domain events and emit MODE_CHANGE, and presentation layers
//! subscribe to MODEL_UPDATE/REDRAW without ever touching the model.
//!
//! Delivery is a plain synchronous call tree -- no batching, no deferral.
//! Handlers run in ascending priority, ties broken by registration order.
//! `fire` iterates a snapshot of the handler list, so handlers are free to
//! subscribe, unsubscribe, or fire further events while a dispatch is in
//! flight.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::fixed::Ticks;
use crate::id::ActorTag;

// ---------------------------------------------------------------------------
// Event identifiers
// ---------------------------------------------------------------------------

/// The closed, ahead-of-time enumerated event set.
///
/// Wire names (see [`EventId::name`]) are stable: the scheduler persists
/// pending events by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventId {
    Tick,
    Control,
    Stop,
    Destroy,
    ModelUpdate,
    GameInit,
    GameStart,
    GameRestart,
    GameEnd,
    NextLevel,
    PinkGhostOut,
    BlueGhostOut,
    OrangeGhostOut,
    GhostBehindDoor,
    GhostOnDeadTarget,
    SwitchTimeout,
    ModeChange,
    Intersection,
    Pickup,
    Crossway,
    FrightenedTimeout,
    EnergizerTimeout,
    Redraw,
}

impl EventId {
    /// Stable wire spelling used by the scheduler save format.
    pub fn name(self) -> &'static str {
        match self {
            EventId::Tick => "TICK",
            EventId::Control => "CONTROL",
            EventId::Stop => "STOP",
            EventId::Destroy => "DESTROY",
            EventId::ModelUpdate => "MODEL_UPDATE",
            EventId::GameInit => "GAME_INIT",
            EventId::GameStart => "GAME_START",
            EventId::GameRestart => "GAME_RESTART",
            EventId::GameEnd => "GAME_END",
            EventId::NextLevel => "NEXT_LEVEL",
            EventId::PinkGhostOut => "PINK_GHOST_OUT",
            EventId::BlueGhostOut => "BLUE_GHOST_OUT",
            EventId::OrangeGhostOut => "ORANGE_GHOST_OUT",
            EventId::GhostBehindDoor => "GHOST_BEHIND_DOOR",
            EventId::GhostOnDeadTarget => "GHOST_ON_DEAD_TARGET",
            EventId::SwitchTimeout => "SWITCH_TIMEOUT",
            EventId::ModeChange => "MODE_CHANGE",
            EventId::Intersection => "INTERSECTION",
            EventId::Pickup => "PICKUP",
            EventId::Crossway => "CROSSWAY",
            EventId::FrightenedTimeout => "FRIGHTENED_TIMEOUT",
            EventId::EnergizerTimeout => "ENERGIZER_TIMEOUT",
            EventId::Redraw => "REDRAW",
        }
    }

    /// Parse a wire spelling. Returns `None` for unknown names; the
    /// scheduler maps that into a `FormatError` at load time.
    pub fn from_name(name: &str) -> Option<EventId> {
        let id = match name {
            "TICK" => EventId::Tick,
            "CONTROL" => EventId::Control,
            "STOP" => EventId::Stop,
            "DESTROY" => EventId::Destroy,
            "MODEL_UPDATE" => EventId::ModelUpdate,
            "GAME_INIT" => EventId::GameInit,
            "GAME_START" => EventId::GameStart,
            "GAME_RESTART" => EventId::GameRestart,
            "GAME_END" => EventId::GameEnd,
            "NEXT_LEVEL" => EventId::NextLevel,
            "PINK_GHOST_OUT" => EventId::PinkGhostOut,
            "BLUE_GHOST_OUT" => EventId::BlueGhostOut,
            "ORANGE_GHOST_OUT" => EventId::OrangeGhostOut,
            "GHOST_BEHIND_DOOR" => EventId::GhostBehindDoor,
            "GHOST_ON_DEAD_TARGET" => EventId::GhostOnDeadTarget,
            "SWITCH_TIMEOUT" => EventId::SwitchTimeout,
            "MODE_CHANGE" => EventId::ModeChange,
            "INTERSECTION" => EventId::Intersection,
            "PICKUP" => EventId::Pickup,
            "CROSSWAY" => EventId::Crossway,
            "FRIGHTENED_TIMEOUT" => EventId::FrightenedTimeout,
            "ENERGIZER_TIMEOUT" => EventId::EnergizerTimeout,
            "REDRAW" => EventId::Redraw,
            _ => return None,
        };
        Some(id)
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// A control input from the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Input {
    Up,
    Left,
    Down,
    Right,
    Save,
}

/// A consumable cell content, as carried by PICKUP events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pickup {
    Dot,
    Energizer,
    Fruit,
}

/// Who fired an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    External,
    Field,
    Scheduler,
    Driver,
    Actor(ActorTag),
}

/// The keyed extra fields of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    Empty,
    Tick { time: Ticks },
    Control { input: Input },
    Pickup { pickup: Pickup },
    Crossway { actor: ActorTag },
    Intersection { ghost: ActorTag },
    ModeChange {
        actor: ActorTag,
        from: &'static str,
        to: &'static str,
    },
    Ghost { name: ActorTag },
}

/// The args record handed to every handler: sender plus payload fields.
#[derive(Debug, Clone, Copy)]
pub struct EventArgs {
    pub sender: Sender,
    pub payload: Payload,
}

impl EventArgs {
    pub fn new(sender: Sender, payload: Payload) -> Self {
        Self { sender, payload }
    }

    pub fn empty(sender: Sender) -> Self {
        Self::new(sender, Payload::Empty)
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// A subscribed callback. Identity is the allocation: the same `Rc` clone
/// that was subscribed must be passed to unsubscribe.
pub type Handler = Rc<dyn Fn(&EventArgs)>;

struct Entry {
    priority: i32,
    /// Monotonically increasing counter for stable ordering within a
    /// priority band.
    order: u64,
    handler: Handler,
}

/// The synchronous publish/subscribe hub.
pub struct EventBus {
    handlers: RefCell<HashMap<EventId, Vec<Entry>>>,
    next_order: Cell<u64>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            handlers: RefCell::new(HashMap::new()),
            next_order: Cell::new(0),
        }
    }

    /// Register a handler. Handlers for one event run in ascending
    /// `priority`; ties keep registration order.
    pub fn subscribe(&self, event_id: EventId, handler: Handler, priority: i32) {
        let order = self.next_order.get();
        self.next_order.set(order + 1);
        let mut handlers = self.handlers.borrow_mut();
        let list = handlers.entry(event_id).or_default();
        list.push(Entry {
            priority,
            order,
            handler,
        });
        list.sort_by_key(|entry| (entry.priority, entry.order));
    }

    /// Remove the first exact `(priority, handler)` match. Removing a
    /// handler that was never subscribed is a no-op.
    pub fn unsubscribe(&self, event_id: EventId, handler: &Handler, priority: i32) {
        let mut handlers = self.handlers.borrow_mut();
        let Some(list) = handlers.get_mut(&event_id) else {
            return;
        };
        if let Some(pos) = list
            .iter()
            .position(|entry| entry.priority == priority && Rc::ptr_eq(&entry.handler, handler))
        {
            list.remove(pos);
        }
    }

    /// Invoke every matching handler synchronously, in priority order.
    ///
    /// Iterates over a snapshot of the handler list: handlers may
    /// subscribe, unsubscribe, or fire further events mid-dispatch without
    /// corrupting this one. A handler added during the dispatch is not
    /// called until the next `fire`.
    pub fn fire(&self, event_id: EventId, args: EventArgs) {
        let snapshot: Vec<Handler> = {
            let handlers = self.handlers.borrow();
            match handlers.get(&event_id) {
                Some(list) => list.iter().map(|entry| Rc::clone(&entry.handler)).collect(),
                None => return,
            }
        };
        for handler in &snapshot {
            handler(&args);
        }
    }

    /// Number of live subscriptions for an event.
    pub fn handler_count(&self, event_id: EventId) -> usize {
        self.handlers
            .borrow()
            .get(&event_id)
            .map_or(0, |list| list.len())
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn record(log: &Rc<RefCell<Vec<&'static str>>>, label: &'static str) -> Handler {
        let log = Rc::clone(log);
        Rc::new(move |_| log.borrow_mut().push(label))
    }

    // -----------------------------------------------------------------------
    // Ordering
    // -----------------------------------------------------------------------

    #[test]
    fn handlers_run_in_registration_order_within_a_priority() {
        let bus = EventBus::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        bus.subscribe(EventId::Tick, record(&log, "a"), 0);
        bus.subscribe(EventId::Tick, record(&log, "b"), 0);
        bus.subscribe(EventId::Tick, record(&log, "c"), 0);

        bus.fire(EventId::Tick, EventArgs::empty(Sender::External));
        assert_eq!(*log.borrow(), vec!["a", "b", "c"]);
    }

    #[test]
    fn lower_priority_runs_first_regardless_of_registration_order() {
        let bus = EventBus::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        bus.subscribe(EventId::Tick, record(&log, "late"), 2);
        bus.subscribe(EventId::Tick, record(&log, "early"), 0);
        bus.subscribe(EventId::Tick, record(&log, "earliest"), -1);
        bus.subscribe(EventId::Tick, record(&log, "mid"), 1);

        bus.fire(EventId::Tick, EventArgs::empty(Sender::External));
        assert_eq!(*log.borrow(), vec!["earliest", "early", "mid", "late"]);
    }

    #[test]
    fn interleaved_priorities_keep_subscription_order_on_ties() {
        let bus = EventBus::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        bus.subscribe(EventId::Tick, record(&log, "p1a"), 1);
        bus.subscribe(EventId::Tick, record(&log, "p0a"), 0);
        bus.subscribe(EventId::Tick, record(&log, "p1b"), 1);
        bus.subscribe(EventId::Tick, record(&log, "p0b"), 0);

        bus.fire(EventId::Tick, EventArgs::empty(Sender::External));
        assert_eq!(*log.borrow(), vec!["p0a", "p0b", "p1a", "p1b"]);
    }

    // -----------------------------------------------------------------------
    // Unsubscribe
    // -----------------------------------------------------------------------

    #[test]
    fn unsubscribe_removes_one_exact_match() {
        let bus = EventBus::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let handler = record(&log, "x");
        bus.subscribe(EventId::Tick, Rc::clone(&handler), 0);
        bus.unsubscribe(EventId::Tick, &handler, 0);

        bus.fire(EventId::Tick, EventArgs::empty(Sender::External));
        assert!(log.borrow().is_empty());
        assert_eq!(bus.handler_count(EventId::Tick), 0);
    }

    #[test]
    fn unsubscribe_needs_the_matching_priority() {
        let bus = EventBus::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let handler = record(&log, "x");
        bus.subscribe(EventId::Tick, Rc::clone(&handler), 1);
        // Wrong priority: not an exact match, so nothing is removed.
        bus.unsubscribe(EventId::Tick, &handler, 0);
        assert_eq!(bus.handler_count(EventId::Tick), 1);
    }

    #[test]
    fn unsubscribing_an_absent_handler_is_a_no_op() {
        let bus = EventBus::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let never_subscribed = record(&log, "x");

        bus.unsubscribe(EventId::Tick, &never_subscribed, 0);
        bus.unsubscribe(EventId::Tick, &never_subscribed, 0);
        assert_eq!(bus.handler_count(EventId::Tick), 0);
    }

    // -----------------------------------------------------------------------
    // Reentrancy
    // -----------------------------------------------------------------------

    #[test]
    fn subscribing_during_fire_does_not_disturb_the_dispatch() {
        let bus = Rc::new(EventBus::new());
        let log = Rc::new(RefCell::new(Vec::new()));

        let late = record(&log, "late");
        let bus_inner = Rc::clone(&bus);
        let log_first = Rc::clone(&log);
        bus.subscribe(
            EventId::Tick,
            Rc::new(move |_| {
                log_first.borrow_mut().push("first");
                bus_inner.subscribe(EventId::Tick, Rc::clone(&late), 0);
            }),
            0,
        );
        bus.subscribe(EventId::Tick, record(&log, "second"), 0);

        // The handler added mid-dispatch must not run this round.
        bus.fire(EventId::Tick, EventArgs::empty(Sender::External));
        assert_eq!(*log.borrow(), vec!["first", "second"]);

        // It runs on the next round.
        log.borrow_mut().clear();
        bus.fire(EventId::Tick, EventArgs::empty(Sender::External));
        assert_eq!(*log.borrow(), vec!["first", "second", "late"]);
    }

    #[test]
    fn unsubscribing_during_fire_does_not_skip_unrelated_handlers() {
        let bus = Rc::new(EventBus::new());
        let log = Rc::new(RefCell::new(Vec::new()));

        let second = record(&log, "second");
        let second_clone = Rc::clone(&second);
        let bus_inner = Rc::clone(&bus);
        let log_first = Rc::clone(&log);
        bus.subscribe(
            EventId::Tick,
            Rc::new(move |_| {
                log_first.borrow_mut().push("first");
                bus_inner.unsubscribe(EventId::Tick, &second_clone, 0);
            }),
            0,
        );
        bus.subscribe(EventId::Tick, second, 0);
        bus.subscribe(EventId::Tick, record(&log, "third"), 0);

        // The snapshot was taken before the removal: "second" still runs
        // this round, and "third" is not skipped.
        bus.fire(EventId::Tick, EventArgs::empty(Sender::External));
        assert_eq!(*log.borrow(), vec!["first", "second", "third"]);

        log.borrow_mut().clear();
        bus.fire(EventId::Tick, EventArgs::empty(Sender::External));
        assert_eq!(*log.borrow(), vec!["first", "third"]);
    }

    #[test]
    fn nested_fire_completes_before_the_outer_dispatch_resumes() {
        let bus = Rc::new(EventBus::new());
        let log = Rc::new(RefCell::new(Vec::new()));

        bus.subscribe(EventId::Pickup, record(&log, "pickup"), 0);
        let bus_inner = Rc::clone(&bus);
        let log_outer = Rc::clone(&log);
        bus.subscribe(
            EventId::Tick,
            Rc::new(move |_| {
                log_outer.borrow_mut().push("tick-before");
                bus_inner.fire(
                    EventId::Pickup,
                    EventArgs::new(
                        Sender::Field,
                        Payload::Pickup {
                            pickup: Pickup::Dot,
                        },
                    ),
                );
                log_outer.borrow_mut().push("tick-after");
            }),
            0,
        );
        bus.subscribe(EventId::Tick, record(&log, "tick-second"), 0);

        bus.fire(EventId::Tick, EventArgs::empty(Sender::External));
        assert_eq!(
            *log.borrow(),
            vec!["tick-before", "pickup", "tick-after", "tick-second"]
        );
    }

    // -----------------------------------------------------------------------
    // Wire names
    // -----------------------------------------------------------------------

    #[test]
    fn event_names_round_trip() {
        let all = [
            EventId::Tick,
            EventId::Control,
            EventId::Stop,
            EventId::Destroy,
            EventId::ModelUpdate,
            EventId::GameInit,
            EventId::GameStart,
            EventId::GameRestart,
            EventId::GameEnd,
            EventId::NextLevel,
            EventId::PinkGhostOut,
            EventId::BlueGhostOut,
            EventId::OrangeGhostOut,
            EventId::GhostBehindDoor,
            EventId::GhostOnDeadTarget,
            EventId::SwitchTimeout,
            EventId::ModeChange,
            EventId::Intersection,
            EventId::Pickup,
            EventId::Crossway,
            EventId::FrightenedTimeout,
            EventId::EnergizerTimeout,
            EventId::Redraw,
        ];
        for id in all {
            assert_eq!(EventId::from_name(id.name()), Some(id));
        }
        assert_eq!(EventId::from_name("NOT_AN_EVENT"), None);
    }
}
