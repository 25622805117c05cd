//! Tick-indexed delayed-event queue built on top of the bus.
//!
//! The scheduler owns the only clock in the kernel: a monotonically
//! nondecreasing tick counter advanced by observing TICK events. It
//! subscribes at the lowest priority band ([`Scheduler::TICK_PRIORITY`])
//! so the clock is already advanced -- and every due event already fired
//! -- before gameplay logic subscribed to the same TICK runs.
//!
//! Pending events persist as a mapping of *relative* delay to event wire
//! names, so a save taken at tick 900 restores correctly into a session
//! whose clock reads anything else.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};
use std::rc::{Rc, Weak};

use crate::error::FormatError;
use crate::event::{EventArgs, EventBus, EventId, Handler, Payload, Sender};
use crate::fixed::Ticks;

/// Tick-relative event scheduler.
pub struct Scheduler {
    bus: Weak<EventBus>,
    current_time: Cell<Ticks>,
    planned: RefCell<BTreeMap<Ticks, VecDeque<EventId>>>,
}

impl Scheduler {
    /// The TICK priority band the scheduler occupies. Gameplay logic that
    /// depends on freshly flushed scheduled events must subscribe TICK at
    /// a higher number.
    pub const TICK_PRIORITY: i32 = 0;

    pub fn new(bus: &Rc<EventBus>) -> Rc<Self> {
        let scheduler = Rc::new(Self {
            bus: Rc::downgrade(bus),
            current_time: Cell::new(0),
            planned: RefCell::new(BTreeMap::new()),
        });
        let weak = Rc::downgrade(&scheduler);
        let handler: Handler = Rc::new(move |args| {
            if let Some(scheduler) = weak.upgrade() {
                scheduler.on_tick(args);
            }
        });
        bus.subscribe(EventId::Tick, handler, Self::TICK_PRIORITY);
        scheduler
    }

    /// The clock value observed on the most recent TICK.
    pub fn current_time(&self) -> Ticks {
        self.current_time.get()
    }

    /// Enqueue `event_id` to fire exactly `delay` ticks from now.
    pub fn schedule(&self, delay: Ticks, event_id: EventId) {
        let at = self.current_time.get() + delay;
        self.planned
            .borrow_mut()
            .entry(at)
            .or_default()
            .push_back(event_id);
    }

    /// Total number of pending events.
    pub fn pending(&self) -> usize {
        self.planned.borrow().values().map(|q| q.len()).sum()
    }

    fn on_tick(&self, args: &EventArgs) {
        let Payload::Tick { time } = args.payload else {
            return;
        };
        self.current_time.set(time);
        let Some(bus) = self.bus.upgrade() else {
            return;
        };
        // Drain everything due exactly now, FIFO. The queue is re-read
        // each round: a handler scheduling with delay 0 lands in this same
        // slot and still fires before control returns.
        loop {
            let next = {
                let mut planned = self.planned.borrow_mut();
                planned.get_mut(&time).and_then(|queue| queue.pop_front())
            };
            let Some(event_id) = next else {
                break;
            };
            bus.fire(event_id, EventArgs::empty(Sender::Scheduler));
        }
        let mut planned = self.planned.borrow_mut();
        if planned.get(&time).is_some_and(|queue| queue.is_empty()) {
            planned.remove(&time);
        }
    }

    /// Discard all pending events. Used on game restart.
    pub fn reset(&self) {
        self.planned.borrow_mut().clear();
    }

    /// Serialize pending events as relative-delay -> event names.
    pub fn store(&self) -> BTreeMap<String, Vec<String>> {
        let now = self.current_time.get();
        let mut out = BTreeMap::new();
        for (&at, queue) in self.planned.borrow().iter() {
            if queue.is_empty() {
                continue;
            }
            let names: Vec<String> = queue.iter().map(|e| e.name().to_owned()).collect();
            out.insert(at.saturating_sub(now).to_string(), names);
        }
        out
    }

    /// Reconstruct pending events from relative delays against the
    /// current clock. All-or-nothing: a malformed delay or unknown event
    /// name fails with a [`FormatError`] and leaves the queue untouched.
    pub fn load(&self, data: &BTreeMap<String, Vec<String>>) -> Result<(), FormatError> {
        let now = self.current_time.get();
        let mut restored: BTreeMap<Ticks, VecDeque<EventId>> = BTreeMap::new();
        for (delay, names) in data {
            let delay: Ticks = delay
                .trim()
                .parse()
                .map_err(|_| FormatError::InvalidDelay(delay.clone()))?;
            for name in names {
                let event_id = EventId::from_name(name)
                    .ok_or_else(|| FormatError::UnknownEvent(name.clone()))?;
                restored.entry(now + delay).or_default().push_back(event_id);
            }
        }
        let mut planned = self.planned.borrow_mut();
        for (at, mut queue) in restored {
            planned.entry(at).or_default().append(&mut queue);
        }
        Ok(())
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn tick(bus: &EventBus, time: Ticks) {
        bus.fire(
            EventId::Tick,
            EventArgs::new(Sender::External, Payload::Tick { time }),
        );
    }

    fn count_fires(bus: &Rc<EventBus>, event_id: EventId) -> Rc<RefCell<Vec<Ticks>>> {
        // Records the clock value at each delivery by reading it off a
        // shared cell updated per tick below.
        let fired = Rc::new(RefCell::new(Vec::new()));
        let now = Rc::new(Cell::new(0u64));
        let now_writer = Rc::clone(&now);
        bus.subscribe(
            EventId::Tick,
            Rc::new(move |args| {
                if let Payload::Tick { time } = args.payload {
                    now_writer.set(time);
                }
            }),
            -1,
        );
        let fired_inner = Rc::clone(&fired);
        bus.subscribe(
            event_id,
            Rc::new(move |_| fired_inner.borrow_mut().push(now.get())),
            0,
        );
        fired
    }

    // -----------------------------------------------------------------------
    // Exact-tick delivery
    // -----------------------------------------------------------------------

    #[test]
    fn fires_exactly_once_at_the_scheduled_tick() {
        let bus = Rc::new(EventBus::new());
        let scheduler = Scheduler::new(&bus);
        let fired = count_fires(&bus, EventId::GameStart);

        // Reach tick 10, then schedule with delay 5.
        for t in 0..=10 {
            tick(&bus, t);
        }
        scheduler.schedule(5, EventId::GameStart);

        for t in 11..=20 {
            tick(&bus, t);
        }
        // Exactly once, at 15 -- not 14, not 16.
        assert_eq!(*fired.borrow(), vec![15]);
    }

    #[test]
    fn same_tick_events_fire_in_fifo_order() {
        let bus = Rc::new(EventBus::new());
        let scheduler = Scheduler::new(&bus);

        let log = Rc::new(RefCell::new(Vec::new()));
        for event_id in [EventId::GameStart, EventId::GameEnd] {
            let log_inner = Rc::clone(&log);
            bus.subscribe(
                event_id,
                Rc::new(move |_| log_inner.borrow_mut().push(event_id)),
                0,
            );
        }

        scheduler.schedule(1, EventId::GameStart);
        scheduler.schedule(1, EventId::GameEnd);
        scheduler.schedule(2, EventId::GameStart);
        tick(&bus, 1);
        tick(&bus, 2);

        assert_eq!(
            *log.borrow(),
            vec![EventId::GameStart, EventId::GameEnd, EventId::GameStart]
        );
    }

    #[test]
    fn all_events_for_a_tick_fire_before_the_next_tick() {
        let bus = Rc::new(EventBus::new());
        let scheduler = Scheduler::new(&bus);
        let fired = count_fires(&bus, EventId::SwitchTimeout);

        scheduler.schedule(3, EventId::SwitchTimeout);
        scheduler.schedule(3, EventId::SwitchTimeout);
        for t in 0..6 {
            tick(&bus, t);
        }
        assert_eq!(*fired.borrow(), vec![3, 3]);
    }

    #[test]
    fn delay_zero_scheduled_during_the_drain_fires_within_the_same_tick() {
        let bus = Rc::new(EventBus::new());
        let scheduler = Scheduler::new(&bus);

        let fired = count_fires(&bus, EventId::GameEnd);
        let scheduler_inner = Rc::clone(&scheduler);
        bus.subscribe(
            EventId::GameStart,
            Rc::new(move |_| scheduler_inner.schedule(0, EventId::GameEnd)),
            0,
        );

        scheduler.schedule(2, EventId::GameStart);
        for t in 0..4 {
            tick(&bus, t);
        }
        assert_eq!(*fired.borrow(), vec![2]);
    }

    #[test]
    fn reset_discards_pending_events() {
        let bus = Rc::new(EventBus::new());
        let scheduler = Scheduler::new(&bus);
        let fired = count_fires(&bus, EventId::GameStart);

        scheduler.schedule(2, EventId::GameStart);
        assert_eq!(scheduler.pending(), 1);
        scheduler.reset();
        assert_eq!(scheduler.pending(), 0);

        for t in 0..5 {
            tick(&bus, t);
        }
        assert!(fired.borrow().is_empty());
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    #[test]
    fn store_produces_relative_delays() {
        let bus = Rc::new(EventBus::new());
        let scheduler = Scheduler::new(&bus);

        for t in 0..=100 {
            tick(&bus, t);
        }
        scheduler.schedule(600, EventId::FrightenedTimeout);
        scheduler.schedule(800, EventId::EnergizerTimeout);
        scheduler.schedule(800, EventId::SwitchTimeout);

        let stored = scheduler.store();
        assert_eq!(stored["600"], vec!["FRIGHTENED_TIMEOUT".to_owned()]);
        assert_eq!(
            stored["800"],
            vec!["ENERGIZER_TIMEOUT".to_owned(), "SWITCH_TIMEOUT".to_owned()]
        );
    }

    #[test]
    fn load_rebases_onto_the_current_clock() {
        let bus = Rc::new(EventBus::new());
        let scheduler = Scheduler::new(&bus);
        let fired = count_fires(&bus, EventId::GameStart);

        // The save was taken at some unrelated absolute time; only the
        // relative delay matters.
        let mut data = BTreeMap::new();
        data.insert("4".to_owned(), vec!["GAME_START".to_owned()]);

        for t in 0..=7 {
            tick(&bus, t);
        }
        scheduler.load(&data).unwrap();
        for t in 8..=15 {
            tick(&bus, t);
        }
        assert_eq!(*fired.borrow(), vec![11]);
    }

    #[test]
    fn load_rejects_unknown_event_names_without_side_effects() {
        let bus = Rc::new(EventBus::new());
        let scheduler = Scheduler::new(&bus);

        let mut data = BTreeMap::new();
        data.insert(
            "3".to_owned(),
            vec!["GAME_START".to_owned(), "NOT_AN_EVENT".to_owned()],
        );
        let err = scheduler.load(&data).unwrap_err();
        assert!(matches!(err, FormatError::UnknownEvent(name) if name == "NOT_AN_EVENT"));
        // All-or-nothing: the well-formed entry was not enqueued either.
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn load_rejects_unparsable_delays() {
        let bus = Rc::new(EventBus::new());
        let scheduler = Scheduler::new(&bus);

        let mut data = BTreeMap::new();
        data.insert("soon".to_owned(), vec!["GAME_START".to_owned()]);
        let err = scheduler.load(&data).unwrap_err();
        assert!(matches!(err, FormatError::InvalidDelay(d) if d == "soon"));
    }

    proptest! {
        #[test]
        fn store_load_round_trips_regardless_of_absolute_time(
            delays in proptest::collection::vec(1u64..500, 1..8),
            skew in 0u64..1000,
        ) {
            let bus_a = Rc::new(EventBus::new());
            let scheduler_a = Scheduler::new(&bus_a);
            tick(&bus_a, 40);
            for (i, &delay) in delays.iter().enumerate() {
                let event = if i % 2 == 0 { EventId::GameStart } else { EventId::GameEnd };
                scheduler_a.schedule(delay, event);
            }
            let stored = scheduler_a.store();

            // Restore into a scheduler whose clock reads differently.
            let bus_b = Rc::new(EventBus::new());
            let scheduler_b = Scheduler::new(&bus_b);
            tick(&bus_b, 40 + skew);
            scheduler_b.load(&stored).unwrap();

            prop_assert_eq!(scheduler_b.store(), stored);
        }
    }
}
