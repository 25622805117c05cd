//! Chomp Core -- the synchronous reactive kernel for the maze-chase game.
//!
//! This crate provides the behavior engine every game build depends on:
//! the priority-ordered event bus, the edge-triggered condition graph,
//! the orthogonal per-actor state machines, the tick-relative scheduler,
//! and the deterministic math and RNG underneath them. No game rules live
//! here -- those sit in `chomp-sim`.
//!
//! # Tick dispatch
//!
//! An external driver fires [`event::EventId::Tick`] once per logical
//! frame. Everything else happens synchronously inside that call tree:
//!
//! 1. The [`scheduler::Scheduler`], subscribed at the lowest priority
//!    band, advances its clock and flushes every event due this tick.
//! 2. State drivers subscribed to domain events evaluate guards,
//!    transition, and emit MODE_CHANGE.
//! 3. Gameplay logic subscribed to TICK at a higher priority number runs
//!    with the clock already advanced.
//!
//! There is no thread parallelism and no deferral: handlers run to
//! completion in ascending (priority, registration) order, and a handler
//! may subscribe, unsubscribe, or fire further events mid-dispatch.
//!
//! # Key Types
//!
//! - [`event::EventBus`] -- synchronous publish/subscribe hub.
//! - [`condition::TriggerableCondition`] -- observable boolean predicates
//!   with edge-triggered notification and pulse semantics.
//! - [`fsm::StateDriver`] -- one axis of an actor's orthogonal state
//!   machines; the composite mode tuple keys speed tables.
//! - [`scheduler::Scheduler`] -- exact-tick FIFO delayed events with
//!   relative-delay persistence.
//! - [`fixed::Fixed64`] -- Q32.32 fixed-point type for deterministic math.
//! - [`rng::SimRng`] -- serializable SplitMix64 PRNG.

pub mod condition;
pub mod error;
pub mod event;
pub mod fixed;
pub mod fsm;
pub mod geometry;
pub mod id;
pub mod rng;
pub mod scheduler;
