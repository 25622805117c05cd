//! Chomp Sim -- the maze-chase game model built on the `chomp-core`
//! kernel.
//!
//! The field owns the maze grid and an arena of actors: one player and
//! four ghosts, each a bundle of orthogonal state drivers wired to the
//! shared event bus. The game driver layers session flow on top --
//! lives, levels, scoring, difficulty, and the scheduled choreography
//! (round starts, ghost releases, energizer timeouts) -- and exposes
//! save/load at its boundary.
//!
//! Rendering, audio, menus, asset loading, and real-time pacing are out
//! of scope: presentation code subscribes to MODEL_UPDATE and
//! MODE_CHANGE and drives TICK from outside (the [`driver::Ticker`]
//! does this for headless runs).
//!
//! # Key Types
//!
//! - [`grid::Grid`] -- the maze: per-cell content and open directions,
//!   toroidal at the edges.
//! - [`field::Field`] -- actor arena plus the per-tick notification
//!   pipeline (crossways, pickups, intersections, door events).
//! - [`actor::Actor`] -- position, heading, and per-kind state; the
//!   player's buffered-turn behavior lives in [`actor`], the ghosts'
//!   targeting and steering in [`ghost`].
//! - [`driver::GameDriver`] -- session flow and persistence.
//! - [`save::SaveData`] -- the string-keyed JSON save schema.

pub mod actor;
pub mod config;
pub mod driver;
pub mod field;
pub mod ghost;
pub mod grid;
pub mod pen;
pub mod save;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
