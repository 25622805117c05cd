//! Pursuer (ghost) behavior: three orthogonal axes, target selection,
//! and the deterministic crossway steering algorithm.
//!
//! Axes: alert {NONE, DEAD, FRIGHTENED, FRIGHTENED_END}, routine
//! {SCATTER, CHASE, FREE}, pen {NONE, HOME, EXIT}. Speed depends on the
//! alert axis only, looked up through the composite mode.
//!
//! Steering happens at crossways, once per visited cell: among the open
//! directions excluding the direct reverse of the heading, pick the one
//! whose destination cell center lies nearest the current target. The
//! candidates are enumerated in [`Direction::ALL`] order and ties keep
//! the first candidate, which makes every run replay-identical.

use std::collections::HashMap;
use std::rc::Rc;
use std::sync::LazyLock;

use chomp_core::error::FormatError;
use chomp_core::event::{EventId, Handler, Payload, Pickup};
use chomp_core::fixed::Fixed64;
use chomp_core::fsm::{AxisState, StateDriver};
use chomp_core::geometry::{CellPos, Direction, Vec2};
use chomp_core::id::ActorTag;

use crate::actor::{base_speed, Actor, Kind, Subscription};
use crate::field::Field;
use crate::grid::Grid;
use crate::pen::PenGraph;

// ---------------------------------------------------------------------------
// Axes
// ---------------------------------------------------------------------------

/// Ghost alert axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GhostAlert {
    None,
    Dead,
    Frightened,
    FrightenedEnd,
}

impl AxisState for GhostAlert {
    fn name(self) -> &'static str {
        match self {
            GhostAlert::None => "NONE",
            GhostAlert::Dead => "DEAD",
            GhostAlert::Frightened => "FRIGHTENED",
            GhostAlert::FrightenedEnd => "FRIGHTENED_END",
        }
    }
}

impl GhostAlert {
    pub fn from_name(name: &str) -> Result<Self, FormatError> {
        match name {
            "NONE" => Ok(GhostAlert::None),
            "DEAD" => Ok(GhostAlert::Dead),
            "FRIGHTENED" => Ok(GhostAlert::Frightened),
            "FRIGHTENED_END" => Ok(GhostAlert::FrightenedEnd),
            _ => Err(FormatError::UnknownName {
                field: "ghost alert mode",
                value: name.to_owned(),
            }),
        }
    }
}

/// Ghost routine axis, time-switched between scatter and chase. FREE is
/// the easy-difficulty mode with no switching and random wandering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GhostRoutine {
    Scatter,
    Chase,
    Free,
}

impl AxisState for GhostRoutine {
    fn name(self) -> &'static str {
        match self {
            GhostRoutine::Scatter => "SCATTER",
            GhostRoutine::Chase => "CHASE",
            GhostRoutine::Free => "FREE",
        }
    }
}

impl GhostRoutine {
    pub fn from_name(name: &str) -> Result<Self, FormatError> {
        match name {
            "SCATTER" => Ok(GhostRoutine::Scatter),
            "CHASE" => Ok(GhostRoutine::Chase),
            "FREE" => Ok(GhostRoutine::Free),
            _ => Err(FormatError::UnknownName {
                field: "ghost routine mode",
                value: name.to_owned(),
            }),
        }
    }
}

/// Ghost pen axis: spawn sequencing inside the holding pen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GhostPen {
    None,
    Home,
    Exit,
}

impl AxisState for GhostPen {
    fn name(self) -> &'static str {
        match self {
            GhostPen::None => "NONE",
            GhostPen::Home => "HOME",
            GhostPen::Exit => "EXIT",
        }
    }
}

impl GhostPen {
    pub fn from_name(name: &str) -> Result<Self, FormatError> {
        match name {
            "NONE" => Ok(GhostPen::None),
            "HOME" => Ok(GhostPen::Home),
            "EXIT" => Ok(GhostPen::Exit),
            _ => Err(FormatError::UnknownName {
                field: "ghost pen mode",
                value: name.to_owned(),
            }),
        }
    }
}

/// The ghost's composite mode.
pub type GhostMode = (GhostAlert, GhostRoutine, GhostPen);

static GHOST_SPEEDS: LazyLock<HashMap<GhostAlert, Fixed64>> = LazyLock::new(|| {
    HashMap::from([
        (GhostAlert::None, Fixed64::from_num(0.75)),
        (GhostAlert::Dead, Fixed64::from_num(1.0)),
        (GhostAlert::Frightened, Fixed64::from_num(0.75)),
        (GhostAlert::FrightenedEnd, Fixed64::from_num(0.75)),
    ])
});

/// Ghost speed for a composite mode; only the alert axis scales speed.
/// Panics on a missing table entry.
pub(crate) fn ghost_speed(mode: GhostMode) -> Fixed64 {
    let factor = GHOST_SPEEDS
        .get(&mode.0)
        .unwrap_or_else(|| panic!("no speed entry for ghost mode {mode:?}"));
    base_speed() * *factor
}

/// Ghost-specific state: the three axes plus steering markers.
pub struct GhostState {
    pub alert: StateDriver<GhostAlert>,
    pub routine: StateDriver<GhostRoutine>,
    pub pen: StateDriver<GhostPen>,
    /// The cell the last steering decision was made at; suppresses
    /// re-deciding every tick while centered on a crossway.
    pub last_turn: Option<CellPos>,
    /// The pen waypoint last acted on, so each node is handled once.
    pub last_node: Option<usize>,
}

// ---------------------------------------------------------------------------
// Targets
// ---------------------------------------------------------------------------

/// Fixed per-kind scatter anchor.
pub(crate) fn scatter_anchor(tag: ActorTag) -> Vec2 {
    match tag {
        ActorTag::RedGhost => Vec2::from_num(26.0, 0.0),
        ActorTag::PinkGhost => Vec2::from_num(1.0, 0.0),
        ActorTag::BlueGhost => Vec2::from_num(26.0, 30.0),
        ActorTag::OrangeGhost => Vec2::from_num(1.0, 30.0),
        ActorTag::Player => unreachable!("the player has no scatter anchor"),
    }
}

/// The release event that moves this ghost HOME -> EXIT, if any. The red
/// ghost starts outside the pen and has none.
fn release_event(tag: ActorTag) -> Option<EventId> {
    match tag {
        ActorTag::PinkGhost => Some(EventId::PinkGhostOut),
        ActorTag::BlueGhost => Some(EventId::BlueGhostOut),
        ActorTag::OrangeGhost => Some(EventId::OrangeGhostOut),
        _ => None,
    }
}

fn ahead_of(position: Vec2, direction: Direction, cells: i32) -> Vec2 {
    let (dx, dy) = direction.offset();
    position.shift(
        Fixed64::from_num(dx * cells),
        Fixed64::from_num(dy * cells),
    )
}

/// The kind-specific pursue target.
fn chase_target(field: &Field, tag: ActorTag, own_position: Vec2) -> Vec2 {
    let (player_position, player_direction) = field
        .with_actor(ActorTag::Player, |a| (a.position, a.direction))
        .unwrap_or_else(|| panic!("player actor missing during {} steering", tag.name()));
    match tag {
        // Straight at the player.
        ActorTag::RedGhost => player_position,
        // Four cells ahead of the player's heading.
        ActorTag::PinkGhost => ahead_of(player_position, player_direction, 4),
        // The red ghost's position reflected through the point two cells
        // ahead of the player.
        ActorTag::BlueGhost => {
            let pivot = ahead_of(player_position, player_direction, 2);
            let red = field
                .with_actor(ActorTag::RedGhost, |a| a.position)
                .unwrap_or_else(|| panic!("red ghost missing during blue ghost steering"));
            Vec2::new(pivot.x + pivot.x - red.x, pivot.y + pivot.y - red.y)
        }
        // The player while far away, its own corner when close.
        ActorTag::OrangeGhost => {
            if player_position.distance_sq(own_position) > Fixed64::from_num(64) {
                player_position
            } else {
                scatter_anchor(tag)
            }
        }
        ActorTag::Player => unreachable!("the player does not pursue"),
    }
}

/// The steering target for the current composite mode. Frightened ghosts
/// (and FREE-routine wanderers) roll a fresh random point per decision.
fn select_target(
    field: &Field,
    tag: ActorTag,
    alert: GhostAlert,
    routine: GhostRoutine,
    own_position: Vec2,
) -> Vec2 {
    match alert {
        GhostAlert::None => match routine {
            GhostRoutine::Scatter => scatter_anchor(tag),
            GhostRoutine::Chase => chase_target(field, tag, own_position),
            GhostRoutine::Free => field.random_point(),
        },
        GhostAlert::Dead => field.door_target(),
        GhostAlert::Frightened | GhostAlert::FrightenedEnd => field.random_point(),
    }
}

// ---------------------------------------------------------------------------
// Steering
// ---------------------------------------------------------------------------

/// Pick the open, non-reverse direction whose destination cell center is
/// nearest the target. Candidates are enumerated in [`Direction::ALL`]
/// order; the strict comparison keeps the first candidate on exact ties.
///
/// Panics when no candidate exists: a dead end should not be reachable in
/// a connected maze, so hitting one is a logic error worth failing loudly
/// on.
pub(crate) fn choose_direction(
    grid: &Grid,
    cell: CellPos,
    heading: Direction,
    target: Vec2,
) -> Direction {
    let connections = grid[cell].connections;
    let mut best: Option<(Direction, Fixed64)> = None;
    for direction in Direction::ALL {
        if !connections.open(direction) || heading.is_opposite(direction) {
            continue;
        }
        let (dx, dy) = direction.offset();
        let destination = cell.shift(dx, dy).wrapped(grid.size());
        let distance = destination.center().distance_sq(target);
        if best.map_or(true, |(_, d)| distance < d) {
            best = Some((direction, distance));
        }
    }
    match best {
        Some((direction, _)) => direction,
        None => panic!("steering dead end at cell {cell}: no open non-reverse direction"),
    }
}

/// Crossway steering for one ghost. Skipped while the pen axis governs
/// motion, and once per visited cell via the last-turn marker.
pub(crate) fn handle_crossway(field: &Field, tag: ActorTag) {
    let snapshot = field
        .with_actor(tag, |actor| {
            actor.ghost().map(|g| {
                (
                    actor.position,
                    actor.direction,
                    actor.cell(),
                    g.alert.current(),
                    g.routine.current(),
                    g.pen.current(),
                    g.last_turn,
                )
            })
        })
        .flatten();
    let Some((position, direction, cell, alert, routine, pen_mode, last_turn)) = snapshot else {
        return;
    };
    if pen_mode != GhostPen::None {
        return;
    }
    if last_turn == Some(cell) {
        return;
    }
    let target = select_target(field, tag, alert, routine, position);
    let chosen = {
        let grid = field.grid();
        choose_direction(&grid, cell, direction, target)
    };
    let _ = field.with_actor_mut(tag, |actor| {
        if let Kind::Ghost(g) = &mut actor.kind {
            g.last_turn = Some(cell);
        }
        actor.direction = chosen;
    });
}

// ---------------------------------------------------------------------------
// Pen choreography
// ---------------------------------------------------------------------------

/// Pen-governed motion, applied before grid integration each tick.
/// HOME ghosts bob between the pen's top and bottom waypoint rows; EXIT
/// ghosts snap onto each newly reached waypoint and follow its canonical
/// exit direction toward the door.
pub(crate) fn pen_step(pen: &PenGraph, actor: &mut Actor) {
    let position = actor.position;
    let mut new_direction = None;
    let mut new_position = None;
    {
        let Kind::Ghost(state) = &mut actor.kind else {
            return;
        };
        match state.pen.current() {
            GhostPen::Home => {
                if let Some(node) = pen.node_at(position) {
                    if state.last_node != Some(node) {
                        if let Some(direction) = PenGraph::bob_direction(node) {
                            new_direction = Some(direction);
                            state.last_node = Some(node);
                        }
                    }
                }
            }
            GhostPen::Exit => {
                if let Some(node) = pen.node_at(position) {
                    if state.last_node != Some(node) {
                        new_direction = Some(pen.exit(node));
                        new_position = Some(pen.node(node));
                        state.last_node = Some(node);
                    }
                }
            }
            GhostPen::None => {}
        }
    }
    if let Some(direction) = new_direction {
        actor.direction = direction;
    }
    if let Some(position) = new_position {
        actor.position = position;
    }
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

/// Build a ghost actor and wire its behavior to the bus. The steering
/// handler is registered before the state-driver transitions; the door
/// handler runs at priority -1 so the exiting ghost turns West before its
/// pen axis leaves EXIT.
pub(crate) fn build_ghost(
    field: &Rc<Field>,
    tag: ActorTag,
    position: Vec2,
    direction: Direction,
    mode: GhostMode,
) -> Actor {
    debug_assert!(tag.is_ghost());
    let bus = field.bus();
    let mut subscriptions = Vec::new();

    let crossway: Handler = {
        let field = Rc::downgrade(field);
        Rc::new(move |args| {
            let Payload::Crossway { actor } = args.payload else {
                return;
            };
            if actor != tag {
                return;
            }
            if let Some(field) = field.upgrade() {
                handle_crossway(&field, tag);
            }
        })
    };
    bus.subscribe(EventId::Crossway, Rc::clone(&crossway), 0);
    subscriptions.push(Subscription {
        event_id: EventId::Crossway,
        priority: 0,
        handler: crossway,
    });

    let alert = StateDriver::new(bus, mode.0, tag);
    alert.add_transition(
        EventId::Intersection,
        &[GhostAlert::Frightened, GhostAlert::FrightenedEnd],
        GhostAlert::Dead,
        Some(Rc::new(move |args| {
            matches!(args.payload, Payload::Intersection { ghost } if ghost == tag)
        })),
    );
    alert.add_transition(
        EventId::Pickup,
        &[GhostAlert::None],
        GhostAlert::Frightened,
        Some(Rc::new(|args| {
            matches!(
                args.payload,
                Payload::Pickup {
                    pickup: Pickup::Energizer
                }
            )
        })),
    );
    alert.add_transition(
        EventId::FrightenedTimeout,
        &[GhostAlert::Frightened],
        GhostAlert::FrightenedEnd,
        None,
    );
    alert.add_transition(
        EventId::EnergizerTimeout,
        &[GhostAlert::FrightenedEnd],
        GhostAlert::None,
        None,
    );
    alert.add_transition(
        EventId::GhostBehindDoor,
        &[GhostAlert::Dead],
        GhostAlert::None,
        Some(Rc::new(move |args| {
            matches!(args.payload, Payload::Ghost { name } if name == tag)
        })),
    );

    let routine = StateDriver::new(bus, mode.1, tag);
    routine.add_toggle(EventId::SwitchTimeout, GhostRoutine::Scatter, GhostRoutine::Chase);

    let pen = StateDriver::new(bus, mode.2, tag);
    if let Some(event_id) = release_event(tag) {
        pen.add_transition(event_id, &[GhostPen::Home], GhostPen::Exit, None);
    }
    pen.add_transition(
        EventId::GhostBehindDoor,
        &[GhostPen::Exit],
        GhostPen::None,
        Some(Rc::new(move |args| {
            matches!(args.payload, Payload::Ghost { name } if name == tag)
        })),
    );

    let door: Handler = {
        let field = Rc::downgrade(field);
        Rc::new(move |args| {
            let Payload::Ghost { name } = args.payload else {
                return;
            };
            if name != tag {
                return;
            }
            let Some(field) = field.upgrade() else {
                return;
            };
            let _ = field.with_actor_mut(tag, |actor| {
                let exiting =
                    matches!(&actor.kind, Kind::Ghost(g) if g.pen.current() == GhostPen::Exit);
                if exiting {
                    actor.direction = Direction::West;
                }
            });
        })
    };
    bus.subscribe(EventId::GhostBehindDoor, Rc::clone(&door), -1);
    subscriptions.push(Subscription {
        event_id: EventId::GhostBehindDoor,
        priority: -1,
        handler: door,
    });

    Actor {
        tag,
        position,
        direction,
        kind: Kind::Ghost(GhostState {
            alert,
            routine,
            pen,
            last_turn: None,
            last_node: None,
        }),
        subscriptions,
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{fixed, grid_from_ascii};

    #[test]
    fn axis_names_round_trip() {
        for alert in [
            GhostAlert::None,
            GhostAlert::Dead,
            GhostAlert::Frightened,
            GhostAlert::FrightenedEnd,
        ] {
            assert_eq!(GhostAlert::from_name(alert.name()).unwrap(), alert);
        }
        for routine in [GhostRoutine::Scatter, GhostRoutine::Chase, GhostRoutine::Free] {
            assert_eq!(GhostRoutine::from_name(routine.name()).unwrap(), routine);
        }
        for pen in [GhostPen::None, GhostPen::Home, GhostPen::Exit] {
            assert_eq!(GhostPen::from_name(pen.name()).unwrap(), pen);
        }
        assert!(GhostAlert::from_name("SCARED").is_err());
    }

    #[test]
    fn dead_ghosts_travel_at_full_speed() {
        let mode = |alert| (alert, GhostRoutine::Scatter, GhostPen::None);
        assert_eq!(ghost_speed(mode(GhostAlert::Dead)), fixed(0.1));
        assert_eq!(ghost_speed(mode(GhostAlert::None)), fixed(0.1) * fixed(0.75));
        assert_eq!(
            ghost_speed(mode(GhostAlert::Frightened)),
            fixed(0.1) * fixed(0.75)
        );
    }

    // -----------------------------------------------------------------------
    // choose_direction
    // -----------------------------------------------------------------------

    #[test]
    fn steering_picks_the_nearest_destination() {
        let grid = grid_from_ascii(&[
            "#.#", //
            "...", //
            "#.#",
        ]);
        // 4-way cell (1,1); target sits below; heading East so West is
        // the excluded reverse.
        let chosen = choose_direction(
            &grid,
            CellPos::new(1, 1),
            Direction::East,
            Vec2::from_num(1.5, 5.0),
        );
        assert_eq!(chosen, Direction::South);
    }

    #[test]
    fn steering_excludes_the_reverse_heading() {
        let grid = grid_from_ascii(&[
            "#.#", //
            "...", //
            "#.#",
        ]);
        // Target behind the ghost: the reverse would be nearest, but it
        // is excluded, so the runner-up wins.
        let chosen = choose_direction(
            &grid,
            CellPos::new(1, 1),
            Direction::East,
            Vec2::from_num(-3.0, 1.5),
        );
        assert_ne!(chosen, Direction::West);
    }

    #[test]
    fn equidistant_candidates_resolve_by_enumeration_order() {
        let grid = grid_from_ascii(&[
            "#.#", //
            "...", //
            "#.#",
        ]);
        // Target at the cell's own center: all destinations equidistant.
        // Heading North excludes South; of {East, North, West} the first
        // in canonical order wins.
        for _ in 0..3 {
            let chosen = choose_direction(
                &grid,
                CellPos::new(1, 1),
                Direction::North,
                Vec2::from_num(1.5, 1.5),
            );
            assert_eq!(chosen, Direction::East);
        }
    }

    #[test]
    #[should_panic(expected = "steering dead end")]
    fn dead_end_is_a_reported_logic_error() {
        let grid = grid_from_ascii(&[
            "###", //
            "#..", //
            "###",
        ]);
        // Cell (1,1) opens only East; heading West makes East the
        // excluded reverse: no candidate survives.
        choose_direction(
            &grid,
            CellPos::new(1, 1),
            Direction::West,
            Vec2::from_num(0.0, 0.0),
        );
    }

    #[test]
    fn steering_measures_distance_through_the_wrap_seam() {
        let grid = grid_from_ascii(&[
            "#.#", //
            "...", //
            "#.#",
        ]);
        // Heading North from (1,1); North's destination wraps to (1,2).
        let chosen = choose_direction(
            &grid,
            CellPos::new(1, 0),
            Direction::North,
            Vec2::from_num(1.5, 2.5),
        );
        assert_eq!(chosen, Direction::North);
    }

    #[test]
    fn pink_target_leads_the_player() {
        assert_eq!(
            ahead_of(Vec2::from_num(5.0, 5.0), Direction::North, 4),
            Vec2::from_num(5.0, 1.0)
        );
        assert_eq!(
            ahead_of(Vec2::from_num(5.0, 5.0), Direction::East, 2),
            Vec2::from_num(7.0, 5.0)
        );
    }
}
