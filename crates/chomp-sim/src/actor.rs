//! Actors: shared motion state plus the player's behavior.
//!
//! An actor is a continuous position, a facing direction, and a set of
//! orthogonal state drivers. The derived integer cell is the floor of the
//! position. Actors live in the field's arena; the behavior closures
//! wired here hold only a `Weak` field reference and the actor's tag, so
//! an actor never extends the field's lifetime and a stale handler simply
//! no-ops.
//!
//! The player runs two axes: life {NONE, DEAD, ENERGIZER} and motion
//! {WALKING, WAITING}. Speed is a table lookup keyed by the composite
//! (life, motion) tuple; a missing entry is a configuration error and
//! panics.

use std::collections::HashMap;
use std::rc::Rc;
use std::sync::LazyLock;

use chomp_core::error::FormatError;
use chomp_core::event::{EventBus, EventId, Handler, Input, Payload, Pickup};
use chomp_core::fixed::Fixed64;
use chomp_core::fsm::{AxisState, StateDriver};
use chomp_core::geometry::{CellPos, Direction, Vec2};
use chomp_core::id::ActorTag;

use crate::field::Field;
use crate::ghost::{self, GhostState};
use crate::grid::Grid;

// ---------------------------------------------------------------------------
// Tolerances
// ---------------------------------------------------------------------------

/// Squared crossway/waypoint arrival tolerance (0.15 grid units).
pub(crate) fn node_eps_sq() -> Fixed64 {
    Fixed64::from_num(0.15) * Fixed64::from_num(0.15)
}

/// Squared wall-stop tolerance (0.06 grid units). An actor centered this
/// close to a cell whose forward connection is closed does not move.
pub(crate) fn wall_eps_sq() -> Fixed64 {
    Fixed64::from_num(0.06) * Fixed64::from_num(0.06)
}

/// Base speed in cells per tick; per-mode factors scale it.
pub(crate) fn base_speed() -> Fixed64 {
    Fixed64::from_num(0.1)
}

// ---------------------------------------------------------------------------
// Player axes
// ---------------------------------------------------------------------------

/// Player life axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayerLife {
    None,
    Dead,
    Energizer,
}

impl AxisState for PlayerLife {
    fn name(self) -> &'static str {
        match self {
            PlayerLife::None => "NONE",
            PlayerLife::Dead => "DEAD",
            PlayerLife::Energizer => "ENERGIZER",
        }
    }
}

impl PlayerLife {
    pub fn from_name(name: &str) -> Result<Self, FormatError> {
        match name {
            "NONE" => Ok(PlayerLife::None),
            "DEAD" => Ok(PlayerLife::Dead),
            "ENERGIZER" => Ok(PlayerLife::Energizer),
            _ => Err(FormatError::UnknownName {
                field: "player life mode",
                value: name.to_owned(),
            }),
        }
    }
}

/// Player motion axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayerMotion {
    Walking,
    Waiting,
}

impl AxisState for PlayerMotion {
    fn name(self) -> &'static str {
        match self {
            PlayerMotion::Walking => "WALKING",
            PlayerMotion::Waiting => "WAITING",
        }
    }
}

impl PlayerMotion {
    pub fn from_name(name: &str) -> Result<Self, FormatError> {
        match name {
            "WALKING" => Ok(PlayerMotion::Walking),
            "WAITING" => Ok(PlayerMotion::Waiting),
            _ => Err(FormatError::UnknownName {
                field: "player motion mode",
                value: name.to_owned(),
            }),
        }
    }
}

/// The player's composite mode, the speed-table key.
pub type PlayerMode = (PlayerLife, PlayerMotion);

static PLAYER_SPEEDS: LazyLock<HashMap<PlayerMode, Fixed64>> = LazyLock::new(|| {
    HashMap::from([
        (
            (PlayerLife::None, PlayerMotion::Walking),
            Fixed64::from_num(0.8),
        ),
        ((PlayerLife::None, PlayerMotion::Waiting), Fixed64::ZERO),
        ((PlayerLife::Dead, PlayerMotion::Walking), Fixed64::ZERO),
        ((PlayerLife::Dead, PlayerMotion::Waiting), Fixed64::ZERO),
        (
            (PlayerLife::Energizer, PlayerMotion::Walking),
            Fixed64::from_num(0.9),
        ),
        ((PlayerLife::Energizer, PlayerMotion::Waiting), Fixed64::ZERO),
    ])
});

/// Player speed for a composite mode. Panics on a missing table entry --
/// that means the mode set and the table drifted apart.
pub(crate) fn player_speed(mode: PlayerMode) -> Fixed64 {
    let factor = PLAYER_SPEEDS
        .get(&mode)
        .unwrap_or_else(|| panic!("no speed entry for player mode {mode:?}"));
    base_speed() * *factor
}

/// Map a control input onto a heading. Non-movement inputs map to none.
pub(crate) fn input_direction(input: Input) -> Option<Direction> {
    match input {
        Input::Right => Some(Direction::East),
        Input::Up => Some(Direction::North),
        Input::Left => Some(Direction::West),
        Input::Down => Some(Direction::South),
        Input::Save => None,
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

/// Player-specific state: the two axes plus the turn buffer and the
/// "already decided at this cell" marker.
pub struct PlayerState {
    pub life: StateDriver<PlayerLife>,
    pub motion: StateDriver<PlayerMotion>,
    pub next_direction: Option<Direction>,
    pub last_turn: Option<CellPos>,
}

/// Kind-specific actor state.
pub enum Kind {
    Player(PlayerState),
    Ghost(GhostState),
}

/// A bus subscription owned by an actor, removed on destroy.
pub(crate) struct Subscription {
    pub event_id: EventId,
    pub priority: i32,
    pub handler: Handler,
}

/// One actor in the field's arena.
pub struct Actor {
    pub tag: ActorTag,
    pub position: Vec2,
    pub direction: Direction,
    pub kind: Kind,
    pub(crate) subscriptions: Vec<Subscription>,
}

impl Actor {
    /// The integer cell this actor currently occupies.
    pub fn cell(&self) -> CellPos {
        self.position.cell()
    }

    pub fn player(&self) -> Option<&PlayerState> {
        match &self.kind {
            Kind::Player(state) => Some(state),
            Kind::Ghost(_) => None,
        }
    }

    pub fn ghost(&self) -> Option<&GhostState> {
        match &self.kind {
            Kind::Ghost(state) => Some(state),
            Kind::Player(_) => None,
        }
    }

    /// The player's composite mode tuple.
    pub fn player_mode(&self) -> Option<PlayerMode> {
        self.player()
            .map(|p| (p.life.current(), p.motion.current()))
    }

    /// The ghost's composite mode tuple.
    pub fn ghost_mode(&self) -> Option<ghost::GhostMode> {
        self.ghost()
            .map(|g| (g.alert.current(), g.routine.current(), g.pen.current()))
    }

    /// Current speed in cells per tick, from the per-kind mode table.
    pub fn speed(&self) -> Fixed64 {
        match &self.kind {
            Kind::Player(p) => player_speed((p.life.current(), p.motion.current())),
            Kind::Ghost(g) => ghost::ghost_speed((
                g.alert.current(),
                g.routine.current(),
                g.pen.current(),
            )),
        }
    }

    /// Unsubscribe this actor's direct handlers and dispose its state
    /// drivers. The drivers' transition handlers stay on the bus as
    /// permanent no-ops.
    pub(crate) fn destroy(&mut self, bus: &EventBus) {
        for sub in self.subscriptions.drain(..) {
            bus.unsubscribe(sub.event_id, &sub.handler, sub.priority);
        }
        match &self.kind {
            Kind::Player(p) => {
                p.life.reset();
                p.motion.reset();
            }
            Kind::Ghost(g) => {
                g.alert.reset();
                g.routine.reset();
                g.pen.reset();
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Motion integration
// ---------------------------------------------------------------------------

/// One tick of motion: `position += speed * heading`, with wall-stop at
/// blocked cell centers and toroidal wrap at the maze bounds.
pub(crate) fn integrate(grid: &Grid, actor: &mut Actor) {
    let cell = actor.cell();
    if actor.position.distance_sq(cell.center()) < wall_eps_sq()
        && !grid[cell].connections.open(actor.direction)
    {
        return;
    }
    let speed = actor.speed();
    let (dx, dy) = actor.direction.offset();
    actor
        .position
        .translate(speed * Fixed64::from_num(dx), speed * Fixed64::from_num(dy));
    actor.position.wrap(grid.size());
}

// ---------------------------------------------------------------------------
// Player wiring
// ---------------------------------------------------------------------------

/// Build the player actor and wire its behavior to the bus. The turn-and-
/// snap handler is registered before the state-driver transitions so the
/// motion axis evaluates its blocked-ahead guard against the heading left
/// after a buffered turn has applied.
pub(crate) fn build_player(
    field: &Rc<Field>,
    position: Vec2,
    direction: Direction,
    mode: PlayerMode,
) -> Actor {
    let bus = field.bus();
    let tag = ActorTag::Player;
    let mut subscriptions = Vec::new();

    let crossway: Handler = {
        let field = Rc::downgrade(field);
        Rc::new(move |args| {
            let Payload::Crossway { actor } = args.payload else {
                return;
            };
            if actor != ActorTag::Player {
                return;
            }
            if let Some(field) = field.upgrade() {
                on_crossway(&field);
            }
        })
    };
    bus.subscribe(EventId::Crossway, Rc::clone(&crossway), 0);
    subscriptions.push(Subscription {
        event_id: EventId::Crossway,
        priority: 0,
        handler: crossway,
    });

    let life = StateDriver::new(bus, mode.0, tag);
    life.add_transition(
        EventId::Intersection,
        &[PlayerLife::None],
        PlayerLife::Dead,
        None,
    );
    life.add_transition(
        EventId::Pickup,
        &[PlayerLife::None],
        PlayerLife::Energizer,
        Some(Rc::new(|args| {
            matches!(
                args.payload,
                Payload::Pickup {
                    pickup: Pickup::Energizer
                }
            )
        })),
    );
    life.add_transition(
        EventId::EnergizerTimeout,
        &[PlayerLife::Energizer],
        PlayerLife::None,
        None,
    );

    let motion = StateDriver::new(bus, mode.1, tag);
    motion.add_transition(
        EventId::Crossway,
        &[PlayerMotion::Walking],
        PlayerMotion::Waiting,
        Some({
            let field = Rc::downgrade(field);
            Rc::new(move |args| {
                let Payload::Crossway { actor } = args.payload else {
                    return false;
                };
                if actor != ActorTag::Player {
                    return false;
                }
                let Some(field) = field.upgrade() else {
                    return false;
                };
                let grid = field.grid();
                field
                    .with_actor(ActorTag::Player, |a| {
                        !grid[a.cell()].connections.open(a.direction)
                    })
                    .unwrap_or(false)
            })
        }),
    );
    motion.add_transition(
        EventId::Control,
        &[PlayerMotion::Waiting],
        PlayerMotion::Walking,
        Some({
            let field = Rc::downgrade(field);
            Rc::new(move |args| {
                let Payload::Control { input } = args.payload else {
                    return false;
                };
                let Some(direction) = input_direction(input) else {
                    return false;
                };
                let Some(field) = field.upgrade() else {
                    return false;
                };
                let grid = field.grid();
                field
                    .with_actor(ActorTag::Player, |a| {
                        grid[a.cell()].connections.open(direction)
                    })
                    .unwrap_or(false)
            })
        }),
    );

    let control: Handler = {
        let field = Rc::downgrade(field);
        Rc::new(move |args| {
            let Payload::Control { input } = args.payload else {
                return;
            };
            let Some(direction) = input_direction(input) else {
                return;
            };
            if let Some(field) = field.upgrade() {
                on_control(&field, direction);
            }
        })
    };
    bus.subscribe(EventId::Control, Rc::clone(&control), 0);
    subscriptions.push(Subscription {
        event_id: EventId::Control,
        priority: 0,
        handler: control,
    });

    Actor {
        tag,
        position,
        direction,
        kind: Kind::Player(PlayerState {
            life,
            motion,
            next_direction: None,
            last_turn: None,
        }),
        subscriptions,
    }
}

/// Apply the buffered turn if the desired direction is open here.
fn try_turn(grid: &Grid, actor: &mut Actor) {
    let Some(next) = actor.player().and_then(|p| p.next_direction) else {
        return;
    };
    if grid[actor.cell()].connections.open(next) {
        actor.direction = next;
        if let Kind::Player(p) = &mut actor.kind {
            p.next_direction = None;
        }
    }
}

/// Crossway: apply the buffered turn and, on first arrival at this cell,
/// snap onto the cell center. The snap runs once per visited cell (the
/// crossway event itself is level-triggered every tick while centered).
fn on_crossway(field: &Field) {
    let grid = field.grid();
    let _ = field.with_actor_mut(ActorTag::Player, |actor| {
        try_turn(&grid, actor);
        let cell = actor.cell();
        let first_visit = matches!(&actor.kind, Kind::Player(p) if p.last_turn != Some(cell));
        if first_visit {
            actor.position = cell.center();
            if let Kind::Player(p) = &mut actor.kind {
                p.last_turn = Some(cell);
            }
        }
    });
}

/// Control input: buffer the desired direction; a direct reversal of the
/// current heading applies immediately.
fn on_control(field: &Field, direction: Direction) {
    let grid = field.grid();
    let _ = field.with_actor_mut(ActorTag::Player, |actor| {
        if let Kind::Player(p) = &mut actor.kind {
            p.next_direction = Some(direction);
        }
        if actor.direction.is_opposite(direction) {
            try_turn(&grid, actor);
        }
    });
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chomp_core::event::EventBus;
    use crate::test_utils::{fixed, grid_from_ascii};

    fn bare_player(bus: &Rc<EventBus>, position: Vec2, direction: Direction) -> Actor {
        Actor {
            tag: ActorTag::Player,
            position,
            direction,
            kind: Kind::Player(PlayerState {
                life: StateDriver::new(bus, PlayerLife::None, ActorTag::Player),
                motion: StateDriver::new(bus, PlayerMotion::Walking, ActorTag::Player),
                next_direction: None,
                last_turn: None,
            }),
            subscriptions: Vec::new(),
        }
    }

    #[test]
    fn axis_names_round_trip() {
        for life in [PlayerLife::None, PlayerLife::Dead, PlayerLife::Energizer] {
            assert_eq!(PlayerLife::from_name(life.name()).unwrap(), life);
        }
        for motion in [PlayerMotion::Walking, PlayerMotion::Waiting] {
            assert_eq!(PlayerMotion::from_name(motion.name()).unwrap(), motion);
        }
        assert!(PlayerLife::from_name("ALIVE").is_err());
    }

    #[test]
    fn speed_table_covers_every_mode() {
        assert_eq!(
            player_speed((PlayerLife::None, PlayerMotion::Walking)),
            fixed(0.1) * fixed(0.8)
        );
        assert_eq!(
            player_speed((PlayerLife::Energizer, PlayerMotion::Walking)),
            fixed(0.1) * fixed(0.9)
        );
        // Waiting and dead modes stand still.
        assert_eq!(
            player_speed((PlayerLife::None, PlayerMotion::Waiting)),
            Fixed64::ZERO
        );
        assert_eq!(
            player_speed((PlayerLife::Dead, PlayerMotion::Walking)),
            Fixed64::ZERO
        );
    }

    #[test]
    fn input_mapping() {
        assert_eq!(input_direction(Input::Right), Some(Direction::East));
        assert_eq!(input_direction(Input::Up), Some(Direction::North));
        assert_eq!(input_direction(Input::Left), Some(Direction::West));
        assert_eq!(input_direction(Input::Down), Some(Direction::South));
        assert_eq!(input_direction(Input::Save), None);
    }

    #[test]
    fn integration_moves_along_the_heading() {
        let bus = Rc::new(EventBus::new());
        let grid = grid_from_ascii(&[
            "#####", //
            "#...#", //
            "#####",
        ]);
        let mut actor = bare_player(&bus, Vec2::from_num(1.5, 1.5), Direction::East);
        integrate(&grid, &mut actor);
        // Walking speed is the base speed times the walking factor, in
        // exact fixed-point arithmetic.
        let step = fixed(0.1) * fixed(0.8);
        assert_eq!(actor.position, Vec2::from_num(1.5, 1.5).shift(step, fixed(0.0)));
    }

    #[test]
    fn integration_halts_at_a_blocked_cell_center() {
        let bus = Rc::new(EventBus::new());
        let grid = grid_from_ascii(&[
            "#####", //
            "#...#", //
            "#####",
        ]);
        // Centered on the leftmost open cell, heading into the wall.
        let mut actor = bare_player(&bus, Vec2::from_num(1.5, 1.5), Direction::West);
        integrate(&grid, &mut actor);
        assert_eq!(actor.position, Vec2::from_num(1.5, 1.5));

        // Off-center, the check does not apply and the actor may move
        // back toward the center.
        let mut actor = bare_player(&bus, Vec2::from_num(1.8, 1.5), Direction::West);
        integrate(&grid, &mut actor);
        assert!(actor.position.x < fixed(1.8));
    }

    #[test]
    fn integration_wraps_at_the_bounds() {
        let bus = Rc::new(EventBus::new());
        // Fully open 3x3 so the actor can cross the seam.
        let grid = grid_from_ascii(&[
            "...", //
            "...", //
            "...",
        ]);
        let mut actor = bare_player(&bus, Vec2::from_num(0.02, 1.5), Direction::West);
        integrate(&grid, &mut actor);
        assert!(actor.position.x > fixed(2.9));
    }
}
