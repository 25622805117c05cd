//! The field: the maze collaborator that owns the actors.
//!
//! Actors live in a slotmap arena owned by the field and are addressed
//! by tag everywhere else; behavior closures hold `Weak<Field>` and never
//! extend the field's lifetime. Each tick, [`Field::update`] integrates
//! motion for every actor in spawn order, then computes and emits the
//! per-tick notifications -- crossways, pickups, intersections, and the
//! door/respawn proximity events -- for the state drivers to consume.
//! Every notification is computed first and fired after the internal
//! borrows are released, so handlers are free to re-enter the arena.

use std::cell::{Ref, RefCell, RefMut};
use std::collections::HashMap;
use std::rc::Rc;

use slotmap::SlotMap;

use chomp_core::event::{EventArgs, EventBus, EventId, Payload, Sender};
use chomp_core::fixed::Fixed64;
use chomp_core::geometry::Vec2;
use chomp_core::id::{ActorId, ActorTag};
use chomp_core::rng::SimRng;

use crate::actor::{self, node_eps_sq, Actor, PlayerMode};
use crate::ghost::{self, GhostMode};
use crate::grid::{Content, Grid};
use crate::pen::PenGraph;

/// The maze plus the actors on it.
pub struct Field {
    bus: Rc<EventBus>,
    grid: RefCell<Grid>,
    pen: PenGraph,
    rng: RefCell<SimRng>,
    actors: RefCell<SlotMap<ActorId, Actor>>,
    lookup: RefCell<HashMap<ActorTag, ActorId>>,
    /// Spawn order; iteration follows it so runs are deterministic.
    order: RefCell<Vec<ActorId>>,
}

impl Field {
    pub fn new(bus: Rc<EventBus>, grid: Grid, seed: u64) -> Rc<Self> {
        let pen = PenGraph::new(grid.anchors().pen);
        Rc::new(Self {
            bus,
            grid: RefCell::new(grid),
            pen,
            rng: RefCell::new(SimRng::new(seed)),
            actors: RefCell::new(SlotMap::with_key()),
            lookup: RefCell::new(HashMap::new()),
            order: RefCell::new(Vec::new()),
        })
    }

    pub fn bus(&self) -> &Rc<EventBus> {
        &self.bus
    }

    pub fn grid(&self) -> Ref<'_, Grid> {
        self.grid.borrow()
    }

    pub fn grid_mut(&self) -> RefMut<'_, Grid> {
        self.grid.borrow_mut()
    }

    pub fn pen(&self) -> &PenGraph {
        &self.pen
    }

    /// The door point dead ghosts walk back to.
    pub fn door_target(&self) -> Vec2 {
        self.pen.door()
    }

    /// A fresh uniformly random point in the maze bounds (inclusive),
    /// drawn from the field's seeded RNG.
    pub(crate) fn random_point(&self) -> Vec2 {
        let size = self.grid.borrow().size();
        let mut rng = self.rng.borrow_mut();
        let x = rng.next_below(size.width as u32 + 1);
        let y = rng.next_below(size.height as u32 + 1);
        Vec2::new(Fixed64::from_num(x), Fixed64::from_num(y))
    }

    // -----------------------------------------------------------------------
    // Actor access
    // -----------------------------------------------------------------------

    /// Run `f` against the actor with this tag, if present.
    pub fn with_actor<R>(&self, tag: ActorTag, f: impl FnOnce(&Actor) -> R) -> Option<R> {
        let id = *self.lookup.borrow().get(&tag)?;
        let actors = self.actors.borrow();
        actors.get(id).map(f)
    }

    /// Run `f` against the actor with this tag, mutably, if present.
    pub fn with_actor_mut<R>(&self, tag: ActorTag, f: impl FnOnce(&mut Actor) -> R) -> Option<R> {
        let id = *self.lookup.borrow().get(&tag)?;
        let mut actors = self.actors.borrow_mut();
        actors.get_mut(id).map(f)
    }

    pub fn actor_count(&self) -> usize {
        self.order.borrow().len()
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Spawn the player. An existing player is destroyed first.
    pub fn spawn_player(
        self: &Rc<Self>,
        position: Vec2,
        direction: chomp_core::geometry::Direction,
        mode: PlayerMode,
    ) {
        self.despawn(ActorTag::Player);
        let actor = actor::build_player(self, position, direction, mode);
        self.insert(ActorTag::Player, actor);
    }

    /// Spawn a ghost. An existing actor with the same tag is destroyed
    /// first.
    pub fn spawn_ghost(
        self: &Rc<Self>,
        tag: ActorTag,
        position: Vec2,
        direction: chomp_core::geometry::Direction,
        mode: GhostMode,
    ) {
        self.despawn(tag);
        let actor = ghost::build_ghost(self, tag, position, direction, mode);
        self.insert(tag, actor);
    }

    fn insert(&self, tag: ActorTag, actor: Actor) {
        let id = self.actors.borrow_mut().insert(actor);
        self.lookup.borrow_mut().insert(tag, id);
        self.order.borrow_mut().push(id);
    }

    fn despawn(&self, tag: ActorTag) {
        let Some(id) = self.lookup.borrow_mut().remove(&tag) else {
            return;
        };
        self.order.borrow_mut().retain(|&other| other != id);
        if let Some(mut actor) = self.actors.borrow_mut().remove(id) {
            actor.destroy(&self.bus);
        }
    }

    /// Destroy every actor: unsubscribe their handlers and dispose their
    /// state drivers. Used on level end, restart, and game over.
    pub fn destroy_actors(&self) {
        let ids: Vec<ActorId> = self.order.borrow_mut().drain(..).collect();
        self.lookup.borrow_mut().clear();
        let mut actors = self.actors.borrow_mut();
        for id in ids {
            if let Some(mut actor) = actors.remove(id) {
                actor.destroy(&self.bus);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Per-tick update
    // -----------------------------------------------------------------------

    /// Advance every actor and emit this tick's notifications.
    pub fn update(&self) {
        {
            let order = self.order.borrow().clone();
            let mut actors = self.actors.borrow_mut();
            let grid = self.grid.borrow();
            for id in order {
                let Some(actor) = actors.get_mut(id) else {
                    continue;
                };
                ghost::pen_step(&self.pen, actor);
                actor::integrate(&grid, actor);
            }
        }
        self.notify_crossways();
        self.notify_pickups();
        self.notify_intersections();
        self.notify_ghost_events();
    }

    /// Level-triggered: fires every tick an actor sits centered on a
    /// non-corridor cell. Downstream handlers deduplicate per visited
    /// cell with their last-turn markers.
    fn notify_crossways(&self) {
        let hits: Vec<ActorTag> = {
            let order = self.order.borrow();
            let actors = self.actors.borrow();
            let grid = self.grid.borrow();
            order
                .iter()
                .filter_map(|&id| actors.get(id))
                .filter(|actor| {
                    let cell = actor.cell();
                    !grid[cell].connections.is_straight_corridor()
                        && actor.position.distance_sq(cell.center()) < node_eps_sq()
                })
                .map(|actor| actor.tag)
                .collect()
        };
        for tag in hits {
            self.bus.fire(
                EventId::Crossway,
                EventArgs::new(Sender::Field, Payload::Crossway { actor: tag }),
            );
        }
    }

    /// Consume whatever the player's cell holds and announce it. Doors
    /// and walls are not consumable and stay put.
    fn notify_pickups(&self) {
        let found = {
            let actors = self.actors.borrow();
            let grid = self.grid.borrow();
            self.lookup
                .borrow()
                .get(&ActorTag::Player)
                .and_then(|&id| actors.get(id))
                .and_then(|player| {
                    let cell = player.cell();
                    grid[cell].content.as_pickup().map(|pickup| (cell, pickup))
                })
        };
        let Some((cell, pickup)) = found else {
            return;
        };
        self.grid.borrow_mut().set_content(cell, Content::Empty);
        self.bus.fire(
            EventId::Pickup,
            EventArgs::new(Sender::Field, Payload::Pickup { pickup }),
        );
    }

    /// One INTERSECTION per ghost sharing the player's cell this tick.
    fn notify_intersections(&self) {
        let hits: Vec<ActorTag> = {
            let order = self.order.borrow();
            let actors = self.actors.borrow();
            let lookup = self.lookup.borrow();
            let Some(player_cell) = lookup
                .get(&ActorTag::Player)
                .and_then(|&id| actors.get(id))
                .map(|player| player.cell())
            else {
                return;
            };
            order
                .iter()
                .filter_map(|&id| actors.get(id))
                .filter(|actor| actor.tag.is_ghost() && actor.cell() == player_cell)
                .map(|actor| actor.tag)
                .collect()
        };
        for tag in hits {
            self.bus.fire(
                EventId::Intersection,
                EventArgs::new(Sender::Field, Payload::Intersection { ghost: tag }),
            );
        }
    }

    /// Proximity events at the door point, which doubles as the dead
    /// ghosts' respawn target.
    fn notify_ghost_events(&self) {
        let door = self.pen.door();
        let hits: Vec<ActorTag> = {
            let order = self.order.borrow();
            let actors = self.actors.borrow();
            order
                .iter()
                .filter_map(|&id| actors.get(id))
                .filter(|actor| {
                    actor.tag.is_ghost() && actor.position.distance_sq(door) < node_eps_sq()
                })
                .map(|actor| actor.tag)
                .collect()
        };
        for tag in hits {
            self.bus.fire(
                EventId::GhostOnDeadTarget,
                EventArgs::new(Sender::Field, Payload::Ghost { name: tag }),
            );
            self.bus.fire(
                EventId::GhostBehindDoor,
                EventArgs::new(Sender::Field, Payload::Ghost { name: tag }),
            );
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
