//! The holding-pen waypoint graph.
//!
//! Ghosts confined to the pen do not navigate the grid: they follow a
//! fixed graph of waypoint nodes hung off the pen anchor. Each node has a
//! canonical exit direction; node arrival is detected by the same
//! proximity tolerance as crossway detection. Node 9 sits above the pen
//! and is the door -- it doubles as the respawn target dead ghosts walk
//! back to.

use chomp_core::fixed::Fixed64;
use chomp_core::geometry::{CellPos, Direction, Vec2};

use crate::actor::node_eps_sq;

/// Waypoint graph for the holding pen.
#[derive(Debug, Clone)]
pub struct PenGraph {
    nodes: [Vec2; PenGraph::NODE_COUNT],
    exits: [Direction; PenGraph::NODE_COUNT],
}

impl PenGraph {
    pub const NODE_COUNT: usize = 10;

    /// Index of the door node.
    pub const DOOR: usize = 9;

    pub fn new(pen_anchor: CellPos) -> Self {
        let anchor = Vec2::new(
            Fixed64::from_num(pen_anchor.x),
            Fixed64::from_num(pen_anchor.y),
        );
        let offsets: [(f64, f64); Self::NODE_COUNT] = [
            (2.0, 2.0),
            (2.0, 2.5),
            (2.0, 3.0),
            (4.0, 2.0),
            (4.0, 2.5),
            (4.0, 3.0),
            (6.0, 2.0),
            (6.0, 2.5),
            (6.0, 3.0),
            (4.0, -0.5),
        ];
        let nodes = offsets
            .map(|(dx, dy)| anchor.shift(Fixed64::from_num(dx), Fixed64::from_num(dy)));
        let exits = [
            Direction::South,
            Direction::East,
            Direction::North,
            Direction::North,
            Direction::North,
            Direction::North,
            Direction::South,
            Direction::West,
            Direction::North,
            Direction::West,
        ];
        Self { nodes, exits }
    }

    pub fn node(&self, index: usize) -> Vec2 {
        self.nodes[index]
    }

    pub fn exit(&self, index: usize) -> Direction {
        self.exits[index]
    }

    /// The door position, which is also the dead-ghost respawn target.
    pub fn door(&self) -> Vec2 {
        self.nodes[Self::DOOR]
    }

    /// The first node within the arrival tolerance of `position`.
    pub fn node_at(&self, position: Vec2) -> Option<usize> {
        self.nodes
            .iter()
            .position(|node| node.distance_sq(position) < node_eps_sq())
    }

    /// The bobbing direction a HOME ghost turns to at this node: the
    /// bottom-row nodes turn back up, the top-row nodes turn back down.
    /// Mid-row nodes leave the heading alone.
    pub fn bob_direction(node: usize) -> Option<Direction> {
        match node {
            0 | 3 | 6 => Some(Direction::South),
            2 | 5 | 8 => Some(Direction::North),
            _ => None,
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
