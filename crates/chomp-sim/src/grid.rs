//! The maze grid: per-cell content and navigability.
//!
//! The kernel reads, per cell, the set of open directions, and writes back
//! pickup consumption (content cleared). Grid files and their format live
//! outside this crate; a grid arrives here already built. Indexing is
//! toroidal, matching the wraparound motion at the maze edges.

use std::ops::Index;

use chomp_core::error::FormatError;
use chomp_core::event::Pickup;
use chomp_core::geometry::{CellPos, Direction, Size};

// ---------------------------------------------------------------------------
// Content
// ---------------------------------------------------------------------------

/// What a cell holds. Wire names are the stable save-file spellings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Content {
    Empty,
    Dot,
    Energizer,
    Fruit,
    Door,
    Wall,
}

impl Content {
    pub fn name(self) -> &'static str {
        match self {
            Content::Empty => "EMPTY",
            Content::Dot => "DOT",
            Content::Energizer => "ENERGIZER",
            Content::Fruit => "FRUIT",
            Content::Door => "DOOR",
            Content::Wall => "WALL",
        }
    }

    pub fn from_name(name: &str) -> Result<Content, FormatError> {
        match name {
            "EMPTY" => Ok(Content::Empty),
            "DOT" => Ok(Content::Dot),
            "ENERGIZER" => Ok(Content::Energizer),
            "FRUIT" => Ok(Content::Fruit),
            "DOOR" => Ok(Content::Door),
            "WALL" => Ok(Content::Wall),
            _ => Err(FormatError::UnknownName {
                field: "content",
                value: name.to_owned(),
            }),
        }
    }

    /// The consumable view of this content. Doors and walls are never
    /// picked up.
    pub fn as_pickup(self) -> Option<Pickup> {
        match self {
            Content::Dot => Some(Pickup::Dot),
            Content::Energizer => Some(Pickup::Energizer),
            Content::Fruit => Some(Pickup::Fruit),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Connections
// ---------------------------------------------------------------------------

/// The set of directions an actor may leave a cell through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Connections([bool; 4]);

impl Connections {
    pub fn new() -> Self {
        Self::default()
    }

    /// All four directions open; handy for tests.
    pub fn all_open() -> Self {
        Self([true; 4])
    }

    fn index(direction: Direction) -> usize {
        match direction {
            Direction::East => 0,
            Direction::North => 1,
            Direction::West => 2,
            Direction::South => 3,
        }
    }

    pub fn set_open(&mut self, direction: Direction, open: bool) {
        self.0[Self::index(direction)] = open;
    }

    pub fn open(&self, direction: Direction) -> bool {
        self.0[Self::index(direction)]
    }

    /// Open directions in the canonical [`Direction::ALL`] order.
    pub fn open_dirs(&self) -> impl Iterator<Item = Direction> + '_ {
        Direction::ALL.into_iter().filter(|&d| self.open(d))
    }

    /// Whether the open set is exactly one of the two straight-corridor
    /// shapes. Any other shape (corner, T, 4-way, dead end) requires a
    /// navigation decision and counts as a crossway.
    pub fn is_straight_corridor(&self) -> bool {
        let open: Vec<Direction> = self.open_dirs().collect();
        matches!(
            open.as_slice(),
            [Direction::North, Direction::South] | [Direction::East, Direction::West]
        )
    }
}

// ---------------------------------------------------------------------------
// Block & Grid
// ---------------------------------------------------------------------------

/// One cell of the maze.
#[derive(Debug, Clone)]
pub struct Block {
    pub cell: CellPos,
    pub content: Content,
    pub connections: Connections,
}

/// Named anchor cells the game pins actors to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchors {
    /// The player's spawn cell.
    pub player: CellPos,
    /// The holding-pen origin; pen waypoints are offsets from here.
    pub pen: CellPos,
}

/// The maze. Blocks are stored row-major; indexing wraps toroidally.
#[derive(Debug, Clone)]
pub struct Grid {
    size: Size,
    blocks: Vec<Block>,
    anchors: Anchors,
}

impl Grid {
    /// Build a grid from row-major blocks. `blocks.len()` must equal
    /// `size.width * size.height`.
    pub fn new(size: Size, blocks: Vec<Block>, anchors: Anchors) -> Self {
        debug_assert_eq!(blocks.len(), (size.width * size.height) as usize);
        Self {
            size,
            blocks,
            anchors,
        }
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn anchors(&self) -> Anchors {
        self.anchors
    }

    fn index_of(&self, cell: CellPos) -> usize {
        let wrapped = cell.wrapped(self.size);
        (wrapped.y * self.size.width + wrapped.x) as usize
    }

    pub fn block(&self, cell: CellPos) -> &Block {
        &self.blocks[self.index_of(cell)]
    }

    pub fn block_mut(&mut self, cell: CellPos) -> &mut Block {
        let index = self.index_of(cell);
        &mut self.blocks[index]
    }

    pub fn set_content(&mut self, cell: CellPos, content: Content) {
        self.block_mut(cell).content = content;
    }

    /// Iterate all blocks in row-major order.
    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter()
    }

    /// Number of dots left on the grid.
    pub fn dot_count(&self) -> u32 {
        self.blocks
            .iter()
            .filter(|b| b.content == Content::Dot)
            .count() as u32
    }
}

impl Index<CellPos> for Grid {
    type Output = Block;

    fn index(&self, cell: CellPos) -> &Block {
        self.block(cell)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
