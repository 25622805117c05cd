//! Maze geometry: continuous positions, integer cells, cardinal directions.
//!
//! Positions are fixed-point ([`Fixed64`]) so motion integration is
//! deterministic. Distances are compared squared throughout -- nothing in
//! the kernel needs a square root. The maze is toroidal: positions and
//! cells wrap at the grid bounds.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::FormatError;
use crate::fixed::Fixed64;

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

/// One of the four cardinal headings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    East,
    North,
    West,
    South,
}

impl Direction {
    /// The canonical enumeration order. Steering iterates candidates in
    /// this order and keeps the first on distance ties, so it is the
    /// deterministic tie-break for the whole simulation.
    pub const ALL: [Direction; 4] = [
        Direction::East,
        Direction::North,
        Direction::West,
        Direction::South,
    ];

    /// Unit cell offset for this heading. North is negative y.
    pub fn offset(self) -> (i32, i32) {
        match self {
            Direction::East => (1, 0),
            Direction::North => (0, -1),
            Direction::West => (-1, 0),
            Direction::South => (0, 1),
        }
    }

    /// The direct reverse of this heading.
    pub fn opposite(self) -> Direction {
        match self {
            Direction::East => Direction::West,
            Direction::North => Direction::South,
            Direction::West => Direction::East,
            Direction::South => Direction::North,
        }
    }

    /// Whether `other` is the direct reverse of this heading.
    pub fn is_opposite(self, other: Direction) -> bool {
        self.opposite() == other
    }

    /// Stable wire spelling used in save files.
    pub fn name(self) -> &'static str {
        match self {
            Direction::East => "EAST",
            Direction::North => "NORTH",
            Direction::West => "WEST",
            Direction::South => "SOUTH",
        }
    }

    /// Parse a wire spelling back into a direction.
    pub fn from_name(name: &str) -> Result<Direction, FormatError> {
        match name {
            "EAST" => Ok(Direction::East),
            "NORTH" => Ok(Direction::North),
            "WEST" => Ok(Direction::West),
            "SOUTH" => Ok(Direction::South),
            _ => Err(FormatError::UnknownName {
                field: "direction",
                value: name.to_owned(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Size
// ---------------------------------------------------------------------------

/// Grid dimensions in cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    pub fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }
}

// ---------------------------------------------------------------------------
// CellPos
// ---------------------------------------------------------------------------

/// An integer grid cell. Derived from a continuous position by flooring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellPos {
    pub x: i32,
    pub y: i32,
}

impl CellPos {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The continuous center of this cell.
    pub fn center(self) -> Vec2 {
        Vec2::new(
            Fixed64::from_num(self.x) + Fixed64::from_num(0.5),
            Fixed64::from_num(self.y) + Fixed64::from_num(0.5),
        )
    }

    pub fn shift(self, dx: i32, dy: i32) -> CellPos {
        CellPos::new(self.x + dx, self.y + dy)
    }

    /// Wrap into the grid bounds (toroidal maze).
    pub fn wrapped(self, size: Size) -> CellPos {
        CellPos::new(self.x.rem_euclid(size.width), self.y.rem_euclid(size.height))
    }

    /// Parse the `"x,y"` wire form.
    pub fn parse(text: &str) -> Result<CellPos, FormatError> {
        let (x, y) = text
            .split_once(',')
            .ok_or_else(|| FormatError::InvalidPoint(text.to_owned()))?;
        let x = x
            .trim()
            .parse()
            .map_err(|_| FormatError::InvalidPoint(text.to_owned()))?;
        let y = y
            .trim()
            .parse()
            .map_err(|_| FormatError::InvalidPoint(text.to_owned()))?;
        Ok(CellPos::new(x, y))
    }
}

impl fmt::Display for CellPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

// ---------------------------------------------------------------------------
// Vec2
// ---------------------------------------------------------------------------

/// A continuous 2D position in cell units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: Fixed64,
    pub y: Fixed64,
}

impl Vec2 {
    pub fn new(x: Fixed64, y: Fixed64) -> Self {
        Self { x, y }
    }

    /// Construct from f64 literals. Initialization only.
    pub fn from_num(x: f64, y: f64) -> Self {
        Self::new(Fixed64::from_num(x), Fixed64::from_num(y))
    }

    pub fn shift(self, dx: Fixed64, dy: Fixed64) -> Vec2 {
        Vec2::new(self.x + dx, self.y + dy)
    }

    pub fn translate(&mut self, dx: Fixed64, dy: Fixed64) {
        self.x += dx;
        self.y += dy;
    }

    /// Squared Euclidean distance. Squared values order the same way the
    /// true distances do, which is all steering and proximity need.
    pub fn distance_sq(self, other: Vec2) -> Fixed64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// The integer cell this position falls in.
    pub fn cell(self) -> CellPos {
        CellPos::new(
            self.x.floor().to_num::<i32>(),
            self.y.floor().to_num::<i32>(),
        )
    }

    /// Wrap into the grid bounds (toroidal maze).
    pub fn wrap(&mut self, size: Size) {
        let width = Fixed64::from_num(size.width);
        let height = Fixed64::from_num(size.height);
        self.x %= width;
        if self.x < 0 {
            self.x += width;
        }
        self.y %= height;
        if self.y < 0 {
            self.y += height;
        }
    }

    /// Parse the `"x,y"` wire form. Lossless against [`fmt::Display`].
    pub fn parse(text: &str) -> Result<Vec2, FormatError> {
        let (x, y) = text
            .split_once(',')
            .ok_or_else(|| FormatError::InvalidPoint(text.to_owned()))?;
        let x: Fixed64 = x
            .trim()
            .parse()
            .map_err(|_| FormatError::InvalidPoint(text.to_owned()))?;
        let y: Fixed64 = y
            .trim()
            .parse()
            .map_err(|_| FormatError::InvalidPoint(text.to_owned()))?;
        Ok(Vec2::new(x, y))
    }
}

impl fmt::Display for Vec2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
