//! Shared test helpers for unit and integration tests.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so the same
//! fixtures serve unit tests here and the scenario tests in the
//! integration-test crate.

use std::rc::Rc;

use chomp_core::event::EventBus;
use chomp_core::fixed::Fixed64;
use chomp_core::geometry::{CellPos, Direction, Size};
use chomp_core::scheduler::Scheduler;

use crate::config::GameConfig;
use crate::driver::{GameDriver, Ticker};
use crate::grid::{Anchors, Block, Connections, Content, Grid};

// ===========================================================================
// Fixed-point helper
// ===========================================================================

pub fn fixed(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

// ===========================================================================
// ASCII grids
// ===========================================================================

/// Build a grid from ASCII rows.
///
/// Legend: `#` wall, `.` dot, `o` energizer, `F` fruit, `-` door,
/// space empty, `P` player anchor (empty cell), `G` pen anchor (wall
/// cell -- the anchor itself is never walked on, only the waypoints hung
/// off it are). A direction is open iff the (toroidal) neighbor is not a
/// wall. Missing anchors default to (0,0).
pub fn grid_from_ascii(rows: &[&str]) -> Grid {
    let height = rows.len() as i32;
    let width = rows[0].chars().count() as i32;
    let size = Size::new(width, height);

    let mut player_anchor = CellPos::new(0, 0);
    let mut pen_anchor = CellPos::new(0, 0);
    let cells: Vec<Vec<char>> = rows.iter().map(|row| row.chars().collect()).collect();

    let content_of = |c: char| match c {
        '#' | 'G' => Content::Wall,
        '.' => Content::Dot,
        'o' => Content::Energizer,
        'F' => Content::Fruit,
        '-' => Content::Door,
        _ => Content::Empty,
    };

    let mut blocks = Vec::with_capacity((width * height) as usize);
    for (y, row) in cells.iter().enumerate() {
        assert_eq!(row.len(), width as usize, "ragged ascii grid");
        for (x, &c) in row.iter().enumerate() {
            let cell = CellPos::new(x as i32, y as i32);
            match c {
                'P' => player_anchor = cell,
                'G' => pen_anchor = cell,
                _ => {}
            }
            let mut connections = Connections::new();
            for direction in Direction::ALL {
                let (dx, dy) = direction.offset();
                let neighbor = cell.shift(dx, dy).wrapped(size);
                let neighbor_char = cells[neighbor.y as usize][neighbor.x as usize];
                connections.set_open(direction, content_of(neighbor_char) != Content::Wall);
            }
            blocks.push(Block {
                cell,
                content: content_of(c),
                connections,
            });
        }
    }

    Grid::new(
        size,
        blocks,
        Anchors {
            player: player_anchor,
            pen: pen_anchor,
        },
    )
}

/// The canonical 13x10 test maze: a corridor ring, a crossway-rich top
/// row, a door corridor, and a walled-off pen whose waypoints match the
/// pen anchor at `G`.
pub fn standard_maze() -> Grid {
    grid_from_ascii(&[
        "#############",
        "#P...o......#",
        "#.#.#####.#.#",
        "#.#.....-.#.#",
        "#.##G######.#",
        "#.#########.#",
        "#.#########.#",
        "#.#########.#",
        "#...........#",
        "#############",
    ])
}

// ===========================================================================
// Harness
// ===========================================================================

/// A fully wired kernel: bus, scheduler, driver, and a tick source.
pub struct Harness {
    pub bus: Rc<EventBus>,
    pub scheduler: Rc<Scheduler>,
    pub driver: Rc<GameDriver>,
    pub ticker: Ticker,
}

impl Harness {
    pub fn new(config: GameConfig, seed: u64) -> Self {
        let bus = Rc::new(EventBus::new());
        let scheduler = Scheduler::new(&bus);
        let driver = GameDriver::new(Rc::clone(&bus), Rc::clone(&scheduler), config, seed);
        Self {
            bus,
            scheduler,
            driver,
            ticker: Ticker::new(),
        }
    }

    /// Advance the simulation by `ticks` ticks.
    pub fn run(&self, ticks: u64) {
        self.ticker.run(&self.bus, ticks);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_maze_has_the_expected_anchors() {
        let grid = standard_maze();
        assert_eq!(grid.anchors().player, CellPos::new(1, 1));
        assert_eq!(grid.anchors().pen, CellPos::new(4, 4));
        // The door cell sits at pen + (4, -1) in cell terms.
        assert_eq!(grid[CellPos::new(8, 3)].content, Content::Door);
    }

    #[test]
    fn standard_maze_top_left_is_a_corner() {
        let grid = standard_maze();
        let corner = &grid[CellPos::new(1, 1)].connections;
        assert!(corner.open(Direction::East));
        assert!(corner.open(Direction::South));
        assert!(!corner.open(Direction::North));
        assert!(!corner.open(Direction::West));
        assert!(!corner.is_straight_corridor());
    }
}
