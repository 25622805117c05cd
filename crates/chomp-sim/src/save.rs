//! Save-file schema and (en/de)coding helpers.
//!
//! The save is a string-keyed JSON tree. Enumerated values travel as
//! their stable wire spellings, points as `"x,y"`, and optional markers
//! as the literal `"None"`. Every parse failure is a [`FormatError`] so
//! the caller can decide between falling back to a fresh game and
//! aborting.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use chomp_core::error::FormatError;
use chomp_core::fixed::Ticks;
use chomp_core::fsm::AxisState;
use chomp_core::geometry::{CellPos, Direction, Vec2};
use chomp_core::id::ActorTag;

use crate::actor::{PlayerLife, PlayerMode, PlayerMotion};
use crate::field::Field;
use crate::ghost::{GhostAlert, GhostMode, GhostPen, GhostRoutine};
use crate::grid::{Content, Grid};

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// A complete game save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveData {
    pub info: InfoSection,
    pub game: GameSection,
    /// Relative delay (decimal string) -> pending event names.
    pub scheduler: BTreeMap<String, Vec<String>>,
    /// Cell `"x,y"` -> content name, for every block of the grid.
    pub blocks: BTreeMap<String, String>,
    pub player: ActorSection,
    pub red_ghost: ActorSection,
    pub pink_ghost: ActorSection,
    pub blue_ghost: ActorSection,
    pub orange_ghost: ActorSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoSection {
    /// Wall-clock stamp, informational only.
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSection {
    pub time: Ticks,
    pub grid: String,
    pub difficulty: String,
    pub level: u32,
    pub scores: u32,
    pub lives: u32,
    pub dots: u32,
}

/// One actor's persisted state. Ghost sections carry the third axis and
/// the pen waypoint marker; the player section omits both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorSection {
    pub position: String,
    pub direction: String,
    pub mode1: String,
    pub mode2: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode3: Option<String>,
    pub last_turn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_node: Option<String>,
}

// ---------------------------------------------------------------------------
// Marker encoding
// ---------------------------------------------------------------------------

fn encode_cell_marker(marker: Option<CellPos>) -> String {
    match marker {
        Some(cell) => cell.to_string(),
        None => "None".to_owned(),
    }
}

fn decode_cell_marker(text: &str) -> Result<Option<CellPos>, FormatError> {
    if text == "None" {
        return Ok(None);
    }
    CellPos::parse(text).map(Some)
}

fn encode_node_marker(marker: Option<usize>) -> String {
    match marker {
        Some(node) => node.to_string(),
        None => "None".to_owned(),
    }
}

fn decode_node_marker(text: &str) -> Result<Option<usize>, FormatError> {
    if text == "None" {
        return Ok(None);
    }
    text.parse()
        .map(Some)
        .map_err(|_| FormatError::InvalidNumber {
            field: "last_node",
            value: text.to_owned(),
        })
}

// ---------------------------------------------------------------------------
// Snapshots (field -> sections)
// ---------------------------------------------------------------------------

/// Snapshot the player's section. Panics if the player is not spawned;
/// saving only happens mid-session.
pub(crate) fn player_section(field: &Field) -> ActorSection {
    field
        .with_actor(ActorTag::Player, |actor| {
            let player = actor
                .player()
                .unwrap_or_else(|| panic!("player actor holds non-player state"));
            ActorSection {
                position: actor.position.to_string(),
                direction: actor.direction.name().to_owned(),
                mode1: player.life.current().name().to_owned(),
                mode2: player.motion.current().name().to_owned(),
                mode3: None,
                last_turn: encode_cell_marker(player.last_turn),
                last_node: None,
            }
        })
        .unwrap_or_else(|| panic!("player actor missing at save time"))
}

/// Snapshot one ghost's section.
pub(crate) fn ghost_section(field: &Field, tag: ActorTag) -> ActorSection {
    field
        .with_actor(tag, |actor| {
            let ghost = actor
                .ghost()
                .unwrap_or_else(|| panic!("{} holds non-ghost state", tag.name()));
            ActorSection {
                position: actor.position.to_string(),
                direction: actor.direction.name().to_owned(),
                mode1: ghost.alert.current().name().to_owned(),
                mode2: ghost.routine.current().name().to_owned(),
                mode3: Some(ghost.pen.current().name().to_owned()),
                last_turn: encode_cell_marker(ghost.last_turn),
                last_node: Some(encode_node_marker(ghost.last_node)),
            }
        })
        .unwrap_or_else(|| panic!("{} missing at save time", tag.name()))
}

/// Snapshot the whole grid's contents, keyed by cell.
pub(crate) fn blocks_section(grid: &Grid) -> BTreeMap<String, String> {
    grid.blocks()
        .map(|block| (block.cell.to_string(), block.content.name().to_owned()))
        .collect()
}

// ---------------------------------------------------------------------------
// Parsing (sections -> typed state)
// ---------------------------------------------------------------------------

/// The player's section, decoded.
pub(crate) struct ParsedPlayer {
    pub position: Vec2,
    pub direction: Direction,
    pub mode: PlayerMode,
    pub last_turn: Option<CellPos>,
}

/// A ghost's section, decoded.
pub(crate) struct ParsedGhost {
    pub position: Vec2,
    pub direction: Direction,
    pub mode: GhostMode,
    pub last_turn: Option<CellPos>,
    pub last_node: Option<usize>,
}

pub(crate) fn parse_player(section: &ActorSection) -> Result<ParsedPlayer, FormatError> {
    Ok(ParsedPlayer {
        position: Vec2::parse(&section.position)?,
        direction: Direction::from_name(&section.direction)?,
        mode: (
            PlayerLife::from_name(&section.mode1)?,
            PlayerMotion::from_name(&section.mode2)?,
        ),
        last_turn: decode_cell_marker(&section.last_turn)?,
    })
}

pub(crate) fn parse_ghost(section: &ActorSection) -> Result<ParsedGhost, FormatError> {
    let mode3 = section
        .mode3
        .as_deref()
        .ok_or(FormatError::MissingField("mode3"))?;
    let last_node = match section.last_node.as_deref() {
        Some(text) => decode_node_marker(text)?,
        None => None,
    };
    Ok(ParsedGhost {
        position: Vec2::parse(&section.position)?,
        direction: Direction::from_name(&section.direction)?,
        mode: (
            GhostAlert::from_name(&section.mode1)?,
            GhostRoutine::from_name(&section.mode2)?,
            GhostPen::from_name(mode3)?,
        ),
        last_turn: decode_cell_marker(&section.last_turn)?,
        last_node,
    })
}

/// Decode the blocks section into typed (cell, content) pairs.
pub(crate) fn parse_blocks(
    blocks: &BTreeMap<String, String>,
) -> Result<Vec<(CellPos, Content)>, FormatError> {
    blocks
        .iter()
        .map(|(cell, content)| Ok((CellPos::parse(cell)?, Content::from_name(content)?)))
        .collect()
}

// ===========================================================================
// Tests
// ===========================================================================
