use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

use crate::error::FormatError;

new_key_type! {
    /// Identifies an actor in the field's arena.
    pub struct ActorId;
}

/// The closed set of actors. Doubles as the save-file section name for
/// each actor, so the spellings are stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActorTag {
    Player,
    RedGhost,
    PinkGhost,
    BlueGhost,
    OrangeGhost,
}

impl ActorTag {
    /// Every ghost, in spawn order.
    pub const GHOSTS: [ActorTag; 4] = [
        ActorTag::RedGhost,
        ActorTag::PinkGhost,
        ActorTag::BlueGhost,
        ActorTag::OrangeGhost,
    ];

    pub fn is_ghost(self) -> bool {
        self != ActorTag::Player
    }

    /// Stable wire spelling used in event payloads and save files.
    pub fn name(self) -> &'static str {
        match self {
            ActorTag::Player => "player",
            ActorTag::RedGhost => "red_ghost",
            ActorTag::PinkGhost => "pink_ghost",
            ActorTag::BlueGhost => "blue_ghost",
            ActorTag::OrangeGhost => "orange_ghost",
        }
    }

    pub fn from_name(name: &str) -> Result<ActorTag, FormatError> {
        match name {
            "player" => Ok(ActorTag::Player),
            "red_ghost" => Ok(ActorTag::RedGhost),
            "pink_ghost" => Ok(ActorTag::PinkGhost),
            "blue_ghost" => Ok(ActorTag::BlueGhost),
            "orange_ghost" => Ok(ActorTag::OrangeGhost),
            _ => Err(FormatError::UnknownName {
                field: "actor",
                value: name.to_owned(),
            }),
        }
    }
}
