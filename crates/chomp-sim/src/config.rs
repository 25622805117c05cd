//! Game configuration: lives, level cap, and every scheduling delay.
//!
//! Loaded from JSON with serde; every field has a default, so a partial
//! (or empty) config file is fine.

use chomp_core::fixed::Ticks;
use serde::{Deserialize, Serialize};

/// Errors that can occur while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

/// Tunables for a game session. Delays are in ticks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Lives at the start of a new game.
    pub start_lives: u32,
    /// Clearing this level wins the game.
    pub max_level: u32,
    /// Delay from session start (or restart/load) until GAME_START.
    pub start_delay: Ticks,
    /// Release delays for the pink, blue, and orange ghosts.
    pub release_delays: [Ticks; 3],
    /// Scatter/chase switch period on normal difficulty.
    pub switch_period: Ticks,
    /// Energizer pickup to FRIGHTENED_TIMEOUT.
    pub frightened_delay: Ticks,
    /// Energizer pickup to ENERGIZER_TIMEOUT.
    pub energizer_delay: Ticks,
    /// Life lost to GAME_RESTART.
    pub respawn_delay: Ticks,
    /// Last life lost to GAME_END.
    pub end_delay: Ticks,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            start_lives: 3,
            max_level: 5,
            start_delay: 250,
            release_delays: [300, 400, 500],
            switch_period: 1000,
            frightened_delay: 600,
            energizer_delay: 800,
            respawn_delay: 300,
            end_delay: 300,
        }
    }
}

/// Load a config from a JSON string.
pub fn load_config_json(json: &str) -> Result<GameConfig, ConfigError> {
    Ok(serde_json::from_str(json)?)
}
