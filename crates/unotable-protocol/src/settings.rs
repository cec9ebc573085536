//! Per-room game settings, editable by the host while waiting.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// How draw-forcing cards may be answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackingMode {
    /// Penalties apply immediately.
    Off,
    /// A Draw Two may be answered with another Draw Two.
    #[default]
    Standard,
    /// Draw Two and Wild Draw Four may answer each other.
    Aggressive,
}

/// What happens when a player's turn timer runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AfkBehavior {
    /// Draw a card, then pass.
    #[default]
    DrawSkip,
    /// Pass without drawing.
    Skip,
}

/// Settings carried by `save_game_settings` and echoed in
/// `game_settings_saved`. Missing fields take their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameSettings {
    pub turn_timeout_seconds: u64,
    pub stacking_mode: StackingMode,
    pub afk_behavior: AfkBehavior,
    /// Timeouts tolerated before a player forfeits. `0` disables forfeit.
    pub max_afk_strikes: u32,
}

impl GameSettings {
    pub const MIN_TURN_TIMEOUT_SECS: u64 = 5;
    pub const MAX_TURN_TIMEOUT_SECS: u64 = 120;

    /// Rejects out-of-range values.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        let range =
            Self::MIN_TURN_TIMEOUT_SECS..=Self::MAX_TURN_TIMEOUT_SECS;
        if !range.contains(&self.turn_timeout_seconds) {
            return Err(ProtocolError::InvalidMessage(format!(
                "turn_timeout_seconds must be between {} and {}",
                range.start(),
                range.end()
            )));
        }
        Ok(())
    }

    pub fn turn_timeout(&self) -> Duration {
        Duration::from_secs(self.turn_timeout_seconds)
    }

    /// Whether repeated timeouts eventually forfeit the player.
    pub fn forfeit_enabled(&self) -> bool {
        self.max_afk_strikes > 0
    }
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            turn_timeout_seconds: 30,
            stacking_mode: StackingMode::default(),
            afk_behavior: AfkBehavior::default(),
            max_afk_strikes: 3,
        }
    }
}
