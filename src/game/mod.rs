//! Game simulation modules

pub mod action;
pub mod combat;
pub mod events;
pub mod r#match;
pub mod physics;
pub mod player;
pub mod registry;
pub mod room;
pub mod rules;
pub mod snapshot;

pub use r#match::{MatchPhase, MatchState};
pub use player::{ActionState, Facing, PlayerState};
pub use registry::RoomRegistry;
pub use room::RoomHandle;

use serde::{Deserialize, Serialize};

/// Latest known input for a player.
///
/// `left`, `right`, `jump` and `block` are held state. `light_attack`,
/// `heavy_attack` and `dash` are presses: true only for the tick that
/// consumes them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InputState {
    pub left: bool,
    pub right: bool,
    pub jump: bool,
    pub light_attack: bool,
    pub heavy_attack: bool,
    pub block: bool,
    pub dash: bool,
    /// Client counter, kept for diagnostics only
    pub sequence: u32,
}

impl InputState {
    /// Clear the edge-triggered presses once a tick has used them
    pub fn consume_edges(&mut self) {
        self.light_attack = false;
        self.heavy_attack = false;
        self.dash = false;
    }

    /// -1, 0 or +1 from the held direction keys
    pub fn move_axis(&self) -> f32 {
        let mut axis = 0.0;
        if self.left {
            axis -= 1.0;
        }
        if self.right {
            axis += 1.0;
        }
        axis
    }
}
