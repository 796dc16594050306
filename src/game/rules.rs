//! Combat rules table - arena, player, dash and attack constants

use serde::{Deserialize, Serialize};

/// Arena dimensions (y grows downward)
pub const ARENA_WIDTH: f32 = 800.0;
pub const ARENA_HEIGHT: f32 = 600.0;
/// Ground line; a grounded player's bottom edge sits here
pub const GROUND_Y: f32 = 500.0;

pub const MAX_PLAYERS: usize = 2;
pub const ROUNDS_TO_WIN: u32 = 2;

/// Seconds counted down before each round
pub const COUNTDOWN_SECONDS: u32 = 3;
/// Delay between a round ending and the next countdown (ms)
pub const ROUND_END_DELAY_MS: u64 = 2000;

/// Player body and movement tuning
pub struct PlayerConfig;

impl PlayerConfig {
    pub const WIDTH: f32 = 50.0;
    pub const HEIGHT: f32 = 80.0;
    /// Horizontal walk speed (px/s)
    pub const SPEED: f32 = 300.0;
    /// Initial vertical velocity of a jump (negative is up)
    pub const JUMP_FORCE: f32 = -500.0;
    /// px/s²
    pub const GRAVITY: f32 = 1200.0;
    pub const MAX_HEALTH: f32 = 100.0;
    pub const MAX_STAMINA: f32 = 100.0;
    /// Stamina regained per second while free to act
    pub const STAMINA_REGEN: f32 = 20.0;
    /// ms
    pub const HIT_STUN_DURATION: f32 = 300.0;
    /// Horizontal spawn inset from the arena edge
    pub const SPAWN_INSET: f32 = 150.0;
}

/// Dash tuning (all times in ms)
pub struct DashConfig;

impl DashConfig {
    pub const SPEED: f32 = 600.0;
    pub const DURATION: f32 = 150.0;
    pub const COOLDOWN: f32 = 500.0;
    pub const I_FRAME_START: f32 = 30.0;
    pub const I_FRAME_END: f32 = 120.0;
    pub const STAMINA_COST: f32 = 15.0;
}

/// Stamina lost by a blocking defender, as a multiple of the attack's cost
pub const BLOCK_CHIP_MULTIPLIER: f32 = 1.5;

/// Attack types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackKind {
    Light,
    Heavy,
}

/// Hitbox geometry relative to the attacker.
///
/// `offset_x` is measured from the attacker's left edge when facing right and
/// mirrored around the body when facing left. `offset_y` is relative to the
/// attacker's vertical center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitboxData {
    pub offset_x: f32,
    pub offset_y: f32,
    pub width: f32,
    pub height: f32,
}

/// Static attack definition
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttackData {
    pub kind: AttackKind,
    pub damage: f32,
    pub knockback_x: f32,
    pub knockback_y: f32,
    pub startup_frames: u32,
    pub active_frames: u32,
    pub recovery_frames: u32,
    pub stamina_cost: f32,
    pub hitbox: HitboxData,
}

const LIGHT_ATTACK: AttackData = AttackData {
    kind: AttackKind::Light,
    damage: 10.0,
    knockback_x: 150.0,
    knockback_y: -100.0,
    startup_frames: 3,
    active_frames: 4,
    recovery_frames: 6,
    stamina_cost: 10.0,
    hitbox: HitboxData {
        offset_x: 40.0,
        offset_y: -20.0,
        width: 60.0,
        height: 50.0,
    },
};

const HEAVY_ATTACK: AttackData = AttackData {
    kind: AttackKind::Heavy,
    damage: 25.0,
    knockback_x: 300.0,
    knockback_y: -200.0,
    startup_frames: 8,
    active_frames: 5,
    recovery_frames: 15,
    stamina_cost: 25.0,
    hitbox: HitboxData {
        offset_x: 35.0,
        offset_y: -30.0,
        width: 80.0,
        height: 70.0,
    },
};

impl AttackData {
    pub fn for_kind(kind: AttackKind) -> &'static Self {
        match kind {
            AttackKind::Light => &LIGHT_ATTACK,
            AttackKind::Heavy => &HEAVY_ATTACK,
        }
    }

    /// Frame at which the attack finishes recovering
    pub fn total_frames(&self) -> u32 {
        self.startup_frames + self.active_frames + self.recovery_frames
    }

    /// First frame after the active window
    pub fn active_end(&self) -> u32 {
        self.startup_frames + self.active_frames
    }

    /// Whether the hitbox is out on this frame
    pub fn is_active(&self, frame: u32) -> bool {
        frame >= self.startup_frames && frame < self.active_end()
    }
}

/// y coordinate of a grounded player's top edge
pub fn ground_line() -> f32 {
    GROUND_Y - PlayerConfig::HEIGHT
}
