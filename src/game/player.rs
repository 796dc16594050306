//! Per-player authoritative state

use serde::{Deserialize, Serialize};

use super::combat::Rect;
use super::rules::{ground_line, AttackKind, DashConfig, PlayerConfig, ARENA_WIDTH};

/// Horizontal facing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Facing {
    Left,
    Right,
}

impl Facing {
    /// +1 for right, -1 for left
    pub fn sign(self) -> f32 {
        match self {
            Facing::Left => -1.0,
            Facing::Right => 1.0,
        }
    }
}

/// Player action state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionState {
    Idle,
    Walking,
    Jumping,
    Dashing,
    AttackingLight,
    AttackingHeavy,
    Blocking,
    HitStun,
    Dead,
}

impl ActionState {
    /// Attack being performed, if any
    pub fn attack_kind(self) -> Option<AttackKind> {
        match self {
            ActionState::AttackingLight => Some(AttackKind::Light),
            ActionState::AttackingHeavy => Some(AttackKind::Heavy),
            _ => None,
        }
    }

    /// States in which input is ignored and the player cannot be hit
    pub fn is_incapacitated(self) -> bool {
        matches!(self, ActionState::HitStun | ActionState::Dead)
    }
}

impl From<AttackKind> for ActionState {
    fn from(kind: AttackKind) -> Self {
        match kind {
            AttackKind::Light => ActionState::AttackingLight,
            AttackKind::Heavy => ActionState::AttackingHeavy,
        }
    }
}

/// Spawn x and facing for a join slot (0 = first joiner)
pub fn spawn_point(slot: usize) -> (f32, Facing) {
    if slot == 0 {
        (PlayerConfig::SPAWN_INSET, Facing::Right)
    } else {
        (ARENA_WIDTH - PlayerConfig::SPAWN_INSET, Facing::Left)
    }
}

/// Player state in a room (authoritative)
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerState {
    pub id: String,

    // Position and movement
    pub x: f32,
    pub y: f32,
    pub vel_x: f32,
    pub vel_y: f32,
    pub grounded: bool,
    pub facing: Facing,

    // Resources
    pub health: f32,
    pub max_health: f32,
    pub stamina: f32,
    pub max_stamina: f32,

    pub state: ActionState,

    // Server-private timers
    /// Hit-stun countdown (ms)
    pub state_timer: f32,
    /// Frames elapsed in the current attack
    pub current_frame: u32,
    /// Remaining dash time (ms)
    pub dash_timer: f32,
    /// Time until the next dash is allowed (ms)
    pub dash_cooldown: f32,
    /// +1 right, -1 left
    pub dash_direction: f32,
}

impl PlayerState {
    pub fn new(id: impl Into<String>, slot: usize) -> Self {
        let (x, facing) = spawn_point(slot);
        Self {
            id: id.into(),
            x,
            y: ground_line(),
            vel_x: 0.0,
            vel_y: 0.0,
            grounded: true,
            facing,
            health: PlayerConfig::MAX_HEALTH,
            max_health: PlayerConfig::MAX_HEALTH,
            stamina: PlayerConfig::MAX_STAMINA,
            max_stamina: PlayerConfig::MAX_STAMINA,
            state: ActionState::Idle,
            state_timer: 0.0,
            current_frame: 0,
            dash_timer: 0.0,
            dash_cooldown: 0.0,
            dash_direction: facing.sign(),
        }
    }

    /// Restore every field except identity to the spawn defaults for `slot`
    pub fn reset_to_spawn(&mut self, slot: usize) {
        let id = std::mem::take(&mut self.id);
        *self = Self::new(id, slot);
    }

    /// Full body rectangle, also used as the hurtbox
    pub fn body(&self) -> Rect {
        Rect {
            x: self.x,
            y: self.y,
            width: PlayerConfig::WIDTH,
            height: PlayerConfig::HEIGHT,
        }
    }

    /// Time spent in the current dash (ms)
    pub fn dash_elapsed(&self) -> f32 {
        DashConfig::DURATION - self.dash_timer
    }

    /// Mid-dash invincibility window
    pub fn is_invincible(&self) -> bool {
        if self.state != ActionState::Dashing {
            return false;
        }
        let elapsed = self.dash_elapsed();
        (DashConfig::I_FRAME_START..=DashConfig::I_FRAME_END).contains(&elapsed)
    }

    pub fn regen_stamina(&mut self, dt: f32) {
        self.stamina = (self.stamina + PlayerConfig::STAMINA_REGEN * dt).min(self.max_stamina);
    }

    /// Spend stamina if enough is available
    pub fn try_spend_stamina(&mut self, cost: f32) -> bool {
        if self.stamina >= cost {
            self.stamina -= cost;
            true
        } else {
            false
        }
    }
}
