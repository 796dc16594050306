//! Player physics: gravity, integration, ground and arena bounds

use super::player::{ActionState, PlayerState};
use super::rules::{ground_line, PlayerConfig, ARENA_WIDTH};

/// Physics system for updating player positions and velocities.
///
/// Bodies never collide with each other; only hitboxes produce effects.
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Integrate one player over `dt` seconds
    pub fn integrate(player: &mut PlayerState, dt: f32) {
        if !player.grounded {
            player.vel_y += PlayerConfig::GRAVITY * dt;
        }

        player.x += player.vel_x * dt;
        player.y += player.vel_y * dt;

        let ground = ground_line();
        if player.y >= ground {
            player.y = ground;
            player.vel_y = 0.0;
            player.grounded = true;
            if player.state == ActionState::Jumping {
                player.state = ActionState::Idle;
            }
        }

        player.x = Self::clamp_to_arena(player.x);
    }

    /// Keep a body's left edge inside [0, arena width - body width]
    pub fn clamp_to_arena(x: f32) -> f32 {
        x.clamp(0.0, ARENA_WIDTH - PlayerConfig::WIDTH)
    }
}
