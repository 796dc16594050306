//! Action state machine - turns input and elapsed time into the next action state

use super::player::{ActionState, Facing, PlayerState};
use super::rules::{AttackData, AttackKind, DashConfig, PlayerConfig};
use super::InputState;

/// Per-player action logic, run before physics each tick
pub struct ActionSystem;

impl ActionSystem {
    /// Advance one player's action state by `dt` seconds
    pub fn update(player: &mut PlayerState, input: &InputState, dt: f32) {
        let dt_ms = dt * 1000.0;

        match player.state {
            ActionState::HitStun | ActionState::Dead => {
                player.state_timer -= dt_ms;
                if player.state_timer <= 0.0 && player.state == ActionState::HitStun {
                    player.state = ActionState::Idle;
                }
            }
            ActionState::AttackingLight | ActionState::AttackingHeavy => {
                Self::advance_attack(player);
            }
            ActionState::Dashing => {
                player.dash_timer -= dt_ms;
                player.vel_x = player.dash_direction * DashConfig::SPEED;
                if player.dash_timer <= 0.0 {
                    player.state = ActionState::Idle;
                    player.dash_timer = 0.0;
                    player.vel_x = 0.0;
                }
            }
            ActionState::Idle | ActionState::Walking | ActionState::Jumping | ActionState::Blocking => {
                Self::update_free(player, input, dt, dt_ms);
            }
        }
    }

    fn advance_attack(player: &mut PlayerState) {
        let Some(kind) = player.state.attack_kind() else {
            return;
        };
        player.current_frame += 1;
        if player.current_frame >= AttackData::for_kind(kind).total_frames() {
            player.state = ActionState::Idle;
            player.current_frame = 0;
        }
    }

    /// Input handling while the player is free to act.
    ///
    /// Triggers run in a fixed order and a later one overrides what an
    /// earlier one set: movement, block, jump, attack, dash.
    fn update_free(player: &mut PlayerState, input: &InputState, dt: f32, dt_ms: f32) {
        if player.dash_cooldown > 0.0 {
            player.dash_cooldown = (player.dash_cooldown - dt_ms).max(0.0);
        }
        player.regen_stamina(dt);

        let axis = input.move_axis();
        if axis != 0.0 {
            player.vel_x = axis * PlayerConfig::SPEED;
            player.facing = if axis > 0.0 { Facing::Right } else { Facing::Left };
            player.state = ActionState::Walking;
        } else {
            player.vel_x = 0.0;
            if player.grounded {
                player.state = ActionState::Idle;
            }
        }

        if input.block && player.grounded {
            player.state = ActionState::Blocking;
            player.vel_x = 0.0;
        }

        let jumped = input.jump && player.grounded;
        if jumped {
            player.vel_y = PlayerConfig::JUMP_FORCE;
            player.grounded = false;
            player.state = ActionState::Jumping;
        }

        let attacked = Self::try_attack(player, input);

        if !jumped && !attacked {
            Self::try_dash(player, input);
        }
    }

    /// Light wins over heavy when both are pressed
    fn try_attack(player: &mut PlayerState, input: &InputState) -> bool {
        if !player.grounded {
            return false;
        }
        let requested = [
            (input.light_attack, AttackKind::Light),
            (input.heavy_attack, AttackKind::Heavy),
        ];
        for (pressed, kind) in requested {
            if pressed && player.try_spend_stamina(AttackData::for_kind(kind).stamina_cost) {
                player.state = ActionState::from(kind);
                player.current_frame = 0;
                player.vel_x = 0.0;
                return true;
            }
        }
        false
    }

    fn try_dash(player: &mut PlayerState, input: &InputState) {
        if !input.dash || player.dash_cooldown > 0.0 {
            return;
        }
        if !player.try_spend_stamina(DashConfig::STAMINA_COST) {
            return;
        }

        player.state = ActionState::Dashing;
        player.dash_timer = DashConfig::DURATION;
        player.dash_cooldown = DashConfig::COOLDOWN;

        if input.left {
            player.facing = Facing::Left;
        } else if input.right {
            player.facing = Facing::Right;
        }
        player.dash_direction = player.facing.sign();
    }
}
