//! Combat system - hitboxes, hurtboxes and hit outcomes

use tracing::debug;

use super::player::{ActionState, PlayerState};
use super::rules::{AttackData, AttackKind, PlayerConfig, BLOCK_CHIP_MULTIPLIER};

/// Axis-aligned rectangle (x, y is the top-left corner)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    /// Strict overlap; touching edges do not count
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.x < other.x + other.width
            && self.x + self.width > other.x
            && self.y < other.y + other.height
            && self.y + self.height > other.y
    }
}

/// Hit result from combat resolution
#[derive(Debug, Clone, PartialEq)]
pub struct HitResult {
    pub attacker_id: String,
    pub defender_id: String,
    pub attack: AttackKind,
    pub blocked: bool,
    /// Health removed (0 when blocked)
    pub damage: f32,
}

/// Combat system for resolving attacks between players
pub struct CombatSystem;

impl CombatSystem {
    /// World-space hitbox of an attack, mirrored by the attacker's facing
    pub fn hitbox(attacker: &PlayerState, attack: &AttackData) -> Rect {
        let hb = &attack.hitbox;
        let x = if attacker.facing.sign() > 0.0 {
            attacker.x + hb.offset_x
        } else {
            attacker.x + PlayerConfig::WIDTH - hb.offset_x - hb.width
        };
        Rect {
            x,
            y: attacker.y + PlayerConfig::HEIGHT / 2.0 + hb.offset_y,
            width: hb.width,
            height: hb.height,
        }
    }

    /// Hitbox if the player's attack is in its active window
    pub fn active_hitbox(attacker: &PlayerState) -> Option<(&'static AttackData, Rect)> {
        let attack = AttackData::for_kind(attacker.state.attack_kind()?);
        if !attack.is_active(attacker.current_frame) {
            return None;
        }
        Some((attack, Self::hitbox(attacker, attack)))
    }

    /// Whether a defender can currently be hit at all
    pub fn can_be_hit(defender: &PlayerState) -> bool {
        !defender.state.is_incapacitated() && !defender.is_invincible()
    }

    /// Resolve all attacker/defender pairs for this tick, in slice order.
    ///
    /// Each attacker's hitbox is captured before its defenders are scanned,
    /// so one swing can land on several defenders within the same tick. Any
    /// landed or blocked hit then jumps the attacker to the end of its
    /// active window.
    pub fn resolve(players: &mut [PlayerState]) -> Vec<HitResult> {
        let mut hits = Vec::new();

        for a in 0..players.len() {
            let Some((attack, hitbox)) = Self::active_hitbox(&players[a]) else {
                continue;
            };
            let attacker_id = players[a].id.clone();
            let knockback_dir = players[a].facing.sign();
            let mut landed = false;

            for d in 0..players.len() {
                if d == a {
                    continue;
                }
                let defender = &mut players[d];
                if !Self::can_be_hit(defender) || !hitbox.overlaps(&defender.body()) {
                    continue;
                }

                let hit = Self::apply_hit(&attacker_id, defender, attack, knockback_dir);
                debug!(
                    attacker = %hit.attacker_id,
                    defender = %hit.defender_id,
                    attack = ?hit.attack,
                    blocked = hit.blocked,
                    "Hit resolved"
                );
                hits.push(hit);
                landed = true;
            }

            if landed {
                players[a].current_frame = attack.active_end();
            }
        }

        hits
    }

    /// Apply a connecting attack to a defender
    pub fn apply_hit(
        attacker_id: &str,
        defender: &mut PlayerState,
        attack: &AttackData,
        knockback_dir: f32,
    ) -> HitResult {
        if defender.state == ActionState::Blocking {
            let chip = attack.stamina_cost * BLOCK_CHIP_MULTIPLIER;
            defender.stamina = (defender.stamina - chip).max(0.0);
            return HitResult {
                attacker_id: attacker_id.to_string(),
                defender_id: defender.id.clone(),
                attack: attack.kind,
                blocked: true,
                damage: 0.0,
            };
        }

        defender.health = (defender.health - attack.damage).max(0.0);
        defender.state = ActionState::HitStun;
        defender.state_timer = PlayerConfig::HIT_STUN_DURATION;
        defender.current_frame = 0;
        defender.dash_timer = 0.0;
        defender.vel_x = attack.knockback_x * knockback_dir;
        defender.vel_y = attack.knockback_y;
        defender.grounded = false;

        HitResult {
            attacker_id: attacker_id.to_string(),
            defender_id: defender.id.clone(),
            attack: attack.kind,
            blocked: false,
            damage: attack.damage,
        }
    }
}
