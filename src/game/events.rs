//! Discrete change records emitted by the match controller.
//!
//! Transitions push an event at the point they happen; the room task drains
//! them after each step and forwards them to clients and logs.

use super::r#match::MatchPhase;
use super::rules::AttackKind;

#[derive(Debug, Clone, PartialEq)]
pub enum MatchEvent {
    /// Top-level phase transition
    PhaseChanged { from: MatchPhase, to: MatchPhase },

    /// Pre-fight countdown ticked down
    Countdown { remaining: u32 },

    /// Fighting begins
    RoundStarted { round: u32 },

    /// An attack connected (possibly blocked)
    PlayerHit {
        attacker_id: String,
        defender_id: String,
        attack: AttackKind,
        blocked: bool,
        damage: f32,
    },

    /// A player's health reached zero
    RoundEnded {
        winner_id: String,
        loser_id: String,
        player1_wins: u32,
        player2_wins: u32,
    },

    MatchEnded { winner_id: Option<String> },
}
