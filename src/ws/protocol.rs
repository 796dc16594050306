//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::events::MatchEvent;
use crate::game::rules::AttackKind;
use crate::game::{ActionState, Facing, InputState, MatchPhase};

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Latest input state; replaces whatever the server held before
    PlayerInput {
        #[serde(flatten)]
        input: InputState,
    },

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },

    /// Leave the room
    Leave,
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerMsg {
    /// Sent once to a session after it joins a room
    Welcome {
        session_id: String,
        room_id: Uuid,
        server_time: u64,
        arena: ArenaInfo,
        state: RoomSnapshot,
    },

    /// Another session joined the room
    PlayerJoined {
        session_id: String,
    },

    /// A session left the room
    PlayerLeft {
        session_id: String,
    },

    /// Whole room state; replaces whatever the client held, later patches apply on top
    FullState {
        state: RoomSnapshot,
    },

    /// Fields that changed since the previous patch
    StatePatch {
        tick: u64,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        room: Option<MatchPatch>,
        #[serde(skip_serializing_if = "Vec::is_empty", default)]
        players: Vec<PlayerPatch>,
        #[serde(skip_serializing_if = "Vec::is_empty", default)]
        removed: Vec<String>,
    },

    RoundStart {
        round: u32,
    },

    PlayerHit {
        attacker_id: String,
        defender_id: String,
        attack: AttackKind,
        blocked: bool,
        damage: f32,
    },

    RoundEnd {
        winner_id: String,
        player1_wins: u32,
        player2_wins: u32,
    },

    MatchEnd {
        winner_id: Option<String>,
    },

    /// Error message
    Error {
        code: String,
        message: String,
    },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
    },
}

impl ServerMsg {
    /// Client-facing message for a match event, if it has one.
    /// Phase and countdown changes travel in state patches instead.
    pub fn from_event(event: &MatchEvent) -> Option<Self> {
        match event {
            MatchEvent::PhaseChanged { .. } | MatchEvent::Countdown { .. } => None,
            MatchEvent::RoundStarted { round } => Some(ServerMsg::RoundStart { round: *round }),
            MatchEvent::PlayerHit {
                attacker_id,
                defender_id,
                attack,
                blocked,
                damage,
            } => Some(ServerMsg::PlayerHit {
                attacker_id: attacker_id.clone(),
                defender_id: defender_id.clone(),
                attack: *attack,
                blocked: *blocked,
                damage: *damage,
            }),
            MatchEvent::RoundEnded {
                winner_id,
                player1_wins,
                player2_wins,
                ..
            } => Some(ServerMsg::RoundEnd {
                winner_id: winner_id.clone(),
                player1_wins: *player1_wins,
                player2_wins: *player2_wins,
            }),
            MatchEvent::MatchEnded { winner_id } => Some(ServerMsg::MatchEnd {
                winner_id: winner_id.clone(),
            }),
        }
    }

    pub fn error(code: &str, message: impl Into<String>) -> Self {
        ServerMsg::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Static arena geometry, so clients need not hardcode it
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArenaInfo {
    pub width: f32,
    pub height: f32,
    pub ground_y: f32,
    pub player_width: f32,
    pub player_height: f32,
}

/// Full room state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub room: MatchView,
    pub players: Vec<PlayerView>,
}

/// Client-visible match fields
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchView {
    pub phase: MatchPhase,
    pub round_number: u32,
    pub player1_wins: u32,
    pub player2_wins: u32,
    pub countdown: u32,
}

/// Client-visible player fields; server-private timers are left out
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub velocity_x: f32,
    pub velocity_y: f32,
    pub health: f32,
    pub max_health: f32,
    pub stamina: f32,
    pub max_stamina: f32,
    pub facing: Facing,
    pub state: ActionState,
}

/// Changed match fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<MatchPhase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player1_wins: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player2_wins: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub countdown: Option<u32>,
}

/// Changed player fields, keyed by player id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerPatch {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub velocity_x: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub velocity_y: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_health: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stamina: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_stamina: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facing: Option<Facing>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<ActionState>,
}
