//! State observation: full snapshots and field-level patches

use crate::ws::protocol::{MatchPatch, MatchView, PlayerPatch, PlayerView, RoomSnapshot, ServerMsg};

use super::{MatchState, PlayerState};

/// `Some(new)` when the value differs from what clients last saw
fn changed<T: PartialEq + Clone>(prev: Option<&T>, new: &T) -> Option<T> {
    match prev {
        Some(old) if old == new => None,
        _ => Some(new.clone()),
    }
}

pub fn player_view(p: &PlayerState) -> PlayerView {
    PlayerView {
        id: p.id.clone(),
        x: p.x,
        y: p.y,
        velocity_x: p.vel_x,
        velocity_y: p.vel_y,
        health: p.health,
        max_health: p.max_health,
        stamina: p.stamina,
        max_stamina: p.max_stamina,
        facing: p.facing,
        state: p.state,
    }
}

pub fn match_view(state: &MatchState) -> MatchView {
    MatchView {
        phase: state.phase,
        round_number: state.round_number,
        player1_wins: state.player1_wins,
        player2_wins: state.player2_wins,
        countdown: state.countdown,
    }
}

pub fn room_snapshot(state: &MatchState) -> RoomSnapshot {
    RoomSnapshot {
        room: match_view(state),
        players: state.players.iter().map(player_view).collect(),
    }
}

impl MatchPatch {
    pub fn diff(prev: Option<&MatchView>, cur: &MatchView) -> Option<Self> {
        let patch = Self {
            phase: changed(prev.map(|p| &p.phase), &cur.phase),
            round_number: changed(prev.map(|p| &p.round_number), &cur.round_number),
            player1_wins: changed(prev.map(|p| &p.player1_wins), &cur.player1_wins),
            player2_wins: changed(prev.map(|p| &p.player2_wins), &cur.player2_wins),
            countdown: changed(prev.map(|p| &p.countdown), &cur.countdown),
        };
        (patch != Self::default()).then_some(patch)
    }
}

impl PlayerPatch {
    pub fn diff(prev: Option<&PlayerView>, cur: &PlayerView) -> Option<Self> {
        let patch = Self {
            id: cur.id.clone(),
            x: changed(prev.map(|p| &p.x), &cur.x),
            y: changed(prev.map(|p| &p.y), &cur.y),
            velocity_x: changed(prev.map(|p| &p.velocity_x), &cur.velocity_x),
            velocity_y: changed(prev.map(|p| &p.velocity_y), &cur.velocity_y),
            health: changed(prev.map(|p| &p.health), &cur.health),
            max_health: changed(prev.map(|p| &p.max_health), &cur.max_health),
            stamina: changed(prev.map(|p| &p.stamina), &cur.stamina),
            max_stamina: changed(prev.map(|p| &p.max_stamina), &cur.max_stamina),
            facing: changed(prev.map(|p| &p.facing), &cur.facing),
            state: changed(prev.map(|p| &p.state), &cur.state),
        };
        let unchanged = Self {
            id: cur.id.clone(),
            ..Default::default()
        };
        (patch != unchanged).then_some(patch)
    }
}

/// Builds state patches for network transmission.
///
/// Remembers the view clients were last sent and emits only what changed.
pub struct SnapshotBuilder {
    /// Tick counter since last patch
    ticks_since_patch: u32,
    /// Patch interval in ticks
    patch_interval: u32,
    last_match: Option<MatchView>,
    last_players: Vec<PlayerView>,
}

impl SnapshotBuilder {
    pub fn new(patch_interval: u32) -> Self {
        Self {
            ticks_since_patch: 0,
            patch_interval: patch_interval.max(1),
            last_match: None,
            last_players: Vec::new(),
        }
    }

    /// Check if it's time to send a patch
    pub fn should_send(&mut self) -> bool {
        self.ticks_since_patch += 1;
        if self.ticks_since_patch >= self.patch_interval {
            self.ticks_since_patch = 0;
            true
        } else {
            false
        }
    }

    /// Force a patch on next check (used for important events)
    pub fn force_next(&mut self) {
        self.ticks_since_patch = self.patch_interval;
    }

    /// Diff the state against the last sent view; `None` if nothing changed
    pub fn build_patch(&mut self, tick: u64, state: &MatchState) -> Option<ServerMsg> {
        let room_view = match_view(state);
        let room = MatchPatch::diff(self.last_match.as_ref(), &room_view);

        let views: Vec<PlayerView> = state.players.iter().map(player_view).collect();
        let players: Vec<PlayerPatch> = views
            .iter()
            .filter_map(|cur| {
                let prev = self.last_players.iter().find(|p| p.id == cur.id);
                PlayerPatch::diff(prev, cur)
            })
            .collect();
        let removed: Vec<String> = self
            .last_players
            .iter()
            .filter(|old| !views.iter().any(|v| v.id == old.id))
            .map(|old| old.id.clone())
            .collect();

        self.last_match = Some(room_view);
        self.last_players = views;

        if room.is_none() && players.is_empty() && removed.is_empty() {
            return None;
        }
        Some(ServerMsg::StatePatch {
            tick,
            room,
            players,
            removed,
        })
    }
}
