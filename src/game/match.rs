//! Match controller - phases, rounds, win tally and the per-tick simulation step

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::action::ActionSystem;
use super::combat::CombatSystem;
use super::events::MatchEvent;
use super::physics::PhysicsSystem;
use super::player::{ActionState, PlayerState};
use super::room::RoomError;
use super::rules::{COUNTDOWN_SECONDS, MAX_PLAYERS, ROUNDS_TO_WIN};
use super::InputState;

/// Match phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPhase {
    /// Waiting for a second player
    Waiting,
    /// Countdown before a round
    Countdown,
    /// Round in progress
    Fighting,
    /// Round decided, next round or match end pending
    RoundEnd,
    /// A player reached the round target; terminal
    MatchEnd,
}

/// Match state (owned by the room task)
#[derive(Debug, Clone)]
pub struct MatchState {
    pub phase: MatchPhase,
    pub round_number: u32,
    pub player1_wins: u32,
    pub player2_wins: u32,
    /// Seconds left in the pre-round countdown
    pub countdown: u32,
    /// Simulation ticks run while fighting
    pub tick: u64,
    /// Players in join order; index is the join slot
    pub players: Vec<PlayerState>,
    /// Latest input per player, overwritten on arrival
    inputs: HashMap<String, InputState>,
    /// Winner of the most recently decided round
    last_round_winner: Option<String>,
    events: Vec<MatchEvent>,
}

impl Default for MatchState {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchState {
    pub fn new() -> Self {
        Self {
            phase: MatchPhase::Waiting,
            round_number: 1,
            player1_wins: 0,
            player2_wins: 0,
            countdown: COUNTDOWN_SECONDS,
            tick: 0,
            players: Vec::with_capacity(MAX_PLAYERS),
            inputs: HashMap::new(),
            last_round_winner: None,
            events: Vec::new(),
        }
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Join slot of a player (0 = first joiner)
    pub fn slot_of(&self, id: &str) -> Option<usize> {
        self.players.iter().position(|p| p.id == id)
    }

    /// Whether a new player could join right now
    pub fn accepts_players(&self) -> bool {
        self.phase != MatchPhase::MatchEnd && self.players.len() < MAX_PLAYERS
    }

    /// Add a player in the next join slot; the second join starts the countdown
    pub fn add_player(&mut self, id: &str) -> Result<usize, RoomError> {
        if self.slot_of(id).is_some() {
            return Err(RoomError::AlreadyJoined);
        }
        if self.phase == MatchPhase::MatchEnd {
            return Err(RoomError::MatchFinished);
        }
        if self.players.len() >= MAX_PLAYERS {
            return Err(RoomError::RoomFull);
        }

        let slot = self.players.len();
        self.players.push(PlayerState::new(id, slot));

        if self.players.len() == MAX_PLAYERS && self.phase == MatchPhase::Waiting {
            // A previous round may have been abandoned mid-fight
            self.reset_players();
            self.start_countdown();
        }
        Ok(slot)
    }

    /// Remove a player. Any unfinished match falls back to waiting; win
    /// counters and round number are kept.
    pub fn remove_player(&mut self, id: &str) -> Option<PlayerState> {
        let slot = self.slot_of(id)?;
        let player = self.players.remove(slot);
        self.inputs.remove(id);

        if self.players.len() < MAX_PLAYERS
            && !matches!(self.phase, MatchPhase::Waiting | MatchPhase::MatchEnd)
        {
            self.set_phase(MatchPhase::Waiting);
        }
        Some(player)
    }

    /// Overwrite the latest input for a player; unknown ids are ignored.
    /// Presses only count while fighting.
    pub fn set_input(&mut self, id: &str, mut input: InputState) -> bool {
        if self.slot_of(id).is_none() {
            return false;
        }
        if self.phase != MatchPhase::Fighting {
            input.consume_edges();
        }
        self.inputs.insert(id.to_string(), input);
        true
    }

    pub fn input_of(&self, id: &str) -> InputState {
        self.inputs.get(id).copied().unwrap_or_default()
    }

    /// Enter the countdown from its full length
    pub fn start_countdown(&mut self) {
        self.countdown = COUNTDOWN_SECONDS;
        self.set_phase(MatchPhase::Countdown);
        self.events.push(MatchEvent::Countdown {
            remaining: self.countdown,
        });
    }

    /// One wall-clock second of countdown. Returns true when fighting begins.
    pub fn countdown_tick(&mut self) -> bool {
        if self.phase != MatchPhase::Countdown {
            return false;
        }
        self.countdown = self.countdown.saturating_sub(1);
        if self.countdown > 0 {
            self.events.push(MatchEvent::Countdown {
                remaining: self.countdown,
            });
            return false;
        }

        self.set_phase(MatchPhase::Fighting);
        self.events.push(MatchEvent::RoundStarted {
            round: self.round_number,
        });
        true
    }

    /// Run one fixed simulation tick of `dt` seconds.
    ///
    /// Every player's action and physics update runs first, then combat over
    /// the post-physics positions, then the round-end check. Only runs while
    /// fighting.
    pub fn step(&mut self, dt: f32) {
        if self.phase != MatchPhase::Fighting {
            return;
        }
        self.tick += 1;

        for player in self.players.iter_mut() {
            let input = self.inputs.get(&player.id).copied().unwrap_or_default();
            ActionSystem::update(player, &input, dt);
            PhysicsSystem::integrate(player, dt);
        }

        for hit in CombatSystem::resolve(&mut self.players) {
            self.events.push(MatchEvent::PlayerHit {
                attacker_id: hit.attacker_id,
                defender_id: hit.defender_id,
                attack: hit.attack,
                blocked: hit.blocked,
                damage: hit.damage,
            });
        }

        self.check_round_end();

        for input in self.inputs.values_mut() {
            input.consume_edges();
        }
    }

    /// Decide the round if a player's health is gone. Only while fighting.
    pub fn check_round_end(&mut self) -> bool {
        if self.phase != MatchPhase::Fighting {
            return false;
        }
        let Some(loser) = self.players.iter().position(|p| p.health <= 0.0) else {
            return false;
        };
        let Some(winner) = (0..self.players.len()).find(|&i| i != loser) else {
            return false;
        };

        self.players[loser].state = ActionState::Dead;
        if winner == 0 {
            self.player1_wins += 1;
        } else {
            self.player2_wins += 1;
        }

        let winner_id = self.players[winner].id.clone();
        self.last_round_winner = Some(winner_id.clone());
        self.set_phase(MatchPhase::RoundEnd);
        self.events.push(MatchEvent::RoundEnded {
            winner_id,
            loser_id: self.players[loser].id.clone(),
            player1_wins: self.player1_wins,
            player2_wins: self.player2_wins,
        });
        true
    }

    /// Resolve the end-of-round delay: end the match or set up the next round
    pub fn finish_round(&mut self) -> MatchPhase {
        if self.phase != MatchPhase::RoundEnd {
            return self.phase;
        }

        if self.player1_wins >= ROUNDS_TO_WIN || self.player2_wins >= ROUNDS_TO_WIN {
            self.set_phase(MatchPhase::MatchEnd);
            self.events.push(MatchEvent::MatchEnded {
                winner_id: self.last_round_winner.clone(),
            });
        } else {
            self.round_number += 1;
            self.reset_players();
            self.start_countdown();
        }
        self.phase
    }

    /// Put every player back on their spawn and clear held inputs
    pub fn reset_players(&mut self) {
        for (slot, player) in self.players.iter_mut().enumerate() {
            player.reset_to_spawn(slot);
        }
        for input in self.inputs.values_mut() {
            *input = InputState {
                sequence: input.sequence,
                ..Default::default()
            };
        }
    }

    /// Take the change records produced since the last drain
    pub fn drain_events(&mut self) -> Vec<MatchEvent> {
        std::mem::take(&mut self.events)
    }

    fn set_phase(&mut self, to: MatchPhase) {
        let from = self.phase;
        if from == to {
            return;
        }
        self.phase = to;
        self.events.push(MatchEvent::PhaseChanged { from, to });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::rules::AttackKind;
    use crate::util::time::tick_delta;

    fn fighting_match() -> MatchState {
        let mut state = MatchState::new();
        state.add_player("p1").unwrap();
        state.add_player("p2").unwrap();
        for _ in 0..COUNTDOWN_SECONDS {
            state.countdown_tick();
        }
        assert_eq!(state.phase, MatchPhase::Fighting);
        state.drain_events();
        state
    }

    /// Put p1 right next to p2, swinging a heavy attack into its active frames
    fn land_heavy(state: &mut MatchState) {
        state.players[0].x = 100.0;
        state.players[1].x = 140.0;
        state.players[1].state = ActionState::Idle;
        state.players[0].state = ActionState::AttackingHeavy;
        state.players[0].current_frame = 7;
        state.step(tick_delta());
    }

    #[test]
    fn second_join_starts_countdown() {
        let mut state = MatchState::new();
        assert_eq!(state.add_player("p1"), Ok(0));
        assert_eq!(state.phase, MatchPhase::Waiting);
        assert_eq!(state.add_player("p2"), Ok(1));
        assert_eq!(state.phase, MatchPhase::Countdown);
        assert_eq!(state.countdown, 3);

        let events = state.drain_events();
        assert!(events.contains(&MatchEvent::PhaseChanged {
            from: MatchPhase::Waiting,
            to: MatchPhase::Countdown
        }));
    }

    #[test]
    fn join_rejections() {
        let mut state = MatchState::new();
        state.add_player("p1").unwrap();
        assert_eq!(state.add_player("p1"), Err(RoomError::AlreadyJoined));
        state.add_player("p2").unwrap();
        assert_eq!(state.add_player("p3"), Err(RoomError::RoomFull));
        assert!(!state.accepts_players());
    }

    #[test]
    fn countdown_reaches_fighting_after_three_seconds() {
        let mut state = MatchState::new();
        state.add_player("p1").unwrap();
        state.add_player("p2").unwrap();
        state.drain_events();

        assert!(!state.countdown_tick());
        assert!(!state.countdown_tick());
        assert_eq!(state.phase, MatchPhase::Countdown);
        assert!(state.countdown_tick());
        assert_eq!(state.phase, MatchPhase::Fighting);
        assert!(state
            .drain_events()
            .contains(&MatchEvent::RoundStarted { round: 1 }));
    }

    #[test]
    fn simulation_idle_outside_fighting() {
        let mut state = MatchState::new();
        state.add_player("p1").unwrap();
        state.add_player("p2").unwrap();
        state.set_input("p1", InputState { right: true, ..Default::default() });
        state.step(tick_delta());
        assert_eq!(state.tick, 0);
        assert_eq!(state.players[0].x, 150.0);
    }

    #[test]
    fn hit_emits_event() {
        let mut state = fighting_match();
        land_heavy(&mut state);
        let events = state.drain_events();
        assert_eq!(
            events,
            vec![MatchEvent::PlayerHit {
                attacker_id: "p1".into(),
                defender_id: "p2".into(),
                attack: AttackKind::Heavy,
                blocked: false,
                damage: 25.0,
            }]
        );
    }

    #[test]
    fn lethal_hit_ends_round_same_tick() {
        let mut state = fighting_match();
        state.players[1].health = 20.0;
        land_heavy(&mut state);

        assert_eq!(state.phase, MatchPhase::RoundEnd);
        assert_eq!(state.player1_wins, 1);
        assert_eq!(state.player2_wins, 0);
        assert_eq!(state.players[1].state, ActionState::Dead);

        let events = state.drain_events();
        assert!(events.contains(&MatchEvent::RoundEnded {
            winner_id: "p1".into(),
            loser_id: "p2".into(),
            player1_wins: 1,
            player2_wins: 0,
        }));
    }

    #[test]
    fn round_flow_resets_players_for_next_round() {
        let mut state = fighting_match();
        state.players[1].health = 10.0;
        state.players[0].stamina = 12.0;
        land_heavy(&mut state);
        assert_eq!(state.phase, MatchPhase::RoundEnd);

        assert_eq!(state.finish_round(), MatchPhase::Countdown);
        assert_eq!(state.round_number, 2);
        assert_eq!(state.countdown, 3);
        assert_eq!(state.players[0], PlayerState::new("p1", 0));
        assert_eq!(state.players[1], PlayerState::new("p2", 1));
        assert_eq!(state.players[0].x, 150.0);
        assert_eq!(state.players[1].x, 650.0);
        assert_eq!(state.player1_wins, 1);
    }

    #[test]
    fn second_round_win_ends_match() {
        let mut state = fighting_match();
        for round in 1..=2 {
            state.players[1].health = 10.0;
            land_heavy(&mut state);
            assert_eq!(state.player1_wins, round);
            state.finish_round();
            if round == 1 {
                for _ in 0..COUNTDOWN_SECONDS {
                    state.countdown_tick();
                }
            }
        }
        assert_eq!(state.phase, MatchPhase::MatchEnd);
        assert!(state.drain_events().contains(&MatchEvent::MatchEnded {
            winner_id: Some("p1".into())
        }));
        assert_eq!(state.add_player("p3"), Err(RoomError::MatchFinished));
    }

    #[test]
    fn second_slot_win_counts_for_player_two() {
        let mut state = fighting_match();
        state.players[0].health = 0.0;
        state.step(tick_delta());
        assert_eq!(state.player2_wins, 1);
        assert_eq!(state.player1_wins, 0);
    }

    #[test]
    fn no_second_death_during_round_end() {
        let mut state = fighting_match();
        state.players[1].health = 0.0;
        state.step(tick_delta());
        assert_eq!(state.phase, MatchPhase::RoundEnd);
        state.drain_events();

        state.players[0].health = 0.0;
        assert!(!state.check_round_end());
        state.step(tick_delta());
        assert_eq!(state.player2_wins, 0);
        assert!(state.drain_events().is_empty());
    }

    #[test]
    fn disconnect_mid_fight_falls_back_to_waiting() {
        let mut state = fighting_match();
        state.players[1].health = 0.0;
        state.step(tick_delta());
        state.finish_round();
        for _ in 0..COUNTDOWN_SECONDS {
            state.countdown_tick();
        }
        state.players[0].health = 40.0;

        let removed = state.remove_player("p2");
        assert!(removed.is_some());
        assert_eq!(state.phase, MatchPhase::Waiting);
        assert_eq!(state.player1_wins, 1);
        assert_eq!(state.round_number, 2);

        state.add_player("p3").unwrap();
        assert_eq!(state.phase, MatchPhase::Countdown);
        assert_eq!(state.players[0].health, 100.0);
        assert_eq!(state.players[1].id, "p3");
        assert_eq!(state.players[1].x, 650.0);
    }

    #[test]
    fn disconnect_during_countdown_cancels_it() {
        let mut state = MatchState::new();
        state.add_player("p1").unwrap();
        state.add_player("p2").unwrap();
        state.remove_player("p1");
        assert_eq!(state.phase, MatchPhase::Waiting);
        assert!(!state.countdown_tick());
        assert_eq!(state.phase, MatchPhase::Waiting);
    }

    #[test]
    fn burst_of_inputs_collapses_to_last() {
        let mut state = fighting_match();
        state.set_input("p1", InputState { light_attack: true, sequence: 1, ..Default::default() });
        state.set_input("p1", InputState { sequence: 2, ..Default::default() });
        state.step(tick_delta());
        assert_eq!(state.players[0].state, ActionState::Idle);
        assert_eq!(state.input_of("p1").sequence, 2);
    }

    #[test]
    fn presses_fire_once_and_holds_persist() {
        let mut state = fighting_match();
        state.set_input("p1", InputState { right: true, light_attack: true, ..Default::default() });
        state.step(tick_delta());
        assert_eq!(state.players[0].state, ActionState::AttackingLight);

        let input = state.input_of("p1");
        assert!(input.right);
        assert!(!input.light_attack);
    }

    #[test]
    fn presses_during_countdown_do_not_carry_into_the_fight() {
        let mut state = MatchState::new();
        state.add_player("p1").unwrap();
        state.add_player("p2").unwrap();
        assert_eq!(state.phase, MatchPhase::Countdown);

        state.set_input(
            "p1",
            InputState { right: true, light_attack: true, dash: true, ..Default::default() },
        );
        let held = state.input_of("p1");
        assert!(held.right);
        assert!(!held.light_attack);
        assert!(!held.dash);

        while !state.countdown_tick() {}
        state.step(tick_delta());
        assert_eq!(state.players[0].state, ActionState::Walking);
        assert_eq!(state.players[0].stamina, state.players[0].max_stamina);
    }

    #[test]
    fn missing_input_is_treated_as_idle() {
        let mut state = fighting_match();
        assert!(!state.set_input("ghost", InputState { left: true, ..Default::default() }));
        state.step(tick_delta());
        assert_eq!(state.players[0].state, ActionState::Idle);
        assert_eq!(state.players[0].x, 150.0);
    }

    #[test]
    fn stamina_and_health_stay_in_range_under_spam() {
        let mut state = fighting_match();
        state.players[0].x = 300.0;
        state.players[1].x = 340.0;
        for tick in 0..600u32 {
            let press = tick % 2 == 0;
            state.set_input("p1", InputState { light_attack: press, ..Default::default() });
            state.set_input("p2", InputState { block: true, heavy_attack: !press, dash: press, ..Default::default() });
            state.step(tick_delta());
            for p in &state.players {
                assert!(p.stamina >= 0.0 && p.stamina <= p.max_stamina);
                assert!(p.health >= 0.0 && p.health <= p.max_health);
            }
            if state.phase != MatchPhase::Fighting {
                break;
            }
        }
    }
}
