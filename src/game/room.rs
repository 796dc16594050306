//! Room actor - owns one match and drives its fixed-tick simulation loop

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{interval, interval_at, sleep_until, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::util::time::{tick_delta, PATCH_TPS, SIMULATION_TPS, TICK_DURATION_MICROS};
use crate::ws::protocol::{RoomSnapshot, ServerMsg};

use super::events::MatchEvent;
use super::r#match::{MatchPhase, MatchState};
use super::rules::ROUND_END_DELAY_MS;
use super::snapshot::{room_snapshot, SnapshotBuilder};
use super::InputState;

/// Room errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    #[error("Room is full")]
    RoomFull,

    #[error("Match has already finished")]
    MatchFinished,

    #[error("Session is already in this room")]
    AlreadyJoined,

    #[error("Room is closed")]
    RoomClosed,
}

impl RoomError {
    /// Stable code for the wire
    pub fn code(&self) -> &'static str {
        match self {
            RoomError::RoomFull => "room_full",
            RoomError::MatchFinished => "match_finished",
            RoomError::AlreadyJoined => "already_joined",
            RoomError::RoomClosed => "room_closed",
        }
    }
}

/// Full room state plus a receiver that starts right after it
#[derive(Debug)]
pub struct RoomSync {
    pub state: RoomSnapshot,
    pub events: broadcast::Receiver<ServerMsg>,
}

/// Reply to a successful join
#[derive(Debug)]
pub struct JoinAck {
    /// Join slot (0 = first joiner)
    pub slot: usize,
    pub state: RoomSnapshot,
    /// Room broadcasts following `state`
    pub events: broadcast::Receiver<ServerMsg>,
}

/// Commands delivered to the room task by sessions
#[derive(Debug)]
pub enum RoomCommand {
    Join {
        session_id: String,
        reply: oneshot::Sender<Result<JoinAck, RoomError>>,
    },
    Input {
        session_id: String,
        input: InputState,
    },
    Leave {
        session_id: String,
    },
    /// Fresh full state for a session whose receiver fell behind
    Resync {
        reply: oneshot::Sender<RoomSync>,
    },
}

/// Handle to a running room
#[derive(Clone)]
pub struct RoomHandle {
    pub id: Uuid,
    pub command_tx: mpsc::Sender<RoomCommand>,
    player_count: Arc<AtomicUsize>,
    accepting: Arc<AtomicBool>,
}

impl RoomHandle {
    pub fn player_count(&self) -> usize {
        self.player_count.load(Ordering::Relaxed)
    }

    /// Whether the room currently has a free slot and an unfinished match
    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::Relaxed) && !self.command_tx.is_closed()
    }

    /// Current full state with a new receiver; replaces a lagged one
    pub async fn resync(&self) -> Result<RoomSync, RoomError> {
        let (reply, reply_rx) = oneshot::channel();
        self.command_tx
            .send(RoomCommand::Resync { reply })
            .await
            .map_err(|_| RoomError::RoomClosed)?;
        reply_rx.await.map_err(|_| RoomError::RoomClosed)
    }

    pub async fn join(&self, session_id: &str) -> Result<JoinAck, RoomError> {
        let (reply, reply_rx) = oneshot::channel();
        self.command_tx
            .send(RoomCommand::Join {
                session_id: session_id.to_string(),
                reply,
            })
            .await
            .map_err(|_| RoomError::RoomClosed)?;
        reply_rx.await.map_err(|_| RoomError::RoomClosed)?
    }

    pub async fn send_input(&self, session_id: &str, input: InputState) -> Result<(), RoomError> {
        self.command_tx
            .send(RoomCommand::Input {
                session_id: session_id.to_string(),
                input,
            })
            .await
            .map_err(|_| RoomError::RoomClosed)
    }

    pub async fn leave(&self, session_id: &str) {
        let _ = self
            .command_tx
            .send(RoomCommand::Leave {
                session_id: session_id.to_string(),
            })
            .await;
    }
}

/// What woke the room loop
enum Wake {
    Command(Option<RoomCommand>),
    Tick,
    CountdownSecond,
    RoundEndElapsed,
}

/// The authoritative game room
pub struct GameRoom {
    id: Uuid,
    state: MatchState,
    command_rx: mpsc::Receiver<RoomCommand>,
    event_tx: broadcast::Sender<ServerMsg>,
    snapshot_builder: SnapshotBuilder,
    player_count: Arc<AtomicUsize>,
    accepting: Arc<AtomicBool>,
    /// Wall-clock countdown, independent of the simulation tick
    countdown_timer: Option<Interval>,
    /// One-shot delay between round end and what follows
    round_end_deadline: Option<Instant>,
    had_players: bool,
}

impl GameRoom {
    /// Create a new room
    pub fn new(id: Uuid) -> (Self, RoomHandle) {
        let (command_tx, command_rx) = mpsc::channel(256);
        let (event_tx, _) = broadcast::channel(128);
        let player_count = Arc::new(AtomicUsize::new(0));
        let accepting = Arc::new(AtomicBool::new(true));

        let handle = RoomHandle {
            id,
            command_tx,
            player_count: player_count.clone(),
            accepting: accepting.clone(),
        };

        let room = Self {
            id,
            state: MatchState::new(),
            command_rx,
            event_tx,
            snapshot_builder: SnapshotBuilder::new(SIMULATION_TPS / PATCH_TPS),
            player_count,
            accepting,
            countdown_timer: None,
            round_end_deadline: None,
            had_players: false,
        };

        (room, handle)
    }

    /// Run the room until its last player leaves
    pub async fn run(mut self) {
        info!(room_id = %self.id, "Room opened");

        let tick_duration = Duration::from_micros(TICK_DURATION_MICROS);
        let mut tick_interval = interval(tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let wake = tokio::select! {
                cmd = self.command_rx.recv() => Wake::Command(cmd),
                _ = tick_interval.tick() => Wake::Tick,
                _ = countdown_second(&mut self.countdown_timer) => Wake::CountdownSecond,
                _ = round_end_elapsed(self.round_end_deadline) => Wake::RoundEndElapsed,
            };

            let is_tick = matches!(wake, Wake::Tick);
            match wake {
                Wake::Command(Some(cmd)) => self.handle_command(cmd),
                Wake::Command(None) => break,
                Wake::Tick => self.state.step(tick_delta()),
                Wake::CountdownSecond => {
                    self.state.countdown_tick();
                }
                Wake::RoundEndElapsed => {
                    self.round_end_deadline = None;
                    self.state.finish_round();
                }
            }

            self.flush_events();
            self.accepting
                .store(self.state.accepts_players(), Ordering::Relaxed);

            if is_tick && self.snapshot_builder.should_send() {
                if let Some(patch) = self.snapshot_builder.build_patch(self.state.tick, &self.state) {
                    let _ = self.event_tx.send(patch);
                }
            }

            if self.had_players && self.state.player_count() == 0 {
                info!(room_id = %self.id, "All players left, closing room");
                break;
            }
        }

        self.accepting.store(false, Ordering::Relaxed);
        info!(room_id = %self.id, rounds = self.state.round_number, "Room closed");
    }

    fn handle_command(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Join { session_id, reply } => {
                let result = self.handle_join(&session_id);
                if let Err(Ok(_)) = reply.send(result) {
                    // Session went away while joining
                    self.handle_leave(&session_id);
                }
            }
            RoomCommand::Input { session_id, input } => {
                if !self.state.set_input(&session_id, input) {
                    debug!(room_id = %self.id, session_id = %session_id, "Input from session not in room");
                }
            }
            RoomCommand::Leave { session_id } => self.handle_leave(&session_id),
            RoomCommand::Resync { reply } => {
                debug!(room_id = %self.id, "Resync requested");
                let _ = reply.send(self.sync());
            }
        }
    }

    /// Snapshot and subscribe in one step so no broadcast falls between them
    fn sync(&self) -> RoomSync {
        RoomSync {
            events: self.event_tx.subscribe(),
            state: room_snapshot(&self.state),
        }
    }

    fn handle_join(&mut self, session_id: &str) -> Result<JoinAck, RoomError> {
        let slot = match self.state.add_player(session_id) {
            Ok(slot) => slot,
            Err(e) => {
                warn!(room_id = %self.id, session_id = %session_id, error = %e, "Join rejected");
                return Err(e);
            }
        };

        self.had_players = true;
        self.player_count
            .store(self.state.player_count(), Ordering::Relaxed);
        self.snapshot_builder.force_next();

        let sync = self.sync();
        let _ = self.event_tx.send(ServerMsg::PlayerJoined {
            session_id: session_id.to_string(),
        });

        info!(
            room_id = %self.id,
            session_id = %session_id,
            slot,
            player_count = self.state.player_count(),
            "Player joined room"
        );

        Ok(JoinAck {
            slot,
            state: sync.state,
            events: sync.events,
        })
    }

    fn handle_leave(&mut self, session_id: &str) {
        let last_sequence = self.state.input_of(session_id).sequence;
        if self.state.remove_player(session_id).is_none() {
            return;
        }
        self.player_count
            .store(self.state.player_count(), Ordering::Relaxed);
        self.snapshot_builder.force_next();

        let _ = self.event_tx.send(ServerMsg::PlayerLeft {
            session_id: session_id.to_string(),
        });

        info!(
            room_id = %self.id,
            session_id = %session_id,
            phase = ?self.state.phase,
            last_sequence,
            "Player left room"
        );
    }

    /// Forward match events to clients and keep timers in step with the phase
    fn flush_events(&mut self) {
        for event in self.state.drain_events() {
            match &event {
                MatchEvent::PhaseChanged { from, to } => {
                    info!(room_id = %self.id, from = ?from, to = ?to, "Phase changed");
                    self.on_phase_entered(*to);
                }
                MatchEvent::RoundEnded {
                    winner_id,
                    player1_wins,
                    player2_wins,
                    ..
                } => {
                    info!(
                        room_id = %self.id,
                        round = self.state.round_number,
                        winner_id = %winner_id,
                        player1_wins,
                        player2_wins,
                        "Round ended"
                    );
                }
                MatchEvent::MatchEnded { winner_id } => {
                    info!(room_id = %self.id, winner_id = ?winner_id, "Match ended");
                }
                MatchEvent::Countdown { remaining } => {
                    debug!(room_id = %self.id, remaining, "Countdown");
                }
                MatchEvent::RoundStarted { .. } | MatchEvent::PlayerHit { .. } => {}
            }

            if let Some(msg) = ServerMsg::from_event(&event) {
                let _ = self.event_tx.send(msg);
            }
        }
    }

    fn on_phase_entered(&mut self, phase: MatchPhase) {
        self.snapshot_builder.force_next();
        match phase {
            MatchPhase::Countdown => {
                let second = Duration::from_secs(1);
                self.countdown_timer = Some(interval_at(Instant::now() + second, second));
                self.round_end_deadline = None;
            }
            MatchPhase::Fighting => {
                self.countdown_timer = None;
            }
            MatchPhase::RoundEnd => {
                self.round_end_deadline =
                    Some(Instant::now() + Duration::from_millis(ROUND_END_DELAY_MS));
            }
            MatchPhase::Waiting | MatchPhase::MatchEnd => {
                self.countdown_timer = None;
                self.round_end_deadline = None;
            }
        }
    }
}

async fn countdown_second(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn round_end_elapsed(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::ActionState;
    use tokio::time::timeout;

    fn spawn_room() -> (RoomHandle, tokio::task::JoinHandle<()>) {
        let (room, handle) = GameRoom::new(Uuid::new_v4());
        let task = tokio::spawn(room.run());
        (handle, task)
    }

    /// Wait for the first message matching `pred`
    async fn recv_until(
        rx: &mut broadcast::Receiver<ServerMsg>,
        pred: impl Fn(&ServerMsg) -> bool,
    ) -> ServerMsg {
        loop {
            match rx.recv().await {
                Ok(msg) if pred(&msg) => return msg,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("room closed"),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_runs_three_wall_clock_seconds() {
        let (handle, _task) = spawn_room();

        let first = handle.join("a").await.unwrap();
        let mut rx = first.events;
        assert_eq!(first.slot, 0);
        assert_eq!(first.state.room.phase, MatchPhase::Waiting);

        let started = Instant::now();
        let second = handle.join("b").await.unwrap();
        assert_eq!(second.slot, 1);
        assert_eq!(second.state.room.phase, MatchPhase::Countdown);
        assert_eq!(second.state.room.countdown, 3);

        let msg = recv_until(&mut rx, |m| matches!(m, ServerMsg::RoundStart { .. })).await;
        assert!(matches!(msg, ServerMsg::RoundStart { round: 1 }));
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(3), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(3100), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn inputs_drive_the_simulation() {
        let (handle, _task) = spawn_room();
        let mut rx = handle.join("a").await.unwrap().events;
        handle.join("b").await.unwrap();
        recv_until(&mut rx, |m| matches!(m, ServerMsg::RoundStart { .. })).await;

        handle
            .send_input("a", InputState { right: true, ..Default::default() })
            .await
            .unwrap();

        let msg = recv_until(&mut rx, |m| match m {
            ServerMsg::StatePatch { players, .. } => players
                .iter()
                .any(|p| p.id == "a" && p.state == Some(ActionState::Walking)),
            _ => false,
        })
        .await;
        assert!(matches!(msg, ServerMsg::StatePatch { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn third_session_is_turned_away() {
        let (handle, _task) = spawn_room();
        handle.join("a").await.unwrap();
        handle.join("b").await.unwrap();
        assert_eq!(handle.join("c").await.unwrap_err(), RoomError::RoomFull);
        assert_eq!(handle.player_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn leaving_mid_countdown_cancels_the_round() {
        let (handle, _task) = spawn_room();
        let mut rx = handle.join("a").await.unwrap().events;
        handle.join("b").await.unwrap();
        handle.leave("b").await;

        recv_until(&mut rx, |m| matches!(m, ServerMsg::PlayerLeft { .. })).await;
        let started = timeout(
            Duration::from_secs(5),
            recv_until(&mut rx, |m| matches!(m, ServerMsg::RoundStart { .. })),
        )
        .await;
        assert!(started.is_err(), "round must not start with one player");
        assert_eq!(handle.player_count(), 1);
        assert!(handle.is_accepting());

        let rejoin = handle.join("c").await.unwrap();
        assert_eq!(rejoin.slot, 1);
        assert_eq!(rejoin.state.room.phase, MatchPhase::Countdown);
    }

    /// Room already fighting, with `b` inside `a`'s light attack reach
    fn spawn_fight(b_health: f32) -> (RoomHandle, tokio::task::JoinHandle<()>) {
        let (mut room, handle) = GameRoom::new(Uuid::new_v4());
        room.state.add_player("a").unwrap();
        room.state.add_player("b").unwrap();
        while !room.state.countdown_tick() {}
        room.state.players[1].x = room.state.players[0].x + 40.0;
        room.state.players[1].health = b_health;
        room.state.drain_events();
        room.had_players = true;
        room.player_count.store(2, Ordering::Relaxed);
        let task = tokio::spawn(room.run());
        (handle, task)
    }

    fn is_countdown_patch(msg: &ServerMsg) -> bool {
        matches!(
            msg,
            ServerMsg::StatePatch { room: Some(room), .. } if room.phase == Some(MatchPhase::Countdown)
        )
    }

    async fn knock_out_b(handle: &RoomHandle, rx: &mut broadcast::Receiver<ServerMsg>) {
        handle
            .send_input("a", InputState { light_attack: true, ..Default::default() })
            .await
            .unwrap();
        let end = recv_until(rx, |m| matches!(m, ServerMsg::RoundEnd { .. })).await;
        assert!(matches!(
            end,
            ServerMsg::RoundEnd { player1_wins: 1, player2_wins: 0, .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn next_round_counts_down_two_seconds_after_a_knockout() {
        let (handle, _task) = spawn_fight(5.0);
        let mut rx = handle.resync().await.unwrap().events;

        knock_out_b(&handle, &mut rx).await;
        let ended_at = Instant::now();

        let early = timeout(
            Duration::from_millis(1990),
            recv_until(&mut rx, is_countdown_patch),
        )
        .await;
        assert!(early.is_err(), "next round started before the delay");

        let patch = recv_until(&mut rx, is_countdown_patch).await;
        let elapsed = ended_at.elapsed();
        assert!(elapsed >= Duration::from_millis(ROUND_END_DELAY_MS), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(ROUND_END_DELAY_MS + 100), "{elapsed:?}");
        match patch {
            ServerMsg::StatePatch { room: Some(room), .. } => {
                assert_eq!(room.round_number, Some(2));
            }
            other => panic!("unexpected message {other:?}"),
        }

        let state = handle.resync().await.unwrap().state;
        assert_eq!(state.room.phase, MatchPhase::Countdown);
        assert_eq!(state.room.round_number, 2);
        assert_eq!(state.room.player1_wins, 1);
        let spawn: Vec<(f32, f32, ActionState)> =
            state.players.iter().map(|p| (p.x, p.health, p.state)).collect();
        assert_eq!(
            spawn,
            vec![(150.0, 100.0, ActionState::Idle), (650.0, 100.0, ActionState::Idle)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn leaving_during_round_end_delay_cancels_next_round() {
        let (handle, _task) = spawn_fight(5.0);
        let mut rx = handle.resync().await.unwrap().events;

        knock_out_b(&handle, &mut rx).await;
        handle.leave("b").await;
        recv_until(&mut rx, |m| matches!(m, ServerMsg::PlayerLeft { .. })).await;

        let next = timeout(Duration::from_secs(3), recv_until(&mut rx, is_countdown_patch)).await;
        assert!(next.is_err(), "round must not restart with one player");

        let state = handle.resync().await.unwrap().state;
        assert_eq!(state.room.phase, MatchPhase::Waiting);
        assert_eq!(state.room.round_number, 1);
        assert_eq!(state.room.player1_wins, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn join_receiver_starts_at_the_snapshot() {
        let (handle, _task) = spawn_room();
        handle.join("a").await.unwrap();
        let mut ack = handle.join("b").await.unwrap();
        assert_eq!(ack.state.players.len(), 2);

        match ack.events.try_recv() {
            Ok(ServerMsg::PlayerJoined { session_id }) => assert_eq!(session_id, "b"),
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn room_closes_after_last_player_leaves() {
        let (handle, task) = spawn_room();
        handle.join("a").await.unwrap();
        handle.leave("a").await;

        timeout(Duration::from_secs(1), task)
            .await
            .expect("room task should exit")
            .unwrap();
        assert!(!handle.is_accepting());
        assert_eq!(handle.join("b").await.unwrap_err(), RoomError::RoomClosed);
    }
}
