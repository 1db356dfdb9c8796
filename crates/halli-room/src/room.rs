//! Room actor: an isolated tokio task that owns one game table.
//!
//! Each room runs in its own task and communicates with the outside
//! world through an mpsc channel — no shared mutable state, just message
//! passing. Timer-driven work (card reveals, the game time limit) lives
//! in the same `select!` loop as the command channel, so every state
//! mutation is serialized by the actor: a bell slap and a reveal tick
//! can never interleave, and "resetting" a timer is just reassigning its
//! deadline before the next loop iteration.

use std::sync::Arc;

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant};

use halli_protocol::{
    BellCorrectData, BellWrongData, EmotionData, EndGameData, EnterRoomData,
    OpenCardData, PlayerCountChangedData, ResponseFrame, ResponseSignal,
    RoomId, SessionId, StartGameData,
};
use halli_session::{Session, SessionRegistry};

use crate::engine::{BellVerdict, GameState, Reveal};
use crate::{GameRules, Phase, RoomError, RoomSettings};

/// Command channel size per room actor.
const COMMAND_CHANNEL: usize = 64;

/// A snapshot of room metadata for responses and the lobby listing.
#[derive(Debug, Clone)]
pub struct RoomInfo {
    pub room_id: RoomId,
    pub name: String,
    pub phase: Phase,
    pub player_count: usize,
    pub settings: RoomSettings,
}

/// Commands sent to a room actor through its channel.
pub(crate) enum RoomCommand {
    /// Seat a session. On success the actor itself emits the EnterRoom
    /// response followed by PlayerCountChanged, so the joiner observes
    /// them in order.
    Join {
        session: Arc<Session>,
        seat_name: String,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    Leave {
        session: SessionId,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    Ready {
        session: SessionId,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    RingBell {
        session: SessionId,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    Emotion {
        session: SessionId,
        emotion_type: i32,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    /// Transport dropped. No reply — the session is already gone.
    Disconnect { session: SessionId },
    Info {
        reply: oneshot::Sender<RoomInfo>,
    },
}

/// Handle to a running room actor. Cheap to clone.
#[derive(Clone, Debug)]
pub struct RoomHandle {
    room_id: RoomId,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    pub async fn join(
        &self,
        session: Arc<Session>,
        seat_name: String,
    ) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Join {
            session,
            seat_name,
            reply,
        })
        .await
    }

    pub async fn leave(&self, session: SessionId) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Leave { session, reply }).await
    }

    pub async fn ready(&self, session: SessionId) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Ready { session, reply }).await
    }

    pub async fn ring_bell(&self, session: SessionId) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::RingBell { session, reply }).await
    }

    pub async fn emotion(
        &self,
        session: SessionId,
        emotion_type: i32,
    ) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Emotion {
            session,
            emotion_type,
            reply,
        })
        .await
    }

    /// Fire-and-forget: the connection is already gone, nobody awaits
    /// the outcome.
    pub async fn disconnect(&self, session: SessionId) {
        let _ = self.sender.send(RoomCommand::Disconnect { session }).await;
    }

    pub async fn info(&self) -> Result<RoomInfo, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Info { reply: reply_tx })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?;
        reply_rx.await.map_err(|_| RoomError::Unavailable(self.room_id))
    }

    async fn request<F>(&self, make: F) -> Result<(), RoomError>
    where
        F: FnOnce(oneshot::Sender<Result<(), RoomError>>) -> RoomCommand,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(make(reply_tx))
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?;
        reply_rx.await.map_err(|_| RoomError::Unavailable(self.room_id))?
    }
}

// ---------------------------------------------------------------------------
// Actor internals
// ---------------------------------------------------------------------------

/// What the loop should do after handling an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// One seat (or seat-to-be, while in the lobby).
///
/// After the LOBBY→STARTING permutation, a member's index in the roster
/// vector IS its seat index for the rest of the game.
struct Member {
    session: Arc<Session>,
    seat_name: String,
    /// `false` once the transport dropped mid-game. The seat and its
    /// cards stay; events stop flowing to it.
    attached: bool,
    ready: bool,
    last_emotion: Option<Instant>,
}

pub(crate) struct RoomActor {
    room_id: RoomId,
    settings: RoomSettings,
    rules: GameRules,
    sessions: Arc<SessionRegistry>,
    registry: Arc<crate::RoomRegistry>,
    phase: Phase,
    members: Vec<Member>,
    game: Option<GameState>,
    rng: SmallRng,
    /// When the next card turns over. `None` whenever the reveal loop is
    /// not running.
    reveal_at: Option<Instant>,
    /// When the game time limit fires. One-shot.
    game_deadline: Option<Instant>,
}

impl RoomActor {
    async fn run(mut self, mut rx: mpsc::Receiver<RoomCommand>) {
        tracing::info!(room = %self.room_id, name = %self.settings.name, "room actor started");

        loop {
            let reveal_at = self.reveal_at;
            let game_deadline = self.game_deadline;

            let flow = tokio::select! {
                cmd = rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => Flow::Stop,
                },
                _ = time::sleep_until(reveal_at.unwrap_or_else(Instant::now)),
                    if reveal_at.is_some() =>
                {
                    self.on_reveal_due()
                }
                _ = time::sleep_until(game_deadline.unwrap_or_else(Instant::now)),
                    if game_deadline.is_some() =>
                {
                    self.on_game_time_expired();
                    Flow::Continue
                }
            };

            if flow == Flow::Stop {
                break;
            }
        }

        self.registry.forget(self.room_id);
        tracing::info!(room = %self.room_id, "room actor stopped");
    }

    fn handle_command(&mut self, cmd: RoomCommand) -> Flow {
        match cmd {
            RoomCommand::Join {
                session,
                seat_name,
                reply,
            } => {
                let result = self.handle_join(session, seat_name);
                let _ = reply.send(result);
                Flow::Continue
            }
            RoomCommand::Leave { session, reply } => match self.handle_leave(session) {
                Ok(flow) => {
                    let _ = reply.send(Ok(()));
                    flow
                }
                Err(err) => {
                    let _ = reply.send(Err(err));
                    Flow::Continue
                }
            },
            RoomCommand::Ready { session, reply } => {
                let result = self.handle_ready(session);
                let _ = reply.send(result);
                Flow::Continue
            }
            RoomCommand::RingBell { session, reply } => {
                match self.handle_ring_bell(session) {
                    Ok(flow) => {
                        let _ = reply.send(Ok(()));
                        flow
                    }
                    Err(err) => {
                        let _ = reply.send(Err(err));
                        Flow::Continue
                    }
                }
            }
            RoomCommand::Emotion {
                session,
                emotion_type,
                reply,
            } => {
                let result = self.handle_emotion(session, emotion_type);
                let _ = reply.send(result);
                Flow::Continue
            }
            RoomCommand::Disconnect { session } => self.handle_disconnect(session),
            RoomCommand::Info { reply } => {
                let _ = reply.send(self.info());
                Flow::Continue
            }
        }
    }

    // -- joining and leaving ----------------------------------------------

    fn handle_join(
        &mut self,
        session: Arc<Session>,
        seat_name: String,
    ) -> Result<(), RoomError> {
        if !self.phase.is_joinable() {
            return Err(RoomError::GameInProgress);
        }
        if self.members.len() >= usize::from(self.settings.max_players) {
            return Err(RoomError::RoomFull(self.room_id));
        }
        if self.members.iter().any(|m| m.session.id() == session.id()) {
            return Err(RoomError::AlreadyInRoom(session.id()));
        }
        if self.members.iter().any(|m| m.seat_name == seat_name) {
            return Err(RoomError::NameTaken(seat_name));
        }

        session.attach_room(self.room_id, seat_name.clone());

        // The joiner sees its EnterRoom response before the roster
        // update that follows it.
        self.send_to(
            &session,
            ResponseSignal::EnterRoom,
            &EnterRoomData {
                room_id: self.room_id.0,
                room_name: self.settings.name.clone(),
                max_players: self.settings.max_players,
                fruit_variation: self.settings.fruit_variation,
                fruit_bell_count: self.settings.bell_target,
                game_tempo: self.settings.tempo.wire_id(),
            },
        );

        tracing::info!(
            room = %self.room_id,
            session = %session.id(),
            seat = %seat_name,
            players = self.members.len() + 1,
            "player joined"
        );

        self.members.push(Member {
            session,
            seat_name,
            attached: true,
            ready: false,
            last_emotion: None,
        });
        self.broadcast_player_count();

        if self.members.len() == usize::from(self.settings.max_players) {
            self.begin_starting();
        }
        Ok(())
    }

    fn handle_leave(&mut self, session: SessionId) -> Result<Flow, RoomError> {
        let idx = self.member_index(session)?;
        if self.phase != Phase::Lobby {
            return Err(RoomError::GameInProgress);
        }

        let member = self.members.remove(idx);
        member.session.detach_room();
        self.send_empty(&member.session, ResponseSignal::LeaveRoom);

        tracing::info!(
            room = %self.room_id,
            session = %session,
            players = self.members.len(),
            "player left"
        );
        self.broadcast_player_count();

        if self.members.is_empty() {
            tracing::info!(room = %self.room_id, "last player left, destroying room");
            self.phase = Phase::Ended;
            return Ok(Flow::Stop);
        }
        Ok(Flow::Continue)
    }

    // -- game start --------------------------------------------------------

    /// LOBBY→STARTING: fix the seat order by random permutation, deal the
    /// hands, and tell every member its seat.
    fn begin_starting(&mut self) {
        self.phase = Phase::Starting;
        self.members.shuffle(&mut self.rng);
        for member in &mut self.members {
            member.ready = false;
        }
        self.game = Some(GameState::new(
            self.members.len(),
            self.rules.starting_cards,
        ));

        let names: Vec<String> =
            self.members.iter().map(|m| m.seat_name.clone()).collect();
        for (seat, member) in self.members.iter().enumerate() {
            self.send_to(
                &member.session,
                ResponseSignal::StartGame,
                &StartGameData {
                    player_count: self.members.len() as u32,
                    player_names: names.clone(),
                    my_index: seat as u32,
                    starting_cards: self.rules.starting_cards,
                    game_time_limit: self.rules.game_time_limit.as_secs(),
                },
            );
        }

        tracing::info!(
            room = %self.room_id,
            players = self.members.len(),
            cards = self.rules.starting_cards,
            "seats assigned, waiting for ready"
        );
    }

    fn handle_ready(&mut self, session: SessionId) -> Result<(), RoomError> {
        let idx = self.member_index(session)?;
        match self.phase {
            Phase::Starting => {}
            Phase::Lobby => return Err(RoomError::GameNotStarted),
            Phase::Playing | Phase::Ended => {
                return Err(RoomError::GameInProgress)
            }
        }

        self.members[idx].ready = true;
        tracing::info!(
            room = %self.room_id,
            session = %session,
            ready = self.members.iter().filter(|m| m.ready).count(),
            total = self.members.len(),
            "player ready"
        );
        self.maybe_start_playing();
        Ok(())
    }

    /// STARTING→PLAYING once every attached seat has readied.
    fn maybe_start_playing(&mut self) {
        if self.phase != Phase::Starting {
            return;
        }
        let attached: Vec<&Member> =
            self.members.iter().filter(|m| m.attached).collect();
        if attached.is_empty() || !attached.iter().all(|m| m.ready) {
            return;
        }

        self.phase = Phase::Playing;
        let now = Instant::now();
        self.reveal_at = Some(now + self.settings.tempo.interval());
        self.game_deadline = Some(now + self.rules.game_time_limit);
        self.broadcast_empty(ResponseSignal::ReadyGame);
        tracing::info!(room = %self.room_id, "all players ready, reveal loop started");
    }

    // -- the reveal loop ---------------------------------------------------

    fn on_reveal_due(&mut self) -> Flow {
        // Phase guard: a deadline that survived a phase change is stale.
        if self.phase != Phase::Playing {
            self.reveal_at = None;
            return Flow::Continue;
        }
        let outcome = match self.game.as_mut() {
            Some(game) => game.reveal(self.settings.fruit_variation, &mut self.rng),
            None => return Flow::Continue,
        };

        match outcome {
            Reveal::Card { seat, fruit, count } => {
                self.broadcast(
                    ResponseSignal::OpenCard,
                    &OpenCardData {
                        fruit_index: i32::from(fruit),
                        fruit_count: i32::from(count),
                        player_index: seat as u32,
                    },
                );
                tracing::debug!(
                    room = %self.room_id,
                    seat, fruit, count,
                    "card revealed"
                );
                self.reveal_at =
                    Some(Instant::now() + self.settings.tempo.interval());
                Flow::Continue
            }
            Reveal::Exhausted => {
                tracing::info!(room = %self.room_id, "no seat holds cards, ending game");
                self.end_game()
            }
        }
    }

    fn on_game_time_expired(&mut self) {
        self.game_deadline = None;
        if let Some(game) = self.game.as_mut() {
            game.set_time_expired();
        }
        tracing::info!(
            room = %self.room_id,
            "game time limit reached, next correct bell ends the game"
        );
    }

    // -- the bell ----------------------------------------------------------

    fn handle_ring_bell(&mut self, session: SessionId) -> Result<Flow, RoomError> {
        let seat = self.member_index(session)?;
        if self.phase != Phase::Playing {
            return Err(RoomError::GameNotStarted);
        }

        let (verdict, expired) = {
            let game = self.game.as_mut().ok_or(RoomError::GameNotStarted)?;
            if !game.latch_bell() {
                return Err(RoomError::BellAlreadyRung);
            }
            let verdict =
                game.adjudicate(seat, self.settings.bell_target, &mut self.rng);
            (verdict, game.time_expired())
        };

        // The slap stops the pending reveal; the next card comes one full
        // interval after the bell.
        self.reveal_at = Some(Instant::now() + self.settings.tempo.interval());

        match verdict {
            BellVerdict::Correct { hands } => {
                tracing::info!(room = %self.room_id, seat, "bell correct");
                self.broadcast(
                    ResponseSignal::BellCorrect,
                    &BellCorrectData {
                        player_index: seat as u32,
                        player_cards: hands,
                    },
                );
                if expired {
                    tracing::info!(room = %self.room_id, "correct bell after time limit");
                    return Ok(self.end_game());
                }
            }
            BellVerdict::Wrong { received, hands } => {
                tracing::info!(room = %self.room_id, seat, "bell wrong");
                self.broadcast(
                    ResponseSignal::BellWrong,
                    &BellWrongData {
                        player_index: seat as u32,
                        card_given_to: received,
                        player_cards: hands,
                    },
                );
            }
        }
        Ok(Flow::Continue)
    }

    // -- emotions ----------------------------------------------------------

    fn handle_emotion(
        &mut self,
        session: SessionId,
        emotion_type: i32,
    ) -> Result<(), RoomError> {
        let idx = self.member_index(session)?;
        if self.phase != Phase::Playing {
            return Err(RoomError::GameNotStarted);
        }

        let now = Instant::now();
        let member = &mut self.members[idx];
        if let Some(last) = member.last_emotion {
            if now.duration_since(last) < self.rules.emotion_cooldown {
                // Inside the cooldown: dropped without an error reply.
                tracing::debug!(
                    room = %self.room_id,
                    session = %session,
                    "emotion throttled"
                );
                return Ok(());
            }
        }
        member.last_emotion = Some(now);

        self.broadcast(
            ResponseSignal::Emotion,
            &EmotionData {
                player_index: idx as u32,
                emotion_type,
            },
        );
        Ok(())
    }

    // -- disconnects and teardown -------------------------------------------

    fn handle_disconnect(&mut self, session: SessionId) -> Flow {
        let Some(idx) =
            self.members.iter().position(|m| m.session.id() == session)
        else {
            return Flow::Continue;
        };

        match self.phase {
            Phase::Lobby => {
                let member = self.members.remove(idx);
                member.session.detach_room();
                tracing::info!(
                    room = %self.room_id,
                    session = %session,
                    "player disconnected before start"
                );
                self.broadcast_player_count();
                if self.members.is_empty() {
                    tracing::info!(room = %self.room_id, "room emptied, destroying");
                    self.phase = Phase::Ended;
                    return Flow::Stop;
                }
                Flow::Continue
            }
            Phase::Starting | Phase::Playing => {
                // The seat and its cards stay in place; only the event
                // flow to this client stops.
                let member = &mut self.members[idx];
                member.attached = false;
                member.session.detach_room();
                tracing::info!(
                    room = %self.room_id,
                    session = %session,
                    seat = idx,
                    "player detached mid-game, seat retained"
                );

                if self.members.iter().all(|m| !m.attached) {
                    tracing::info!(
                        room = %self.room_id,
                        "all players detached, destroying room"
                    );
                    self.phase = Phase::Ended;
                    return Flow::Stop;
                }
                // A detached seat can no longer ready up.
                self.maybe_start_playing();
                Flow::Continue
            }
            Phase::Ended => Flow::Continue,
        }
    }

    /// PLAYING→ENDED: restore piles, publish the result, release every
    /// seat, and stop the actor.
    fn end_game(&mut self) -> Flow {
        let data = match self.game.as_mut() {
            Some(game) => {
                game.return_piles();
                EndGameData {
                    player_cards: game.hands().to_vec(),
                    player_ranks: game.ranks(),
                }
            }
            None => {
                self.phase = Phase::Ended;
                return Flow::Stop;
            }
        };

        tracing::info!(
            room = %self.room_id,
            cards = ?data.player_cards,
            ranks = ?data.player_ranks,
            "game over"
        );
        self.broadcast(ResponseSignal::EndGame, &data);

        for member in &self.members {
            member.session.detach_room();
        }
        self.members.clear();
        self.game = None;
        self.reveal_at = None;
        self.game_deadline = None;
        self.phase = Phase::Ended;
        Flow::Stop
    }

    // -- helpers -------------------------------------------------------------

    fn member_index(&self, session: SessionId) -> Result<usize, RoomError> {
        self.members
            .iter()
            .position(|m| m.session.id() == session)
            .ok_or(RoomError::NotInRoom(session))
    }

    fn info(&self) -> RoomInfo {
        RoomInfo {
            room_id: self.room_id,
            name: self.settings.name.clone(),
            phase: self.phase,
            player_count: self.members.len(),
            settings: self.settings.clone(),
        }
    }

    fn broadcast<T: serde::Serialize>(&self, signal: ResponseSignal, data: &T) {
        match ResponseFrame::ok(signal, data) {
            Ok(frame) => self.sessions.broadcast_to_room(self.room_id, &frame),
            Err(err) => {
                tracing::error!(room = %self.room_id, error = %err, "broadcast encode failed");
            }
        }
    }

    fn broadcast_empty(&self, signal: ResponseSignal) {
        let frame = ResponseFrame::ok_empty(signal);
        self.sessions.broadcast_to_room(self.room_id, &frame);
    }

    fn broadcast_player_count(&self) {
        self.broadcast(
            ResponseSignal::PlayerCountChanged,
            &PlayerCountChangedData {
                player_count: self.members.len() as u32,
            },
        );
    }

    fn send_to<T: serde::Serialize>(
        &self,
        session: &Session,
        signal: ResponseSignal,
        data: &T,
    ) {
        match ResponseFrame::ok(signal, data) {
            Ok(frame) => {
                session.send(&frame);
            }
            Err(err) => {
                tracing::error!(room = %self.room_id, error = %err, "send encode failed");
            }
        }
    }

    fn send_empty(&self, session: &Session, signal: ResponseSignal) {
        session.send(&ResponseFrame::ok_empty(signal));
    }
}

/// Spawns a new room actor task and returns its handle.
///
/// `seed` fixes the actor's random generator for deterministic tests;
/// production passes `None` and gets OS entropy. The room id is mixed in
/// so two seeded rooms still play different games.
pub(crate) fn spawn_room(
    room_id: RoomId,
    settings: RoomSettings,
    rules: GameRules,
    sessions: Arc<SessionRegistry>,
    registry: Arc<crate::RoomRegistry>,
    seed: Option<u64>,
) -> RoomHandle {
    let (tx, rx) = mpsc::channel(COMMAND_CHANNEL);

    let rng = match seed {
        Some(seed) => SmallRng::seed_from_u64(seed ^ u64::from(room_id.0)),
        None => SmallRng::from_os_rng(),
    };

    let actor = RoomActor {
        room_id,
        settings,
        rules,
        sessions,
        registry,
        phase: Phase::Lobby,
        members: Vec::new(),
        game: None,
        rng,
        reveal_at: None,
        game_deadline: None,
    };

    tokio::spawn(actor.run(rx));

    RoomHandle {
        room_id,
        sender: tx,
    }
}
