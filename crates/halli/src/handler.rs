//! Per-connection handling: the read pump, the write pump, and signal
//! dispatch.
//!
//! Each accepted socket gets one task running [`handle_connection`]. It
//! upgrades to a websocket, registers a session, greets the client, and
//! splits into:
//!
//! - a **write pump** task that drains the session's bounded outbound
//!   queue (10s deadline per write) and pings the client every 54s, and
//! - a **read pump** in the current task with a 512-byte frame cap and a
//!   60s idle deadline that only a pong from the client extends.
//!
//! When either pump ends, the session is unregistered exactly once and
//! its room (if any) is told about the disconnect.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::{self, Instant};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use halli_protocol::{
    decode_request, CreateAccountData, CreateAccountRequest,
    CreateRoomData, CreateRoomRequest, EnterRoomRequest, HelloData,
    LoginData, LoginRequest, PongData, Request, RequestSignal,
    ResponseFrame, ResponseSignal, RoomId, RoomListData, RoomSummary,
};
use halli_room::{RoomError, RoomHandle, RoomSettings, Tempo};
use halli_session::{AccountStore, Session, SessionChannels};

use crate::server::AppState;
use crate::ServerError;

/// Largest accepted inbound frame, in bytes.
const MAX_FRAME_BYTES: usize = 512;

/// Idle read deadline; reset by each pong from the client.
const READ_IDLE: Duration = Duration::from_secs(60);

/// Keepalive ping cadence. Must be shorter than [`READ_IDLE`].
const PING_INTERVAL: Duration = Duration::from_secs(54);

/// Per-write deadline; a peer that cannot take a frame in this long is
/// dropped.
const WRITE_DEADLINE: Duration = Duration::from_secs(10);

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;
type WsStream = SplitStream<WebSocketStream<TcpStream>>;

/// Handles one connection from websocket upgrade to teardown.
pub(crate) async fn handle_connection<A: AccountStore>(
    stream: TcpStream,
    peer: SocketAddr,
    state: Arc<AppState<A>>,
) -> Result<(), ServerError> {
    let ws = tokio_tungstenite::accept_async(stream).await?;
    let (sink, ws_reader) = ws.split();

    let (session, channels) = state.sessions.register();
    tracing::info!(session = %session.id(), %peer, "client connected");

    // Greeting on the Pong signal, carrying the client's id.
    send_ok(
        &session,
        ResponseSignal::Pong,
        &HelloData {
            client_id: session.id().to_string(),
            message: "connection established".into(),
        },
    );

    let close_signal = channels.closed.clone();
    let writer = tokio::spawn(write_pump(sink, channels));

    read_pump(ws_reader, close_signal, &session, &state).await;

    // Teardown: the room learns about the drop, the registry forgets the
    // session (idempotent), and the write pump winds down.
    let room_id = session.room_id();
    state.sessions.unregister(session.id());
    if let Some(room_id) = room_id {
        if let Some(room) = state.rooms.get(room_id) {
            room.disconnect(session.id()).await;
        }
    }
    let _ = writer.await;

    tracing::info!(session = %session.id(), "client disconnected");
    Ok(())
}

// ---------------------------------------------------------------------------
// Pumps
// ---------------------------------------------------------------------------

/// Drains the outbound queue onto the socket and keeps the peer alive
/// with periodic pings.
async fn write_pump(mut sink: WsSink, mut channels: SessionChannels) {
    // First ping one interval from now, not immediately.
    let mut ping = time::interval_at(
        Instant::now() + PING_INTERVAL,
        PING_INTERVAL,
    );

    loop {
        tokio::select! {
            frame = channels.outbound.recv() => match frame {
                Some(text) => {
                    let write = sink.send(Message::Text(text.into()));
                    match time::timeout(WRITE_DEADLINE, write).await {
                        Ok(Ok(())) => {}
                        Ok(Err(err)) => {
                            tracing::debug!(error = %err, "write failed");
                            break;
                        }
                        Err(_) => {
                            tracing::warn!("write deadline exceeded, dropping peer");
                            break;
                        }
                    }
                }
                None => break,
            },
            _ = channels.closed.changed() => {
                if *channels.closed.borrow() {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            }
            _ = ping.tick() => {
                let write = sink.send(Message::Ping(Vec::new().into()));
                match time::timeout(WRITE_DEADLINE, write).await {
                    Ok(Ok(())) => {}
                    _ => {
                        tracing::debug!("keepalive ping failed, dropping peer");
                        break;
                    }
                }
            }
        }
    }

    let _ = sink.close().await;
}

/// Reads frames until the peer goes quiet, misbehaves, or disconnects.
async fn read_pump<A: AccountStore>(
    mut reader: WsStream,
    mut close_signal: tokio::sync::watch::Receiver<bool>,
    session: &Arc<Session>,
    state: &Arc<AppState<A>>,
) {
    let mut deadline = Instant::now() + READ_IDLE;

    loop {
        tokio::select! {
            msg = reader.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    if text.len() > MAX_FRAME_BYTES {
                        tracing::warn!(session = %session.id(), "frame over size cap");
                        break;
                    }
                    dispatch(text.as_bytes(), session, state).await;
                }
                Some(Ok(Message::Binary(data))) => {
                    if data.len() > MAX_FRAME_BYTES {
                        tracing::warn!(session = %session.id(), "frame over size cap");
                        break;
                    }
                    dispatch(&data, session, state).await;
                }
                Some(Ok(Message::Pong(_))) => {
                    deadline = Instant::now() + READ_IDLE;
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {} // ping/frame: nothing to do
                Some(Err(err)) => {
                    tracing::debug!(session = %session.id(), error = %err, "read error");
                    break;
                }
            },
            _ = time::sleep_until(deadline) => {
                tracing::info!(session = %session.id(), "read idle deadline reached");
                break;
            }
            _ = close_signal.changed() => {
                if *close_signal.borrow() {
                    break;
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

async fn dispatch<A: AccountStore>(
    raw: &[u8],
    session: &Arc<Session>,
    state: &Arc<AppState<A>>,
) {
    let request = match decode_request(raw) {
        Ok(request) => request,
        Err(failure) => {
            tracing::debug!(
                session = %session.id(),
                echo = failure.echo_signal,
                error = %failure.error,
                "rejected frame"
            );
            session.send(&ResponseFrame::error(failure.echo_signal));
            return;
        }
    };

    match request {
        Request::Ping => handle_ping(session),
        Request::GetRoomList => handle_room_list(session, state).await,
        Request::EnterRoom(req) => handle_enter_room(req, session, state).await,
        Request::CreateRoom(req) => {
            handle_create_room(req, session, state).await
        }
        Request::LeaveRoom => handle_leave_room(session, state).await,
        Request::ReadyGame => {
            let outcome = match member_room(session, state) {
                Ok(room) => room.ready(session.id()).await,
                Err(err) => Err(err),
            };
            reply_room_outcome(session, RequestSignal::ReadyGame, outcome);
        }
        Request::RingBell => {
            let outcome = match member_room(session, state) {
                Ok(room) => room.ring_bell(session.id()).await,
                Err(err) => Err(err),
            };
            reply_room_outcome(session, RequestSignal::RingBell, outcome);
        }
        Request::Emotion(req) => {
            let outcome = match member_room(session, state) {
                Ok(room) => room.emotion(session.id(), req.emotion_type).await,
                Err(err) => Err(err),
            };
            reply_room_outcome(session, RequestSignal::Emotion, outcome);
        }
        Request::CreateAccount(req) => {
            handle_create_account(req, session, state).await
        }
        Request::Login(req) => handle_login(req, session, state).await,
    }
}

fn handle_ping(session: &Session) {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    send_ok(session, ResponseSignal::Pong, &PongData { timestamp });
}

async fn handle_room_list<A: AccountStore>(
    session: &Session,
    state: &Arc<AppState<A>>,
) {
    let rooms = state
        .rooms
        .list()
        .await
        .into_iter()
        .map(|info| RoomSummary {
            room_id: info.room_id.0,
            room_name: info.name,
            player_count: info.player_count as u32,
            max_player_count: info.settings.max_players,
            fruit_variation: info.settings.fruit_variation,
            fruit_count: info.settings.bell_target,
            speed: info.settings.tempo.wire_id(),
        })
        .collect();
    send_ok(session, ResponseSignal::RoomList, &RoomListData { rooms });
}

async fn handle_enter_room<A: AccountStore>(
    req: EnterRoomRequest,
    session: &Arc<Session>,
    state: &Arc<AppState<A>>,
) {
    if session.room_id().is_some() {
        tracing::debug!(session = %session.id(), "enter refused: already in a room");
        reply_error(session, RequestSignal::EnterRoom);
        return;
    }

    let room = match state.rooms.get_or_create(RoomId(req.room_id)) {
        Ok(room) => room,
        Err(err) => {
            tracing::warn!(session = %session.id(), error = %err, "enter failed");
            reply_error(session, RequestSignal::EnterRoom);
            return;
        }
    };

    join_room(&room, session, RequestSignal::EnterRoom).await;
}

async fn handle_create_room<A: AccountStore>(
    req: CreateRoomRequest,
    session: &Arc<Session>,
    state: &Arc<AppState<A>>,
) {
    if session.room_id().is_some() {
        tracing::debug!(session = %session.id(), "create refused: already in a room");
        reply_error(session, RequestSignal::CreateRoom);
        return;
    }
    // The codec pins the protocol range; the configured bounds can
    // narrow it further.
    if !state.player_range.contains(&req.max_player_count) {
        tracing::debug!(
            session = %session.id(),
            requested = req.max_player_count,
            "create refused: player count outside configured bounds"
        );
        reply_error(session, RequestSignal::CreateRoom);
        return;
    }

    // `speed` was range-checked by the codec.
    let Some(tempo) = Tempo::from_wire(req.speed) else {
        reply_error(session, RequestSignal::CreateRoom);
        return;
    };
    let settings = RoomSettings {
        name: req.room_name,
        max_players: req.max_player_count,
        fruit_variation: req.fruit_variation,
        bell_target: req.fruit_count,
        tempo,
    };

    let room = match state.rooms.create(settings) {
        Ok(room) => room,
        Err(err) => {
            tracing::warn!(session = %session.id(), error = %err, "create failed");
            reply_error(session, RequestSignal::CreateRoom);
            return;
        }
    };

    // The create response first, then the enter flow (the actor emits
    // the EnterRoom response itself).
    send_ok(
        session,
        ResponseSignal::CreateRoom,
        &CreateRoomData {
            room_id: room.room_id().0,
        },
    );
    join_room(&room, session, RequestSignal::CreateRoom).await;
}

/// Seats the session, with the login nickname as the seat name when one
/// exists and a synthesised one otherwise.
async fn join_room(
    room: &RoomHandle,
    session: &Arc<Session>,
    echo: RequestSignal,
) {
    let seat_name = session.nickname().unwrap_or_else(|| {
        use rand::Rng;
        format!("Player{:04}", rand::rng().random_range(0..10_000))
    });

    if let Err(err) = room.join(Arc::clone(session), seat_name).await {
        tracing::warn!(
            session = %session.id(),
            room = %room.room_id(),
            error = %err,
            "join failed"
        );
        reply_error(session, echo);
    }
}

async fn handle_leave_room<A: AccountStore>(
    session: &Arc<Session>,
    state: &Arc<AppState<A>>,
) {
    let outcome = match member_room(session, state) {
        Ok(room) => room.leave(session.id()).await,
        Err(err) => Err(err),
    };
    // The room actor sends the success response itself.
    reply_room_outcome(session, RequestSignal::LeaveRoom, outcome);
}

async fn handle_create_account<A: AccountStore>(
    req: CreateAccountRequest,
    session: &Session,
    state: &Arc<AppState<A>>,
) {
    match state
        .accounts
        .create_account(&req.id, &req.nickname, &req.password)
        .await
    {
        Ok(()) => {
            send_ok(
                session,
                ResponseSignal::CreateAccount,
                &CreateAccountData { id: req.id },
            );
        }
        Err(err) => {
            tracing::warn!(session = %session.id(), error = %err, "create account failed");
            reply_error(session, RequestSignal::CreateAccount);
        }
    }
}

async fn handle_login<A: AccountStore>(
    req: LoginRequest,
    session: &Session,
    state: &Arc<AppState<A>>,
) {
    match state.accounts.login(&req.id, &req.password).await {
        Ok(identity) => {
            session.set_account(identity.id.clone(), identity.nickname.clone());
            send_ok(
                session,
                ResponseSignal::Login,
                &LoginData {
                    id: identity.id,
                    nickname: identity.nickname,
                },
            );
        }
        Err(err) => {
            tracing::warn!(session = %session.id(), error = %err, "login failed");
            reply_error(session, RequestSignal::Login);
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Resolves the room the session currently sits in.
fn member_room<A: AccountStore>(
    session: &Session,
    state: &Arc<AppState<A>>,
) -> Result<RoomHandle, RoomError> {
    let room_id = session
        .room_id()
        .ok_or(RoomError::NotInRoom(session.id()))?;
    state
        .rooms
        .get(room_id)
        .ok_or(RoomError::NotFound(room_id))
}

/// Logs a room-op failure and sends the 400 echo. Successes need no
/// direct reply here — the room actor emits whatever the operation
/// produces.
fn reply_room_outcome(
    session: &Session,
    echo: RequestSignal,
    outcome: Result<(), RoomError>,
) {
    if let Err(err) = outcome {
        tracing::debug!(session = %session.id(), signal = %echo, error = %err, "room op failed");
        reply_error(session, echo);
    }
}

fn send_ok<T: serde::Serialize>(
    session: &Session,
    signal: ResponseSignal,
    data: &T,
) {
    match ResponseFrame::ok(signal, data) {
        Ok(frame) => {
            session.send(&frame);
        }
        Err(err) => {
            tracing::error!(session = %session.id(), error = %err, "encode failed");
        }
    }
}

fn reply_error(session: &Session, echo: RequestSignal) {
    session.send(&ResponseFrame::error(echo.wire_id()));
}
