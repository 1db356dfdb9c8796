//! Integration tests for the room actor and registry.
//!
//! These drive real room tasks through their handles with seeded
//! generators and paused tokio time, observing exactly what each session
//! would receive on the wire.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use halli_protocol::RoomId;
use halli_room::{
    GameRules, RoomDefaults, RoomError, RoomHandle, RoomRegistry,
    RoomSettings, Tempo,
};
use halli_session::{Session, SessionChannels, SessionRegistry};

// =========================================================================
// Harness
// =========================================================================

fn registries(
    rules: GameRules,
    max_rooms: usize,
) -> (Arc<SessionRegistry>, Arc<RoomRegistry>) {
    let sessions = Arc::new(SessionRegistry::new());
    let rooms = Arc::new(
        RoomRegistry::new(
            Arc::clone(&sessions),
            rules,
            RoomDefaults::default(),
            max_rooms,
        )
        .with_seed(7),
    );
    (sessions, rooms)
}

fn quick_rules() -> GameRules {
    GameRules {
        starting_cards: 5,
        game_time_limit: Duration::from_secs(3600),
        emotion_cooldown: Duration::from_secs(1),
    }
}

fn table(max_players: u8) -> RoomSettings {
    RoomSettings {
        name: "table".into(),
        max_players,
        fruit_variation: 3,
        bell_target: 5,
        tempo: Tempo::Turbo,
    }
}

struct Client {
    session: Arc<Session>,
    channels: SessionChannels,
}

fn client(sessions: &SessionRegistry) -> Client {
    let (session, channels) = sessions.register();
    Client { session, channels }
}

impl Client {
    async fn next_frame(&mut self) -> Value {
        let text = self
            .channels
            .outbound
            .recv()
            .await
            .expect("session outbound closed");
        serde_json::from_str(&text).expect("frame is JSON")
    }

    /// Reads frames until one with the given signal arrives.
    async fn next_with_signal(&mut self, signal: u64) -> Value {
        loop {
            let frame = self.next_frame().await;
            if frame["signal"] == signal {
                return frame;
            }
        }
    }

    async fn join(&self, room: &RoomHandle, name: &str) -> Result<(), RoomError> {
        room.join(Arc::clone(&self.session), name.into()).await
    }
}

/// Lets spawned actors run their teardown before we assert on registry
/// state.
async fn settle() {
    for _ in 0..64 {
        tokio::task::yield_now().await;
    }
}

/// Seats two players and drives the room to PLAYING. Returns the seat
/// index of each client.
async fn start_two_player_game(
    room: &RoomHandle,
    a: &mut Client,
    b: &mut Client,
) -> (u32, u32) {
    a.join(room, "alice").await.unwrap();
    b.join(room, "bob").await.unwrap();

    let start_a = a.next_with_signal(1010).await;
    let start_b = b.next_with_signal(1010).await;
    let seat_a = start_a["data"]["myIndex"].as_u64().unwrap() as u32;
    let seat_b = start_b["data"]["myIndex"].as_u64().unwrap() as u32;

    room.ready(a.session.id()).await.unwrap();
    room.ready(b.session.id()).await.unwrap();
    a.next_with_signal(1011).await;
    b.next_with_signal(1011).await;

    (seat_a, seat_b)
}

// =========================================================================
// Lobby
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_join_emits_enter_room_then_player_count() {
    let (sessions, rooms) = registries(quick_rules(), 6);
    let room = rooms.create(table(3)).unwrap();
    let mut a = client(&sessions);

    a.join(&room, "alice").await.unwrap();

    let enter = a.next_frame().await;
    assert_eq!(enter["signal"], 1001);
    assert_eq!(enter["code"], 200);
    assert_eq!(enter["data"]["roomId"], room.room_id().0);
    assert_eq!(enter["data"]["roomName"], "table");
    assert_eq!(enter["data"]["maxPlayers"], 3);
    assert_eq!(enter["data"]["fruitBellCount"], 5);
    assert_eq!(enter["data"]["gameTempo"], 3);

    let count = a.next_frame().await;
    assert_eq!(count["signal"], 1005);
    assert_eq!(count["data"]["playerCount"], 1);
}

#[tokio::test(start_paused = true)]
async fn test_second_join_updates_everyone() {
    let (sessions, rooms) = registries(quick_rules(), 6);
    let room = rooms.create(table(3)).unwrap();
    let mut a = client(&sessions);
    let mut b = client(&sessions);

    a.join(&room, "alice").await.unwrap();
    b.join(&room, "bob").await.unwrap();

    let count = a.next_with_signal(1005).await;
    assert_eq!(count["data"]["playerCount"], 1);
    let count = a.next_with_signal(1005).await;
    assert_eq!(count["data"]["playerCount"], 2);

    b.next_with_signal(1001).await;
    let count = b.next_with_signal(1005).await;
    assert_eq!(count["data"]["playerCount"], 2);
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_seat_name_is_rejected() {
    let (sessions, rooms) = registries(quick_rules(), 6);
    let room = rooms.create(table(3)).unwrap();
    let a = client(&sessions);
    let b = client(&sessions);

    a.join(&room, "alice").await.unwrap();
    let err = b.join(&room, "alice").await.unwrap_err();
    assert!(matches!(err, RoomError::NameTaken(_)));
}

#[tokio::test(start_paused = true)]
async fn test_leave_empties_and_destroys_room() {
    let (sessions, rooms) = registries(quick_rules(), 6);
    let room = rooms.create(table(3)).unwrap();
    let room_id = room.room_id();
    let mut a = client(&sessions);

    a.join(&room, "alice").await.unwrap();
    room.leave(a.session.id()).await.unwrap();

    let bye = a.next_with_signal(1002).await;
    assert_eq!(bye["code"], 200);
    assert_eq!(a.session.room_id(), None);

    settle().await;
    assert!(rooms.get(room_id).is_none());
    assert_eq!(rooms.count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_leave_when_not_a_member_is_rejected() {
    let (sessions, rooms) = registries(quick_rules(), 6);
    let room = rooms.create(table(3)).unwrap();
    let outsider = client(&sessions);

    let err = room.leave(outsider.session.id()).await.unwrap_err();
    assert!(matches!(err, RoomError::NotInRoom(_)));
}

// =========================================================================
// Game start
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_full_room_auto_starts_with_stable_seats() {
    let (sessions, rooms) = registries(quick_rules(), 6);
    let room = rooms.create(table(2)).unwrap();
    let mut a = client(&sessions);
    let mut b = client(&sessions);

    a.join(&room, "alice").await.unwrap();
    b.join(&room, "bob").await.unwrap();

    let start_a = a.next_with_signal(1010).await;
    let start_b = b.next_with_signal(1010).await;

    assert_eq!(start_a["data"]["playerCount"], 2);
    assert_eq!(start_a["data"]["startingCards"], 5);
    assert_eq!(start_a["data"]["playerNames"], start_b["data"]["playerNames"]);

    let seat_a = start_a["data"]["myIndex"].as_u64().unwrap() as usize;
    let seat_b = start_b["data"]["myIndex"].as_u64().unwrap() as usize;
    assert_ne!(seat_a, seat_b);

    // Each client's seat in the shared name list is its own name.
    assert_eq!(start_a["data"]["playerNames"][seat_a], "alice");
    assert_eq!(start_b["data"]["playerNames"][seat_b], "bob");
}

#[tokio::test(start_paused = true)]
async fn test_join_after_start_is_rejected() {
    let (sessions, rooms) = registries(quick_rules(), 6);
    let room = rooms.create(table(2)).unwrap();
    let a = client(&sessions);
    let b = client(&sessions);
    let late = client(&sessions);

    a.join(&room, "alice").await.unwrap();
    b.join(&room, "bob").await.unwrap();

    let err = late.join(&room, "carol").await.unwrap_err();
    assert!(matches!(err, RoomError::GameInProgress));
}

#[tokio::test(start_paused = true)]
async fn test_ready_before_start_is_rejected() {
    let (sessions, rooms) = registries(quick_rules(), 6);
    let room = rooms.create(table(2)).unwrap();
    let a = client(&sessions);

    a.join(&room, "alice").await.unwrap();
    let err = room.ready(a.session.id()).await.unwrap_err();
    assert!(matches!(err, RoomError::GameNotStarted));
}

#[tokio::test(start_paused = true)]
async fn test_all_ready_starts_the_reveal_loop() {
    let (sessions, rooms) = registries(quick_rules(), 6);
    let room = rooms.create(table(2)).unwrap();
    let mut a = client(&sessions);
    let mut b = client(&sessions);

    start_two_player_game(&room, &mut a, &mut b).await;

    let card = a.next_with_signal(2000).await;
    assert_eq!(card["code"], 200);
    assert!(card["data"]["fruitIndex"].as_i64().unwrap() < 3);
    let count = card["data"]["fruitCount"].as_i64().unwrap();
    assert!((1..=5).contains(&count));
    b.next_with_signal(2000).await;
}

#[tokio::test(start_paused = true)]
async fn test_leave_during_starting_is_rejected() {
    let (sessions, rooms) = registries(quick_rules(), 6);
    let room = rooms.create(table(2)).unwrap();
    let mut a = client(&sessions);
    let mut b = client(&sessions);

    // Filling the roster fixes the seat order; nobody has readied, so
    // the room sits in STARTING. The roster must not shrink now.
    a.join(&room, "alice").await.unwrap();
    b.join(&room, "bob").await.unwrap();
    a.next_with_signal(1010).await;
    b.next_with_signal(1010).await;

    let err = room.leave(a.session.id()).await.unwrap_err();
    assert!(matches!(err, RoomError::GameInProgress));
    // The seat is untouched: readying both still starts the game.
    room.ready(a.session.id()).await.unwrap();
    room.ready(b.session.id()).await.unwrap();
    a.next_with_signal(1011).await;
    b.next_with_signal(1011).await;
}

#[tokio::test(start_paused = true)]
async fn test_leave_during_game_is_rejected() {
    let (sessions, rooms) = registries(quick_rules(), 6);
    let room = rooms.create(table(2)).unwrap();
    let mut a = client(&sessions);
    let mut b = client(&sessions);

    start_two_player_game(&room, &mut a, &mut b).await;

    let err = room.leave(a.session.id()).await.unwrap_err();
    assert!(matches!(err, RoomError::GameInProgress));
}

// =========================================================================
// Bell
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_bell_latch_allows_one_adjudication_per_round() {
    let (sessions, rooms) = registries(quick_rules(), 6);
    let room = rooms.create(table(2)).unwrap();
    let mut a = client(&sessions);
    let mut b = client(&sessions);

    start_two_player_game(&room, &mut a, &mut b).await;
    a.next_with_signal(2000).await;

    room.ring_bell(a.session.id()).await.unwrap();
    let err = room.ring_bell(b.session.id()).await.unwrap_err();
    assert!(matches!(err, RoomError::BellAlreadyRung));

    // Exactly one adjudication frame, then the loop resumes.
    let frame = a.next_frame().await;
    let verdict = frame["signal"].as_u64().unwrap();
    assert!(verdict == 2002 || verdict == 2003);
    let after = a.next_frame().await;
    assert_eq!(after["signal"], 2000);
}

#[tokio::test(start_paused = true)]
async fn test_bell_before_playing_is_rejected() {
    let (sessions, rooms) = registries(quick_rules(), 6);
    let room = rooms.create(table(2)).unwrap();
    let a = client(&sessions);

    a.join(&room, "alice").await.unwrap();
    let err = room.ring_bell(a.session.id()).await.unwrap_err();
    assert!(matches!(err, RoomError::GameNotStarted));
}

#[tokio::test(start_paused = true)]
async fn test_correct_bell_collects_piles_and_conserves_cards() {
    // One fruit kind only: every reveal stacks the same fruit, so the
    // face-up total walks until it hits the target and a correct slap
    // is possible.
    let rules = GameRules {
        starting_cards: 60,
        game_time_limit: Duration::from_secs(3600),
        emotion_cooldown: Duration::from_secs(1),
    };
    let (sessions, rooms) = registries(rules, 6);
    let room = rooms
        .create(RoomSettings {
            name: "scripted".into(),
            max_players: 2,
            fruit_variation: 1,
            bell_target: 5,
            tempo: Tempo::Turbo,
        })
        .unwrap();
    let mut a = client(&sessions);
    let mut b = client(&sessions);

    let (seat_a, _) = start_two_player_game(&room, &mut a, &mut b).await;
    let total = 2 * 60;

    // Track the visible tops from A's frames until one fruit sums to 5.
    let mut tops = [0i64; 2];
    for _ in 0..200 {
        let card = a.next_with_signal(2000).await;
        let seat = card["data"]["playerIndex"].as_u64().unwrap() as usize;
        tops[seat] = card["data"]["fruitCount"].as_i64().unwrap();

        if tops[0] + tops[1] == 5 {
            room.ring_bell(a.session.id()).await.unwrap();
            let correct = a.next_with_signal(2002).await;
            assert_eq!(correct["data"]["playerIndex"], seat_a);
            let hands: Vec<i64> = correct["data"]["playerCards"]
                .as_array()
                .unwrap()
                .iter()
                .map(|v| v.as_i64().unwrap())
                .collect();
            // Payout pulled every face-up card back into hands.
            assert_eq!(hands.iter().sum::<i64>(), total);
            return;
        }
    }
    panic!("face-up total never reached the bell target");
}

#[tokio::test(start_paused = true)]
async fn test_correct_bell_after_time_limit_ends_the_game() {
    let rules = GameRules {
        starting_cards: 60,
        // Expires immediately: the first correct slap ends the game.
        game_time_limit: Duration::ZERO,
        emotion_cooldown: Duration::from_secs(1),
    };
    let (sessions, rooms) = registries(rules, 6);
    let room = rooms
        .create(RoomSettings {
            name: "sudden death".into(),
            max_players: 2,
            fruit_variation: 1,
            bell_target: 5,
            tempo: Tempo::Turbo,
        })
        .unwrap();
    let room_id = room.room_id();
    let mut a = client(&sessions);
    let mut b = client(&sessions);

    start_two_player_game(&room, &mut a, &mut b).await;

    let mut tops = [0i64; 2];
    for _ in 0..200 {
        let card = a.next_with_signal(2000).await;
        let seat = card["data"]["playerIndex"].as_u64().unwrap() as usize;
        tops[seat] = card["data"]["fruitCount"].as_i64().unwrap();

        if tops[0] + tops[1] == 5 {
            room.ring_bell(b.session.id()).await.unwrap();
            a.next_with_signal(2002).await;
            let end = a.next_with_signal(3000).await;
            let ranks: Vec<u64> = end["data"]["playerRanks"]
                .as_array()
                .unwrap()
                .iter()
                .map(|v| v.as_u64().unwrap())
                .collect();
            assert!(ranks.contains(&1));

            settle().await;
            assert!(rooms.get(room_id).is_none());
            assert_eq!(a.session.room_id(), None);
            assert_eq!(b.session.room_id(), None);
            return;
        }
    }
    panic!("face-up total never reached the bell target");
}

// =========================================================================
// Game end by exhaustion
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_exhausted_hands_end_the_game_with_ranks() {
    let rules = GameRules {
        starting_cards: 2,
        game_time_limit: Duration::from_secs(3600),
        emotion_cooldown: Duration::from_secs(1),
    };
    let (sessions, rooms) = registries(rules, 6);
    let room = rooms.create(table(2)).unwrap();
    let mut a = client(&sessions);
    let mut b = client(&sessions);

    start_two_player_game(&room, &mut a, &mut b).await;

    // Four cards total, then the next reveal finds nothing and ends it.
    for _ in 0..4 {
        a.next_with_signal(2000).await;
    }
    let end = a.next_with_signal(3000).await;
    let cards: Vec<i64> = end["data"]["playerCards"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_i64().unwrap())
        .collect();
    // Every face-up pile was returned to its seat before ranking.
    assert_eq!(cards.iter().sum::<i64>(), 4);

    let ranks: Vec<u64> = end["data"]["playerRanks"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_u64().unwrap())
        .collect();
    if cards[0] == cards[1] {
        assert_eq!(ranks, vec![1, 1]);
    } else {
        assert!(ranks.contains(&1) && ranks.contains(&2));
    }
}

// =========================================================================
// Emotions
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_emotion_broadcasts_with_seat_index() {
    let (sessions, rooms) = registries(quick_rules(), 6);
    let room = rooms.create(table(2)).unwrap();
    let mut a = client(&sessions);
    let mut b = client(&sessions);

    let (seat_a, _) = start_two_player_game(&room, &mut a, &mut b).await;

    room.emotion(a.session.id(), 2).await.unwrap();
    let emotion = b.next_with_signal(2004).await;
    assert_eq!(emotion["data"]["playerIndex"], seat_a);
    assert_eq!(emotion["data"]["emotionType"], 2);
}

#[tokio::test(start_paused = true)]
async fn test_emotion_within_cooldown_is_silently_dropped() {
    let (sessions, rooms) = registries(quick_rules(), 6);
    let room = rooms.create(table(2)).unwrap();
    let mut a = client(&sessions);
    let mut b = client(&sessions);

    start_two_player_game(&room, &mut a, &mut b).await;

    room.emotion(a.session.id(), 1).await.unwrap();
    // Second one lands inside the cooldown: accepted, not broadcast.
    room.emotion(a.session.id(), 2).await.unwrap();

    b.next_with_signal(2004).await;
    // Only reveals follow; no second emotion frame is queued.
    let frame = b.next_frame().await;
    assert_eq!(frame["signal"], 2000);
}

// =========================================================================
// Disconnects
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_disconnect_in_lobby_behaves_like_leave() {
    let (sessions, rooms) = registries(quick_rules(), 6);
    let room = rooms.create(table(3)).unwrap();
    let mut a = client(&sessions);
    let b = client(&sessions);

    a.join(&room, "alice").await.unwrap();
    b.join(&room, "bob").await.unwrap();
    a.next_with_signal(1005).await;
    a.next_with_signal(1005).await;

    room.disconnect(b.session.id()).await;
    let count = a.next_with_signal(1005).await;
    assert_eq!(count["data"]["playerCount"], 1);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_mid_game_keeps_the_seat_and_cadence() {
    let (sessions, rooms) = registries(quick_rules(), 6);
    let room = rooms.create(table(2)).unwrap();
    let mut a = client(&sessions);
    let mut b = client(&sessions);

    let (seat_a, seat_b) = start_two_player_game(&room, &mut a, &mut b).await;
    a.next_with_signal(2000).await;

    room.disconnect(b.session.id()).await;

    // No roster change is announced and reveals keep flowing, still
    // addressing both seats.
    let mut seats_seen = Vec::new();
    for _ in 0..4 {
        let frame = a.next_frame().await;
        assert_eq!(frame["signal"], 2000);
        seats_seen.push(frame["data"]["playerIndex"].as_u64().unwrap() as u32);
    }
    assert!(seats_seen.contains(&seat_a));
    assert!(seats_seen.contains(&seat_b));
}

#[tokio::test(start_paused = true)]
async fn test_room_is_destroyed_when_every_player_detaches() {
    let (sessions, rooms) = registries(quick_rules(), 6);
    let room = rooms.create(table(2)).unwrap();
    let room_id = room.room_id();
    let mut a = client(&sessions);
    let mut b = client(&sessions);

    start_two_player_game(&room, &mut a, &mut b).await;

    room.disconnect(a.session.id()).await;
    room.disconnect(b.session.id()).await;

    settle().await;
    assert!(rooms.get(room_id).is_none());
}

// =========================================================================
// Registry
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_fresh_ids_are_one_past_the_highest() {
    let (_sessions, rooms) = registries(quick_rules(), 6);
    let first = rooms.create(table(2)).unwrap();
    let second = rooms.create(table(2)).unwrap();
    assert_eq!(first.room_id(), RoomId(1));
    assert_eq!(second.room_id(), RoomId(2));
}

#[tokio::test(start_paused = true)]
async fn test_room_cap_rejects_creation() {
    let (_sessions, rooms) = registries(quick_rules(), 1);
    rooms.create(table(2)).unwrap();
    let err = rooms.create(table(2)).unwrap_err();
    assert!(matches!(err, RoomError::TooManyRooms));
}

#[tokio::test(start_paused = true)]
async fn test_enter_unknown_id_creates_the_room_implicitly() {
    let (_sessions, rooms) = registries(quick_rules(), 6);
    let handle = rooms.get_or_create(RoomId(7)).unwrap();
    assert_eq!(handle.room_id(), RoomId(7));
    assert!(rooms.get(RoomId(7)).is_some());

    let info = handle.info().await.unwrap();
    assert_eq!(info.name, RoomDefaults::default().name);
}

#[tokio::test(start_paused = true)]
async fn test_playing_rooms_are_hidden_from_the_listing() {
    let (sessions, rooms) = registries(quick_rules(), 6);
    let lobby_room = rooms.create(table(3)).unwrap();
    let game_room = rooms.create(table(2)).unwrap();

    let mut a = client(&sessions);
    let mut b = client(&sessions);
    start_two_player_game(&game_room, &mut a, &mut b).await;

    let listing = rooms.list().await;
    assert_eq!(listing.len(), 1);
    assert_eq!(listing[0].room_id, lobby_room.room_id());
    assert_eq!(listing[0].player_count, 0);
}
