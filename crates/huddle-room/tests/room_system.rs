//! Integration tests for registries and room actors.
//!
//! Commands to one room are processed in mailbox order, so awaiting
//! `RoomHandle::info` after a fire-and-forget command guarantees every
//! frame that command produced is already on the members' queues.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use huddle_protocol::{
    BulletId, ChatMessage, ClientFrame, ClientId, Identity, Member, PlayerSlot, Point, RoomId,
    ServerFrame, SignalFrame, SignalKind,
};
use huddle_room::{
    Admission, ChatStore, ClientHandle, MemoryChatStore, NoopChatStore, OutboundQueue, RoomConfig, RoomError,
    RoomHandle, RoomKind, RoomRegistry, StoreError,
};
use serde_json::json;
use tokio::sync::Barrier;

// =========================================================================
// Helpers
// =========================================================================

fn chat_rooms() -> RoomRegistry<NoopChatStore> {
    RoomRegistry::new(RoomKind::Chat, RoomConfig::default(), NoopChatStore)
}

fn game_rooms() -> RoomRegistry<NoopChatStore> {
    RoomRegistry::new(RoomKind::Game, RoomConfig::default(), NoopChatStore)
}

fn rid(id: &str) -> RoomId {
    RoomId::new(id)
}

fn cid(id: &str) -> ClientId {
    ClientId::new(id)
}

struct Joined {
    room: RoomHandle,
    admission: Admission,
    queue: OutboundQueue,
    id: ClientId,
}

impl Joined {
    async fn send(&self, frame: ClientFrame) {
        self.room
            .dispatch(self.id.clone(), self.admission.ticket, frame)
            .await
            .unwrap();
    }

    async fn leave(&self) {
        self.room
            .unregister(self.id.clone(), self.admission.ticket)
            .await
            .unwrap();
    }

    /// Everything queued for this member right now.
    fn drain(&mut self) -> Vec<ServerFrame> {
        let mut frames = Vec::new();
        while let Some(frame) = self.queue.try_recv() {
            frames.push((*frame).clone());
        }
        frames
    }
}

async fn join<S: ChatStore>(registry: &RoomRegistry<S>, room: &str, id: &str) -> Joined {
    let (room, admission, queue) = registry
        .join(&rid(room), Identity::new(id, id.to_uppercase()))
        .await
        .unwrap();
    Joined {
        room,
        admission,
        queue,
        id: cid(id),
    }
}

fn member(id: &str) -> Member {
    Member {
        id: cid(id),
        name: id.to_uppercase(),
    }
}

fn member_ids(members: &[Member]) -> Vec<&str> {
    members.iter().map(|m| m.id.as_str()).collect()
}

fn chat(text: &str) -> ClientFrame {
    ClientFrame::Chat { text: text.into() }
}

fn signal(to: Option<&str>) -> ClientFrame {
    ClientFrame::Signal(SignalFrame {
        kind: SignalKind::Offer,
        to: to.map(cid),
        payload: json!({"sdp": "v=0"}),
    })
}

async fn wait_until_reclaimed<S: ChatStore>(registry: &RoomRegistry<S>, room: &str) {
    for _ in 0..200 {
        if registry.get(&rid(room)).await.is_none() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("room {room} was never reclaimed");
}

// =========================================================================
// Registry
// =========================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_resolve_creates_one_room() {
    const CALLERS: usize = 32;
    let registry = chat_rooms();
    let start = Arc::new(Barrier::new(CALLERS));

    let mut tasks = Vec::new();
    for _ in 0..CALLERS {
        let registry = registry.clone();
        let start = start.clone();
        tasks.push(tokio::spawn(async move {
            start.wait().await;
            registry.resolve(&RoomId::new("room-A")).await.generation()
        }));
    }

    let mut generations = Vec::new();
    for task in tasks {
        generations.push(task.await.unwrap());
    }
    generations.sort_unstable();
    generations.dedup();

    assert_eq!(generations.len(), 1, "every caller sees the same actor");
    assert_eq!(registry.room_count().await, 1);
}

#[tokio::test]
async fn test_rooms_are_isolated() {
    let registry = chat_rooms();
    let mut a = join(&registry, "r1", "a").await;
    let mut b = join(&registry, "r2", "b").await;
    a.drain();
    b.drain();

    a.send(chat("only r1")).await;
    a.room.info().await.unwrap();
    b.room.info().await.unwrap();

    assert!(b.drain().is_empty());
    assert_eq!(registry.room_count().await, 2);
}

#[tokio::test]
async fn test_get_does_not_create() {
    let registry = chat_rooms();
    assert!(registry.get(&rid("nope")).await.is_none());
    assert_eq!(registry.room_count().await, 0);
}

// =========================================================================
// Registration
// =========================================================================

#[tokio::test]
async fn test_membership_is_registers_minus_unregisters() {
    let registry = chat_rooms();
    let x = join(&registry, "r1", "x").await;
    let y = join(&registry, "r1", "y").await;
    let z = join(&registry, "r1", "z").await;

    y.leave().await;
    y.leave().await; // no-op

    let info = x.room.info().await.unwrap();
    assert_eq!(member_ids(&info.members), ["x", "z"]);
    assert_eq!(z.room.member_count(), 2);
}

#[tokio::test]
async fn test_end_to_end_scenario() {
    let registry = chat_rooms();

    // X into an empty room: snapshot with nobody else.
    let mut x = join(&registry, "r1", "x").await;
    match x.drain().as_slice() {
        [ServerFrame::Snapshot { you, members, history, game }] => {
            assert_eq!(*you, member("x"));
            assert!(members.is_empty());
            assert!(history.is_empty());
            assert!(game.is_none());
        }
        other => panic!("expected snapshot, got {other:?}"),
    }

    // Y joins: X hears about it, Y's snapshot lists X.
    let mut y = join(&registry, "r1", "y").await;
    assert_eq!(x.drain(), vec![ServerFrame::MemberJoined { member: member("y") }]);
    match y.drain().as_slice() {
        [ServerFrame::Snapshot { members, .. }] => assert_eq!(member_ids(members), ["x"]),
        other => panic!("expected snapshot, got {other:?}"),
    }

    // X says hi: both receive the log ending with it.
    x.send(chat("hi")).await;
    x.room.info().await.unwrap();
    for frames in [x.drain(), y.drain()] {
        match frames.as_slice() {
            [ServerFrame::ChatLog { messages }] => {
                let last = messages.last().unwrap();
                assert_eq!(last.sender, cid("x"));
                assert_eq!(last.text, "hi");
            }
            other => panic!("expected chat log, got {other:?}"),
        }
    }

    // Y leaves: X is told, Y's queue closes.
    y.leave().await;
    x.room.info().await.unwrap();
    assert_eq!(x.drain(), vec![ServerFrame::MemberLeft { member: member("y") }]);
    assert!(y.queue.recv().await.is_none());
    assert!(registry.get(&rid("r1")).await.is_some());

    // X leaves: the room goes away.
    x.leave().await;
    wait_until_reclaimed(&registry, "r1").await;
    assert!(x.queue.recv().await.is_none());
}

#[tokio::test]
async fn test_reclaimed_room_is_recreated_fresh() {
    let registry = chat_rooms();
    let x = join(&registry, "r1", "x").await;
    let first = x.room.generation();
    x.send(chat("before")).await;
    x.leave().await;
    wait_until_reclaimed(&registry, "r1").await;

    assert!(matches!(x.room.info().await, Err(RoomError::Unavailable(_))));

    let mut again = join(&registry, "r1", "x").await;
    assert_ne!(again.room.generation(), first);
    match again.drain().as_slice() {
        [ServerFrame::Snapshot { history, .. }] => assert!(history.is_empty()),
        other => panic!("expected snapshot, got {other:?}"),
    }
}

#[tokio::test]
async fn test_register_behind_last_leave_is_refused_then_rejoins_fresh() {
    let registry = chat_rooms();
    let x = join(&registry, "r1", "x").await;
    let first = x.room.generation();

    // Both commands are queued before the actor handles either.
    x.leave().await;
    let (client, _queue) = ClientHandle::new(Identity::new("y", "Y"), 8);
    let refused = x.room.register(client).await;
    assert!(matches!(refused, Err(RoomError::Unavailable(_))));
    assert!(x.room.is_closed());

    let y = join(&registry, "r1", "y").await;
    assert_ne!(y.room.generation(), first);
    let info = y.room.info().await.unwrap();
    assert_eq!(member_ids(&info.members), ["y"]);
    assert_eq!(registry.room_count().await, 1);
}

#[tokio::test]
async fn test_duplicate_identity_replaces_connection() {
    let registry = chat_rooms();
    let mut first = join(&registry, "r1", "x").await;
    let mut second = join(&registry, "r1", "x").await;

    assert_ne!(first.admission.ticket, second.admission.ticket);
    assert!(matches!(first.drain().as_slice(), [ServerFrame::Snapshot { .. }]));
    assert!(first.queue.recv().await.is_none(), "old connection closed");
    assert!(matches!(second.drain().as_slice(), [ServerFrame::Snapshot { .. }]));

    // The old connection going away does not remove the new one.
    first.leave().await;
    first.send(chat("ghost")).await;
    let info = second.room.info().await.unwrap();
    assert_eq!(member_ids(&info.members), ["x"]);
    assert_eq!(info.history_len, 0);
}

// =========================================================================
// Chat and signaling
// =========================================================================

#[tokio::test]
async fn test_chat_reaches_only_current_members() {
    let registry = chat_rooms();
    let mut x = join(&registry, "r1", "x").await;
    let mut y = join(&registry, "r1", "y").await;
    let mut z = join(&registry, "r1", "z").await;
    z.leave().await;
    x.send(chat("after z left")).await;
    x.room.info().await.unwrap();

    assert!(x.drain().iter().any(|f| matches!(f, ServerFrame::ChatLog { .. })));
    assert!(y.drain().iter().any(|f| matches!(f, ServerFrame::ChatLog { .. })));
    assert!(!z.drain().iter().any(|f| matches!(f, ServerFrame::ChatLog { .. })));
}

#[tokio::test]
async fn test_chat_log_is_cumulative() {
    let registry = chat_rooms();
    let mut x = join(&registry, "r1", "x").await;
    x.send(chat("one")).await;
    x.send(chat("two")).await;
    let info = x.room.info().await.unwrap();
    assert_eq!(info.history_len, 2);

    let last = x.drain().pop().unwrap();
    let ServerFrame::ChatLog { messages } = last else {
        panic!("expected chat log, got {last:?}");
    };
    let texts: Vec<_> = messages.iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, ["one", "two"]);
    assert_eq!(messages[0].name, "X");
}

#[tokio::test]
async fn test_direct_signal_reaches_target_only() {
    let registry = chat_rooms();
    let mut x = join(&registry, "r1", "x").await;
    let mut y = join(&registry, "r1", "y").await;
    let mut z = join(&registry, "r1", "z").await;
    x.drain();
    y.drain();
    z.drain();

    x.send(signal(Some("y"))).await;
    x.room.info().await.unwrap();

    match y.drain().as_slice() {
        [ServerFrame::Signal { kind, from, to, payload }] => {
            assert_eq!(*kind, SignalKind::Offer);
            assert_eq!(*from, cid("x"));
            assert_eq!(*to, Some(cid("y")));
            assert_eq!(payload["sdp"], "v=0");
        }
        other => panic!("expected signal, got {other:?}"),
    }
    assert!(x.drain().is_empty());
    assert!(z.drain().is_empty());
}

#[tokio::test]
async fn test_signal_to_absent_target_is_dropped() {
    let registry = chat_rooms();
    let mut x = join(&registry, "r1", "x").await;
    let mut y = join(&registry, "r1", "y").await;
    x.drain();
    y.drain();

    x.send(signal(Some("ghost"))).await;
    let info = x.room.info().await.unwrap();

    assert!(x.drain().is_empty());
    assert!(y.drain().is_empty());
    assert_eq!(info.members.len(), 2);
}

#[tokio::test]
async fn test_untargeted_signal_goes_to_everyone_else() {
    let registry = chat_rooms();
    let mut x = join(&registry, "r1", "x").await;
    let mut y = join(&registry, "r1", "y").await;
    let mut z = join(&registry, "r1", "z").await;
    x.drain();
    y.drain();
    z.drain();

    x.send(signal(None)).await;
    x.room.info().await.unwrap();

    assert!(x.drain().is_empty());
    assert_eq!(y.drain().len(), 1);
    assert_eq!(z.drain().len(), 1);
}

#[tokio::test]
async fn test_game_frames_ignored_in_chat_room() {
    let registry = chat_rooms();
    let mut x = join(&registry, "r1", "x").await;
    x.drain();

    x.send(ClientFrame::Move(Point::new(1.0, 2.0))).await;
    x.send(ClientFrame::Fire(Point::new(1.0, 2.0))).await;
    let info = x.room.info().await.unwrap();

    assert!(x.drain().is_empty());
    assert_eq!(info.bullets, 0);
}

// =========================================================================
// Backpressure
// =========================================================================

#[tokio::test]
async fn test_full_queue_evicts_member() {
    let registry = RoomRegistry::new(
        RoomKind::Chat,
        RoomConfig {
            outbound_capacity: 2,
            ..RoomConfig::default()
        },
        NoopChatStore,
    );

    // X never reads: snapshot + member-joined fill its queue.
    let mut x = join(&registry, "r1", "x").await;
    let mut y = join(&registry, "r1", "y").await;
    y.drain();

    y.send(chat("flood")).await;
    let info = y.room.info().await.unwrap();

    assert_eq!(member_ids(&info.members), ["y"]);
    let frames = y.drain();
    assert!(matches!(frames[0], ServerFrame::ChatLog { .. }));
    assert_eq!(frames[1], ServerFrame::MemberLeft { member: member("x") });

    // X still gets what was queued before the eviction, then the end.
    assert_eq!(x.drain().len(), 2);
    assert!(x.queue.recv().await.is_none());
}

#[tokio::test]
async fn test_dropped_queue_evicts_member_on_next_delivery() {
    let registry = chat_rooms();
    let x = join(&registry, "r1", "x").await;
    let mut y = join(&registry, "r1", "y").await;
    y.drain();

    let Joined { queue, .. } = x;
    drop(queue);

    y.send(chat("anyone?")).await;
    let info = y.room.info().await.unwrap();
    assert_eq!(member_ids(&info.members), ["y"]);
}

// =========================================================================
// Persistence
// =========================================================================

fn stored(text: &str) -> ChatMessage {
    ChatMessage {
        sender: cid("old"),
        name: "OLD".into(),
        text: text.into(),
        sent_at: Utc::now(),
    }
}

#[tokio::test]
async fn test_history_loaded_and_appended() {
    let store = MemoryChatStore::new();
    store.seed(rid("r1"), vec![stored("from yesterday")]);
    let registry = RoomRegistry::new(RoomKind::Chat, RoomConfig::default(), store.clone());

    let mut x = join(&registry, "r1", "x").await;
    match x.drain().as_slice() {
        [ServerFrame::Snapshot { history, .. }] => assert_eq!(history[0].text, "from yesterday"),
        other => panic!("expected snapshot, got {other:?}"),
    }

    x.send(chat("today")).await;
    x.room.info().await.unwrap();
    let texts: Vec<_> = store.messages(&rid("r1")).into_iter().map(|m| m.text).collect();
    assert_eq!(texts, ["from yesterday", "today"]);
}

struct BrokenStore;

impl ChatStore for BrokenStore {
    async fn load(&self, _room_id: &RoomId) -> Result<Vec<ChatMessage>, StoreError> {
        Err(StoreError::Unavailable("down".into()))
    }

    async fn append(&self, _room_id: &RoomId, _message: &ChatMessage) -> Result<(), StoreError> {
        Err(StoreError::Rejected("read only".into()))
    }
}

#[tokio::test]
async fn test_failing_store_does_not_block_chat() {
    let registry = RoomRegistry::new(RoomKind::Chat, RoomConfig::default(), BrokenStore);
    let mut x = join(&registry, "r1", "x").await;
    x.drain();

    x.send(chat("still delivered")).await;
    x.room.info().await.unwrap();

    match x.drain().as_slice() {
        [ServerFrame::ChatLog { messages }] => assert_eq!(messages[0].text, "still delivered"),
        other => panic!("expected chat log, got {other:?}"),
    }
}

// =========================================================================
// Game rooms
// =========================================================================

fn game_slot(frames: &[ServerFrame]) -> (PlayerSlot, bool) {
    match frames.first() {
        Some(ServerFrame::Snapshot { game: Some(game), .. }) => (game.slot, game.state.ready),
        other => panic!("expected game snapshot, got {other:?}"),
    }
}

#[tokio::test]
async fn test_game_slots_and_capacity() {
    let registry = game_rooms();

    let mut a = join(&registry, "g1", "a").await;
    assert_eq!(a.admission.slot, Some(PlayerSlot::One));
    assert_eq!(game_slot(&a.drain()), (PlayerSlot::One, false));

    let mut b = join(&registry, "g1", "b").await;
    assert_eq!(b.admission.slot, Some(PlayerSlot::Two));
    assert_eq!(game_slot(&b.drain()), (PlayerSlot::Two, true));

    let frames = a.drain();
    assert!(frames.contains(&ServerFrame::MemberJoined { member: member("b") }));
    assert!(frames.iter().any(|f| matches!(f, ServerFrame::GameState(view) if view.ready)));

    let refused = registry.join(&rid("g1"), Identity::new("c", "C")).await;
    assert!(matches!(refused, Err(RoomError::RoomFull(_))));

    // A's slot frees up for the next player.
    a.leave().await;
    let c = join(&registry, "g1", "c").await;
    assert_eq!(c.admission.slot, Some(PlayerSlot::One));
}

#[tokio::test]
async fn test_move_broadcasts_full_state() {
    let registry = game_rooms();
    let mut a = join(&registry, "g1", "a").await;
    let mut b = join(&registry, "g1", "b").await;
    a.drain();
    b.drain();

    b.send(ClientFrame::Move(Point::new(300.0, 60.0))).await;
    a.room.info().await.unwrap();

    for frames in [a.drain(), b.drain()] {
        let view = frames
            .iter()
            .find_map(|f| match f {
                ServerFrame::GameState(view) => Some(*view),
                _ => None,
            })
            .expect("game state broadcast");
        assert_eq!(view.player2, Point::new(300.0, 60.0));
        assert_eq!(view.player1, Point::new(100.0, 500.0));
    }
}

fn created_ids(frames: &[ServerFrame]) -> Vec<BulletId> {
    frames
        .iter()
        .filter_map(|f| match f {
            ServerFrame::BulletCreated(b) => Some(b.id),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_bullet_ids_strictly_increase() {
    let registry = game_rooms();
    let mut a = join(&registry, "g1", "a").await;
    a.drain();

    for _ in 0..3 {
        a.send(ClientFrame::Fire(Point::new(400.0, 300.0))).await;
    }
    a.room.info().await.unwrap();

    let ids = created_ids(&a.drain());
    assert_eq!(ids.len(), 3);
    assert!(ids.windows(2).all(|w| w[0] < w[1]));
}

#[tokio::test(start_paused = true)]
async fn test_bullet_leaving_arena_removed_once() {
    let registry = game_rooms();
    let mut a = join(&registry, "g1", "a").await;
    a.drain();

    a.send(ClientFrame::Fire(Point::new(400.0, 53.0))).await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    let info = a.room.info().await.unwrap();

    let frames = a.drain();
    let id = created_ids(&frames)[0];
    let removals = frames
        .iter()
        .filter(|f| **f == ServerFrame::BulletRemoved { id })
        .count();
    assert_eq!(removals, 1);
    assert_eq!(info.bullets, 0);
}

#[tokio::test(start_paused = true)]
async fn test_collision_reports_hit_then_removal() {
    let registry = game_rooms();
    let mut a = join(&registry, "g1", "a").await;
    let b = join(&registry, "g1", "b").await;
    a.drain();

    // B's paddle is at (100, 50); one step puts this at (120, 95).
    a.send(ClientFrame::Fire(Point::new(120.0, 100.0))).await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    b.room.info().await.unwrap();

    let frames = a.drain();
    let id = created_ids(&frames)[0];
    let hit = frames
        .iter()
        .position(|f| *f == ServerFrame::Hit { slot: PlayerSlot::Two, bullet: id })
        .expect("hit reported");
    let removed = frames
        .iter()
        .position(|f| *f == ServerFrame::BulletRemoved { id })
        .expect("removal reported");
    assert_eq!(removed, hit + 1);
    assert!(!frames.iter().any(|f| matches!(f, ServerFrame::BulletUpdated(b) if b.id == id)));
}
