//! Integration tests for room actors driven through the `RoomManager`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use linkrace_protocol::{
    ChatMessage, Event, EventBody, EventKind, PlayMode, PlayerId, ROOM_IS_READY, RoomId,
    START_GAME,
};
use linkrace_room::{
    ChatLogic, HistoryStore, MemoryStore, RaceLogic, RoomConfig, RoomError, RoomHandle,
    RoomLogic, RoomManager, RoomPhase, StoreError,
};
use linkrace_session::{SessionReceiver, session_channel};
use linkrace_transport::ConnectionId;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;

// =========================================================================
// Helpers
// =========================================================================

type Manager<L, S> = Mutex<RoomManager<L, S>>;

fn manager<L: RoomLogic, S: HistoryStore>(store: Arc<S>) -> Manager<L, S> {
    Mutex::new(RoomManager::new(store, RoomConfig::default()))
}

fn room(id: &str) -> RoomId {
    RoomId::parse(id).unwrap()
}

fn cid(id: u64) -> ConnectionId {
    ConnectionId::new(id)
}

fn hello(player: &str) -> Event {
    Event::new(
        PlayerId::new(player),
        1,
        EventBody::Hello {
            play_mode: PlayMode::Vs,
        },
    )
}

fn start(player: &str, start_page: &str, goal_page: &str) -> Event {
    Event::new(
        PlayerId::new(player),
        1,
        EventBody::StartRequest {
            start_page: start_page.into(),
            goal_page: goal_page.into(),
        },
    )
}

fn traversed(player: &str, url: &str) -> Event {
    Event::new(PlayerId::new(player), 2, EventBody::Traversed(url.into()))
}

/// Connects a new session and returns its handle and receiver.
async fn join<L: RoomLogic, S: HistoryStore>(
    mgr: &Manager<L, S>,
    room_id: &RoomId,
    id: u64,
) -> (RoomHandle<L>, SessionReceiver) {
    let (tx, rx) = session_channel();
    let handle = RoomManager::connect(mgr, room_id, cid(id), tx).await.unwrap();
    (handle, rx)
}

/// Waits until the actor has processed everything sent before this call.
async fn settle<L: RoomLogic>(handle: &RoomHandle<L>) {
    handle.get_info().await.unwrap();
}

/// Decodes everything already queued on a session.
fn drain<T: DeserializeOwned>(rx: &mut SessionReceiver) -> Vec<T> {
    std::iter::from_fn(|| rx.try_recv().ok())
        .map(|frame| serde_json::from_slice(&frame).unwrap())
        .collect()
}

fn kinds(events: &[Event]) -> Vec<EventKind> {
    events.iter().map(Event::kind).collect()
}

/// A store that can be switched into a failing mode.
#[derive(Default)]
struct FlakyStore {
    inner: MemoryStore,
    fail_puts: AtomicBool,
    fail_gets: AtomicBool,
}

impl HistoryStore for FlakyStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        if self.fail_gets.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::other("store offline")));
        }
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, blob: Vec<u8>) -> Result<(), StoreError> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::other("disk full")));
        }
        self.inner.put(key, blob).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.inner.delete(key).await
    }
}

// =========================================================================
// Ordering and replay
// =========================================================================

#[tokio::test]
async fn test_every_session_sees_same_commit_order() {
    let mgr = manager::<RaceLogic, _>(Arc::new(MemoryStore::new()));
    let r = room("r1");
    let (h1, mut rx1) = join(&mgr, &r, 1).await;
    let (_h2, mut rx2) = join(&mgr, &r, 2).await;

    h1.submit(cid(1), hello("p1")).await.unwrap();
    h1.submit(cid(2), hello("p2")).await.unwrap();
    h1.submit(cid(1), start("p1", "A", "B")).await.unwrap();
    settle(&h1).await;

    let seen1: Vec<Event> = drain(&mut rx1);
    let seen2: Vec<Event> = drain(&mut rx2);
    assert_eq!(seen1, seen2);
    assert_eq!(
        kinds(&seen1),
        vec![
            EventKind::Status,
            EventKind::StartUrl,
            EventKind::GoalUrl,
            EventKind::Traversed,
            EventKind::Traversed,
            EventKind::Command,
        ]
    );
    assert_eq!(seen1[0].body, EventBody::Status(ROOM_IS_READY.into()));
    assert_eq!(seen1[3].player, PlayerId::new("p1"));
    assert_eq!(seen1[4].player, PlayerId::new("p2"));
    assert_eq!(seen1[5].body, EventBody::Command(START_GAME.into()));
}

#[tokio::test]
async fn test_late_join_replays_history_before_live_events() {
    let mgr = manager::<RaceLogic, _>(Arc::new(MemoryStore::new()));
    let r = room("r1");
    let (h1, mut rx1) = join(&mgr, &r, 1).await;
    h1.submit(cid(1), hello("p1")).await.unwrap();
    h1.submit(cid(1), hello("p2")).await.unwrap();
    h1.submit(cid(1), start("p1", "A", "B")).await.unwrap();
    h1.submit(cid(1), traversed("p1", "C")).await.unwrap();
    settle(&h1).await;
    let live: Vec<Event> = drain(&mut rx1);

    let (h3, mut rx3) = join(&mgr, &r, 3).await;
    h3.submit(cid(1), traversed("p1", "D")).await.unwrap();
    settle(&h3).await;

    let seen: Vec<Event> = drain(&mut rx3);
    assert_eq!(&seen[..live.len()], &live[..], "replay must match live order");
    assert_eq!(seen[live.len()..], [traversed("p1", "D")]);
}

#[tokio::test]
async fn test_scrolled_is_live_only() {
    let store = Arc::new(MemoryStore::new());
    let mgr = manager::<RaceLogic, _>(store.clone());
    let r = room("r1");
    let (h1, _rx1) = join(&mgr, &r, 1).await;
    let (_h2, mut rx2) = join(&mgr, &r, 2).await;

    let scroll = Event::new(PlayerId::new("p1"), 5, EventBody::Scrolled("0.25".into()));
    h1.submit(cid(1), scroll.clone()).await.unwrap();
    h1.submit(cid(1), traversed("p1", "A")).await.unwrap();
    settle(&h1).await;

    let live: Vec<Event> = drain(&mut rx2);
    assert_eq!(live, vec![scroll, traversed("p1", "A")]);

    let (_h3, mut rx3) = join(&mgr, &r, 3).await;
    let replayed: Vec<Event> = drain(&mut rx3);
    assert_eq!(replayed, vec![traversed("p1", "A")]);

    let blob = store.get("game/r1").await.unwrap().unwrap();
    let stored: Vec<Event> = serde_json::from_slice(&blob).unwrap();
    assert_eq!(stored, replayed);
}

#[tokio::test]
async fn test_replay_is_idempotent_across_reconnects() {
    let mgr = manager::<RaceLogic, _>(Arc::new(MemoryStore::new()));
    let r = room("r1");
    let (h1, _rx1) = join(&mgr, &r, 1).await;
    h1.submit(cid(1), traversed("p1", "A")).await.unwrap();
    h1.submit(cid(1), traversed("p1", "B")).await.unwrap();
    settle(&h1).await;

    let (h2, mut rx2) = join(&mgr, &r, 2).await;
    let first: Vec<Event> = drain(&mut rx2);
    h2.disconnect(cid(2)).await.unwrap();

    let (_h3, mut rx3) = join(&mgr, &r, 3).await;
    let second: Vec<Event> = drain(&mut rx3);

    assert_eq!(first, second);
    assert_eq!(first.len(), 2);
}

#[tokio::test]
async fn test_rooms_are_isolated() {
    let mgr = manager::<RaceLogic, _>(Arc::new(MemoryStore::new()));
    let (ha, _rxa) = join(&mgr, &room("a"), 1).await;
    let (hb, mut rxb) = join(&mgr, &room("b"), 2).await;

    ha.submit(cid(1), traversed("p1", "A")).await.unwrap();
    settle(&ha).await;
    settle(&hb).await;

    assert!(drain::<Event>(&mut rxb).is_empty());
    assert_eq!(mgr.lock().await.room_count(), 2);
}

#[tokio::test]
async fn test_event_from_unattached_connection_is_ignored() {
    let mgr = manager::<RaceLogic, _>(Arc::new(MemoryStore::new()));
    let r = room("r1");
    let (h1, mut rx1) = join(&mgr, &r, 1).await;

    h1.submit(cid(99), traversed("ghost", "A")).await.unwrap();
    settle(&h1).await;

    assert!(drain::<Event>(&mut rx1).is_empty());
    assert_eq!(h1.get_info().await.unwrap().history_len, 0);
}

#[tokio::test]
async fn test_room_info_reports_roster_and_phase() {
    let mgr = manager::<RaceLogic, _>(Arc::new(MemoryStore::new()));
    let r = room("r1");
    let (h1, _rx1) = join(&mgr, &r, 1).await;
    h1.submit(cid(1), hello("p1")).await.unwrap();
    h1.submit(cid(1), hello("p2")).await.unwrap();

    let info = mgr.lock().await.room_info(&r).await.unwrap();
    assert_eq!(info.phase, Some(RoomPhase::Ready));
    assert_eq!(info.roster, vec![PlayerId::new("p1"), PlayerId::new("p2")]);
    assert_eq!(info.session_count, 1);
    assert_eq!(info.history_len, 1);
}

// =========================================================================
// Persistence
// =========================================================================

#[tokio::test]
async fn test_failed_persist_broadcasts_nothing() {
    let store = Arc::new(FlakyStore::default());
    let mgr = manager::<RaceLogic, _>(store.clone());
    let r = room("r1");
    let (h1, mut rx1) = join(&mgr, &r, 1).await;
    h1.submit(cid(1), hello("p1")).await.unwrap();
    h1.submit(cid(1), hello("p2")).await.unwrap();
    settle(&h1).await;
    assert_eq!(drain::<Event>(&mut rx1).len(), 1);

    store.fail_puts.store(true, Ordering::SeqCst);
    h1.submit(cid(1), start("p1", "A", "B")).await.unwrap();
    settle(&h1).await;

    assert!(drain::<Event>(&mut rx1).is_empty(), "nothing may be broadcast");
    assert_eq!(h1.get_info().await.unwrap().history_len, 1);

    store.fail_puts.store(false, Ordering::SeqCst);
    h1.submit(cid(1), traversed("p1", "X")).await.unwrap();
    settle(&h1).await;
    assert_eq!(drain::<Event>(&mut rx1), vec![traversed("p1", "X")]);
}

#[tokio::test]
async fn test_history_survives_actor_restart() {
    let store = Arc::new(MemoryStore::new());
    let r = room("r1");
    {
        let mgr = manager::<RaceLogic, _>(store.clone());
        let (h1, _rx1) = join(&mgr, &r, 1).await;
        h1.submit(cid(1), traversed("p1", "A")).await.unwrap();
        settle(&h1).await;
        mgr.lock().await.shutdown_all().await;
    }

    let mgr = manager::<RaceLogic, _>(store);
    let (_h, mut rx) = join(&mgr, &r, 2).await;
    assert_eq!(drain::<Event>(&mut rx), vec![traversed("p1", "A")]);
}

#[tokio::test]
async fn test_activation_failure_is_unavailable() {
    let store = Arc::new(FlakyStore::default());
    store.fail_gets.store(true, Ordering::SeqCst);
    let mgr = manager::<RaceLogic, _>(store);

    let (tx, _rx) = session_channel();
    let result = RoomManager::connect(&mgr, &room("r1"), cid(1), tx).await;

    assert!(matches!(result, Err(RoomError::Unavailable(_))));
}

// =========================================================================
// Idle cleanup
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_reconnect_within_grace_keeps_history() {
    let store = Arc::new(MemoryStore::new());
    let mgr = manager::<RaceLogic, _>(store.clone());
    let r = room("r1");

    let (h1, _rx1) = join(&mgr, &r, 1).await;
    h1.submit(cid(1), traversed("p1", "A")).await.unwrap();
    h1.disconnect(cid(1)).await.unwrap();
    assert!(h1.get_info().await.unwrap().cleanup_pending);

    tokio::time::sleep(Duration::from_secs(3)).await;
    let (h2, mut rx2) = join(&mgr, &r, 2).await;
    assert_eq!(drain::<Event>(&mut rx2), vec![traversed("p1", "A")]);

    tokio::time::sleep(Duration::from_secs(3)).await;
    let info = h2.get_info().await.unwrap();
    assert!(!info.cleanup_pending);
    assert_eq!(info.history_len, 1);
    assert!(store.get("game/r1").await.unwrap().is_some());
    assert!(!h1.is_closed(), "same actor keeps serving the room");
}

#[tokio::test(start_paused = true)]
async fn test_idle_room_is_deleted_after_grace() {
    let store = Arc::new(MemoryStore::new());
    let mgr = manager::<RaceLogic, _>(store.clone());
    let r = room("r1");

    let (h1, _rx1) = join(&mgr, &r, 1).await;
    h1.submit(cid(1), hello("p1")).await.unwrap();
    h1.submit(cid(1), traversed("p1", "A")).await.unwrap();
    h1.disconnect(cid(1)).await.unwrap();
    settle(&h1).await;

    tokio::time::sleep(Duration::from_secs(6)).await;

    assert!(store.keys().await.is_empty());
    assert!(h1.is_closed());
    assert_eq!(mgr.lock().await.room_count(), 0);

    // The next connect activates a fresh room.
    let (h2, mut rx2) = join(&mgr, &r, 2).await;
    assert!(drain::<Event>(&mut rx2).is_empty());
    let info = h2.get_info().await.unwrap();
    assert_eq!(info.phase, Some(RoomPhase::Empty));
    assert!(info.roster.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_stopped_rooms_are_dropped_on_next_activation() {
    let mgr = manager::<RaceLogic, _>(Arc::new(MemoryStore::new()));

    for i in 0..50 {
        let r = room(&format!("r{i}"));
        let (handle, _rx) = join(&mgr, &r, i).await;
        handle.disconnect(cid(i)).await.unwrap();
        settle(&handle).await;
    }
    assert_eq!(mgr.lock().await.room_count(), 50);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(mgr.lock().await.room_count(), 0);

    let (_handle, _rx) = join(&mgr, &room("fresh"), 100).await;
    let mgr = mgr.lock().await;
    assert_eq!(mgr.tracked_count(), 1);
    assert_eq!(mgr.room_ids(), vec![room("fresh")]);
}

#[tokio::test(start_paused = true)]
async fn test_cleanup_waits_for_last_session() {
    let store = Arc::new(MemoryStore::new());
    let mgr = manager::<RaceLogic, _>(store.clone());
    let r = room("r1");

    let (h1, _rx1) = join(&mgr, &r, 1).await;
    let (_h2, _rx2) = join(&mgr, &r, 2).await;
    h1.submit(cid(1), traversed("p1", "A")).await.unwrap();
    h1.disconnect(cid(1)).await.unwrap();
    assert!(!h1.get_info().await.unwrap().cleanup_pending);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(store.get("game/r1").await.unwrap().is_some());

    h1.disconnect(cid(2)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(4_900)).await;
    assert!(store.get("game/r1").await.unwrap().is_some());

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(store.get("game/r1").await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_custom_grace_is_honoured() {
    let store = Arc::new(MemoryStore::new());
    let config = RoomConfig {
        cleanup_grace: Duration::from_secs(30),
        ..RoomConfig::default()
    };
    let mgr = Mutex::new(RoomManager::<RaceLogic, _>::new(store.clone(), config));
    let r = room("r1");

    let (h1, _rx1) = join(&mgr, &r, 1).await;
    h1.submit(cid(1), traversed("p1", "A")).await.unwrap();
    h1.disconnect(cid(1)).await.unwrap();

    tokio::time::sleep(Duration::from_secs(20)).await;
    assert!(store.get("game/r1").await.unwrap().is_some());
    tokio::time::sleep(Duration::from_secs(11)).await;
    assert!(store.get("game/r1").await.unwrap().is_none());
}

// =========================================================================
// Chat rooms
// =========================================================================

#[tokio::test]
async fn test_chat_room_keeps_and_replays_messages() {
    let store = Arc::new(MemoryStore::new());
    let mgr = manager::<ChatLogic, _>(store.clone());
    let r = room("lobby");
    let msg = |user: &str, text: &str| ChatMessage {
        user: user.into(),
        message: text.into(),
    };

    let (h1, mut rx1) = join(&mgr, &r, 1).await;
    h1.submit(cid(1), msg("ann", "hi")).await.unwrap();
    h1.submit(cid(1), msg("bob", "yo")).await.unwrap();
    settle(&h1).await;
    assert_eq!(drain::<ChatMessage>(&mut rx1).len(), 2);

    let (_h2, mut rx2) = join(&mgr, &r, 2).await;
    assert_eq!(
        drain::<ChatMessage>(&mut rx2),
        vec![msg("ann", "hi"), msg("bob", "yo")]
    );
    assert_eq!(store.keys().await, vec!["chat/lobby".to_string()]);
}

#[tokio::test]
async fn test_chat_and_race_rooms_share_store_without_collision() {
    let store = Arc::new(MemoryStore::new());
    let races = manager::<RaceLogic, _>(store.clone());
    let chats = manager::<ChatLogic, _>(store.clone());
    let r = room("same");

    let (hr, _rxr) = join(&races, &r, 1).await;
    let (hc, _rxc) = join(&chats, &r, 2).await;
    hr.submit(cid(1), traversed("p1", "A")).await.unwrap();
    hc.submit(
        cid(2),
        ChatMessage {
            user: "ann".into(),
            message: "hi".into(),
        },
    )
    .await
    .unwrap();
    settle(&hr).await;
    settle(&hc).await;

    assert_eq!(
        store.keys().await,
        vec!["chat/same".to_string(), "game/same".to_string()]
    );
}
