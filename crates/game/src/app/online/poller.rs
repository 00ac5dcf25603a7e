//! Background presence poller.
//!
//! One named thread talks to the [`OnlineService`]; the simulation only
//! touches [`SharedOnline`], whose single mutex is held for a copy or a
//! swap and never across network I/O.

use std::collections::VecDeque;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::service::{ChatMessage, OnlineError, OnlineService, PlayerId, PlayerUpdate, RemotePlayer};

pub const POLL_INTERVAL: Duration = Duration::from_millis(20);
pub const JOIN_TIMEOUT: Duration = Duration::from_secs(2);
pub const CHAT_FETCH_LIMIT: usize = 50;
pub const CHAT_HISTORY_LIMIT: usize = 100;

const POLLER_THREAD_NAME: &str = "online-poller";

/// Everything the simulation reads from the network side.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OnlineSnapshot {
    pub roster: Vec<RemotePlayer>,
    pub chat: VecDeque<ChatMessage>,
    pub last_chat_id: u64,
}

#[derive(Debug, Default)]
struct Outbox {
    position: Option<PlayerUpdate>,
    chat: VecDeque<String>,
}

#[derive(Debug, Default)]
struct SharedState {
    snapshot: OnlineSnapshot,
    outbox: Outbox,
}

/// Cloneable handle on the state shared between the poller and the
/// simulation.
#[derive(Debug, Clone, Default)]
pub struct SharedOnline {
    inner: Arc<Mutex<SharedState>>,
}

impl SharedOnline {
    fn lock(&self) -> MutexGuard<'_, SharedState> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("online state lock poisoned; recovered inner value");
                poisoned.into_inner()
            }
        }
    }

    pub fn snapshot(&self) -> OnlineSnapshot {
        self.lock().snapshot.clone()
    }

    pub fn roster(&self) -> Vec<RemotePlayer> {
        self.lock().snapshot.roster.clone()
    }

    /// At most the last `limit` messages, oldest first.
    pub fn recent_chat(&self, limit: usize) -> Vec<ChatMessage> {
        let state = self.lock();
        let chat = &state.snapshot.chat;
        chat.iter()
            .skip(chat.len().saturating_sub(limit))
            .cloned()
            .collect()
    }

    /// Replaces any position not yet sent; only the newest one matters.
    pub fn queue_position(&self, update: PlayerUpdate) {
        self.lock().outbox.position = Some(update);
    }

    pub fn queue_chat(&self, text: impl Into<String>) {
        self.lock().outbox.chat.push_back(text.into());
    }

    pub(crate) fn replace_roster(&self, roster: Vec<RemotePlayer>) {
        self.lock().snapshot.roster = roster;
    }

    /// Appends messages newer than the last seen id and trims the history.
    pub(crate) fn merge_chat(&self, messages: Vec<ChatMessage>) -> usize {
        let mut state = self.lock();
        let snapshot = &mut state.snapshot;
        let mut added = 0;
        for message in messages {
            if message.id <= snapshot.last_chat_id {
                continue;
            }
            snapshot.last_chat_id = message.id;
            snapshot.chat.push_back(message);
            added += 1;
        }
        while snapshot.chat.len() > CHAT_HISTORY_LIMIT {
            snapshot.chat.pop_front();
        }
        added
    }

    fn take_outbox(&self) -> Outbox {
        std::mem::take(&mut self.lock().outbox)
    }
}

/// Warns on the first failure of a streak and when it ends; the failures
/// in between are only debug events, so a dead server does not flood the
/// log at the poll rate.
#[derive(Debug, Default)]
struct FailureStreak {
    failures: u32,
}

impl FailureStreak {
    fn record<T>(&mut self, operation: &'static str, result: Result<T, OnlineError>) -> Option<T> {
        match result {
            Ok(value) => {
                if self.failures > 0 {
                    info!(operation, failures = self.failures, "online_recovered");
                    self.failures = 0;
                }
                Some(value)
            }
            Err(error) => {
                if self.failures == 0 {
                    warn!(operation, error = %error, "online_request_failed");
                } else {
                    debug!(operation, error = %error, "online_request_failed");
                }
                self.failures = self.failures.saturating_add(1);
                None
            }
        }
    }
}

#[derive(Debug, Default)]
struct PollHealth {
    post: FailureStreak,
    roster: FailureStreak,
    chat: FailureStreak,
}

/// One poll cycle: flush the outbox, then refresh roster and chat. Failed
/// calls leave the shared snapshot as it was.
fn poll_once(
    service: &dyn OnlineService,
    local_id: Option<PlayerId>,
    shared: &SharedOnline,
    health: &mut PollHealth,
) {
    let outbox = shared.take_outbox();
    match local_id {
        Some(id) => {
            if let Some(update) = outbox.position {
                health
                    .post
                    .record("post_position", service.post_position(&update));
            }
            for text in outbox.chat {
                health.post.record("post_chat", service.post_chat(id, &text));
            }
        }
        None if outbox.position.is_some() || !outbox.chat.is_empty() => {
            debug!("online_outbox_dropped_unregistered");
        }
        None => {}
    }

    if let Some(roster) = health.roster.record("get_roster", service.get_roster()) {
        let remote = roster
            .into_iter()
            .filter(|(id, _)| Some(*id) != local_id)
            .map(|(id, mut player)| {
                player.id = id;
                player
            })
            .collect();
        shared.replace_roster(remote);
    }

    if let Some(mut messages) = health.chat.record("get_chat", service.get_chat()) {
        if messages.len() > CHAT_FETCH_LIMIT {
            messages.drain(..messages.len() - CHAT_FETCH_LIMIT);
        }
        shared.merge_chat(messages);
    }
}

/// Owns the poller thread. Dropping it stops the thread.
pub struct OnlinePoller {
    shared: SharedOnline,
    local_id: Option<PlayerId>,
    stop_tx: Option<mpsc::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl OnlinePoller {
    /// Registers once, then starts polling every `interval`. A failed
    /// registration is logged; the poller still runs but cannot post.
    pub fn start(service: Box<dyn OnlineService>, interval: Duration) -> Result<Self, OnlineError> {
        let local_id = match service.register() {
            Ok(id) => {
                info!(player_id = id, "online_registered");
                Some(id)
            }
            Err(error) => {
                warn!(error = %error, "online_registration_failed");
                None
            }
        };

        let shared = SharedOnline::default();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let thread_shared = shared.clone();
        let handle = thread::Builder::new()
            .name(POLLER_THREAD_NAME.to_string())
            .spawn(move || {
                let mut health = PollHealth::default();
                debug!(interval_ms = interval.as_millis() as u64, "online_poller_started");
                loop {
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                    poll_once(service.as_ref(), local_id, &thread_shared, &mut health);
                }
                debug!("online_poller_exited");
            })
            .map_err(OnlineError::Spawn)?;

        Ok(Self {
            shared,
            local_id,
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }

    pub fn shared(&self) -> SharedOnline {
        self.shared.clone()
    }

    pub fn local_id(&self) -> Option<PlayerId> {
        self.local_id
    }

    /// Signals the thread and waits up to [`JOIN_TIMEOUT`]. Returns false
    /// when the thread did not finish in time; it is then left detached.
    pub fn stop(&mut self) -> bool {
        self.stop_with_timeout(JOIN_TIMEOUT)
    }

    fn stop_with_timeout(&mut self, timeout: Duration) -> bool {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        let Some(handle) = self.handle.take() else {
            return true;
        };

        let deadline = Instant::now() + timeout;
        while !handle.is_finished() {
            if Instant::now() >= deadline {
                warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "online_poller_stop_timeout"
                );
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
        if handle.join().is_err() {
            warn!("online_poller_panicked");
        }
        info!("online_poller_stopped");
        true
    }
}

impl Drop for OnlinePoller {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;

    #[derive(Default)]
    struct FakeState {
        roster: BTreeMap<PlayerId, RemotePlayer>,
        chat: Vec<ChatMessage>,
        fail_reads: bool,
        posted_positions: Vec<PlayerUpdate>,
        posted_chat: Vec<(PlayerId, String)>,
        roster_calls: u32,
    }

    #[derive(Clone, Default)]
    struct FakeService {
        state: Arc<Mutex<FakeState>>,
        register_fails: bool,
    }

    impl FakeService {
        fn with<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
            f(&mut self.state.lock().expect("fake lock"))
        }
    }

    fn unavailable() -> OnlineError {
        OnlineError::Status {
            url: "fake".to_string(),
            status: 503,
        }
    }

    impl OnlineService for FakeService {
        fn register(&self) -> Result<PlayerId, OnlineError> {
            if self.register_fails {
                Err(unavailable())
            } else {
                Ok(1)
            }
        }

        fn post_position(&self, update: &PlayerUpdate) -> Result<(), OnlineError> {
            self.with(|state| state.posted_positions.push(update.clone()));
            Ok(())
        }

        fn get_roster(&self) -> Result<BTreeMap<PlayerId, RemotePlayer>, OnlineError> {
            self.with(|state| {
                state.roster_calls += 1;
                if state.fail_reads {
                    Err(unavailable())
                } else {
                    Ok(state.roster.clone())
                }
            })
        }

        fn post_chat(&self, id: PlayerId, text: &str) -> Result<(), OnlineError> {
            self.with(|state| state.posted_chat.push((id, text.to_string())));
            Ok(())
        }

        fn get_chat(&self) -> Result<Vec<ChatMessage>, OnlineError> {
            self.with(|state| {
                if state.fail_reads {
                    Err(unavailable())
                } else {
                    Ok(state.chat.clone())
                }
            })
        }
    }

    fn remote(id: PlayerId, value: f32) -> RemotePlayer {
        RemotePlayer {
            id,
            x: value,
            y: value,
            map: format!("map{value}"),
            direction: None,
            sprite: "character/ow1.png".to_string(),
            is_moving: true,
        }
    }

    fn message(id: u64, sender: PlayerId, text: &str) -> ChatMessage {
        ChatMessage {
            id,
            sender,
            text: text.to_string(),
        }
    }

    fn update(id: PlayerId, x: f32) -> PlayerUpdate {
        PlayerUpdate {
            id,
            x,
            y: 0.0,
            map: "map.tmx".to_string(),
            direction: None,
            sprite: None,
        }
    }

    #[test]
    fn roster_excludes_local_player_and_tags_ids() {
        let service = FakeService::default();
        service.with(|state| {
            state.roster.insert(1, remote(0, 1.0));
            state.roster.insert(2, remote(0, 2.0));
            state.roster.insert(5, remote(0, 5.0));
        });
        let shared = SharedOnline::default();
        poll_once(&service, Some(1), &shared, &mut PollHealth::default());

        let ids: Vec<_> = shared.roster().iter().map(|player| player.id).collect();
        assert_eq!(ids, vec![2, 5]);
    }

    #[test]
    fn failed_fetch_keeps_previous_snapshot() {
        let service = FakeService::default();
        service.with(|state| {
            state.roster.insert(2, remote(2, 2.0));
            state.chat.push(message(1, 2, "hello"));
        });
        let shared = SharedOnline::default();
        let mut health = PollHealth::default();
        poll_once(&service, Some(1), &shared, &mut health);
        let before = shared.snapshot();

        service.with(|state| {
            state.fail_reads = true;
            state.roster.clear();
        });
        poll_once(&service, Some(1), &shared, &mut health);
        poll_once(&service, Some(1), &shared, &mut health);

        assert_eq!(shared.snapshot(), before);
        assert_eq!(health.roster.failures, 2);
    }

    #[test]
    fn outbox_sends_latest_position_and_all_chat() {
        let service = FakeService::default();
        let shared = SharedOnline::default();
        shared.queue_position(update(1, 10.0));
        shared.queue_position(update(1, 20.0));
        shared.queue_chat("hi");
        shared.queue_chat("bye");
        poll_once(&service, Some(1), &shared, &mut PollHealth::default());

        service.with(|state| {
            assert_eq!(state.posted_positions, vec![update(1, 20.0)]);
            assert_eq!(
                state.posted_chat,
                vec![(1, "hi".to_string()), (1, "bye".to_string())]
            );
        });

        poll_once(&service, Some(1), &shared, &mut PollHealth::default());
        service.with(|state| assert_eq!(state.posted_positions.len(), 1));
    }

    #[test]
    fn unregistered_client_posts_nothing() {
        let service = FakeService::default();
        let shared = SharedOnline::default();
        shared.queue_position(update(-1, 1.0));
        shared.queue_chat("hello?");
        poll_once(&service, None, &shared, &mut PollHealth::default());
        service.with(|state| {
            assert!(state.posted_positions.is_empty());
            assert!(state.posted_chat.is_empty());
            assert_eq!(state.roster_calls, 1);
        });
    }

    #[test]
    fn chat_skips_seen_ids_and_stays_bounded() {
        let shared = SharedOnline::default();
        assert_eq!(
            shared.merge_chat(vec![message(1, 2, "a"), message(2, 3, "b")]),
            2
        );
        assert_eq!(
            shared.merge_chat(vec![message(2, 3, "b"), message(3, 2, "c")]),
            1
        );
        assert_eq!(shared.snapshot().last_chat_id, 3);

        shared.merge_chat((4..=150).map(|id| message(id, 2, "spam")).collect());
        let snapshot = shared.snapshot();
        assert_eq!(snapshot.chat.len(), CHAT_HISTORY_LIMIT);
        assert_eq!(snapshot.chat.front().map(|m| m.id), Some(51));

        let recent = shared.recent_chat(5);
        assert_eq!(
            recent.iter().map(|m| m.id).collect::<Vec<_>>(),
            vec![146, 147, 148, 149, 150]
        );
    }

    #[test]
    fn poll_keeps_only_the_fetch_window() {
        let service = FakeService::default();
        service.with(|state| {
            state.chat = (1..=80).map(|id| message(id, 2, "x")).collect();
        });
        let shared = SharedOnline::default();
        poll_once(&service, Some(1), &shared, &mut PollHealth::default());
        let snapshot = shared.snapshot();
        assert_eq!(snapshot.chat.len(), CHAT_FETCH_LIMIT);
        assert_eq!(snapshot.chat.front().map(|m| m.id), Some(31));
    }

    #[test]
    fn poller_thread_publishes_and_stops() {
        let service = FakeService::default();
        service.with(|state| {
            state.roster.insert(4, remote(4, 4.0));
        });
        let mut poller =
            OnlinePoller::start(Box::new(service.clone()), Duration::from_millis(5)).expect("start");
        assert_eq!(poller.local_id(), Some(1));

        let shared = poller.shared();
        let deadline = Instant::now() + Duration::from_secs(5);
        while shared.roster().is_empty() {
            assert!(Instant::now() < deadline, "poller never published");
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(shared.roster()[0].id, 4);

        assert!(poller.stop());
        let calls = service.with(|state| state.roster_calls);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(service.with(|state| state.roster_calls), calls);
        assert!(poller.stop(), "second stop is a no-op");
    }

    #[test]
    fn failed_registration_still_polls() {
        let service = FakeService {
            register_fails: true,
            ..FakeService::default()
        };
        let mut poller =
            OnlinePoller::start(Box::new(service.clone()), Duration::from_millis(5)).expect("start");
        assert_eq!(poller.local_id(), None);
        let deadline = Instant::now() + Duration::from_secs(5);
        while service.with(|state| state.roster_calls) == 0 {
            assert!(Instant::now() < deadline, "poller never polled");
            thread::sleep(Duration::from_millis(5));
        }
        assert!(poller.stop());
    }

    #[test]
    fn readers_never_observe_a_partial_roster() {
        let shared = SharedOnline::default();
        let done = AtomicBool::new(false);
        thread::scope(|scope| {
            scope.spawn(|| {
                for generation in 0..2_000 {
                    let value = generation as f32;
                    shared.replace_roster((0..8).map(|id| remote(id, value)).collect());
                }
                done.store(true, Ordering::Release);
            });
            scope.spawn(|| {
                while !done.load(Ordering::Acquire) {
                    let roster = shared.roster();
                    let Some(first) = roster.first() else {
                        continue;
                    };
                    assert_eq!(roster.len(), 8);
                    for player in &roster {
                        assert_eq!(player.x, first.x);
                        assert_eq!(player.y, player.x);
                        assert_eq!(player.map, first.map);
                    }
                }
            });
        });
    }
}
