//! Drives a [`BoardState`] from a [`LivesSource`]: loads, liveness polling and
//! change notification for whichever front end renders the board.

use crate::client::LivesSource;
use crate::error::Error;
use crate::poller::{DEFAULT_POLL_INTERVAL, PollTask};
use crate::selection::{Action, BoardState, Effect, FETCH_FAILED_MESSAGE, Snapshot};
use domain::embed::ThumbnailQuality;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::watch;

/// Tuning for a [`BoardController`]
#[derive(Debug, Clone, Copy)]
pub struct BoardOptions {
    pub poll_interval: Duration,
    /// `High` for the web player, `Default` for mobile
    pub thumbnail_quality: ThumbnailQuality,
}

impl Default for BoardOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            thumbnail_quality: ThumbnailQuality::High,
        }
    }
}

struct Inner {
    source: Arc<dyn LivesSource>,
    options: BoardOptions,
    state: Mutex<BoardState>,
    next_seq: AtomicU64,
    poll: Mutex<Option<PollTask>>,
    /// Set by `teardown`; no poll is started until the next explicit refresh
    torn_down: AtomicBool,
    updates: watch::Sender<Snapshot>,
}

/// Shared handle to one board
///
/// Must be used inside a tokio runtime. Polling stops on [`teardown`] or when
/// the last handle is dropped.
///
/// [`teardown`]: BoardController::teardown
#[derive(Clone)]
pub struct BoardController {
    inner: Arc<Inner>,
}

impl BoardController {
    pub fn new(source: Arc<dyn LivesSource>, options: BoardOptions) -> Self {
        let state = BoardState::new(options.thumbnail_quality);
        let (updates, _) = watch::channel(state.snapshot());
        Self {
            inner: Arc::new(Inner {
                source,
                options,
                state: Mutex::new(state),
                next_seq: AtomicU64::new(0),
                poll: Mutex::new(None),
                torn_down: AtomicBool::new(false),
                updates,
            }),
        }
    }

    /// Current rendering of the board
    pub fn snapshot(&self) -> Snapshot {
        self.inner.lock_state().snapshot()
    }

    /// Receive a new [`Snapshot`] after every change
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.inner.updates.subscribe()
    }

    /// Whether a liveness poll is running, and for which live
    pub fn polling(&self) -> Option<String> {
        self.inner
            .poll
            .lock()
            .expect("Failed to acquire poll lock")
            .as_ref()
            .filter(|task| task.is_running())
            .map(|task| task.live_id().to_string())
    }

    /// Fetch every record and rebuild the board
    ///
    /// On failure the previous board is kept and the error message is set.
    /// Resumes polling after a [`teardown`](Self::teardown).
    pub async fn refresh(&self) -> Result<(), Error> {
        self.inner.torn_down.store(false, Ordering::SeqCst);
        Inner::refresh(&self.inner).await
    }

    /// Apply a navigation action (`ShowCurrent`, `Select`, `Search`, ...)
    pub fn dispatch(&self, action: Action) {
        let effect = self.inner.apply(action);
        Inner::sync_poll(&self.inner);
        if effect == Effect::Refetch {
            let inner = self.inner.clone();
            tokio::spawn(async move {
                let _ = Inner::refresh(&inner).await;
            });
        }
    }

    /// Stop polling; call when the view showing the board goes away
    ///
    /// Loads still in flight finish without restarting the poll.
    pub fn teardown(&self) {
        self.inner.torn_down.store(true, Ordering::SeqCst);
        if let Some(task) = self
            .inner
            .poll
            .lock()
            .expect("Failed to acquire poll lock")
            .take()
        {
            task.stop();
        }
    }
}

impl Inner {
    fn lock_state(&self) -> std::sync::MutexGuard<'_, BoardState> {
        self.state.lock().expect("Failed to acquire board state lock")
    }

    fn apply(&self, action: Action) -> Effect {
        let (effect, snapshot) = {
            let mut state = self.lock_state();
            let effect = state.apply(action);
            (effect, state.snapshot())
        };
        self.updates.send_replace(snapshot);
        effect
    }

    async fn refresh(self: &Arc<Self>) -> Result<(), Error> {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst) + 1;
        self.apply(Action::LoadStarted { seq });

        let result = self.source.fetch_lives(None).await;
        let outcome = match result {
            Ok(records) => {
                tracing::debug!(seq, count = records.len(), "board loaded");
                self.apply(Action::Loaded { seq, records });
                Ok(())
            }
            Err(e) => {
                tracing::warn!(seq, error = %e, "failed to load board");
                let message = if e.is_auth() {
                    e.user_message()
                } else {
                    FETCH_FAILED_MESSAGE.to_string()
                };
                self.apply(Action::LoadFailed { seq, message });
                Err(e)
            }
        };

        Self::sync_poll(self);
        outcome
    }

    /// Start, replace or stop the liveness poll to match the watched live
    fn sync_poll(self: &Arc<Self>) {
        let watched = self.lock_state().watched_live_id().map(str::to_string);
        let mut slot = self.poll.lock().expect("Failed to acquire poll lock");
        if self.torn_down.load(Ordering::SeqCst) {
            if let Some(task) = slot.take() {
                task.stop();
            }
            return;
        }

        let unchanged = match (slot.as_ref(), watched.as_deref()) {
            (Some(task), Some(id)) => task.live_id() == id && task.is_running(),
            (None, None) => true,
            _ => false,
        };
        if unchanged {
            return;
        }

        if let Some(task) = slot.take() {
            task.stop();
        }
        if let Some(id) = watched {
            *slot = Some(Self::spawn_poll(Arc::downgrade(self), id, self.options.poll_interval));
        }
    }

    fn spawn_poll(weak: Weak<Self>, live_id: String, period: Duration) -> PollTask {
        let watched = live_id.clone();
        PollTask::spawn(live_id, period, move || {
            let weak = weak.clone();
            let watched = watched.clone();
            async move {
                let Some(inner) = weak.upgrade() else {
                    return ControlFlow::Break(());
                };
                inner.check_liveness(watched).await
            }
        })
    }

    async fn check_liveness(self: Arc<Self>, watched: String) -> ControlFlow<()> {
        match self.source.fetch_lives(Some(true)).await {
            Ok(live) => {
                let effect = self.apply(Action::LivenessChecked {
                    watched: watched.clone(),
                    live,
                });
                if effect == Effect::Refetch {
                    // cancels this task when the watched live is no longer current
                    let _ = Self::refresh(&self).await;
                }
                ControlFlow::Continue(())
            }
            Err(e) => {
                tracing::warn!(live = %watched, error = %e, "liveness check failed");
                self.apply(Action::LivenessCheckFailed {
                    message: e.user_message(),
                });
                ControlFlow::Continue(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::selection::Mode;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use domain::Live;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct FakeSource {
        records: Mutex<Vec<Live>>,
        fail: AtomicBool,
        fetches: AtomicUsize,
        delay: Mutex<Duration>,
    }

    impl FakeSource {
        fn set(&self, records: Vec<Live>) {
            *self.records.lock().unwrap() = records;
        }
    }

    #[async_trait]
    impl LivesSource for FakeSource {
        async fn fetch_lives(&self, is_live: Option<bool>) -> Result<Vec<Live>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let delay = *self.delay.lock().unwrap();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(Error::Status {
                    status: 503,
                    message: "down".to_string(),
                });
            }
            Ok(self
                .records
                .lock()
                .unwrap()
                .iter()
                .filter(|live| is_live.is_none_or(|flag| live.is_live == flag))
                .cloned()
                .collect())
        }
    }

    fn live(id: &str, is_live: bool, minute: u32) -> Live {
        Live {
            id: id.to_string(),
            title: format!("Live {id}"),
            url: format!("https://www.youtube.com/embed/{id}"),
            is_live,
            created_at: Utc.with_ymd_and_hms(2024, 2, 1, 10, minute, 0).unwrap(),
        }
    }

    fn setup() -> (Arc<FakeSource>, BoardController) {
        let source = Arc::new(FakeSource::default());
        source.set(vec![live("1", true, 2), live("2", true, 3), live("3", false, 1)]);
        let controller = BoardController::new(source.clone(), BoardOptions::default());
        (source, controller)
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_starts_polling_the_current_live() {
        let (_source, controller) = setup();
        controller.refresh().await.unwrap();

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.active.unwrap().id, "2");
        assert_eq!(snapshot.archive_len, 2);
        assert_eq!(controller.polling().as_deref(), Some("2"));
    }

    #[tokio::test(start_paused = true)]
    async fn ended_live_switches_to_previous_within_one_cycle() {
        let (source, controller) = setup();
        controller.refresh().await.unwrap();

        source.set(vec![live("1", true, 2), live("2", false, 3), live("3", false, 1)]);
        tokio::time::sleep(Duration::from_secs(31)).await;

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.mode, Mode::Previous);
        assert!(snapshot.active.is_none());
        // the older live record takes over as current once re-fetched
        assert_eq!(snapshot.current.unwrap().id, "1");
        assert_eq!(controller.polling(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn ended_live_moves_to_archive() {
        let (source, controller) = setup();
        source.set(vec![live("1", false, 2), live("2", true, 3), live("3", false, 1)]);
        controller.refresh().await.unwrap();
        let mut updates = controller.subscribe();

        source.set(vec![live("1", false, 2), live("2", false, 3), live("3", false, 1)]);
        tokio::time::sleep(Duration::from_secs(31)).await;

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.mode, Mode::Previous);
        assert!(snapshot.active.is_none());
        assert!(snapshot.current.is_none());
        assert_eq!(snapshot.archive_len, 3);
        assert_eq!(controller.polling(), None);
        assert!(updates.has_changed().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn unchanged_live_keeps_polling() {
        let (source, controller) = setup();
        controller.refresh().await.unwrap();
        let before = source.fetches.load(Ordering::SeqCst);

        tokio::time::sleep(Duration::from_secs(95)).await;

        assert_eq!(source.fetches.load(Ordering::SeqCst), before + 3);
        assert_eq!(controller.snapshot().mode, Mode::Current);
        assert_eq!(controller.polling().as_deref(), Some("2"));
    }

    #[tokio::test(start_paused = true)]
    async fn browsing_the_archive_pauses_polling() {
        let (source, controller) = setup();
        controller.refresh().await.unwrap();

        controller.dispatch(Action::ShowPrevious);
        assert_eq!(controller.polling(), None);
        let before = source.fetches.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(source.fetches.load(Ordering::SeqCst), before);

        controller.dispatch(Action::ShowCurrent);
        assert_eq!(controller.polling().as_deref(), Some("2"));
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_stops_polling() {
        let (source, controller) = setup();
        controller.refresh().await.unwrap();
        controller.teardown();

        let before = source.fetches.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(source.fetches.load(Ordering::SeqCst), before);
        assert_eq!(controller.polling(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_in_flight_at_teardown_does_not_restart_polling() {
        let (source, controller) = setup();
        *source.delay.lock().unwrap() = Duration::from_millis(10);

        let in_flight = tokio::spawn({
            let controller = controller.clone();
            async move { controller.refresh().await }
        });
        tokio::time::sleep(Duration::from_millis(1)).await;
        controller.teardown();
        in_flight.await.unwrap().unwrap();

        assert_eq!(controller.snapshot().active.unwrap().id, "2");
        assert_eq!(controller.polling(), None);
        let before = source.fetches.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(source.fetches.load(Ordering::SeqCst), before);

        controller.refresh().await.unwrap();
        assert_eq!(controller.polling().as_deref(), Some("2"));
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_controller_stops_polling() {
        let (source, controller) = setup();
        controller.refresh().await.unwrap();
        drop(controller);

        let before = source.fetches.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(source.fetches.load(Ordering::SeqCst), before);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_refresh_keeps_the_board() {
        let (source, controller) = setup();
        controller.refresh().await.unwrap();

        source.fail.store(true, Ordering::SeqCst);
        assert!(controller.refresh().await.is_err());

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.error.as_deref(), Some(FETCH_FAILED_MESSAGE));
        assert!(!snapshot.loading);
        assert_eq!(snapshot.active.unwrap().id, "2");
        assert_eq!(snapshot.archive_len, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_liveness_check_keeps_the_stream() {
        let (source, controller) = setup();
        controller.refresh().await.unwrap();

        source.fail.store(true, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(31)).await;

        let snapshot = controller.snapshot();
        assert!(snapshot.error.is_some());
        assert_eq!(snapshot.active.unwrap().id, "2");
        assert_eq!(controller.polling().as_deref(), Some("2"));
    }
}
