use std::future::Future;
use std::ops::ControlFlow;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Default liveness polling interval
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// A repeating background check bound to one watched live
///
/// The check first runs one `period` after spawning. The task ends when the
/// check returns `ControlFlow::Break`, when [`PollTask::stop`] is called, or
/// when the handle is dropped.
#[derive(Debug)]
pub struct PollTask {
    live_id: String,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl PollTask {
    pub fn spawn<F, Fut>(live_id: impl Into<String>, period: Duration, mut check: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ControlFlow<()>> + Send + 'static,
    {
        let live_id = live_id.into();
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let id = live_id.clone();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::debug!(live = %id, period_secs = period.as_secs(), "liveness polling started");

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    flow = async {
                        interval.tick().await;
                        check().await
                    } => {
                        if flow.is_break() {
                            break;
                        }
                    }
                }
            }

            tracing::debug!(live = %id, "liveness polling stopped");
        });

        Self {
            live_id,
            cancel,
            handle,
        }
    }

    /// The live this task watches
    pub fn live_id(&self) -> &str {
        &self.live_id
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Cancel the task; an in-flight check is abandoned
    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

impl Drop for PollTask {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(
        counter: Arc<AtomicUsize>,
        stop_after: usize,
    ) -> impl FnMut() -> std::future::Ready<ControlFlow<()>> + Send + 'static {
        move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            std::future::ready(if n >= stop_after {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn first_check_waits_one_period() {
        let counter = Arc::new(AtomicUsize::new(0));
        let task = PollTask::spawn("a", Duration::from_secs(30), counting(counter.clone(), usize::MAX));

        tokio::time::sleep(Duration::from_secs(29)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert!(task.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn break_ends_the_task() {
        let counter = Arc::new(AtomicUsize::new(0));
        let task = PollTask::spawn("a", Duration::from_secs(30), counting(counter.clone(), 2));

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert!(!task.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_and_drop_cancel() {
        let counter = Arc::new(AtomicUsize::new(0));
        let task = PollTask::spawn("a", Duration::from_secs(30), counting(counter.clone(), usize::MAX));
        task.stop();
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert!(!task.is_running());

        let dropped = PollTask::spawn("b", Duration::from_secs(30), counting(counter.clone(), usize::MAX));
        drop(dropped);
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
