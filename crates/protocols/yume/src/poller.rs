//! Polling readers
//!
//! A [`PollingReader`] owns a background task that runs a fetch on a fixed
//! interval and on demand. The last good result survives failed fetches, and
//! the task ends when the handle is shut down or dropped. Results that arrive
//! after that are discarded.

use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tokio::sync::{oneshot, watch, Notify, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// What a reader exposes to its consumers
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReaderState<T> {
    /// Last successfully fetched value
    pub data: Option<T>,
    pub loading: bool,
    /// Message of the most recent failed fetch, cleared on success
    pub error: Option<String>,
    /// Unix ms of the last successful fetch
    pub last_updated_ms: Option<u64>,
    /// Number of successful fetches
    pub generation: u64,
}

impl<T> Default for ReaderState<T> {
    fn default() -> Self {
        Self {
            data: None,
            loading: false,
            error: None,
            last_updated_ms: None,
            generation: 0,
        }
    }
}

impl<T> ReaderState<T> {
    /// Convert the data, keeping the reader status
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ReaderState<U> {
        ReaderState {
            data: self.data.map(f),
            loading: self.loading,
            error: self.error,
            last_updated_ms: self.last_updated_ms,
            generation: self.generation,
        }
    }
}

/// Something that can be asked to fetch again
pub trait Refetch: Send + Sync {
    fn refetch(&self);

    /// Refetch once `delay` has elapsed
    fn refetch_after(&self, delay: Duration);
}

pub struct PollingReader<T> {
    name: String,
    state: Arc<RwLock<ReaderState<T>>>,
    trigger: Arc<Notify>,
    alive: Arc<AtomicBool>,
    /// Count of finished fetches, successful or not
    completed: watch::Receiver<u64>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl<T> PollingReader<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Start polling. The first fetch runs immediately.
    pub fn spawn<F, Fut, E>(name: impl Into<String>, interval: Duration, fetch: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let name = name.into();
        let state = Arc::new(RwLock::new(ReaderState::default()));
        let trigger = Arc::new(Notify::new());
        let alive = Arc::new(AtomicBool::new(true));
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let (completed_tx, completed) = watch::channel(0u64);

        let task = {
            let name = name.clone();
            let state = state.clone();
            let trigger = trigger.clone();
            let alive = alive.clone();
            let period = interval.max(Duration::from_millis(1));

            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                tracing::debug!(reader = %name, interval_ms = period.as_millis() as u64, "Poller started");

                loop {
                    tokio::select! {
                        _ = &mut shutdown_rx => break,
                        _ = ticker.tick() => {}
                        _ = trigger.notified() => {}
                    }

                    state.write().await.loading = true;
                    let result = tokio::select! {
                        _ = &mut shutdown_rx => break,
                        result = fetch() => result,
                    };
                    if !alive.load(Ordering::SeqCst) {
                        break;
                    }

                    let mut guard = state.write().await;
                    guard.loading = false;
                    match result {
                        Ok(data) => {
                            guard.data = Some(data);
                            guard.error = None;
                            guard.last_updated_ms = Some(now_ms());
                            guard.generation += 1;
                        }
                        Err(e) => {
                            tracing::warn!(reader = %name, error = %e, "Fetch failed, keeping last snapshot");
                            guard.error = Some(e.to_string());
                        }
                    }
                    drop(guard);
                    completed_tx.send_modify(|n| *n += 1);
                }

                tracing::debug!(reader = %name, "Poller stopped");
            })
        };

        Self {
            name,
            state,
            trigger,
            alive,
            completed,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn state(&self) -> ReaderState<T> {
        self.state.read().await.clone()
    }

    /// Last good value, if any
    pub async fn data(&self) -> Option<T> {
        self.state.read().await.data.clone()
    }

    /// State once at least one fetch has finished.
    ///
    /// Returns right away if the task has already stopped.
    pub async fn first_result(&self) -> ReaderState<T> {
        let mut completed = self.completed.clone();
        let _ = completed.wait_for(|n| *n > 0).await;
        self.state().await
    }

    pub fn is_running(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
            && self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stop the task without waiting for it, through a shared handle.
    pub fn cancel(&self) {
        self.alive.store(false, Ordering::SeqCst);
        if let Some(task) = &self.task {
            task.abort();
        }
    }

    /// Stop the task and wait for it to exit. An in-flight fetch is dropped.
    pub async fn shutdown(mut self) {
        self.alive.store(false, Ordering::SeqCst);
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl<T> Refetch for PollingReader<T>
where
    T: Send + Sync,
{
    fn refetch(&self) {
        if self.alive.load(Ordering::SeqCst) {
            self.trigger.notify_one();
        }
    }

    fn refetch_after(&self, delay: Duration) {
        let trigger = self.trigger.clone();
        let alive = self.alive.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if alive.load(Ordering::SeqCst) {
                trigger.notify_one();
            }
        });
    }
}

impl<T> Drop for PollingReader<T> {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::SeqCst);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
