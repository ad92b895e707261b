use crate::config::BatcherConfig;
use crate::error::BatchError;
use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// The boxed future returned by a batch fetch.
pub type FetchFuture<V, E> = Pin<Box<dyn Future<Output = Result<Vec<V>, E>> + Send + 'static>>;

type FetchFn<K, V, E> = dyn Fn(Vec<K>) -> FetchFuture<V, E> + Send + Sync;
type Reply<V, E> = oneshot::Sender<Result<V, BatchError<E>>>;

struct Waiter<K, V, E> {
    key: K,
    reply: Reply<V, E>,
}

struct State<K, V, E> {
    pending: Vec<Waiter<K, V, E>>,
    // Bumped on every dispatch; a timer only flushes the window it was armed for.
    window: u64,
    timer: Option<JoinHandle<()>>,
    inflight: Vec<JoinHandle<()>>,
    closed: bool,
}

struct Inner<K, V, E> {
    config: BatcherConfig,
    fetch: Arc<FetchFn<K, V, E>>,
    state: Mutex<State<K, V, E>>,
}

/// Coalesces keys from independent callers into windowed batch fetches.
///
/// A window is dispatched when it holds `max_batch` keys or `wait` after its
/// first key arrived, whichever comes first. The timer is armed by the first
/// key of a window and never pushed back by later ones. Each dispatched
/// window runs its fetch on its own task; keys submitted meanwhile go to the
/// next window.
///
/// The fetch must return exactly one value per key, in key order. A fetch
/// error is cloned to every key of the window.
///
/// Cloning a `Batcher` yields another handle to the same queue. Submitting
/// requires a running tokio runtime.
pub struct Batcher<K, V, E> {
    inner: Arc<Inner<K, V, E>>,
}

impl<K, V, E> Clone for Batcher<K, V, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V, E> std::fmt::Debug for Batcher<K, V, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Batcher")
            .field("config", &self.inner.config)
            .field("pending", &state.pending.len())
            .field("closed", &state.closed)
            .finish()
    }
}

impl<K, V, E> Batcher<K, V, E>
where
    K: Send + 'static,
    V: Send + 'static,
    E: std::error::Error + Clone + Send + Sync + 'static,
{
    pub fn new<F, Fut>(config: BatcherConfig, fetch: F) -> Self
    where
        F: Fn(Vec<K>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<V>, E>> + Send + 'static,
    {
        let fetch: Arc<FetchFn<K, V, E>> =
            Arc::new(move |keys| -> FetchFuture<V, E> { Box::pin(fetch(keys)) });

        Self {
            inner: Arc::new(Inner {
                config,
                fetch,
                state: Mutex::new(State {
                    pending: Vec::new(),
                    window: 0,
                    timer: None,
                    inflight: Vec::new(),
                    closed: false,
                }),
            }),
        }
    }

    pub fn config(&self) -> &BatcherConfig {
        &self.inner.config
    }

    /// Queues `key` and returns a handle resolving to its value.
    ///
    /// The key is queued immediately; the handle does not need to be polled
    /// for the key to be fetched.
    pub fn submit(&self, key: K) -> BatchHandle<V, E> {
        let mut state = self.inner.state.lock();
        self.enqueue(&mut state, key)
    }

    /// Queues every key under one lock, so they land in as few windows as
    /// possible, and returns the handles in key order.
    pub fn submit_all(&self, keys: impl IntoIterator<Item = K>) -> Vec<BatchHandle<V, E>> {
        let mut state = self.inner.state.lock();
        keys.into_iter()
            .map(|key| self.enqueue(&mut state, key))
            .collect()
    }

    /// Submits `key` and waits for its value.
    pub async fn load(&self, key: K) -> Result<V, BatchError<E>> {
        self.submit(key).await
    }

    /// Submits every key and waits for all values, in key order.
    pub async fn load_all(&self, keys: impl IntoIterator<Item = K>) -> Vec<Result<V, BatchError<E>>> {
        let handles = self.submit_all(keys);
        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            results.push(handle.await);
        }
        results
    }

    /// Stops accepting keys, dispatches the open window and waits for every
    /// in-flight fetch to deliver. Keys submitted afterwards fail with
    /// [`BatchError::Closed`].
    pub async fn shutdown(&self) {
        let inflight = {
            let mut state = self.inner.state.lock();
            state.closed = true;
            self.inner.dispatch(&mut state);
            std::mem::take(&mut state.inflight)
        };

        debug!(inflight = inflight.len(), "draining batcher");
        for handle in inflight {
            if let Err(e) = handle.await {
                warn!(error = %e, "batch delivery task failed");
            }
        }
    }

    fn enqueue(&self, state: &mut State<K, V, E>, key: K) -> BatchHandle<V, E> {
        let (reply, rx) = oneshot::channel();

        if state.closed {
            let _ = reply.send(Err(BatchError::Closed));
            return BatchHandle { rx };
        }

        state.pending.push(Waiter { key, reply });

        if state.pending.len() >= self.inner.config.batch_limit() {
            self.inner.dispatch(state);
        } else if state.pending.len() == 1 {
            state.timer = Some(arm_timer(
                Arc::downgrade(&self.inner),
                state.window,
                self.inner.config,
            ));
        }

        BatchHandle { rx }
    }
}

fn arm_timer<K, V, E>(inner: Weak<Inner<K, V, E>>, window: u64, config: BatcherConfig) -> JoinHandle<()>
where
    K: Send + 'static,
    V: Send + 'static,
    E: std::error::Error + Clone + Send + Sync + 'static,
{
    tokio::spawn(async move {
        tokio::time::sleep(config.wait).await;
        if let Some(inner) = inner.upgrade() {
            inner.flush_window(window);
        }
    })
}

impl<K, V, E> Inner<K, V, E>
where
    K: Send + 'static,
    V: Send + 'static,
    E: std::error::Error + Clone + Send + Sync + 'static,
{
    fn flush_window(&self, window: u64) {
        let mut state = self.state.lock();
        if state.window != window {
            // Already dispatched by size.
            return;
        }
        trace!(window, "batch wait elapsed");
        // This runs on the timer task itself; it must not abort itself.
        state.timer = None;
        self.dispatch(&mut state);
    }

    /// Closes the current window and hands its keys to a delivery task.
    fn dispatch(&self, state: &mut State<K, V, E>) {
        state.window = state.window.wrapping_add(1);
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        if state.pending.is_empty() {
            return;
        }

        let (keys, replies): (Vec<K>, Vec<Reply<V, E>>) = state
            .pending
            .drain(..)
            .map(|waiter| (waiter.key, waiter.reply))
            .unzip();
        debug!(size = keys.len(), "dispatching batch");

        let fetch = Arc::clone(&self.fetch);
        state.inflight.retain(|handle| !handle.is_finished());
        state
            .inflight
            .push(tokio::spawn(deliver(fetch, keys, replies)));
    }
}

async fn deliver<K, V, E>(fetch: Arc<FetchFn<K, V, E>>, keys: Vec<K>, replies: Vec<Reply<V, E>>)
where
    E: std::error::Error + Clone,
{
    let expected = replies.len();

    match fetch(keys).await {
        Ok(values) if values.len() == expected => {
            for (reply, value) in replies.into_iter().zip(values) {
                // The caller may have stopped waiting.
                let _ = reply.send(Ok(value));
            }
        }
        Ok(values) => {
            let actual = values.len();
            warn!(expected, actual, "batch fetch returned the wrong number of results");
            for reply in replies {
                let _ = reply.send(Err(BatchError::ResultCount { expected, actual }));
            }
        }
        Err(err) => {
            warn!(size = expected, error = %err, "batch fetch failed");
            for reply in replies {
                let _ = reply.send(Err(BatchError::Fetch(err.clone())));
            }
        }
    }
}

/// Resolves to the value fetched for one submitted key.
#[must_use = "dropping the handle discards the value, not the key"]
pub struct BatchHandle<V, E> {
    rx: oneshot::Receiver<Result<V, BatchError<E>>>,
}

impl<V, E> Future for BatchHandle<V, E> {
    type Output = Result<V, BatchError<E>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(BatchError::Dropped)))
    }
}
