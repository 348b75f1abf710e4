//! Cancellation of in-flight requests.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// A cancellation signal shared between a caller and a running request.
///
/// Cloning yields another handle to the same signal. Cancelling is idempotent
/// and safe from any thread.
#[derive(Debug, Clone)]
pub struct CancelToken {
    sender: Arc<watch::Sender<bool>>,
}

impl CancelToken {
    /// Creates a token that is not cancelled.
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Signals cancellation. Calling it again has no effect.
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    /// Returns `true` once [`cancel`](Self::cancel) was called.
    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }

    /// Completes when the token is cancelled.
    pub async fn cancelled(&self) {
        let mut receiver = self.sender.subscribe();
        // The sender lives as long as `self`, so this only ends on cancellation.
        let _ = receiver.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to a request spawned in the background.
///
/// Returned by [`Client::execute_with_callback`](crate::Client::execute_with_callback)
/// and [`Client::execute_stream`](crate::Client::execute_stream).
#[derive(Debug)]
pub struct RequestHandle {
    id: Uuid,
    token: CancelToken,
    task: JoinHandle<()>,
}

impl RequestHandle {
    pub(crate) fn new(id: Uuid, token: CancelToken, task: JoinHandle<()>) -> Self {
        Self { id, token, task }
    }

    /// The request id used in log events.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Cancels the request. The caller receives a single cancellation error.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// The request's cancellation token.
    pub fn token(&self) -> &CancelToken {
        &self.token
    }

    /// Returns `true` once the request and its completion have run.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// The set of requests currently running on a client, keyed by request id.
#[derive(Debug, Default)]
pub(crate) struct InFlight {
    requests: Mutex<BTreeMap<Uuid, CancelToken>>,
}

impl InFlight {
    pub(crate) fn register(self: &Arc<Self>, id: Uuid, token: CancelToken) -> InFlightGuard {
        self.requests.lock().insert(id, token);
        InFlightGuard {
            id,
            registry: Arc::clone(self),
        }
    }

    pub(crate) fn cancel(&self, id: &Uuid) -> bool {
        match self.requests.lock().get(id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub(crate) fn cancel_all(&self) -> usize {
        let requests = self.requests.lock();
        for token in requests.values() {
            token.cancel();
        }
        requests.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.requests.lock().len()
    }
}

/// Removes a request from the registry when it finishes.
pub(crate) struct InFlightGuard {
    id: Uuid,
    registry: Arc<InFlight>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.registry.requests.lock().remove(&self.id);
    }
}
