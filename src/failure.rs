//! Centralized reporting of terminally failed requests.
//!
//! Every request that fails for good is reported twice: once to its caller and
//! once here, to the client's [`FailureDelegate`] and to every
//! [`FailureSubscription`]. Filtering (e.g. ignoring 401s) is the subscriber's job.

use crate::Error;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Receives every terminally failed request of a client.
pub trait FailureDelegate: Send + Sync {
    /// Called once per failed request, before the error reaches the caller.
    fn request_did_fail(&self, error: &Error);
}

impl<F> FailureDelegate for F
where
    F: Fn(&Error) + Send + Sync,
{
    fn request_did_fail(&self, error: &Error) {
        self(error)
    }
}

/// Broadcast channel of failed requests, owned by one client.
#[derive(Debug, Clone)]
pub struct FailureChannel {
    sender: broadcast::Sender<Arc<Error>>,
}

impl FailureChannel {
    /// Creates a channel that buffers up to `capacity` errors per slow subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Starts receiving failures published from now on.
    pub fn subscribe(&self) -> FailureSubscription {
        FailureSubscription {
            receiver: self.sender.subscribe(),
        }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub(crate) fn publish(&self, error: Arc<Error>) {
        // No subscribers is not an error.
        let _ = self.sender.send(error);
    }
}

impl Default for FailureChannel {
    fn default() -> Self {
        Self::new(64)
    }
}

/// A live subscription to a client's failures.
///
/// Dropping it, or calling [`unsubscribe`](Self::unsubscribe), ends it.
#[derive(Debug)]
pub struct FailureSubscription {
    receiver: broadcast::Receiver<Arc<Error>>,
}

impl FailureSubscription {
    /// Waits for the next failure.
    ///
    /// Returns `None` once the client is gone. Failures missed because this
    /// subscriber lagged behind are skipped.
    pub async fn recv(&mut self) -> Option<Arc<Error>> {
        loop {
            match self.receiver.recv().await {
                Ok(error) => return Some(error),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "Failure subscriber lagged, skipping errors");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Returns a failure if one is already waiting.
    pub fn try_recv(&mut self) -> Option<Arc<Error>> {
        loop {
            match self.receiver.try_recv() {
                Ok(error) => return Some(error),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }

    /// Ends the subscription.
    pub fn unsubscribe(self) {}
}
