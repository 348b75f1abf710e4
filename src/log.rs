//! Request lifecycle logging.
//!
//! The client reports every lifecycle step to a [`LogDestination`]. The default,
//! [`TracingLogDestination`], forwards events to `tracing`.

use crate::Error;
use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::time::Duration;
use url::Url;
use uuid::Uuid;

/// A lifecycle event of one request.
#[derive(Debug)]
pub enum LogEvent<'a> {
    /// A free-form message.
    Message(&'a str),

    /// The request was built and is about to be sent (or mocked).
    RequestStarted {
        /// Request id
        id: Uuid,
        /// HTTP method
        method: &'a Method,
        /// Resolved URL
        url: &'a Url,
        /// Merged headers
        headers: &'a HeaderMap,
        /// Redacted parameter snapshot
        params: &'a BTreeMap<String, String>,
    },

    /// An attempt failed and the request will be retried.
    RequestRetrying {
        /// Request id
        id: Uuid,
        /// The attempt that failed (1-indexed)
        attempt: usize,
        /// Why it failed
        error: &'a Error,
    },

    /// The request produced its final resource.
    RequestCompleted {
        /// Request id
        id: Uuid,
        /// HTTP status (200 for mocked responses)
        status: StatusCode,
        /// Time since the request started, retries included
        elapsed: Duration,
        /// Raw response body
        body: Option<&'a Bytes>,
        /// The finalized value
        finalized: &'a dyn Debug,
        /// Whether the body came from a mocked resource
        mocked: bool,
    },

    /// The request failed for good.
    RequestFailed {
        /// Request id
        id: Uuid,
        /// Time since the request started
        elapsed: Duration,
        /// The terminal error
        error: &'a Error,
    },
}

/// Observer of request lifecycle events.
///
/// Called from the request task, possibly from several requests at once.
/// Implementations must not panic.
pub trait LogDestination: Send + Sync {
    /// Receives one event.
    fn log(&self, event: LogEvent<'_>);
}

/// Forwards events to `tracing`. Header values are never written.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogDestination;

impl LogDestination for TracingLogDestination {
    fn log(&self, event: LogEvent<'_>) {
        match event {
            LogEvent::Message(message) => tracing::info!("{}", message),
            LogEvent::RequestStarted {
                id,
                method,
                url,
                headers,
                params,
            } => {
                let header_names: Vec<&str> = headers.keys().map(|k| k.as_str()).collect();
                tracing::debug!(
                    request_id = %id,
                    method = %method,
                    url = %url,
                    headers = ?header_names,
                    params = ?params,
                    "Starting request"
                );
            }
            LogEvent::RequestRetrying { id, attempt, error } => {
                tracing::warn!(
                    request_id = %id,
                    attempt = attempt,
                    error = %error,
                    "Request failed, retrying"
                );
            }
            LogEvent::RequestCompleted {
                id,
                status,
                elapsed,
                body,
                finalized,
                mocked,
            } => {
                tracing::info!(
                    request_id = %id,
                    status = status.as_u16(),
                    latency_ms = elapsed.as_millis(),
                    bytes = body.map(|b| b.len()).unwrap_or(0),
                    mocked = mocked,
                    "Request completed"
                );
                tracing::trace!(request_id = %id, value = ?finalized, "Finalized value");
            }
            LogEvent::RequestFailed { id, elapsed, error } => {
                tracing::error!(
                    request_id = %id,
                    latency_ms = elapsed.as_millis(),
                    error = %error,
                    "Request failed"
                );
            }
        }
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyLogDestination;

impl LogDestination for EmptyLogDestination {
    fn log(&self, _event: LogEvent<'_>) {}
}
