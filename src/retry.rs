//! Retry configuration and predicates for handling transient failures.
//!
//! Retries only ever apply to errors from the network exchange itself
//! (see [`Error::is_retry_eligible`]): encoding and URL errors happen before any
//! I/O, and timeouts and cancellations always end the request.

use crate::Error;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Which errors a client retries.
///
/// # Examples
///
/// ```
/// use netable::retry::{RetryableErrors, RetryOn5xx};
/// use std::sync::Arc;
///
/// let never = RetryableErrors::None;
/// let server_errors = RetryableErrors::Custom(Arc::new(RetryOn5xx));
/// let not_found = RetryableErrors::custom(|error: &netable::Error| {
///     error.status().map(|s| s.as_u16()) == Some(404)
/// });
/// ```
#[derive(Clone, Default)]
pub enum RetryableErrors {
    /// Do not retry failed requests.
    #[default]
    None,

    /// Retry every transport failure and every HTTP status error.
    All,

    /// Retry only connection-level transport failures, never HTTP status errors.
    TransportOnly,

    /// Retry when the predicate says so.
    Custom(Arc<dyn RetryPredicate>),
}

impl RetryableErrors {
    /// Wraps a closure as a [`RetryableErrors::Custom`] predicate.
    pub fn custom<F>(predicate: F) -> Self
    where
        F: Fn(&Error) -> bool + Send + Sync + 'static,
    {
        RetryableErrors::Custom(Arc::new(ErrorPredicate(predicate)))
    }
}

impl fmt::Debug for RetryableErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryableErrors::None => f.write_str("None"),
            RetryableErrors::All => f.write_str("All"),
            RetryableErrors::TransportOnly => f.write_str("TransportOnly"),
            RetryableErrors::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Defines when and how often failed requests are retried.
///
/// A fixed `delay` is waited before every attempt after the first.
///
/// # Examples
///
/// ```
/// use netable::{RetryConfiguration, RetryableErrors};
/// use std::time::Duration;
///
/// // One initial attempt plus up to two retries, 500ms apart.
/// let retry = RetryConfiguration::new(RetryableErrors::All, 2, Duration::from_millis(500));
/// assert!(retry.enabled(2));
/// assert!(!retry.enabled(0));
/// ```
#[derive(Debug, Clone, Default)]
pub struct RetryConfiguration {
    /// Which errors are retried.
    pub errors: RetryableErrors,

    /// Maximum number of retries after the initial attempt.
    pub count: usize,

    /// Wait before each retry.
    pub delay: Duration,
}

impl RetryConfiguration {
    /// Creates a retry configuration.
    pub fn new(errors: RetryableErrors, count: usize, delay: Duration) -> Self {
        Self {
            errors,
            count,
            delay,
        }
    }

    /// A configuration that never retries.
    pub fn none() -> Self {
        Self::default()
    }

    /// Returns `true` if a retry is still possible with `retries_left` remaining.
    pub fn enabled(&self, retries_left: usize) -> bool {
        !matches!(self.errors, RetryableErrors::None) && retries_left > 0
    }

    /// Classifies `error` under this policy.
    ///
    /// # Arguments
    ///
    /// * `error` - The error from the failed attempt
    /// * `attempt` - The attempt that failed (1-indexed)
    pub fn should_retry(&self, error: &Error, attempt: usize) -> bool {
        if !error.is_retry_eligible() {
            return false;
        }
        match &self.errors {
            RetryableErrors::None => false,
            RetryableErrors::All => true,
            RetryableErrors::TransportOnly => error.is_transport(),
            RetryableErrors::Custom(predicate) => predicate.should_retry(error, attempt),
        }
    }
}

/// Trait for deciding whether a failed request should be retried.
///
/// Predicates only see retry-eligible errors. They run inside the request task
/// and must not touch shared state.
///
/// # Examples
///
/// ```
/// use netable::{Error, RetryPredicate};
///
/// struct RetryOnRateLimit;
///
/// impl RetryPredicate for RetryOnRateLimit {
///     fn should_retry(&self, error: &Error, _attempt: usize) -> bool {
///         matches!(error, Error::Http { status, .. } if status.as_u16() == 429)
///     }
/// }
/// ```
pub trait RetryPredicate: Send + Sync {
    /// Determines whether the request should be retried.
    ///
    /// # Arguments
    ///
    /// * `error` - The error that occurred
    /// * `attempt` - The attempt number (1-indexed)
    fn should_retry(&self, error: &Error, attempt: usize) -> bool;
}

struct ErrorPredicate<F>(F);

impl<F> RetryPredicate for ErrorPredicate<F>
where
    F: Fn(&Error) -> bool + Send + Sync,
{
    fn should_retry(&self, error: &Error, _attempt: usize) -> bool {
        (self.0)(error)
    }
}

/// Retry only on 5xx server errors.
#[derive(Debug, Clone, Copy)]
pub struct RetryOn5xx;

impl RetryPredicate for RetryOn5xx {
    fn should_retry(&self, error: &Error, _attempt: usize) -> bool {
        matches!(error, Error::Http { status, .. } if status.is_server_error())
    }
}

/// Retry only on connection-level transport errors.
#[derive(Debug, Clone, Copy)]
pub struct RetryOnConnectionError;

impl RetryPredicate for RetryOnConnectionError {
    fn should_retry(&self, error: &Error, _attempt: usize) -> bool {
        error.is_transport()
    }
}

/// Combine multiple retry predicates with OR logic.
///
/// Retries if ANY of the predicates return `true`.
///
/// # Examples
///
/// ```
/// use netable::retry::{OrPredicate, RetryOn5xx, RetryOnConnectionError};
///
/// let predicate = OrPredicate::new(vec![
///     Box::new(RetryOn5xx),
///     Box::new(RetryOnConnectionError),
/// ]);
/// ```
pub struct OrPredicate {
    predicates: Vec<Box<dyn RetryPredicate>>,
}

impl OrPredicate {
    /// Creates a new `OrPredicate` from a list of predicates.
    pub fn new(predicates: Vec<Box<dyn RetryPredicate>>) -> Self {
        Self { predicates }
    }
}

impl RetryPredicate for OrPredicate {
    fn should_retry(&self, error: &Error, attempt: usize) -> bool {
        self.predicates
            .iter()
            .any(|p| p.should_retry(error, attempt))
    }
}

/// Combine multiple retry predicates with AND logic.
///
/// Retries only if ALL of the predicates return `true`.
pub struct AndPredicate {
    predicates: Vec<Box<dyn RetryPredicate>>,
}

impl AndPredicate {
    /// Creates a new `AndPredicate` from a list of predicates.
    pub fn new(predicates: Vec<Box<dyn RetryPredicate>>) -> Self {
        Self { predicates }
    }
}

impl RetryPredicate for AndPredicate {
    fn should_retry(&self, error: &Error, attempt: usize) -> bool {
        self.predicates
            .iter()
            .all(|p| p.should_retry(error, attempt))
    }
}
