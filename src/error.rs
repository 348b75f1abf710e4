//! Error types for the request pipeline.
//!
//! Every failure in every stage (URL resolution, parameter encoding, interception,
//! transport, status checking, decoding, finalizing) is reported as exactly one
//! variant of [`Error`]. Transport crates never leak through: the transport boundary
//! converts its failures into a [`TransportError`] first.

use bytes::Bytes;
use http::StatusCode;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// The error type for every request executed by a [`Client`](crate::Client).
///
/// # Examples
///
/// ```no_run
/// use netable::{Client, Error, Request};
///
/// # async fn example() -> Result<(), Error> {
/// let client = Client::builder()
///     .base_url("https://api.example.com")?
///     .build()?;
///
/// match client.execute(Request::<(), serde_json::Value>::get("/endpoint")).await {
///     Ok(value) => println!("Success: {:?}", value),
///     Err(Error::Http { status, raw }) => {
///         eprintln!("HTTP error {}: {:?}", status, raw);
///     }
///     Err(Error::FallbackDecode(old)) => {
///         eprintln!("Server sent the legacy shape: {:?}", old);
///     }
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
    /// The request could not be built: parameters, headers, or body failed to encode.
    ///
    /// Always raised before any network I/O and never retried.
    #[error("Coding error: {0}")]
    Coding(String),

    /// The response body could not be decoded into the expected type.
    ///
    /// The raw bytes are kept for debugging when they were available.
    #[error("Failed to decode response: {source}")]
    Decoding {
        /// The underlying parser error
        #[source]
        source: Arc<serde_json::Error>,
        /// The raw response body
        raw: Option<Bytes>,
    },

    /// The server answered with a status outside `200..=299`.
    #[error("HTTP error {status}: {}", body_text(.raw))]
    Http {
        /// The HTTP status code
        status: StatusCode,
        /// The raw response body
        raw: Option<Bytes>,
    },

    /// The request path and base URL do not combine into a usable http(s) URL.
    #[error("Malformed URL: {0}")]
    MalformedUrl(String),

    /// The network exchange itself failed.
    #[error("Request failed: {0}")]
    RequestFailed(#[from] TransportError),

    /// A fully qualified request URL points outside the client's base URL.
    #[error("URL {url} does not belong to server {base}")]
    WrongServer {
        /// The rejected URL
        url: String,
        /// The client's base URL
        base: String,
    },

    /// A body was required but the response carried none.
    #[error("No data in response")]
    NoData,

    /// The payload could not be extracted from the decoded response.
    #[error("Resource extraction failed: {0}")]
    ResourceExtraction(String),

    /// The primary decode failed but the body matched the declared fallback type.
    ///
    /// This is a recoverable, inspectable outcome: the decoded fallback value is
    /// carried in the error and can be retrieved with [`Error::fallback`].
    #[error("Response decoded as fallback type {}", .0.type_name())]
    FallbackDecode(FallbackValue),

    /// An interceptor rejected or failed to adapt the request.
    #[error("Interceptor error: {0}")]
    Interceptor(String),

    /// Anything that fits no other variant.
    #[error("Unknown error: {0}")]
    Unknown(#[source] Arc<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Returns `true` if this error came from attempting the network exchange
    /// and is not inherently terminal.
    ///
    /// Only these errors are ever handed to a retry policy. Timeouts and
    /// cancellations are excluded: retrying a timeout risks unbounded latency and
    /// retrying a cancellation defeats the caller.
    ///
    /// # Examples
    ///
    /// ```
    /// use netable::{Error, TransportError};
    /// use http::StatusCode;
    ///
    /// let err = Error::Http { status: StatusCode::INTERNAL_SERVER_ERROR, raw: None };
    /// assert!(err.is_retry_eligible());
    ///
    /// let err = Error::RequestFailed(TransportError::TimedOut);
    /// assert!(!err.is_retry_eligible());
    ///
    /// let err = Error::Coding("cannot encode nested collections".into());
    /// assert!(!err.is_retry_eligible());
    /// ```
    pub fn is_retry_eligible(&self) -> bool {
        match self {
            Error::RequestFailed(cause) => !cause.is_terminal(),
            Error::Http { .. } => true,
            _ => false,
        }
    }

    /// Returns `true` for low-level connection failures.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::RequestFailed(TransportError::Connect(_) | TransportError::Other(_))
        )
    }

    /// Returns `true` if the request was cancelled by the caller.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::RequestFailed(TransportError::Cancelled))
    }

    /// Returns `true` if a network attempt exceeded the configured timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::RequestFailed(TransportError::TimedOut))
    }

    /// Returns the HTTP status code for [`Error::Http`].
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns the raw response body if this error has one.
    pub fn raw_response(&self) -> Option<&Bytes> {
        match self {
            Error::Http { raw, .. } | Error::Decoding { raw, .. } => raw.as_ref(),
            _ => None,
        }
    }

    /// Returns the decoded fallback value if this is a [`Error::FallbackDecode`]
    /// holding a `T`.
    ///
    /// # Examples
    ///
    /// ```
    /// use netable::{Error, FallbackValue};
    ///
    /// let err = Error::FallbackDecode(FallbackValue::new(7u32));
    /// assert_eq!(err.fallback::<u32>(), Some(&7));
    /// assert_eq!(err.fallback::<String>(), None);
    /// ```
    pub fn fallback<T: Any>(&self) -> Option<&T> {
        match self {
            Error::FallbackDecode(value) => value.downcast_ref(),
            _ => None,
        }
    }

    pub(crate) fn decoding(source: serde_json::Error, raw: Option<&Bytes>) -> Self {
        Error::Decoding {
            source: Arc::new(source),
            raw: raw.cloned(),
        }
    }
}

/// Failures of the HTTP transport, independent of the client library that
/// performed the exchange.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The attempt exceeded the per-attempt timeout.
    #[error("request timed out")]
    TimedOut,

    /// The caller cancelled the request.
    #[error("request was cancelled")]
    Cancelled,

    /// The connection could not be established or was dropped.
    #[error("connection failed: {0}")]
    Connect(String),

    /// Any other transport failure.
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Timeouts and cancellations end a request no matter the retry policy.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransportError::TimedOut | TransportError::Cancelled)
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::TimedOut
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else {
            TransportError::Other(err.to_string())
        }
    }
}

/// A successfully decoded fallback value, type-erased so that [`Error`] stays
/// a single non-generic type.
#[derive(Clone)]
pub struct FallbackValue {
    value: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl FallbackValue {
    /// Wraps a decoded fallback value.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            value: Arc::new(value),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Returns the value if it is a `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref()
    }

    /// The Rust type name of the wrapped value.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for FallbackValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FallbackValue")
            .field("type", &self.type_name)
            .finish_non_exhaustive()
    }
}

fn body_text(raw: &Option<Bytes>) -> String {
    raw.as_ref()
        .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
        .unwrap_or_default()
}

/// A specialized `Result` type for the request pipeline.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_error_displays_body() {
        let err = Error::Http {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            raw: Some(Bytes::from_static(b"oops")),
        };
        assert_eq!(err.to_string(), "HTTP error 500 Internal Server Error: oops");
        assert_eq!(err.raw_response().map(|b| &b[..]), Some(&b"oops"[..]));
    }

    #[test]
    fn terminal_transport_errors_are_not_retry_eligible() {
        assert!(!Error::RequestFailed(TransportError::Cancelled).is_retry_eligible());
        assert!(!Error::RequestFailed(TransportError::TimedOut).is_retry_eligible());
        assert!(Error::RequestFailed(TransportError::Connect("refused".into())).is_retry_eligible());
        assert!(!Error::MalformedUrl("bad".into()).is_retry_eligible());
        assert!(!Error::FallbackDecode(FallbackValue::new(1u8)).is_retry_eligible());
    }

    #[test]
    fn transport_classification() {
        assert!(Error::RequestFailed(TransportError::Other("reset".into())).is_transport());
        assert!(!Error::RequestFailed(TransportError::TimedOut).is_transport());
        assert!(!Error::Http {
            status: StatusCode::BAD_GATEWAY,
            raw: None
        }
        .is_transport());
    }
}
