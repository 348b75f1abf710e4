//! Response wrapper that keeps the finalized value together with the exchange
//! that produced it.

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use std::time::Duration;

/// A successful request's final resource plus metadata.
///
/// Returned by [`Client::send`](crate::Client::send);
/// [`Client::execute`](crate::Client::execute) returns only `data`.
///
/// # Examples
///
/// ```no_run
/// use netable::{Client, Request};
/// use serde::Deserialize;
///
/// #[derive(Debug, Deserialize)]
/// struct Post { title: String }
///
/// # async fn example() -> Result<(), netable::Error> {
/// let client = Client::builder()
///     .base_url("https://api.example.com")?
///     .build()?;
///
/// let response = client.send(Request::<(), Vec<Post>>::get("/posts")).await?;
///
/// println!("{} posts in {:?}", response.data.len(), response.latency);
/// println!("Attempts: {}", response.attempts);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Response<T> {
    /// The finalized value.
    pub data: T,

    /// The raw response body.
    pub raw_body: Option<Bytes>,

    /// The HTTP status code; `200 OK` for mocked responses.
    pub status: StatusCode,

    /// The response headers; empty for mocked responses.
    pub headers: HeaderMap,

    /// Time from the start of the request to the final result, retries included.
    pub latency: Duration,

    /// Number of attempts made; `1` when the first attempt succeeded.
    pub attempts: usize,

    /// Whether the body came from a mocked local resource.
    pub mocked: bool,
}

impl<T> Response<T> {
    /// Maps the response data to a different type, keeping the metadata.
    ///
    /// # Examples
    ///
    /// ```
    /// # use netable::Response;
    /// # use http::{HeaderMap, StatusCode};
    /// # use std::time::Duration;
    /// let response = Response {
    ///     data: 42,
    ///     raw_body: None,
    ///     status: StatusCode::OK,
    ///     headers: HeaderMap::new(),
    ///     latency: Duration::from_millis(100),
    ///     attempts: 1,
    ///     mocked: false,
    /// };
    ///
    /// let string_response = response.map(|n| n.to_string());
    /// assert_eq!(string_response.data, "42");
    /// ```
    pub fn map<U, F>(self, f: F) -> Response<U>
    where
        F: FnOnce(T) -> U,
    {
        Response {
            data: f(self.data),
            raw_body: self.raw_body,
            status: self.status,
            headers: self.headers,
            latency: self.latency,
            attempts: self.attempts,
            mocked: self.mocked,
        }
    }

    /// Returns `true` if the request required retries.
    pub fn was_retried(&self) -> bool {
        self.attempts > 1
    }

    /// Returns a header value by name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    /// Consumes the response, returning the finalized value.
    pub fn into_data(self) -> T {
        self.data
    }
}

impl<T> AsRef<T> for Response<T> {
    fn as_ref(&self) -> &T {
        &self.data
    }
}

impl<T> std::ops::Deref for Response<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}
