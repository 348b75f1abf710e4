//! The request executor.
//!
//! The [`Client`] type runs every [`Request`] through the same pipeline:
//! resolve the URL, encode parameters, intercept, send (retrying per the
//! client's [`RetryConfiguration`]), check the status, decode, finalize.
//! Use [`ClientBuilder`] to configure and create clients.

use crate::cancel::{CancelToken, InFlight, RequestHandle};
use crate::failure::{FailureChannel, FailureDelegate, FailureSubscription};
use crate::interceptor::{AdaptedRequest, FileMockLoader, Interceptor, InterceptorList, MockLoader};
use crate::log::{LogDestination, LogEvent, TracingLogDestination};
use crate::params::EncodedParameters;
use crate::resolve::{check_base, resolve};
use crate::transport::{
    OutgoingBody, OutgoingRequest, ReqwestTransport, Transport, TransportResponse,
};
use crate::{Config, Error, Request, Response, Result, RetryConfiguration, TransportError};
use bytes::Bytes;
use futures::Stream;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use parking_lot::RwLock;
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use url::Url;
use uuid::Uuid;

/// An HTTP client that executes typed [`Request`]s.
///
/// The client is designed to be reused across requests and shared across
/// tasks; cloning it is cheap and every clone drives the same pipeline,
/// in-flight registry and failure channel.
///
/// # Examples
///
/// ```no_run
/// use netable::{Client, Request, RetryConfiguration, RetryableErrors};
/// use serde::{Deserialize, Serialize};
/// use std::time::Duration;
///
/// #[derive(Serialize)]
/// struct NewPost {
///     title: String,
/// }
///
/// #[derive(Debug, Deserialize)]
/// struct Post {
///     id: u64,
///     title: String,
/// }
///
/// # async fn example() -> Result<(), netable::Error> {
/// let client = Client::builder()
///     .base_url("https://api.example.com")?
///     .timeout(Duration::from_secs(30))
///     .retry_configuration(RetryConfiguration::new(
///         RetryableErrors::All,
///         2,
///         Duration::from_millis(500),
///     ))
///     .build()?;
///
/// // GET request, unwrapping the `posts` key of the response object
/// let posts = client
///     .execute(Request::<(), Vec<Post>>::get("/posts").smart_unwrap("posts"))
///     .await?;
/// println!("Fetched {} posts", posts.len());
///
/// // POST request
/// let created = client
///     .execute(
///         Request::<(), Post>::post("/posts").parameters(NewPost {
///             title: "Hello".to_string(),
///         }),
///     )
///     .await?;
/// println!("Created post {}", created.id);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    transport: Arc<dyn Transport>,
    base_url: Url,
    default_headers: HeaderMap,
    config: Config,
    retry: RetryConfiguration,
    interceptors: InterceptorList,
    mock_loader: Arc<dyn MockLoader>,
    log: Arc<dyn LogDestination>,
    failure_delegate: RwLock<Option<Arc<dyn FailureDelegate>>>,
    failures: FailureChannel,
    in_flight: Arc<InFlight>,
    delivery: Option<Handle>,
}

/// Where one request's bytes come from, fixed once interceptors ran.
enum Source {
    Network(OutgoingRequest),
    Mocked(Url),
}

/// A successful attempt.
struct Attempt<F> {
    data: F,
    body: Option<Bytes>,
    status: StatusCode,
    headers: HeaderMap,
    mocked: bool,
}

impl Client {
    /// Creates a new `ClientBuilder` for configuring a client.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use netable::Client;
    ///
    /// # async fn example() -> Result<(), netable::Error> {
    /// let client = Client::builder()
    ///     .base_url("https://api.example.com")?
    ///     .build()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// The base URL every request path is resolved against.
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// The client-wide configuration.
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// The client's retry policy.
    pub fn retry_configuration(&self) -> &RetryConfiguration {
        &self.inner.retry
    }

    /// Executes `request` and returns its final resource.
    ///
    /// # Errors
    ///
    /// Every failure, from URL resolution to finalizing, is reported as one
    /// [`Error`]. Terminal failures other than cancellation are also reported to
    /// the failure delegate and the failure channel.
    pub async fn execute<P, R, F, Fb>(&self, request: Request<P, R, F, Fb>) -> Result<F>
    where
        P: Serialize,
        R: DeserializeOwned,
        F: Debug,
        Fb: DeserializeOwned + Send + Sync + 'static,
    {
        self.send(request).await.map(Response::into_data)
    }

    /// Executes `request` and returns the final resource with response metadata.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use netable::{Client, Request};
    ///
    /// # async fn example() -> Result<(), netable::Error> {
    /// # let client = Client::builder().base_url("https://api.example.com")?.build()?;
    /// let response = client
    ///     .send(Request::<(), serde_json::Value>::get("/version"))
    ///     .await?;
    /// println!("{} after {} attempt(s)", response.status, response.attempts);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn send<P, R, F, Fb>(&self, request: Request<P, R, F, Fb>) -> Result<Response<F>>
    where
        P: Serialize,
        R: DeserializeOwned,
        F: Debug,
        Fb: DeserializeOwned + Send + Sync + 'static,
    {
        self.run(
            Uuid::new_v4(),
            &request,
            &self.inner.interceptors,
            &CancelToken::new(),
        )
        .await
    }

    /// Executes `request`, stopping as soon as `token` is cancelled.
    ///
    /// A cancelled request fails with exactly one
    /// `Error::RequestFailed(TransportError::Cancelled)` and is not reported to
    /// the failure delegate or channel.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use netable::{CancelToken, Client, Request};
    ///
    /// # async fn example() -> Result<(), netable::Error> {
    /// # let client = Client::builder().base_url("https://api.example.com")?.build()?;
    /// let token = CancelToken::new();
    /// let watchdog = token.clone();
    /// tokio::spawn(async move {
    ///     tokio::time::sleep(std::time::Duration::from_secs(1)).await;
    ///     watchdog.cancel();
    /// });
    ///
    /// let result = client
    ///     .execute_cancellable(Request::<(), serde_json::Value>::get("/slow"), &token)
    ///     .await;
    /// assert!(result.map_or_else(|e| e.is_cancelled(), |_| true));
    /// # Ok(())
    /// # }
    /// ```
    pub async fn execute_cancellable<P, R, F, Fb>(
        &self,
        request: Request<P, R, F, Fb>,
        token: &CancelToken,
    ) -> Result<F>
    where
        P: Serialize,
        R: DeserializeOwned,
        F: Debug,
        Fb: DeserializeOwned + Send + Sync + 'static,
    {
        self.run(Uuid::new_v4(), &request, &self.inner.interceptors, token)
            .await
            .map(Response::into_data)
    }

    /// Executes `request` with an explicit interceptor list instead of the
    /// client's own.
    pub async fn send_with<P, R, F, Fb>(
        &self,
        request: Request<P, R, F, Fb>,
        interceptors: &InterceptorList,
        token: &CancelToken,
    ) -> Result<Response<F>>
    where
        P: Serialize,
        R: DeserializeOwned,
        F: Debug,
        Fb: DeserializeOwned + Send + Sync + 'static,
    {
        self.run(Uuid::new_v4(), &request, interceptors, token).await
    }

    /// Spawns `request` and hands its outcome to `callback` exactly once.
    ///
    /// The callback runs on the client's delivery runtime when one was set with
    /// [`ClientBuilder::delivery_handle`], otherwise on the request task.
    ///
    /// # Panics
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use netable::{Client, Request};
    ///
    /// # async fn example() -> Result<(), netable::Error> {
    /// # let client = Client::builder().base_url("https://api.example.com")?.build()?;
    /// let handle = client.execute_with_callback(
    ///     Request::<(), serde_json::Value>::get("/version"),
    ///     |result| match result {
    ///         Ok(version) => println!("version: {}", version),
    ///         Err(e) => eprintln!("failed: {}", e),
    ///     },
    /// );
    /// println!("started request {}", handle.id());
    /// # Ok(())
    /// # }
    /// ```
    pub fn execute_with_callback<P, R, F, Fb, C>(
        &self,
        request: Request<P, R, F, Fb>,
        callback: C,
    ) -> RequestHandle
    where
        P: Serialize + Send + Sync + 'static,
        R: DeserializeOwned + Send + 'static,
        F: Debug + Send + 'static,
        Fb: DeserializeOwned + Send + Sync + 'static,
        C: FnOnce(Result<F>) + Send + 'static,
    {
        let id = Uuid::new_v4();
        let token = CancelToken::new();
        let client = self.clone();
        let task_token = token.clone();

        let task = tokio::spawn(async move {
            let result = client
                .run(id, &request, &client.inner.interceptors, &task_token)
                .await
                .map(Response::into_data);
            match &client.inner.delivery {
                Some(delivery) => {
                    delivery.spawn(async move { callback(result) });
                }
                None => callback(result),
            }
        });

        RequestHandle::new(id, token, task)
    }

    /// Spawns `request` and returns a stream that yields its outcome once and
    /// then ends.
    ///
    /// # Panics
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use futures::StreamExt;
    /// use netable::{Client, Request};
    ///
    /// # async fn example() -> Result<(), netable::Error> {
    /// # let client = Client::builder().base_url("https://api.example.com")?.build()?;
    /// let mut stream = client.execute_stream(Request::<(), serde_json::Value>::get("/version"));
    /// while let Some(result) = stream.next().await {
    ///     println!("{:?}", result?);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn execute_stream<P, R, F, Fb>(&self, request: Request<P, R, F, Fb>) -> RequestStream<F>
    where
        P: Serialize + Send + Sync + 'static,
        R: DeserializeOwned + Send + 'static,
        F: Debug + Send + 'static,
        Fb: DeserializeOwned + Send + Sync + 'static,
    {
        let (sender, receiver) = oneshot::channel();
        let handle = self.execute_with_callback(request, move |result| {
            // The stream may have been dropped; nobody is waiting then.
            let _ = sender.send(result);
        });
        RequestStream {
            receiver: Some(receiver),
            handle,
        }
    }

    /// Makes a GET request to `path`, decoding the body as `R`.
    pub async fn get<R>(&self, path: impl Into<String>) -> Result<R>
    where
        R: DeserializeOwned + Debug + 'static,
    {
        self.execute(Request::<(), R>::get(path)).await
    }

    /// Makes a POST request to `path` with `parameters` as the JSON body.
    pub async fn post<P, R>(&self, path: impl Into<String>, parameters: P) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned + Debug + 'static,
    {
        self.execute(Request::<(), R>::post(path).parameters(parameters))
            .await
    }

    /// Makes a PUT request to `path` with `parameters` as the JSON body.
    pub async fn put<P, R>(&self, path: impl Into<String>, parameters: P) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned + Debug + 'static,
    {
        self.execute(Request::<(), R>::put(path).parameters(parameters))
            .await
    }

    /// Makes a PATCH request to `path` with `parameters` as the JSON body.
    pub async fn patch<P, R>(&self, path: impl Into<String>, parameters: P) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned + Debug + 'static,
    {
        self.execute(Request::<(), R>::patch(path).parameters(parameters))
            .await
    }

    /// Makes a DELETE request to `path`.
    pub async fn delete<R>(&self, path: impl Into<String>) -> Result<R>
    where
        R: DeserializeOwned + Debug + 'static,
    {
        self.execute(Request::<(), R>::delete(path)).await
    }

    /// Subscribes to every terminally failed request from now on.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use netable::Client;
    ///
    /// # async fn example() -> Result<(), netable::Error> {
    /// # let client = Client::builder().base_url("https://api.example.com")?.build()?;
    /// let mut failures = client.subscribe_failures();
    /// tokio::spawn(async move {
    ///     while let Some(error) = failures.recv().await {
    ///         if error.status().map_or(true, |s| s.as_u16() != 401) {
    ///             eprintln!("request failed: {}", error);
    ///         }
    ///     }
    /// });
    /// # Ok(())
    /// # }
    /// ```
    pub fn subscribe_failures(&self) -> FailureSubscription {
        self.inner.failures.subscribe()
    }

    /// Replaces the failure delegate.
    pub fn set_failure_delegate(&self, delegate: impl FailureDelegate + 'static) {
        *self.inner.failure_delegate.write() = Some(Arc::new(delegate));
    }

    /// Removes the failure delegate.
    pub fn clear_failure_delegate(&self) {
        *self.inner.failure_delegate.write() = None;
    }

    /// Cancels the running request with `id`. Returns `false` if it is not running.
    pub fn cancel(&self, id: &Uuid) -> bool {
        self.inner.in_flight.cancel(id)
    }

    /// Cancels every running request and returns how many there were.
    pub fn cancel_all(&self) -> usize {
        let cancelled = self.inner.in_flight.cancel_all();
        if cancelled > 0 {
            tracing::info!(cancelled, "Cancelled all in-flight requests");
        }
        cancelled
    }

    /// Number of requests currently running on this client.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.len()
    }

    async fn run<P, R, F, Fb>(
        &self,
        id: Uuid,
        request: &Request<P, R, F, Fb>,
        interceptors: &InterceptorList,
        token: &CancelToken,
    ) -> Result<Response<F>>
    where
        P: Serialize,
        R: DeserializeOwned,
        F: Debug,
        Fb: DeserializeOwned + Send + Sync + 'static,
    {
        let start = Instant::now();
        let _registered = self.inner.in_flight.register(id, token.clone());

        match self.pipeline(id, start, request, interceptors, token).await {
            Ok(response) => Ok(response),
            Err(error) => {
                self.report_failure(id, start.elapsed(), &error);
                Err(error)
            }
        }
    }

    async fn pipeline<P, R, F, Fb>(
        &self,
        id: Uuid,
        start: Instant,
        request: &Request<P, R, F, Fb>,
        interceptors: &InterceptorList,
        token: &CancelToken,
    ) -> Result<Response<F>>
    where
        P: Serialize,
        R: DeserializeOwned,
        F: Debug,
        Fb: DeserializeOwned + Send + Sync + 'static,
    {
        let inner = &self.inner;
        let outgoing = self.prepare(request)?;

        let params = request.log_parameters(&inner.config);
        inner.log.log(LogEvent::RequestStarted {
            id,
            method: &outgoing.method,
            url: &outgoing.url,
            headers: &outgoing.headers,
            params: &params,
        });

        let adapted = interceptors.apply(&outgoing, self).await?;
        let source = match adapted {
            AdaptedRequest::Unchanged => Source::Network(outgoing),
            AdaptedRequest::Changed(changed) => Source::Network(changed),
            AdaptedRequest::Mocked(url) => {
                let message = format!("Request {} answered from {}", id, url);
                inner.log.log(LogEvent::Message(&message));
                Source::Mocked(url)
            }
        };

        let mut attempt = 0;
        let mut retries_left = inner.retry.count;

        loop {
            attempt += 1;

            if attempt > 1 {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => return Err(cancelled()),
                    _ = tokio::time::sleep(inner.retry.delay) => {}
                }
            }
            if token.is_cancelled() {
                return Err(cancelled());
            }

            let error = match self.attempt(&source, request, token).await {
                Ok(done) => {
                    let latency = start.elapsed();
                    inner.log.log(LogEvent::RequestCompleted {
                        id,
                        status: done.status,
                        elapsed: latency,
                        body: done.body.as_ref(),
                        finalized: &done.data,
                        mocked: done.mocked,
                    });
                    return Ok(Response {
                        data: done.data,
                        raw_body: done.body,
                        status: done.status,
                        headers: done.headers,
                        latency,
                        attempts: attempt,
                        mocked: done.mocked,
                    });
                }
                Err(error) => error,
            };

            if token.is_cancelled() {
                return Err(cancelled());
            }
            if !inner.retry.enabled(retries_left) || !inner.retry.should_retry(&error, attempt) {
                return Err(error);
            }

            inner.log.log(LogEvent::RequestRetrying {
                id,
                attempt,
                error: &error,
            });
            retries_left -= 1;
        }
    }

    /// Merges headers, resolves the URL and encodes the parameters.
    fn prepare<P, R, F, Fb>(&self, request: &Request<P, R, F, Fb>) -> Result<OutgoingRequest>
    where
        P: Serialize,
    {
        let inner = &self.inner;

        let mut headers = inner.default_headers.clone();
        for (name, value) in &request.headers {
            headers.insert(name.clone(), value.clone());
        }

        let mut url = resolve(&request.path, &inner.base_url)?;

        let body = match request.encode(&inner.config)? {
            EncodedParameters::None => None,
            query @ EncodedParameters::Query(_) => {
                query.apply_query(&mut url);
                None
            }
            EncodedParameters::Body { content_type, body } => {
                let value = HeaderValue::from_str(&content_type)
                    .map_err(|e| Error::Coding(format!("Invalid content type: {}", e)))?;
                headers.insert(CONTENT_TYPE, value);
                Some(OutgoingBody::Bytes(body))
            }
            EncodedParameters::Form(fields) => {
                headers.remove(CONTENT_TYPE);
                Some(OutgoingBody::Form(fields))
            }
        };

        Ok(OutgoingRequest {
            method: request.method.clone(),
            url,
            headers,
            body,
        })
    }

    /// One attempt: fetch, check the status, decode, finalize.
    async fn attempt<P, R, F, Fb>(
        &self,
        source: &Source,
        request: &Request<P, R, F, Fb>,
        token: &CancelToken,
    ) -> Result<Attempt<F>>
    where
        R: DeserializeOwned,
        Fb: DeserializeOwned + Send + Sync + 'static,
    {
        let inner = &self.inner;

        let (response, mocked) = match source {
            Source::Mocked(url) => {
                let body = inner.mock_loader.load(url)?;
                let response = TransportResponse {
                    status: StatusCode::OK,
                    headers: HeaderMap::new(),
                    body: Some(body),
                };
                (response, true)
            }
            Source::Network(outgoing) => {
                let send = inner.transport.send(outgoing, inner.config.timeout);
                let response = tokio::select! {
                    biased;
                    _ = token.cancelled() => return Err(cancelled()),
                    result = with_timeout(send, inner.config.timeout) => result?,
                };
                (response, false)
            }
        };

        let TransportResponse {
            status,
            headers,
            body,
        } = response;

        if !status.is_success() {
            if status.is_client_error() {
                tracing::debug!(status = status.as_u16(), "Client error (4xx)");
            } else if status.is_server_error() {
                tracing::debug!(status = status.as_u16(), "Server error (5xx)");
            }
            return Err(Error::Http { status, raw: body });
        }

        let raw = request.decode(body.as_ref(), &inner.config)?;
        let data = request.finalize(raw)?;

        Ok(Attempt {
            data,
            body,
            status,
            headers,
            mocked,
        })
    }

    fn report_failure(&self, id: Uuid, elapsed: Duration, error: &Error) {
        let inner = &self.inner;
        inner.log.log(LogEvent::RequestFailed { id, elapsed, error });

        if error.is_cancelled() {
            return;
        }

        let delegate = inner.failure_delegate.read().clone();
        if let Some(delegate) = delegate {
            delegate.request_did_fail(error);
        }
        inner.failures.publish(Arc::new(error.clone()));
    }
}

impl Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.inner.base_url.as_str())
            .field("config", &self.inner.config)
            .field("retry", &self.inner.retry)
            .field("interceptors", &self.inner.interceptors)
            .finish_non_exhaustive()
    }
}

fn cancelled() -> Error {
    Error::RequestFailed(TransportError::Cancelled)
}

async fn with_timeout(
    send: impl Future<Output = std::result::Result<TransportResponse, TransportError>>,
    timeout: Option<Duration>,
) -> std::result::Result<TransportResponse, TransportError> {
    match timeout {
        Some(timeout) => tokio::time::timeout(timeout, send)
            .await
            .unwrap_or(Err(TransportError::TimedOut)),
        None => send.await,
    }
}

/// The single outcome of a request started with [`Client::execute_stream`].
///
/// Yields exactly one item, then ends. Dropping the stream does not cancel the
/// request; use [`handle`](Self::handle) for that.
#[derive(Debug)]
pub struct RequestStream<F> {
    receiver: Option<oneshot::Receiver<Result<F>>>,
    handle: RequestHandle,
}

impl<F> RequestStream<F> {
    /// The handle of the underlying request.
    pub fn handle(&self) -> &RequestHandle {
        &self.handle
    }
}

impl<F> Stream for RequestStream<F> {
    type Item = Result<F>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let Some(receiver) = self.receiver.as_mut() else {
            return Poll::Ready(None);
        };
        let item = match Pin::new(receiver).poll(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(Ok(result)) => Some(result),
            // The request task was aborted before it produced an outcome.
            Poll::Ready(Err(_)) => None,
        };
        self.receiver = None;
        Poll::Ready(item)
    }
}

/// Builder for configuring and creating a [`Client`].
///
/// # Examples
///
/// ```no_run
/// use netable::interceptor::HeaderInterceptor;
/// use netable::{ClientBuilder, RetryConfiguration, RetryableErrors};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), netable::Error> {
/// let client = ClientBuilder::new()
///     .base_url("https://api.example.com")?
///     .timeout(Duration::from_secs(30))
///     .retry_configuration(RetryConfiguration::new(
///         RetryableErrors::TransportOnly,
///         3,
///         Duration::from_millis(250),
///     ))
///     .default_header("User-Agent", "my-app/1.0")?
///     .interceptor(HeaderInterceptor::bearer("secret")?)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    base_url: Option<Url>,
    default_headers: HeaderMap,
    config: Config,
    retry: RetryConfiguration,
    interceptors: InterceptorList,
    transport: Option<Arc<dyn Transport>>,
    mock_loader: Arc<dyn MockLoader>,
    log: Arc<dyn LogDestination>,
    failure_delegate: Option<Arc<dyn FailureDelegate>>,
    delivery: Option<Handle>,
    failure_capacity: usize,
}

impl ClientBuilder {
    /// Creates a new `ClientBuilder` with default settings.
    pub fn new() -> Self {
        Self {
            base_url: None,
            default_headers: HeaderMap::new(),
            config: Config::default(),
            retry: RetryConfiguration::none(),
            interceptors: InterceptorList::new(),
            transport: None,
            mock_loader: Arc::new(FileMockLoader),
            log: Arc::new(TracingLogDestination),
            failure_delegate: None,
            delivery: None,
            failure_capacity: 64,
        }
    }

    /// Sets the base URL for all requests.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedUrl`] if the URL cannot be parsed.
    pub fn base_url(mut self, url: impl AsRef<str>) -> Result<Self> {
        let url = Url::parse(url.as_ref())
            .map_err(|e| Error::MalformedUrl(format!("{}: {}", url.as_ref(), e)))?;
        self.base_url = Some(url);
        Ok(self)
    }

    /// Adds a header sent with every request. Per-request headers override it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Coding`] if the header name or value is invalid.
    pub fn default_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| Error::Coding(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| Error::Coding(format!("Invalid header value: {}", e)))?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// Replaces the client configuration, including any timeout set earlier.
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Sets the per-attempt timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    /// Sets the retry policy. Requests are not retried by default.
    pub fn retry_configuration(mut self, retry: RetryConfiguration) -> Self {
        self.retry = retry;
        self
    }

    /// Appends an interceptor to the client's chain.
    pub fn interceptor(mut self, interceptor: impl Interceptor + 'static) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    /// Replaces the client's interceptor chain.
    pub fn interceptors(mut self, interceptors: InterceptorList) -> Self {
        self.interceptors = interceptors;
        self
    }

    /// Sets where lifecycle events go. Defaults to [`TracingLogDestination`].
    pub fn log_destination(mut self, destination: impl LogDestination + 'static) -> Self {
        self.log = Arc::new(destination);
        self
    }

    /// Sets the failure delegate.
    pub fn failure_delegate(mut self, delegate: impl FailureDelegate + 'static) -> Self {
        self.failure_delegate = Some(Arc::new(delegate));
        self
    }

    /// Replaces the network transport. Defaults to [`ReqwestTransport`].
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Replaces how mocked resources are loaded. Defaults to [`FileMockLoader`].
    pub fn mock_loader(mut self, loader: impl MockLoader + 'static) -> Self {
        self.mock_loader = Arc::new(loader);
        self
    }

    /// Runs completion callbacks on this runtime instead of the request task.
    pub fn delivery_handle(mut self, handle: Handle) -> Self {
        self.delivery = Some(handle);
        self
    }

    /// How many failures the failure channel buffers for a slow subscriber.
    pub fn failure_channel_capacity(mut self, capacity: usize) -> Self {
        self.failure_capacity = capacity;
        self
    }

    /// Builds the configured `Client`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedUrl`] if no base URL was provided or it is not
    /// an http(s) URL, and [`Error::Unknown`] if the default transport cannot be
    /// created.
    pub fn build(self) -> Result<Client> {
        let base_url = self
            .base_url
            .ok_or_else(|| Error::MalformedUrl("Base URL is required".to_string()))?;
        check_base(&base_url)?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => {
                let client = reqwest::Client::builder()
                    .build()
                    .map_err(|e| Error::Unknown(Arc::new(e)))?;
                Arc::new(ReqwestTransport::with_client(client))
            }
        };

        Ok(Client {
            inner: Arc::new(ClientInner {
                transport,
                base_url,
                default_headers: self.default_headers,
                config: self.config,
                retry: self.retry,
                interceptors: self.interceptors,
                mock_loader: self.mock_loader,
                log: self.log,
                failure_delegate: RwLock::new(self.failure_delegate),
                failures: FailureChannel::new(self.failure_capacity),
                in_flight: Arc::new(InFlight::default()),
                delivery: self.delivery,
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
