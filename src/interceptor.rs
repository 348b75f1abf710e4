//! Request interceptors.
//!
//! Interceptors run in registration order on every request, after URL
//! resolution and parameter encoding. Each may rewrite the outgoing request or
//! answer it from a local file instead of the network.

use crate::transport::OutgoingRequest;
use crate::{Client, Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderName, HeaderValue};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use url::Url;

/// The outcome of one interceptor.
#[derive(Debug, Clone, PartialEq)]
pub enum AdaptedRequest {
    /// Leave the request as it is.
    Unchanged,
    /// Send this request instead.
    Changed(OutgoingRequest),
    /// Skip the network and answer with the contents of this `file://` URL.
    Mocked(Url),
}

/// Interceptor trait for rewriting or mocking outgoing requests.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use netable::interceptor::{AdaptedRequest, Interceptor};
/// use netable::transport::OutgoingRequest;
/// use netable::{Client, Result};
///
/// struct ApiVersion;
///
/// #[async_trait]
/// impl Interceptor for ApiVersion {
///     async fn adapt(&self, request: &OutgoingRequest, _client: &Client) -> Result<AdaptedRequest> {
///         let mut request = request.clone();
///         request.url.query_pairs_mut().append_pair("api-version", "2");
///         Ok(AdaptedRequest::Changed(request))
///     }
/// }
/// ```
#[async_trait]
pub trait Interceptor: Send + Sync {
    /// Adapts `request`. `client` is the client executing it.
    async fn adapt(&self, request: &OutgoingRequest, client: &Client) -> Result<AdaptedRequest>;
}

/// An ordered list of interceptors.
#[derive(Clone, Default)]
pub struct InterceptorList {
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl InterceptorList {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an interceptor; it runs after those already added.
    pub fn push(&mut self, interceptor: impl Interceptor + 'static) {
        self.interceptors.push(Arc::new(interceptor));
    }

    /// Appends an interceptor, builder style.
    pub fn with(mut self, interceptor: impl Interceptor + 'static) -> Self {
        self.push(interceptor);
        self
    }

    /// Number of interceptors.
    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    /// Returns `true` if there are no interceptors.
    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Runs the chain.
    ///
    /// Each interceptor sees the latest changed request. The first `Mocked`
    /// result ends the chain. Otherwise the last `Changed` result wins, or
    /// `Unchanged` if nothing changed.
    ///
    /// # Errors
    ///
    /// Propagates the first interceptor error; a mock pointing at anything other
    /// than a local file fails [`Error::Interceptor`].
    pub async fn apply(&self, request: &OutgoingRequest, client: &Client) -> Result<AdaptedRequest> {
        let mut changed: Option<OutgoingRequest> = None;

        for interceptor in &self.interceptors {
            let current = changed.as_ref().unwrap_or(request);
            match interceptor.adapt(current, client).await? {
                AdaptedRequest::Unchanged => {}
                AdaptedRequest::Changed(next) => changed = Some(next),
                AdaptedRequest::Mocked(url) => {
                    if url.scheme() != "file" {
                        return Err(Error::Interceptor(format!(
                            "cannot mock with non-local resource {}",
                            url
                        )));
                    }
                    return Ok(AdaptedRequest::Mocked(url));
                }
            }
        }

        Ok(changed.map_or(AdaptedRequest::Unchanged, AdaptedRequest::Changed))
    }
}

impl std::fmt::Debug for InterceptorList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptorList")
            .field("len", &self.interceptors.len())
            .finish()
    }
}

/// Loads the bytes behind a mocked resource.
pub trait MockLoader: Send + Sync {
    /// Reads the resource at `url`.
    fn load(&self, url: &Url) -> Result<Bytes>;
}

/// Reads mocked resources from the local file system.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileMockLoader;

impl MockLoader for FileMockLoader {
    fn load(&self, url: &Url) -> Result<Bytes> {
        let path = url
            .to_file_path()
            .map_err(|_| Error::Interceptor(format!("{} is not a local file", url)))?;
        std::fs::read(&path)
            .map(Bytes::from)
            .map_err(|e| Error::Interceptor(format!("cannot load mock {}: {}", path.display(), e)))
    }
}

/// Sets a header on every request, replacing any existing value.
///
/// # Examples
///
/// ```
/// use netable::interceptor::HeaderInterceptor;
///
/// let auth = HeaderInterceptor::bearer("secret-token").unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct HeaderInterceptor {
    name: HeaderName,
    value: HeaderValue,
}

impl HeaderInterceptor {
    /// Creates an interceptor setting `name: value`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Coding`] if the header name or value is invalid.
    pub fn new(name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| Error::Coding(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| Error::Coding(format!("Invalid header value: {}", e)))?;
        Ok(Self { name, value })
    }

    /// Creates an `Authorization: Bearer <token>` interceptor.
    pub fn bearer(token: impl AsRef<str>) -> Result<Self> {
        Self::new("authorization", format!("Bearer {}", token.as_ref()))
    }
}

#[async_trait]
impl Interceptor for HeaderInterceptor {
    async fn adapt(&self, request: &OutgoingRequest, _client: &Client) -> Result<AdaptedRequest> {
        if request.headers.get(&self.name) == Some(&self.value) {
            return Ok(AdaptedRequest::Unchanged);
        }
        let mut request = request.clone();
        request.headers.insert(self.name.clone(), self.value.clone());
        Ok(AdaptedRequest::Changed(request))
    }
}

/// Answers requests for known paths from local files.
///
/// Paths are matched against the request URL's path exactly.
#[derive(Debug, Clone, Default)]
pub struct MockInterceptor {
    mocks: HashMap<String, Url>,
}

impl MockInterceptor {
    /// Creates an interceptor with no mocks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers requests for `path` with the file at `file`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Interceptor`] if `file` is not an absolute path.
    pub fn mock(mut self, path: impl Into<String>, file: impl Into<PathBuf>) -> Result<Self> {
        let file = file.into();
        let url = Url::from_file_path(&file)
            .map_err(|_| Error::Interceptor(format!("{} is not an absolute path", file.display())))?;
        self.mocks.insert(path.into(), url);
        Ok(self)
    }
}

#[async_trait]
impl Interceptor for MockInterceptor {
    async fn adapt(&self, request: &OutgoingRequest, _client: &Client) -> Result<AdaptedRequest> {
        Ok(self
            .mocks
            .get(request.url.path())
            .cloned()
            .map_or(AdaptedRequest::Unchanged, AdaptedRequest::Mocked))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderMap, Method};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn client() -> Client {
        Client::builder()
            .base_url("https://api.example.com")
            .unwrap()
            .build()
            .unwrap()
    }

    fn request() -> OutgoingRequest {
        OutgoingRequest {
            method: Method::GET,
            url: Url::parse("https://api.example.com/posts").unwrap(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    struct Counting(Arc<AtomicUsize>, AdaptedRequest);

    #[async_trait]
    impl Interceptor for Counting {
        async fn adapt(&self, _request: &OutgoingRequest, _client: &Client) -> Result<AdaptedRequest> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(self.1.clone())
        }
    }

    struct AppendQuery(&'static str);

    #[async_trait]
    impl Interceptor for AppendQuery {
        async fn adapt(&self, request: &OutgoingRequest, _client: &Client) -> Result<AdaptedRequest> {
            let mut request = request.clone();
            request.url.query_pairs_mut().append_pair(self.0, "1");
            Ok(AdaptedRequest::Changed(request))
        }
    }

    #[tokio::test]
    async fn test_empty_chain_is_unchanged() {
        let adapted = InterceptorList::new().apply(&request(), &client()).await.unwrap();
        assert_eq!(adapted, AdaptedRequest::Unchanged);
    }

    #[tokio::test]
    async fn test_changes_chain_in_order() {
        let list = InterceptorList::new()
            .with(AppendQuery("first"))
            .with(AppendQuery("second"));
        match list.apply(&request(), &client()).await.unwrap() {
            AdaptedRequest::Changed(changed) => {
                assert_eq!(changed.url.query(), Some("first=1&second=1"));
            }
            other => panic!("expected change, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_mock_short_circuits() {
        let after = Arc::new(AtomicUsize::new(0));
        let mock = Url::parse("file:///tmp/posts.json").unwrap();
        let list = InterceptorList::new()
            .with(AppendQuery("first"))
            .with(Counting(Arc::new(AtomicUsize::new(0)), AdaptedRequest::Mocked(mock.clone())))
            .with(Counting(after.clone(), AdaptedRequest::Unchanged));

        let adapted = list.apply(&request(), &client()).await.unwrap();
        assert_eq!(adapted, AdaptedRequest::Mocked(mock));
        assert_eq!(after.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_remote_mock_rejected() {
        let remote = Url::parse("https://cdn.example.com/posts.json").unwrap();
        let list = InterceptorList::new().with(Counting(
            Arc::new(AtomicUsize::new(0)),
            AdaptedRequest::Mocked(remote),
        ));
        let err = list.apply(&request(), &client()).await.unwrap_err();
        assert!(matches!(err, Error::Interceptor(_)));
    }

    #[tokio::test]
    async fn test_header_interceptor() {
        let list = InterceptorList::new().with(HeaderInterceptor::bearer("abc").unwrap());
        match list.apply(&request(), &client()).await.unwrap() {
            AdaptedRequest::Changed(changed) => {
                assert_eq!(changed.headers["authorization"], "Bearer abc");
            }
            other => panic!("expected change, got {:?}", other),
        }
    }

    #[test]
    fn test_file_loader_missing_file() {
        let url = Url::parse("file:///definitely/not/here.json").unwrap();
        assert!(matches!(FileMockLoader.load(&url), Err(Error::Interceptor(_))));
    }
}
