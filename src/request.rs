//! Request declarations.
//!
//! A [`Request`] describes one endpoint call: method, path, parameters, headers,
//! and how the response is decoded and finalized. It is built right before the
//! call and never mutated by the client.

use crate::casing::{KeyDecodingStrategy, KeyEncodingStrategy};
use crate::decode::{self, ArrayDecodeStrategy, DecodeOptions, DecodeStrategy};
use crate::params::{self, BodyEncoding, EncodedParameters};
use crate::{Config, Error, Result};
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Replaces the default parameter flattening.
pub type EncodeOverride<P> = Arc<dyn Fn(&P) -> Result<Map<String, Value>> + Send + Sync>;

/// Replaces the configured decode strategy.
pub type DecodeOverride<R> = Arc<dyn Fn(Option<&Bytes>) -> Result<R> + Send + Sync>;

/// Turns the raw resource into the value handed back to the caller.
pub type Finalizer<R, F> = Arc<dyn Fn(R) -> Result<F> + Send + Sync>;

/// A typed request declaration.
///
/// # Type Parameters
///
/// * `P` - Parameters, any `Serialize` value; `()` for none
/// * `R` - The raw resource decoded from the response body
/// * `F` - The final resource returned to the caller (defaults to `R`)
/// * `Fb` - The fallback resource tried when `R` fails to decode (defaults to `()`)
///
/// # Examples
///
/// ```
/// use netable::Request;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize)]
/// struct Login { email: String, password: String }
///
/// #[derive(Deserialize)]
/// struct Session { token: String }
///
/// let request = Request::<_, Session>::post("/auth/login")
///     .parameters(Login { email: "a@b.c".into(), password: "secret".into() })
///     .unredacted(["email"])
///     .smart_unwrap("session")
///     .finalize_with(|session| Ok(session.token));
///
/// assert_eq!(request.path, "/auth/login");
/// ```
pub struct Request<P, R, F = R, Fb = ()> {
    /// The HTTP method.
    pub method: Method,

    /// The request path, relative to the base URL or fully qualified.
    pub path: String,

    /// The parameters, encoded into the query or the body.
    pub parameters: P,

    /// Headers for this request; they win over the client's default headers.
    pub headers: HeaderMap,

    /// Body format for POST, PUT and PATCH.
    pub body_encoding: BodyEncoding,

    /// How the response body becomes `R`.
    pub decode_strategy: DecodeStrategy,

    /// How JSON arrays inside the response are decoded.
    pub array_strategy: ArrayDecodeStrategy,

    /// Whether a body that fails to decode as `R` is tried as `Fb`.
    pub decode_fallback: bool,

    /// Overrides the client's key encoding for this request.
    pub key_encoding: Option<KeyEncodingStrategy>,

    /// Overrides the client's key decoding for this request.
    pub key_decoding: Option<KeyDecodingStrategy>,

    /// Parameter keys whose values may appear in logs.
    pub unredacted_keys: HashSet<String>,

    encode_with: Option<EncodeOverride<P>>,
    decode_with: Option<DecodeOverride<R>>,
    finalize: Finalizer<R, F>,
    fallback_type: PhantomData<fn() -> Fb>,
}

impl<R: 'static> Request<(), R> {
    /// Creates a request with no parameters whose final resource is the raw one.
    ///
    /// The decode strategy is picked from `R`: see [`DecodeStrategy::for_type`].
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            parameters: (),
            headers: HeaderMap::new(),
            body_encoding: BodyEncoding::default(),
            decode_strategy: DecodeStrategy::for_type::<R>(),
            array_strategy: ArrayDecodeStrategy::default(),
            decode_fallback: false,
            key_encoding: None,
            key_decoding: None,
            unredacted_keys: HashSet::new(),
            encode_with: None,
            decode_with: None,
            finalize: Arc::new(identity::<R>),
            fallback_type: PhantomData,
        }
    }

    /// A GET request.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// A POST request.
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// A PUT request.
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    /// A PATCH request.
    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    /// A DELETE request.
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }
}

impl<P, R, F, Fb> Request<P, R, F, Fb> {
    /// Sets the parameters, changing the parameter type.
    ///
    /// Any encode override is dropped since it was written for the old type.
    pub fn parameters<P2>(self, parameters: P2) -> Request<P2, R, F, Fb> {
        Request {
            method: self.method,
            path: self.path,
            parameters,
            headers: self.headers,
            body_encoding: self.body_encoding,
            decode_strategy: self.decode_strategy,
            array_strategy: self.array_strategy,
            decode_fallback: self.decode_fallback,
            key_encoding: self.key_encoding,
            key_decoding: self.key_decoding,
            unredacted_keys: self.unredacted_keys,
            encode_with: None,
            decode_with: self.decode_with,
            finalize: self.finalize,
            fallback_type: PhantomData,
        }
    }

    /// Adds a header to the request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Coding`] if the header name or value is invalid.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| Error::Coding(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| Error::Coding(format!("Invalid header value: {}", e)))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Sets the body format for POST-family requests.
    pub fn body_encoding(mut self, encoding: BodyEncoding) -> Self {
        self.body_encoding = encoding;
        self
    }

    /// Sends the parameters as `multipart/form-data`.
    pub fn multipart(self) -> Self {
        self.body_encoding(BodyEncoding::FormData)
    }

    /// Sends the parameters as `application/x-www-form-urlencoded`.
    pub fn url_encoded(self) -> Self {
        self.body_encoding(BodyEncoding::UrlEncoded)
    }

    /// Sets the decode strategy explicitly.
    pub fn decode_strategy(mut self, strategy: DecodeStrategy) -> Self {
        self.decode_strategy = strategy;
        self
    }

    /// Unwraps the payload stored under `key` in the response object.
    pub fn smart_unwrap(self, key: impl Into<String>) -> Self {
        self.decode_strategy(DecodeStrategy::SmartUnwrap {
            key: Some(key.into()),
        })
    }

    /// Unwraps the single key of the response object that decodes to `R`.
    pub fn smart_unwrap_any(self) -> Self {
        self.decode_strategy(DecodeStrategy::SmartUnwrap { key: None })
    }

    /// Drops array elements that fail to decode instead of failing the request.
    pub fn lossy_arrays(mut self) -> Self {
        self.array_strategy = ArrayDecodeStrategy::Lossy;
        self
    }

    /// Sets the key encoding for this request's parameters.
    pub fn key_encoding(mut self, strategy: KeyEncodingStrategy) -> Self {
        self.key_encoding = Some(strategy);
        self
    }

    /// Sets the key decoding for this request's response.
    pub fn key_decoding(mut self, strategy: KeyDecodingStrategy) -> Self {
        self.key_decoding = Some(strategy);
        self
    }

    /// Allows the values of these parameter keys to appear in logs.
    pub fn unredacted<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.unredacted_keys.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Decodes the body as `Fb` when it does not decode as `R`.
    ///
    /// The fallback goes through the same decode strategy, so it composes with
    /// [`smart_unwrap`](Self::smart_unwrap) in either order. A body matching
    /// only `Fb` fails the request with [`Error::FallbackDecode`] carrying the
    /// decoded `Fb`.
    pub fn with_fallback<Fb2>(self) -> Request<P, R, F, Fb2> {
        Request {
            method: self.method,
            path: self.path,
            parameters: self.parameters,
            headers: self.headers,
            body_encoding: self.body_encoding,
            decode_strategy: self.decode_strategy,
            array_strategy: self.array_strategy,
            decode_fallback: true,
            key_encoding: self.key_encoding,
            key_decoding: self.key_decoding,
            unredacted_keys: self.unredacted_keys,
            encode_with: self.encode_with,
            decode_with: self.decode_with,
            finalize: self.finalize,
            fallback_type: PhantomData,
        }
    }

    /// Replaces the default parameter flattening with `encode`.
    pub fn encode_with(
        mut self,
        encode: impl Fn(&P) -> Result<Map<String, Value>> + Send + Sync + 'static,
    ) -> Self {
        self.encode_with = Some(Arc::new(encode));
        self
    }

    /// Replaces the decode strategy with `decode`.
    pub fn decode_with(
        mut self,
        decode: impl Fn(Option<&Bytes>) -> Result<R> + Send + Sync + 'static,
    ) -> Self {
        self.decode_with = Some(Arc::new(decode));
        self
    }

    /// Transforms the raw resource into a different final resource.
    pub fn finalize_with<F2>(
        self,
        finalize: impl Fn(R) -> Result<F2> + Send + Sync + 'static,
    ) -> Request<P, R, F2, Fb> {
        Request {
            method: self.method,
            path: self.path,
            parameters: self.parameters,
            headers: self.headers,
            body_encoding: self.body_encoding,
            decode_strategy: self.decode_strategy,
            array_strategy: self.array_strategy,
            decode_fallback: self.decode_fallback,
            key_encoding: self.key_encoding,
            key_decoding: self.key_decoding,
            unredacted_keys: self.unredacted_keys,
            encode_with: self.encode_with,
            decode_with: self.decode_with,
            finalize: Arc::new(finalize),
            fallback_type: PhantomData,
        }
    }

    pub(crate) fn finalize(&self, raw: R) -> Result<F> {
        (self.finalize)(raw)
    }
}

impl<P: Serialize, R, F, Fb> Request<P, R, F, Fb> {
    pub(crate) fn encode(&self, config: &Config) -> Result<EncodedParameters> {
        let keys = self.key_encoding.unwrap_or(config.key_encoding);
        match &self.encode_with {
            Some(encode) => {
                params::encode_map(encode(&self.parameters)?, &self.method, self.body_encoding, keys)
            }
            None => params::encode(&self.parameters, &self.method, self.body_encoding, keys),
        }
    }

    pub(crate) fn log_parameters(&self, config: &Config) -> BTreeMap<String, String> {
        params::redacted(
            &self.parameters,
            &self.unredacted_keys,
            config.enable_log_redaction,
        )
    }
}

impl<P, R, F, Fb> Request<P, R, F, Fb>
where
    R: DeserializeOwned,
    Fb: DeserializeOwned + Send + Sync + 'static,
{
    pub(crate) fn decode(&self, bytes: Option<&Bytes>, config: &Config) -> Result<R> {
        if let Some(decode) = &self.decode_with {
            return decode(bytes);
        }
        let options = DecodeOptions {
            strategy: &self.decode_strategy,
            arrays: self.array_strategy,
            keys: self.key_decoding.unwrap_or(config.key_decoding),
            fallback: self.decode_fallback,
        };
        decode::decode::<R, Fb>(bytes, &options)
    }
}

fn identity<R>(raw: R) -> Result<R> {
    Ok(raw)
}

impl<P: Clone, R, F, Fb> Clone for Request<P, R, F, Fb> {
    fn clone(&self) -> Self {
        Self {
            method: self.method.clone(),
            path: self.path.clone(),
            parameters: self.parameters.clone(),
            headers: self.headers.clone(),
            body_encoding: self.body_encoding,
            decode_strategy: self.decode_strategy.clone(),
            array_strategy: self.array_strategy,
            decode_fallback: self.decode_fallback,
            key_encoding: self.key_encoding,
            key_decoding: self.key_decoding,
            unredacted_keys: self.unredacted_keys.clone(),
            encode_with: self.encode_with.clone(),
            decode_with: self.decode_with.clone(),
            finalize: self.finalize.clone(),
            fallback_type: PhantomData,
        }
    }
}

impl<P, R, F, Fb> fmt::Debug for Request<P, R, F, Fb> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("body_encoding", &self.body_encoding)
            .field("decode_strategy", &self.decode_strategy)
            .field("array_strategy", &self.array_strategy)
            .field("decode_fallback", &self.decode_fallback)
            .finish_non_exhaustive()
    }
}
