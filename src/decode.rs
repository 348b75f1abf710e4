//! Response decoding strategies.
//!
//! Which strategy applies is chosen when a [`Request`](crate::Request) is
//! declared: [`DecodeStrategy::for_type`] picks `Empty` or `RawBytes` from the raw
//! resource type, and the request builder switches to `SmartUnwrap` on demand.
//! Array handling ([`ArrayDecodeStrategy`]), key casing and the fallback type
//! apply on top of the JSON-based strategies.

use crate::casing::KeyDecodingStrategy;
use crate::error::FallbackValue;
use crate::{Error, Result};
use bytes::Bytes;
use serde::de::{value::BytesDeserializer, DeserializeOwned, Error as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::TypeId;

/// The raw resource of requests whose response body is ignored.
///
/// Decodes from `{}` regardless of what the server sent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Empty {}

/// How the response body becomes the raw resource.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DecodeStrategy {
    /// Ignore the body; decode from a canonical empty object.
    Empty,
    /// Parse the body as JSON into the raw resource.
    #[default]
    Plain,
    /// The body is an object wrapping the payload under one key.
    ///
    /// With `key: None` exactly one key of the object must decode to the raw
    /// resource; zero or several matches are extraction errors.
    SmartUnwrap {
        /// The key holding the payload
        key: Option<String>,
    },
    /// Hand the body bytes over untouched.
    RawBytes,
}

impl DecodeStrategy {
    /// The strategy implied by a raw resource type: `Empty` for [`Empty`] and
    /// `()`, `RawBytes` for [`Bytes`], `Plain` for anything else.
    pub fn for_type<R: 'static>() -> Self {
        let id = TypeId::of::<R>();
        if id == TypeId::of::<Empty>() || id == TypeId::of::<()>() {
            DecodeStrategy::Empty
        } else if id == TypeId::of::<Bytes>() {
            DecodeStrategy::RawBytes
        } else {
            DecodeStrategy::Plain
        }
    }

    fn reads_json(&self) -> bool {
        matches!(self, DecodeStrategy::Plain | DecodeStrategy::SmartUnwrap { .. })
    }
}

/// How JSON arrays are decoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ArrayDecodeStrategy {
    /// One bad element fails the whole array.
    #[default]
    Standard,
    /// Elements that fail to decode are dropped; the rest keep their order.
    Lossy,
}

/// Everything the decoder needs to know about one request.
#[derive(Debug, Clone, Copy)]
pub struct DecodeOptions<'a> {
    /// The decode strategy
    pub strategy: &'a DecodeStrategy,
    /// Array handling
    pub arrays: ArrayDecodeStrategy,
    /// Key casing applied before decoding
    pub keys: KeyDecodingStrategy,
    /// Try the fallback type when the JSON decode fails
    pub fallback: bool,
}

impl<'a> DecodeOptions<'a> {
    /// Options with standard arrays and default keys.
    pub fn new(strategy: &'a DecodeStrategy) -> Self {
        Self {
            strategy,
            arrays: ArrayDecodeStrategy::Standard,
            keys: KeyDecodingStrategy::UseDefaultKeys,
            fallback: false,
        }
    }
}

/// Decodes `bytes` into the raw resource `R`.
///
/// `Fb` is the fallback type, only consulted when `options.fallback` is set. It
/// is decoded from the same bytes with the same JSON strategy (unwrap key and
/// key casing included) but with standard arrays.
///
/// # Errors
///
/// - [`Error::NoData`] when a strategy that reads the body gets none.
/// - [`Error::Decoding`] when parsing fails.
/// - [`Error::ResourceExtraction`] when smart unwrapping finds no unambiguous payload.
/// - [`Error::FallbackDecode`] when the body decodes only as `Fb`.
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use netable::decode::{decode, ArrayDecodeStrategy, DecodeOptions, DecodeStrategy};
///
/// let body = Bytes::from_static(br#"{"posts": [1, "two", 3]}"#);
/// let strategy = DecodeStrategy::SmartUnwrap { key: Some("posts".into()) };
/// let mut options = DecodeOptions::new(&strategy);
/// options.arrays = ArrayDecodeStrategy::Lossy;
///
/// let posts: Vec<u32> = decode::<_, ()>(Some(&body), &options).unwrap();
/// assert_eq!(posts, vec![1, 3]);
/// ```
pub fn decode<R, Fb>(bytes: Option<&Bytes>, options: &DecodeOptions<'_>) -> Result<R>
where
    R: DeserializeOwned,
    Fb: DeserializeOwned + Send + Sync + 'static,
{
    let primary = match decode_as::<R>(bytes, options) {
        Ok(resource) => return Ok(resource),
        Err(e) => e,
    };

    if !options.fallback || !options.strategy.reads_json() || matches!(primary, Error::NoData) {
        return Err(primary);
    }

    let fallback = DecodeOptions {
        arrays: ArrayDecodeStrategy::Standard,
        fallback: false,
        ..*options
    };
    match decode_as::<Fb>(bytes, &fallback) {
        Ok(value) => {
            tracing::debug!(
                fallback = std::any::type_name::<Fb>(),
                error = %primary,
                "Response matched fallback type"
            );
            Err(Error::FallbackDecode(FallbackValue::new(value)))
        }
        Err(_) => Err(primary),
    }
}

fn decode_as<R: DeserializeOwned>(bytes: Option<&Bytes>, options: &DecodeOptions<'_>) -> Result<R> {
    match options.strategy {
        DecodeStrategy::Empty => decode_empty(),
        DecodeStrategy::RawBytes => {
            let raw = bytes.ok_or(Error::NoData)?;
            R::deserialize(BytesDeserializer::<serde::de::value::Error>::new(raw))
                .map_err(|e| Error::decoding(serde_json::Error::custom(e), bytes))
        }
        DecodeStrategy::Plain => decode_json(bytes, options),
        DecodeStrategy::SmartUnwrap { key } => {
            let raw = bytes.ok_or(Error::NoData)?;
            let value = parse_value(raw, options.keys)?;
            smart_unwrap(value, key.as_deref(), options.arrays, raw)
        }
    }
}

fn decode_empty<R: DeserializeOwned>() -> Result<R> {
    serde_json::from_slice(b"{}")
        .or_else(|_| serde_json::from_slice(b"null"))
        .map_err(|e| Error::decoding(e, None))
}

fn decode_json<R: DeserializeOwned>(bytes: Option<&Bytes>, options: &DecodeOptions<'_>) -> Result<R> {
    let raw = bytes.ok_or(Error::NoData)?;
    if options.arrays == ArrayDecodeStrategy::Standard && options.keys.is_default() {
        return serde_json::from_slice(raw).map_err(|e| Error::decoding(e, bytes));
    }
    let value = parse_value(raw, options.keys)?;
    from_value(value, options.arrays, raw)
}

fn parse_value(raw: &Bytes, keys: KeyDecodingStrategy) -> Result<Value> {
    serde_json::from_slice::<Value>(raw)
        .map(|value| keys.apply(value))
        .map_err(|e| Error::decoding(e, Some(raw)))
}

fn from_value<R: DeserializeOwned>(value: Value, arrays: ArrayDecodeStrategy, raw: &Bytes) -> Result<R> {
    let value = match (arrays, value) {
        (ArrayDecodeStrategy::Lossy, Value::Array(items)) => Value::Array(retain_decodable::<R>(items)),
        (_, value) => value,
    };
    R::deserialize(value).map_err(|e| Error::decoding(e, Some(raw)))
}

/// Keeps the elements that decode on their own as a one-element `R`.
fn retain_decodable<R: DeserializeOwned>(items: Vec<Value>) -> Vec<Value> {
    let total = items.len();
    let kept: Vec<Value> = items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| {
            let probe = Value::Array(vec![item]);
            match R::deserialize(&probe) {
                Ok(_) => match probe {
                    Value::Array(mut one) => one.pop(),
                    _ => None,
                },
                Err(e) => {
                    tracing::debug!(index, error = %e, "Discarding undecodable array element");
                    None
                }
            }
        })
        .collect();

    if kept.len() < total {
        tracing::warn!(
            kept = kept.len(),
            discarded = total - kept.len(),
            "Lossy array decode dropped elements"
        );
    }
    kept
}

fn smart_unwrap<R: DeserializeOwned>(
    value: Value,
    key: Option<&str>,
    arrays: ArrayDecodeStrategy,
    raw: &Bytes,
) -> Result<R> {
    let Value::Object(mut map) = value else {
        return Err(Error::ResourceExtraction(
            "expected a JSON object to unwrap".to_string(),
        ));
    };

    if let Some(key) = key {
        let inner = map
            .remove(key)
            .ok_or_else(|| Error::ResourceExtraction(format!("key {:?} not found in response", key)))?;
        return from_value(inner, arrays, raw);
    }

    let mut matches: Vec<(String, R)> = map
        .into_iter()
        .filter_map(|(k, v)| from_value::<R>(v, arrays, raw).ok().map(|r| (k, r)))
        .collect();

    match (matches.pop(), matches.is_empty()) {
        (Some((_, resource)), true) => Ok(resource),
        (None, _) => Err(Error::ResourceExtraction(format!(
            "no key decodes to {}",
            std::any::type_name::<R>()
        ))),
        (Some((last, _)), false) => {
            let mut keys: Vec<String> = matches.into_iter().map(|(k, _)| k).collect();
            keys.push(last);
            keys.sort();
            Err(Error::ResourceExtraction(format!(
                "ambiguous response: keys {:?} all decode, specify an unwrap key",
                keys
            )))
        }
    }
}
