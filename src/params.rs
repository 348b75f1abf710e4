//! Encoding of request parameters into query strings and bodies.
//!
//! Parameters are any [`Serialize`] value. Methods without a body (GET, DELETE,
//! HEAD, ...) carry them as query items; POST, PUT and PATCH carry them as a body
//! in the request's [`BodyEncoding`].

use crate::casing::KeyEncodingStrategy;
use crate::{Error, Result};
use bytes::Bytes;
use http::Method;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use url::Url;

/// Placeholder written to logs in place of a redacted parameter value.
pub const REDACTED: &str = "<redacted>";

/// Body format for POST-family requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BodyEncoding {
    /// `application/json`, the full structured value.
    #[default]
    Json,
    /// `multipart/form-data`, one part per flattened key.
    FormData,
    /// `application/x-www-form-urlencoded`.
    UrlEncoded,
}

/// The outcome of encoding a parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodedParameters {
    /// There was nothing to encode.
    None,
    /// Query items, in key order.
    Query(Vec<(String, String)>),
    /// A request body and the content type describing it.
    Body {
        /// Value for the `Content-Type` header
        content_type: String,
        /// Encoded body
        body: Bytes,
    },
    /// `multipart/form-data` fields, in key order. The transport frames the
    /// parts and picks the boundary.
    Form(Vec<(String, String)>),
}

impl EncodedParameters {
    /// Appends query items to `url`. Bodies are left for the caller to attach.
    pub fn apply_query(&self, url: &mut Url) {
        if let EncodedParameters::Query(pairs) = self {
            if pairs.is_empty() {
                return;
            }
            url.query_pairs_mut().extend_pairs(pairs.iter());
        }
    }
}

/// Returns `true` if `method` carries its parameters in a body.
pub fn has_body(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH)
}

/// Encodes `parameters` for a request with the given method.
///
/// A parameter value that serializes to `null` (the unit type, `None`) encodes
/// to [`EncodedParameters::None`].
///
/// # Errors
///
/// [`Error::Coding`] if a query, url-encoded, or multipart encoding is given a
/// value that is not a key/value mapping, or one holding a nested array or object.
/// JSON bodies accept any structured value.
///
/// # Examples
///
/// ```
/// use netable::params::{encode, BodyEncoding, EncodedParameters};
/// use netable::casing::KeyEncodingStrategy;
/// use http::Method;
/// use serde_json::json;
///
/// let encoded = encode(
///     &json!({"page": 2, "query": "rust lang"}),
///     &Method::GET,
///     BodyEncoding::Json,
///     KeyEncodingStrategy::UseDefaultKeys,
/// ).unwrap();
///
/// assert_eq!(
///     encoded,
///     EncodedParameters::Query(vec![
///         ("page".into(), "2".into()),
///         ("query".into(), "rust lang".into()),
///     ])
/// );
/// ```
pub fn encode<P: Serialize + ?Sized>(
    parameters: &P,
    method: &Method,
    encoding: BodyEncoding,
    keys: KeyEncodingStrategy,
) -> Result<EncodedParameters> {
    let value = to_value(parameters)?;
    if value.is_null() {
        return Ok(EncodedParameters::None);
    }
    encode_value(keys.apply(value), method, encoding)
}

/// Encodes an already-built mapping, skipping serialization.
pub fn encode_map(
    map: Map<String, Value>,
    method: &Method,
    encoding: BodyEncoding,
    keys: KeyEncodingStrategy,
) -> Result<EncodedParameters> {
    encode_value(keys.apply(Value::Object(map)), method, encoding)
}

fn encode_value(value: Value, method: &Method, encoding: BodyEncoding) -> Result<EncodedParameters> {
    if !has_body(method) {
        let pairs = flatten(value)?.into_iter().collect();
        return Ok(EncodedParameters::Query(pairs));
    }

    match encoding {
        BodyEncoding::Json => {
            let body = serde_json::to_vec(&value).map_err(|e| Error::Coding(e.to_string()))?;
            Ok(EncodedParameters::Body {
                content_type: "application/json".to_string(),
                body: Bytes::from(body),
            })
        }
        BodyEncoding::UrlEncoded => {
            let body = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(flatten(value)?)
                .finish();
            Ok(EncodedParameters::Body {
                content_type: "application/x-www-form-urlencoded".to_string(),
                body: Bytes::from(body),
            })
        }
        BodyEncoding::FormData => Ok(EncodedParameters::Form(flatten(value)?.into_iter().collect())),
    }
}

/// Flattens a value into a string-to-string mapping.
///
/// Numbers and booleans are stringified and `null` entries are dropped.
pub fn flatten(value: Value) -> Result<BTreeMap<String, String>> {
    let Value::Object(map) = value else {
        return Err(unwrap_failure());
    };

    let mut flat = BTreeMap::new();
    for (key, value) in map {
        let text = match value {
            Value::Null => continue,
            Value::String(s) => s,
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::Array(_) | Value::Object(_) => {
                return Err(Error::Coding("cannot encode nested collections".to_string()))
            }
        };
        flat.insert(key, text);
    }
    Ok(flat)
}

/// Produces the parameter snapshot written to logs.
///
/// With redaction enabled every key outside `unredacted` has its value replaced
/// by [`REDACTED`]. This never fails: a value that cannot be flattened yields an
/// empty mapping.
pub fn redacted<P: Serialize + ?Sized>(
    parameters: &P,
    unredacted: &HashSet<String>,
    redact: bool,
) -> BTreeMap<String, String> {
    let flat = match to_value(parameters) {
        Ok(Value::Null) | Err(_) => return BTreeMap::new(),
        Ok(value) => flatten(value).unwrap_or_default(),
    };

    if !redact {
        return flat;
    }

    flat.into_iter()
        .map(|(k, v)| {
            if unredacted.contains(&k) {
                (k, v)
            } else {
                (k, REDACTED.to_string())
            }
        })
        .collect()
}

fn to_value<P: Serialize + ?Sized>(parameters: &P) -> Result<Value> {
    serde_json::to_value(parameters).map_err(|e| Error::Coding(e.to_string()))
}

fn unwrap_failure() -> Error {
    Error::Coding("failed to unwrap parameter dictionary".to_string())
}
