//! Key casing strategies for outgoing parameters and incoming responses.

use serde_json::{Map, Value};

/// How parameter keys are written when a request is encoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KeyEncodingStrategy {
    /// Keep keys exactly as the parameter type serializes them.
    #[default]
    UseDefaultKeys,
    /// Convert `camelCase` keys to `snake_case`.
    ConvertToSnakeCase,
}

/// How response keys are read before a body is decoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KeyDecodingStrategy {
    /// Keep keys exactly as the server sent them.
    #[default]
    UseDefaultKeys,
    /// Convert `snake_case` keys to `camelCase`.
    ConvertFromSnakeCase,
}

impl KeyEncodingStrategy {
    /// Applies the strategy to every object key in `value`, recursively.
    pub fn apply(self, value: Value) -> Value {
        match self {
            KeyEncodingStrategy::UseDefaultKeys => value,
            KeyEncodingStrategy::ConvertToSnakeCase => rename_keys(value, &to_snake_case),
        }
    }
}

impl KeyDecodingStrategy {
    /// Applies the strategy to every object key in `value`, recursively.
    pub fn apply(self, value: Value) -> Value {
        match self {
            KeyDecodingStrategy::UseDefaultKeys => value,
            KeyDecodingStrategy::ConvertFromSnakeCase => rename_keys(value, &from_snake_case),
        }
    }

    pub(crate) fn is_default(self) -> bool {
        self == KeyDecodingStrategy::UseDefaultKeys
    }
}

fn rename_keys(value: Value, rename: &dyn Fn(&str) -> String) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (rename(&k), rename_keys(v, rename)))
                .collect::<Map<_, _>>(),
        ),
        Value::Array(items) => {
            Value::Array(items.into_iter().map(|v| rename_keys(v, rename)).collect())
        }
        other => other,
    }
}

/// `userId` → `user_id`, `URLString` → `url_string`.
///
/// Runs of capitals are treated as one word; the last capital of a run starts
/// a new word when it is followed by a lowercase letter.
pub fn to_snake_case(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    let mut out = String::with_capacity(key.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1).copied();
            let boundary = match prev {
                None | Some('_') => false,
                Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_uppercase() => next.is_some_and(|n| n.is_lowercase()),
                Some(_) => false,
            };
            if boundary {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// `user_id` → `userId`. Leading and trailing underscores are kept.
pub fn from_snake_case(key: &str) -> String {
    let trimmed = key.trim_matches('_');
    if trimmed.is_empty() || !trimmed.contains('_') {
        return key.to_string();
    }

    let leading = &key[..key.len() - key.trim_start_matches('_').len()];
    let trailing = &key[key.trim_end_matches('_').len()..];

    let mut out = String::with_capacity(key.len());
    out.push_str(leading);
    for (i, word) in trimmed.split('_').filter(|w| !w.is_empty()).enumerate() {
        if i == 0 {
            out.push_str(&word.to_lowercase());
        } else {
            let mut chars = word.chars();
            if let Some(first) = chars.next() {
                out.extend(first.to_uppercase());
                out.push_str(&chars.as_str().to_lowercase());
            }
        }
    }
    out.push_str(trailing);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn snake_case_conversion() {
        assert_eq!(to_snake_case("userId"), "user_id");
        assert_eq!(to_snake_case("URLString"), "url_string");
        assert_eq!(to_snake_case("title"), "title");
        assert_eq!(to_snake_case("already_snake"), "already_snake");
        assert_eq!(to_snake_case("page2Size"), "page2_size");
    }

    #[test]
    fn camel_case_conversion() {
        assert_eq!(from_snake_case("user_id"), "userId");
        assert_eq!(from_snake_case("created_at_utc"), "createdAtUtc");
        assert_eq!(from_snake_case("_private_key"), "_privateKey");
        assert_eq!(from_snake_case("title"), "title");
    }

    #[test]
    fn decoding_strategy_is_recursive() {
        let value = json!({"post_list": [{"user_id": 1}], "meta": {"next_page": 2}});
        let converted = KeyDecodingStrategy::ConvertFromSnakeCase.apply(value);
        assert_eq!(
            converted,
            json!({"postList": [{"userId": 1}], "meta": {"nextPage": 2}})
        );
    }
}
