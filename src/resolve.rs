//! Resolution of request paths against a client's base URL.

use crate::{Error, Result};
use url::Url;

/// Resolves `path` against `base` into one fully qualified http(s) URL.
///
/// - An empty path yields `base` unchanged.
/// - A path that parses as a URL on its own must start with `base`'s string
///   form, otherwise [`Error::WrongServer`].
/// - Any other path is appended to `base` with exactly one separating slash;
///   characters that cannot appear raw in a URL fail [`Error::MalformedUrl`].
///   Dot segments may not climb out of `base`'s path ([`Error::WrongServer`]).
///
/// `base` itself must pass [`check_base`].
///
/// # Examples
///
/// ```
/// use netable::resolve::resolve;
/// use url::Url;
///
/// let base = Url::parse("https://api.example.com/v1/").unwrap();
/// let url = resolve("/posts/all", &base).unwrap();
/// assert_eq!(url.as_str(), "https://api.example.com/v1/posts/all");
/// ```
pub fn resolve(path: &str, base: &Url) -> Result<Url> {
    check_base(base)?;
    if path.is_empty() {
        return Ok(base.clone());
    }

    match Url::parse(path) {
        Ok(url) => {
            if !url.as_str().starts_with(base.as_str()) {
                return Err(Error::WrongServer {
                    url: url.to_string(),
                    base: base.to_string(),
                });
            }
            Ok(url)
        }
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let url = join(path, base)?;
            if !below(&url, base) {
                return Err(Error::WrongServer {
                    url: url.to_string(),
                    base: base.to_string(),
                });
            }
            Ok(url)
        }
        Err(e) => Err(Error::MalformedUrl(format!("{}: {}", path, e))),
    }
}

/// Checks that `base` can have paths appended: http(s), with no query and no
/// fragment.
///
/// # Errors
///
/// [`Error::MalformedUrl`] naming what is wrong with `base`.
pub fn check_base(base: &Url) -> Result<()> {
    if !matches!(base.scheme(), "http" | "https") {
        return Err(Error::MalformedUrl(format!(
            "Base URL {} is not an http(s) URL",
            base
        )));
    }
    if base.query().is_some() || base.fragment().is_some() {
        return Err(Error::MalformedUrl(format!(
            "Base URL {} must not carry a query or fragment",
            base
        )));
    }
    Ok(())
}

/// `url` is `base` or lies under it on a segment boundary.
fn below(url: &Url, base: &Url) -> bool {
    let root = base.as_str().trim_end_matches('/');
    match url.as_str().strip_prefix(root) {
        Some(rest) => rest.is_empty() || rest.starts_with(['/', '?', '#']),
        None => false,
    }
}

fn join(path: &str, base: &Url) -> Result<Url> {
    if let Some(bad) = path.chars().find(|c| is_illegal(*c)) {
        return Err(Error::MalformedUrl(format!(
            "{:?} contains illegal character {:?}",
            path, bad
        )));
    }

    let joined = format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    Url::parse(&joined).map_err(|e| Error::MalformedUrl(format!("{}: {}", joined, e)))
}

fn is_illegal(c: char) -> bool {
    c.is_control() || c.is_whitespace() || matches!(c, '<' | '>' | '"' | '`' | '{' | '}' | '|' | '\\' | '^')
}
