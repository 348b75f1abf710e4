//! Client-wide configuration.

use crate::casing::{KeyDecodingStrategy, KeyEncodingStrategy};
use std::time::Duration;

/// Settings shared by every request of one [`Client`](crate::Client).
///
/// Set once when the client is built and never changed afterwards.
///
/// # Examples
///
/// ```
/// use netable::Config;
/// use netable::casing::KeyDecodingStrategy;
/// use std::time::Duration;
///
/// let config = Config::builder()
///     .timeout(Duration::from_secs(15))
///     .key_decoding(KeyDecodingStrategy::ConvertFromSnakeCase)
///     .enable_log_redaction(false)
///     .build();
///
/// assert_eq!(config.timeout, Some(Duration::from_secs(15)));
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Timeout for each individual network attempt. `None` leaves it to the transport.
    pub timeout: Option<Duration>,

    /// Default key casing for outgoing parameters.
    pub key_encoding: KeyEncodingStrategy,

    /// Default key casing for incoming responses.
    pub key_decoding: KeyDecodingStrategy,

    /// Whether parameter values are redacted in logs.
    ///
    /// Defaults to `true`; requests list the keys that may be shown.
    pub enable_log_redaction: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timeout: None,
            key_encoding: KeyEncodingStrategy::default(),
            key_decoding: KeyDecodingStrategy::default(),
            enable_log_redaction: true,
        }
    }
}

impl Config {
    /// Creates a new builder for configuring a client.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for [`Config`].
#[derive(Default)]
pub struct ConfigBuilder {
    timeout: Option<Duration>,
    key_encoding: Option<KeyEncodingStrategy>,
    key_decoding: Option<KeyDecodingStrategy>,
    enable_log_redaction: Option<bool>,
}

impl ConfigBuilder {
    /// Sets the per-attempt timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the default key encoding.
    pub fn key_encoding(mut self, strategy: KeyEncodingStrategy) -> Self {
        self.key_encoding = Some(strategy);
        self
    }

    /// Sets the default key decoding.
    pub fn key_decoding(mut self, strategy: KeyDecodingStrategy) -> Self {
        self.key_decoding = Some(strategy);
        self
    }

    /// Sets whether parameter values are redacted in logs.
    pub fn enable_log_redaction(mut self, enabled: bool) -> Self {
        self.enable_log_redaction = Some(enabled);
        self
    }

    /// Builds the `Config`.
    pub fn build(self) -> Config {
        let default = Config::default();
        Config {
            timeout: self.timeout.or(default.timeout),
            key_encoding: self.key_encoding.unwrap_or(default.key_encoding),
            key_decoding: self.key_decoding.unwrap_or(default.key_decoding),
            enable_log_redaction: self
                .enable_log_redaction
                .unwrap_or(default.enable_log_redaction),
        }
    }
}
