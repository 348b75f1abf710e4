//! # Netable - typed HTTP requests with a single error channel
//!
//! Netable runs typed [`Request`] descriptions against a base URL. Each request
//! says how its parameters are encoded and how its response is decoded; the
//! [`Client`] drives it through one pipeline: resolve the URL, encode the
//! parameters, run interceptors, send (retrying when configured), check the
//! status, decode, finalize. Every failure comes back as one [`Error`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use netable::{Client, Request};
//! use serde::{Deserialize, Serialize};
//! use std::time::Duration;
//!
//! #[derive(Serialize)]
//! struct Login {
//!     username: String,
//!     password: String,
//! }
//!
//! #[derive(Debug, Deserialize)]
//! struct Post {
//!     title: String,
//!     content: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), netable::Error> {
//!     let client = Client::builder()
//!         .base_url("https://api.example.com")?
//!         .timeout(Duration::from_secs(30))
//!         .build()?;
//!
//!     // Form-encoded POST with an empty response body
//!     let login = Login {
//!         username: "alice".to_string(),
//!         password: "hunter2".to_string(),
//!     };
//!     client
//!         .execute(Request::<(), netable::Empty>::post("/login").parameters(login).url_encoded())
//!         .await?;
//!
//!     // `{"posts": [...]}` decoded straight into `Vec<Post>`, skipping bad elements
//!     let posts = client
//!         .execute(Request::<(), Vec<Post>>::get("/posts").smart_unwrap("posts").lossy_arrays())
//!         .await?;
//!     println!("Fetched {} posts", posts.len());
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Typed requests** - Parameters, raw resource, final resource and fallback type in one value
//! - **Decoding strategies** - Empty bodies, raw bytes, smart unwrap, lossy arrays, fallback types
//! - **Parameter encoding** - Query strings, JSON, url-encoded and multipart bodies, key casing
//! - **Interceptors** - Rewrite or mock outgoing requests
//! - **Retries** - Fixed delay with a pluggable policy for which errors are retried
//! - **Cancellation** - Per request, by id, or everything in flight
//! - **Failure channel** - Every terminal failure broadcast to subscribers and a delegate
//! - **Logging** - Lifecycle events to `tracing` or your own [`log::LogDestination`]
//!
//! ## Error Handling
//!
//! ```no_run
//! use netable::{Client, Error, Request};
//! use serde::Deserialize;
//!
//! #[derive(Debug, Deserialize)]
//! struct User { name: String }
//!
//! #[derive(Debug, Deserialize)]
//! struct LegacyUser { username: String }
//!
//! # async fn example() -> Result<(), Error> {
//! # let client = Client::builder().base_url("https://api.example.com")?.build()?;
//! let request = Request::<(), User>::get("/me").with_fallback::<LegacyUser>();
//! match client.execute(request).await {
//!     Ok(user) => println!("Hello {}", user.name),
//!     Err(err @ Error::FallbackDecode(_)) => {
//!         let legacy = err.fallback::<LegacyUser>();
//!         println!("Legacy user: {:?}", legacy);
//!     }
//!     Err(Error::Http { status, raw }) => {
//!         eprintln!("HTTP error {}: {:?}", status, raw);
//!     }
//!     Err(e) => eprintln!("Other error: {}", e),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Retries
//!
//! ```no_run
//! use netable::retry::{OrPredicate, RetryOn5xx, RetryOnConnectionError};
//! use netable::{Client, RetryConfiguration, RetryableErrors};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), netable::Error> {
//! let client = Client::builder()
//!     .base_url("https://api.example.com")?
//!     .retry_configuration(RetryConfiguration::new(
//!         RetryableErrors::Custom(std::sync::Arc::new(OrPredicate::new(vec![
//!             Box::new(RetryOn5xx),
//!             Box::new(RetryOnConnectionError),
//!         ]))),
//!         3,
//!         Duration::from_millis(500),
//!     ))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod error;
mod request;
mod response;

pub mod cancel;
pub mod casing;
pub mod decode;
pub mod failure;
pub mod interceptor;
pub mod log;
pub mod params;
pub mod resolve;
pub mod retry;
pub mod transport;

pub use cancel::{CancelToken, RequestHandle};
pub use client::{Client, ClientBuilder, RequestStream};
pub use config::{Config, ConfigBuilder};
pub use decode::{ArrayDecodeStrategy, DecodeStrategy, Empty};
pub use error::{Error, FallbackValue, Result, TransportError};
pub use params::BodyEncoding;
pub use request::Request;
pub use response::Response;
pub use retry::{RetryConfiguration, RetryPredicate, RetryableErrors};
