//! # Host Bridge Traits
//!
//! Abstractions the sync core depends on but does not implement itself.
//!
//! ## Traits
//!
//! - [`HttpClient`](http::HttpClient) - Async HTTP operations with retry policy
//! - [`EpisodeSource`](source::EpisodeSource) - Producer of raw episode candidates
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! convert their own error types into it so the core sees one shape:
//!
//! ```ignore
//! impl From<MyScraperError> for BridgeError {
//!     fn from(e: MyScraperError) -> Self {
//!         BridgeError::OperationFailed(e.to_string())
//!     }
//! }
//! ```
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so implementations can be shared
//! across async tasks behind an `Arc`.

pub mod error;
pub mod http;
pub mod source;
pub mod time;

pub use error::BridgeError;

pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use source::{EpisodeSource, RawCandidate};
pub use time::{Clock, SystemClock};
