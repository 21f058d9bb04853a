//! # viteset-client
//!
//! Watch a Viteset blob and receive its value whenever it changes.
//!
//! ## Overview
//!
//! A [`Client`](core::Client) polls `{host}/{blob}` over HTTP on a fixed
//! interval. Each poll sends the ETag of the last value it saw, so the server
//! can answer `304 Not Modified` instead of re-sending an unchanged blob. New
//! values and poll errors are delivered, in order, on a Tokio channel.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use viteset_client::prelude::*;
//!
//! # async fn example() -> Result<()> {
//! let mut client = Client::new(ClientConfig::new("SOME_BLOB_NAME", "SOME_CLIENT_SECRET"));
//! let mut updates = client.subscribe()?;
//!
//! while let Some(update) = updates.recv().await {
//!     match update {
//!         // Blob values are raw bytes; pass them to your parser of choice.
//!         Update::Value(value) => println!("{}", String::from_utf8_lossy(&value)),
//!         // Failing to fetch an update isn't all that bad: keep the last value.
//!         Update::Error(err) => eprintln!("{}", err),
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Polling interval
//!
//! The default interval is [`DEFAULT_INTERVAL`](core::DEFAULT_INTERVAL).
//! Please don't go below [`MIN_RECOMMENDED_INTERVAL`](core::MIN_RECOMMENDED_INTERVAL):
//! shorter intervals greatly increase load on Viteset servers. They are
//! accepted, but logged as a warning.
//!
//! ## Logging
//!
//! The crate emits [`tracing`](https://docs.rs/tracing) events; install a
//! subscriber to see them.
//!
//! ## Feature Flags
//!
//! - `metrics`: OpenTelemetry poll metrics via [`metrics::PollMetrics`]

#![warn(missing_docs, rust_2024_compatibility)]
#![deny(unsafe_code)]

pub mod core;
pub mod error;
pub mod sources;

#[cfg(feature = "metrics")]
pub mod metrics;

/// Convenient re-exports for common usage patterns.
pub mod prelude {
    pub use crate::core::{Client, ClientConfig, Update};
    pub use crate::error::{ClientError, FetchError, Result};
}
