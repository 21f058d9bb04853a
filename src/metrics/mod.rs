//! Built-in metrics for blob polling.
//!
//! Provides OpenTelemetry metrics tracking:
//! - Polls started
//! - Changed, unchanged and failed poll outcomes
//! - Fetch duration
//! - Value age
//!
//! # Examples
//!
//! ```rust,no_run
//! use viteset_client::prelude::*;
//! use viteset_client::metrics::PollMetrics;
//! use opentelemetry::global;
//!
//! # async fn example() -> Result<()> {
//! let metrics = PollMetrics::new(global::meter("my-app"));
//! let mut client = Client::new(ClientConfig::new("feature-flags", "secret"))
//!     .with_metrics(metrics);
//! let updates = client.subscribe()?;
//! # Ok(())
//! # }
//! ```

mod poll_metrics;

pub use poll_metrics::PollMetrics;
