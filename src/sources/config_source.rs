//! Client configuration source trait.

use crate::core::ClientConfig;
use crate::error::{ClientError, Result};
use config::ConfigBuilder;
use config::builder::DefaultState;
use serde::Deserialize;
use std::time::Duration;

/// Trait for places a [`ClientConfig`] can be loaded from.
pub trait ConfigSource: Send + Sync {
    /// Load a client configuration.
    ///
    /// Missing `blob` or `secret` keys load as empty strings; they are
    /// rejected later, when the client subscribes.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be read or parsed.
    fn load(&self) -> Result<ClientConfig>;

    /// Get a human-readable name for this source (for logging/debugging).
    fn name(&self) -> String;
}

/// The flat key layout shared by every source.
#[derive(Default, Deserialize)]
#[serde(default)]
struct RawClientConfig {
    blob: String,
    secret: String,
    host: String,
    interval_secs: u64,
    timeout_secs: u64,
}

impl From<RawClientConfig> for ClientConfig {
    fn from(raw: RawClientConfig) -> Self {
        ClientConfig {
            blob: raw.blob,
            secret: raw.secret,
            host: raw.host,
            interval: Duration::from_secs(raw.interval_secs),
            timeout: Duration::from_secs(raw.timeout_secs),
        }
    }
}

/// Build `builder` and deserialize the result into a [`ClientConfig`].
pub(crate) fn load_client_config(
    builder: ConfigBuilder<DefaultState>,
    source_name: &str,
) -> Result<ClientConfig> {
    let config = builder.build().map_err(|e| {
        ClientError::Load(format!("Failed to load source '{}': {}", source_name, e))
    })?;

    let raw = config.try_deserialize::<RawClientConfig>().map_err(|e| {
        ClientError::Load(format!("Failed to parse source '{}': {}", source_name, e))
    })?;

    tracing::debug!(source = source_name, blob = %raw.blob, "loaded client configuration");
    Ok(raw.into())
}
