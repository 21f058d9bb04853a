//! Client configuration and the documented defaults.

use crate::error::{ClientError, Result};
use crate::sources::{ConfigSource, EnvSource, FileSource};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// The crate version, sent in the `User-Agent` header.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The default Viteset host to fetch blobs from.
pub const DEFAULT_HOST: &str = "https://api.viteset.com";

/// The default interval for polling for blob updates.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(15);

/// The shortest polling interval Viteset asks integrators to use.
///
/// Shorter intervals are accepted but greatly increase load on Viteset
/// servers, so `subscribe` logs a warning when one is configured.
pub const MIN_RECOMMENDED_INTERVAL: Duration = Duration::from_secs(15);

/// The default per-request HTTP timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Settings for watching a single blob.
///
/// `blob` and `secret` are required. An empty `host` or a zero `interval` or
/// `timeout` is replaced by its default when the client subscribes.
///
/// # Examples
///
/// ```rust
/// use viteset_client::prelude::*;
/// use std::time::Duration;
///
/// let config = ClientConfig::new("feature-flags", "client-secret")
///     .with_interval(Duration::from_secs(30));
/// assert_eq!(config.host, "");
/// ```
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ClientConfig {
    /// The name of the blob to subscribe to
    pub blob: String,
    /// The secret for a client with access to the blob
    pub secret: String,
    /// Base URL of the Viteset API. Empty means [`DEFAULT_HOST`].
    pub host: String,
    /// Time between polls. Zero means [`DEFAULT_INTERVAL`].
    ///
    /// Please don't go below [`MIN_RECOMMENDED_INTERVAL`].
    pub interval: Duration,
    /// Per-request HTTP timeout. Zero means [`DEFAULT_TIMEOUT`].
    pub timeout: Duration,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("blob", &self.blob)
            .field("secret", &"<redacted>")
            .field("host", &self.host)
            .field("interval", &self.interval)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ClientConfig {
    /// Create a configuration for `blob`, authenticated with `secret`.
    pub fn new(blob: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            blob: blob.into(),
            secret: secret.into(),
            ..Self::default()
        }
    }

    /// Set the API host, e.g. `https://api.viteset.com`.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the polling interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set the per-request HTTP timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Load a configuration from `{PREFIX}_BLOB`, `{PREFIX}_SECRET`,
    /// `{PREFIX}_HOST`, `{PREFIX}_INTERVAL_SECS` and `{PREFIX}_TIMEOUT_SECS`.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use viteset_client::prelude::*;
    ///
    /// # fn example() -> Result<()> {
    /// // VITESET_BLOB=feature-flags VITESET_SECRET=... ./my-app
    /// let config = ClientConfig::from_env("VITESET")?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_env(prefix: &str) -> Result<Self> {
        EnvSource::new(prefix).load()
    }

    /// Load a configuration from a YAML, TOML or JSON file.
    ///
    /// Keys are `blob`, `secret`, `host`, `interval_secs` and `timeout_secs`.
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        FileSource::new(path).load()
    }

    /// Check the required fields and fill in defaults.
    pub(crate) fn validated(mut self) -> Result<Self> {
        if self.blob.is_empty() {
            return Err(ClientError::MissingField("blob"));
        }
        if self.secret.is_empty() {
            return Err(ClientError::MissingField("secret"));
        }
        if self.host.is_empty() {
            self.host = DEFAULT_HOST.to_string();
        }
        if self.interval.is_zero() {
            self.interval = DEFAULT_INTERVAL;
        }
        if self.timeout.is_zero() {
            self.timeout = DEFAULT_TIMEOUT;
        }
        Ok(self)
    }

    /// The URL polled for this blob.
    pub fn url(&self) -> String {
        format!("{}/{}", self.host.trim_end_matches('/'), self.blob)
    }
}
