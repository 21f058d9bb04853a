//! Environment variable configuration source.

use super::ConfigSource;
use super::config_source::load_client_config;
use crate::core::ClientConfig;
use crate::error::Result;
use config::Environment;

/// Loads a [`ClientConfig`] from prefixed environment variables.
///
/// # Examples
///
/// ```rust
/// use viteset_client::sources::{ConfigSource, EnvSource};
///
/// // VITESET_BLOB, VITESET_SECRET, VITESET_HOST, VITESET_INTERVAL_SECS
/// let source = EnvSource::new("VITESET");
/// assert_eq!(source.name(), "env:VITESET_*");
/// ```
pub struct EnvSource {
    prefix: String,
    vars: Option<config::Map<String, String>>,
}

impl EnvSource {
    /// Create a new environment variable source.
    ///
    /// # Arguments
    ///
    /// * `prefix` - Prefix for environment variables (e.g., "VITESET")
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            vars: None,
        }
    }

    /// Read from `vars` instead of the process environment.
    #[cfg(test)]
    fn with_vars(mut self, vars: config::Map<String, String>) -> Self {
        self.vars = Some(vars);
        self
    }
}

impl ConfigSource for EnvSource {
    fn load(&self) -> Result<ClientConfig> {
        let env_source = Environment::with_prefix(&self.prefix)
            .prefix_separator("_")
            .source(self.vars.clone());

        load_client_config(
            config::Config::builder().add_source(env_source),
            &self.name(),
        )
    }

    fn name(&self) -> String {
        format!("env:{}_*", self.prefix)
    }
}
