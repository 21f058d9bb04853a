//! File-based configuration source.

use super::ConfigSource;
use super::config_source::load_client_config;
use crate::core::ClientConfig;
use crate::error::{ClientError, Result};
use config::File;
use std::path::PathBuf;

/// Loads a [`ClientConfig`] from a YAML, TOML, or JSON file.
///
/// The format is detected from the file extension.
///
/// # Examples
///
/// ```rust,no_run
/// use viteset_client::sources::{ConfigSource, FileSource};
///
/// # fn example() -> viteset_client::error::Result<()> {
/// let config = FileSource::new("config/viteset.toml").load()?;
/// # Ok(())
/// # }
/// ```
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    /// Create a new file source.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Validate that the file extension is supported.
    fn validate_extension(&self) -> Result<()> {
        let extension = self
            .path
            .extension()
            .and_then(|ext| ext.to_str())
            .ok_or_else(|| {
                ClientError::Load(format!(
                    "Unable to determine file format for: {}",
                    self.path.display()
                ))
            })?;

        match extension {
            "yaml" | "yml" | "toml" | "json" => Ok(()),
            _ => Err(ClientError::Load(format!(
                "Unsupported file extension: {}. Supported: .yaml, .yml, .toml, .json",
                extension
            ))),
        }
    }
}

impl ConfigSource for FileSource {
    fn load(&self) -> Result<ClientConfig> {
        self.validate_extension()?;

        if !self.path.exists() {
            return Err(ClientError::Load(format!(
                "Configuration file not found: {}",
                self.path.display()
            )));
        }

        load_client_config(
            config::Config::builder().add_source(File::from(self.path.clone()).required(true)),
            &self.name(),
        )
    }

    fn name(&self) -> String {
        format!("file:{}", self.path.display())
    }
}
