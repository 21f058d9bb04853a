//! Where client configuration and blob values come from.

mod config_source;
mod env;
mod fetcher;
mod file;
mod http;

pub use config_source::ConfigSource;
pub use env::EnvSource;
pub use file::FileSource;

pub(crate) use fetcher::{BlobFetcher, FetchOutcome};
pub(crate) use http::HttpFetcher;
