//! The seam between the subscription loop and whatever retrieves the blob.

use crate::error::FetchError;
use async_trait::async_trait;

/// The classified result of one poll.
#[derive(Debug)]
pub(crate) enum FetchOutcome {
    /// The server reports the value still matches the validator we sent.
    Unchanged,
    /// A new value, with the validator to send on the next poll.
    Changed {
        value: Vec<u8>,
        validator: Option<String>,
    },
    /// The poll failed; the cached value stays as it was.
    Failed(FetchError),
}

/// Retrieves the current value of one blob.
///
/// Implementations hold no cache state: the last validator is passed in and
/// the new one is returned in [`FetchOutcome::Changed`].
#[async_trait]
pub(crate) trait BlobFetcher: Send + Sync {
    async fn fetch(&self, last_validator: Option<&str>) -> FetchOutcome;
}
