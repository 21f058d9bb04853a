//! Values delivered to subscribers.

use crate::error::FetchError;

/// Either a blob's latest value, or the error from the last poll.
///
/// Errors are usually transient and resolve on a later poll, so most callers
/// log them and keep using the last value they saw.
#[derive(Debug)]
pub enum Update {
    /// The blob changed; this is its new raw value.
    Value(Vec<u8>),
    /// Polling failed. The subscription keeps running.
    Error(FetchError),
}

impl Update {
    /// The new value, if this update carries one.
    pub fn value(&self) -> Option<&[u8]> {
        match self {
            Self::Value(value) => Some(value),
            Self::Error(_) => None,
        }
    }

    /// The poll error, if this update carries one.
    pub fn error(&self) -> Option<&FetchError> {
        match self {
            Self::Value(_) => None,
            Self::Error(err) => Some(err),
        }
    }

    /// Returns `true` if this update carries an error.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Convert into a `Result`, for use with `?`.
    pub fn into_result(self) -> Result<Vec<u8>, FetchError> {
        match self {
            Self::Value(value) => Ok(value),
            Self::Error(err) => Err(err),
        }
    }
}
