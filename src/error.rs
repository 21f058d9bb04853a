//! Error types for viteset-client.

/// Result type alias for viteset-client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors returned synchronously when configuring or subscribing a [`Client`].
///
/// None of these start a background task.
///
/// [`Client`]: crate::core::Client
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// A required configuration field was empty.
    #[error("missing {0}")]
    MissingField(&'static str),

    /// The client is subscribed, or was subscribed and then canceled.
    ///
    /// A client supports exactly one subscription over its lifetime.
    #[error("client subscription is already active")]
    AlreadyActive,

    /// `subscribe` was called outside a Tokio runtime.
    #[error("subscribing requires a running Tokio runtime")]
    NoRuntime,

    /// The HTTP client could not be constructed.
    #[error("Failed to create HTTP client: {0}")]
    HttpClient(String),

    /// Failed to load client configuration from the environment or a file.
    #[error("Failed to load configuration: {0}")]
    Load(String),
}

/// Errors produced by a single poll of the blob.
///
/// These never end a subscription; they are delivered as [`Update::Error`]
/// and the next tick polls again.
///
/// [`Update::Error`]: crate::core::Update::Error
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The request could not be sent or its body could not be read.
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// A request header could not be built from the configured values.
    #[error("Invalid request header: {0}")]
    InvalidHeader(String),

    /// The server answered with a status other than 200 or 304.
    #[error("expected status code {expected} but got {actual}: `{body}`")]
    UnexpectedStatus {
        /// The status code a changed value is served with
        expected: u16,
        /// The status code actually received
        actual: u16,
        /// Raw response body, kept for diagnostics
        body: String,
    },
}

impl FetchError {
    /// The HTTP status code behind this error, if the server responded.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::UnexpectedStatus { actual, .. } => Some(*actual),
            Self::Transport(err) => err.status().map(|s| s.as_u16()),
            Self::InvalidHeader(_) => None,
        }
    }
}
