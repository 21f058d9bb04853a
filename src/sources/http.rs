//! Conditional HTTP fetching of a Viteset blob.

use super::fetcher::{BlobFetcher, FetchOutcome};
use crate::core::ClientConfig;
use crate::error::{ClientError, FetchError, Result};
use async_trait::async_trait;
use reqwest::header::{self, HeaderValue};
use reqwest::{Client, StatusCode};
use tracing::warn;

const USER_AGENT: &str = concat!("Viteset-Client-Rust/", env!("CARGO_PKG_VERSION"));

/// Fetches one blob, sending the last seen ETag so unchanged values are not
/// re-transmitted.
pub(crate) struct HttpFetcher {
    url: String,
    secret: String,
    client: Client,
}

impl HttpFetcher {
    /// Build a fetcher for an already validated configuration.
    pub(crate) fn new(config: &ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ClientError::HttpClient(e.to_string()))?;

        Ok(Self {
            url: config.url(),
            secret: config.secret.clone(),
            client,
        })
    }

    async fn fetch_inner(
        &self,
        last_validator: Option<&str>,
    ) -> std::result::Result<FetchOutcome, FetchError> {
        let auth = HeaderValue::from_str(&format!("Bearer {}", self.secret))
            .map_err(|e| FetchError::InvalidHeader(format!("Invalid bearer token: {}", e)))?;

        let mut request = self
            .client
            .get(&self.url)
            .header(header::AUTHORIZATION, auth);

        if let Some(etag) = last_validator {
            let etag = HeaderValue::from_str(etag)
                .map_err(|e| FetchError::InvalidHeader(format!("Invalid ETag: {}", e)))?;
            request = request.header(header::IF_NONE_MATCH, etag);
        }

        let response = request.send().await?;
        let status = response.status();
        let validator = read_validator(response.headers());
        let body = response.bytes().await?;

        match status {
            StatusCode::NOT_MODIFIED => Ok(FetchOutcome::Unchanged),
            StatusCode::OK => Ok(FetchOutcome::Changed {
                value: body.to_vec(),
                validator,
            }),
            other => Err(FetchError::UnexpectedStatus {
                expected: StatusCode::OK.as_u16(),
                actual: other.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            }),
        }
    }
}

/// The `ETag` of a response, if present and readable as a header string.
fn read_validator(headers: &header::HeaderMap) -> Option<String> {
    let etag = headers.get(header::ETAG)?;
    match etag.to_str() {
        Ok(etag) => Some(etag.to_string()),
        Err(_) => {
            warn!(
                etag = ?etag,
                "ignoring unreadable ETag header, next poll will not be conditional"
            );
            None
        }
    }
}

#[async_trait]
impl BlobFetcher for HttpFetcher {
    async fn fetch(&self, last_validator: Option<&str>) -> FetchOutcome {
        self.fetch_inner(last_validator)
            .await
            .unwrap_or_else(FetchOutcome::Failed)
    }
}
