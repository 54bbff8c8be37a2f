use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;
use url::Url;

use crate::error::FetchError;

/// Retrieves the raw stimulus manifest. One attempt per call, no retry.
#[async_trait]
pub trait ManifestFetcher: Send + Sync {
    /// Fetch the manifest document found at `location`.
    ///
    /// # Errors
    ///
    /// Returns `FetchError` if the document cannot be retrieved.
    async fn fetch(&self, location: &str) -> Result<String, FetchError>;
}

/// Fetches manifests over HTTP(S).
#[derive(Clone, Default)]
pub struct HttpManifestFetcher {
    client: Client,
}

impl HttpManifestFetcher {
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    #[must_use]
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

fn parse_location(location: &str) -> Result<Url, FetchError> {
    let url = Url::parse(location).map_err(|e| FetchError::InvalidLocation {
        location: location.to_string(),
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(FetchError::InvalidLocation {
            location: location.to_string(),
            reason: format!("unsupported scheme {other}"),
        }),
    }
}

#[async_trait]
impl ManifestFetcher for HttpManifestFetcher {
    async fn fetch(&self, location: &str) -> Result<String, FetchError> {
        let url = parse_location(location)?;
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(FetchError::HttpStatus(response.status()));
        }
        Ok(response.text().await?)
    }
}

/// Serves manifests from memory, keyed by location.
#[derive(Debug, Clone, Default)]
pub struct StaticManifestFetcher {
    documents: HashMap<String, String>,
}

impl StaticManifestFetcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_document(mut self, location: impl Into<String>, raw: impl Into<String>) -> Self {
        self.documents.insert(location.into(), raw.into());
        self
    }
}

#[async_trait]
impl ManifestFetcher for StaticManifestFetcher {
    async fn fetch(&self, location: &str) -> Result<String, FetchError> {
        self.documents
            .get(location)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(location.to_string()))
    }
}
