//! Scryfall backend
//!
//! Plain HTTP GETs against the public Scryfall API. Only a 404 means the card
//! does not exist; connection errors, timeouts, 429s and 5xx responses are all
//! transient.

use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::{CatalogBackend, Ruling};
use crate::error::{AmoeboidError, Result};

const USER_AGENT: &str = concat!("amoeboid/", env!("CARGO_PKG_VERSION"));

/// Scryfall's list envelope, used by rulings, autocomplete and catalogs
#[derive(Debug, Deserialize)]
struct ListEnvelope<T> {
    data: Vec<T>,
}

pub struct ScryfallBackend {
    client: reqwest::Client,
    base_url: String,
}

impl ScryfallBackend {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| AmoeboidError::Transient(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get(&self, url: &str, query: &[(String, String)]) -> Result<Response> {
        debug!(url = %url, "Catalog GET");
        self.client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| AmoeboidError::Transient(format!("Request to {url} failed: {e}")))
    }

    async fn json<T: serde::de::DeserializeOwned>(response: Response, url: &str) -> Result<T> {
        response
            .json()
            .await
            .map_err(|e| AmoeboidError::Transient(format!("Undecodable response from {url}: {e}")))
    }
}

/// Turn a non-success status into the matching error
async fn check_status(response: Response, subject: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(AmoeboidError::NotFound(subject.to_string()));
    }

    let body = response.text().await.unwrap_or_default();
    warn!("Scryfall API error: {} - {}", status, body);
    Err(AmoeboidError::Transient(format!(
        "Scryfall API error for `{subject}`: HTTP {status}"
    )))
}

#[async_trait]
impl CatalogBackend for ScryfallBackend {
    async fn named(
        &self,
        fuzzy: &str,
        parameters: &[(String, String)],
    ) -> Result<serde_json::Value> {
        let url = format!("{}/cards/named", self.base_url);
        let mut query = vec![("fuzzy".to_string(), fuzzy.to_string())];
        query.extend(parameters.iter().cloned());

        let response = check_status(self.get(&url, &query).await?, fuzzy).await?;
        Self::json(response, &url).await
    }

    async fn image(&self, url: &str) -> Result<Vec<u8>> {
        let response = check_status(self.get(url, &[]).await?, url).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| AmoeboidError::Transient(format!("Image download from {url} failed: {e}")))?;
        Ok(bytes.to_vec())
    }

    async fn rulings(&self, rulings_uri: &str) -> Result<Vec<Ruling>> {
        let response = check_status(self.get(rulings_uri, &[]).await?, rulings_uri).await?;
        let envelope: ListEnvelope<Ruling> = Self::json(response, rulings_uri).await?;
        Ok(envelope.data)
    }

    async fn autocomplete(&self, partial: &str) -> Result<Vec<String>> {
        let url = format!("{}/cards/autocomplete", self.base_url);
        let query = [("q".to_string(), partial.to_string())];

        let response = check_status(self.get(&url, &query).await?, partial).await?;
        let envelope: ListEnvelope<String> = Self::json(response, &url).await?;
        Ok(envelope.data)
    }

    async fn card_names(&self) -> Result<Vec<String>> {
        let url = format!("{}/catalog/card-names", self.base_url);

        let response = check_status(self.get(&url, &[]).await?, "card-names").await?;
        let envelope: ListEnvelope<String> = Self::json(response, &url).await?;
        Ok(envelope.data)
    }

    fn name(&self) -> &'static str {
        "scryfall"
    }
}
