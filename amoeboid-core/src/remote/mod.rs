//! Remote card catalog access
//!
//! [`CatalogBackend`] abstracts the wire protocol so the service can run against
//! the live Scryfall API or a test double. [`RemoteCatalogClient`] wraps a
//! backend with request spacing and the image-assembly rules for multi-faced
//! cards.

mod rate_limit;
#[cfg(feature = "scryfall")]
mod scryfall;

pub use rate_limit::RateLimiter;
#[cfg(feature = "scryfall")]
pub use scryfall::ScryfallBackend;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::cache::CacheEntry;
use crate::card::RawCard;
use crate::compositor;
use crate::error::{AmoeboidError, Result};
use crate::query::Query;

/// A single official or community ruling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ruling {
    pub published_at: NaiveDate,
    pub source: String,
    pub comment: String,
}

/// A raw record together with the image served for it
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedCard {
    pub canonical_name: String,
    pub record: serde_json::Value,
    pub image_bytes: Vec<u8>,
}

impl From<CacheEntry> for FetchedCard {
    fn from(entry: CacheEntry) -> Self {
        Self {
            canonical_name: entry.canonical_name,
            record: entry.raw_record,
            image_bytes: entry.image_bytes,
        }
    }
}

/// Wire-level access to a card catalog
///
/// Implementations map "no such card" to `AmoeboidError::NotFound` and every
/// other failure to `AmoeboidError::Transient`. They do no spacing of their own.
#[async_trait]
pub trait CatalogBackend: Send + Sync {
    /// Fuzzy lookup by name, with optional disambiguating parameters
    async fn named(&self, fuzzy: &str, parameters: &[(String, String)])
        -> Result<serde_json::Value>;

    /// Download an image by URL
    async fn image(&self, url: &str) -> Result<Vec<u8>>;

    /// Rulings published at a card's rulings URI
    async fn rulings(&self, rulings_uri: &str) -> Result<Vec<Ruling>>;

    /// Name completions for a partial query
    async fn autocomplete(&self, partial: &str) -> Result<Vec<String>>;

    /// Every known card name, for the fuzzy name index
    async fn card_names(&self) -> Result<Vec<String>>;

    /// Backend identifier for logging
    fn name(&self) -> &'static str;
}

#[async_trait]
impl<T: CatalogBackend + ?Sized> CatalogBackend for Arc<T> {
    async fn named(
        &self,
        fuzzy: &str,
        parameters: &[(String, String)],
    ) -> Result<serde_json::Value> {
        (**self).named(fuzzy, parameters).await
    }

    async fn image(&self, url: &str) -> Result<Vec<u8>> {
        (**self).image(url).await
    }

    async fn rulings(&self, rulings_uri: &str) -> Result<Vec<Ruling>> {
        (**self).rulings(rulings_uri).await
    }

    async fn autocomplete(&self, partial: &str) -> Result<Vec<String>> {
        (**self).autocomplete(partial).await
    }

    async fn card_names(&self) -> Result<Vec<String>> {
        (**self).card_names().await
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Rate-limited client over a [`CatalogBackend`]
pub struct RemoteCatalogClient {
    backend: Box<dyn CatalogBackend>,
    limiter: RateLimiter,
}

impl RemoteCatalogClient {
    pub fn new(backend: Box<dyn CatalogBackend>, limiter: RateLimiter) -> Self {
        Self { backend, limiter }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Fetch a card record and its display image
    ///
    /// Records without a card-level image get their face images stitched side
    /// by side into one PNG. Every call to the backend, including each image
    /// download, waits for its own slot.
    pub async fn fetch_card(&self, name: &str, query: &Query) -> Result<FetchedCard> {
        self.limiter.acquire().await;
        let record = self
            .backend
            .named(name, &query.remote_parameters())
            .await?;
        let raw = RawCard::from_value(&record)?;

        let image_bytes = match raw.normal_image() {
            Some(url) => {
                self.limiter.acquire().await;
                self.backend.image(url).await?
            }
            None => {
                let mut faces = Vec::new();
                for url in raw.face_images()? {
                    self.limiter.acquire().await;
                    let bytes = self.backend.image(url).await?;
                    let face = compositor::decode(&bytes).map_err(|e| {
                        AmoeboidError::malformed(&raw.name, format!("face image {url}: {e}"))
                    })?;
                    faces.push(face);
                }
                compositor::encode_png(&compositor::compose_faces(&faces)).map_err(|e| {
                    AmoeboidError::malformed(&raw.name, format!("face composite: {e}"))
                })?
            }
        };

        info!(
            card = %raw.name,
            backend = self.backend.name(),
            image_bytes = image_bytes.len(),
            "Fetched card from catalog"
        );

        Ok(FetchedCard {
            canonical_name: raw.name,
            record,
            image_bytes,
        })
    }

    /// Rulings for a card; any failure is reported as "no rulings"
    pub async fn fetch_rulings(&self, rulings_uri: &str) -> Vec<Ruling> {
        self.limiter.acquire().await;
        match self.backend.rulings(rulings_uri).await {
            Ok(rulings) => rulings,
            Err(e) => {
                warn!(uri = %rulings_uri, error = %e, "Rulings unavailable");
                Vec::new()
            }
        }
    }

    pub async fn fetch_autocomplete(&self, partial: &str) -> Result<Vec<String>> {
        self.limiter.acquire().await;
        self.backend.autocomplete(partial).await
    }

    pub async fn fetch_card_names(&self) -> Result<Vec<String>> {
        self.limiter.acquire().await;
        self.backend.card_names().await
    }
}
