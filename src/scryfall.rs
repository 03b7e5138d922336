//! Scryfall API client
//!
//! [`CatalogClient`] is the narrow interface the cache talks to;
//! [`ScryfallClient`] implements it over HTTP with async reqwest.

use crate::config::CacheConfig;
use crate::error::CacheError;
use crate::models::{CardRecord, LookupKey};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::StatusCode;
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Failure reported by a catalog client
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// The catalog has no such card or image
    #[error("not found")]
    NotFound,
    /// Network error, timeout, rate limiting, server error or unreadable response
    #[error("{0}")]
    Transient(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Transient(err.to_string())
    }
}

/// Remote source of card metadata and images
pub trait CatalogClient: Send + Sync + 'static {
    /// Fetch a card by its Scryfall ID
    fn fetch_by_id(&self, id: &str)
        -> impl Future<Output = Result<CardRecord, FetchError>> + Send;

    /// Fetch the card a foreign key (name, MTGO id, set/number, ...) refers to
    fn fetch_by_foreign_key(
        &self,
        key: &LookupKey,
    ) -> impl Future<Output = Result<CardRecord, FetchError>> + Send;

    /// Download raw image bytes
    fn download_image(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send;
}

/// Scryfall API error response
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
pub struct ScryfallError {
    pub status: u16,
    pub code: String,
    pub details: String,
}

/// HTTP client for api.scryfall.com
///
/// Requests are spaced by at least the configured interval, shared across
/// all callers of one client.
pub struct ScryfallClient {
    http: reqwest::Client,
    base_url: String,
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl ScryfallClient {
    pub fn new(config: &CacheConfig) -> Result<Self, CacheError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json;q=0.9,*/*;q=0.8"));

        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .timeout(config.timeout_duration())
            .build()
            .map_err(|e| CacheError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            min_interval: config.request_interval_duration(),
            last_request: Mutex::new(None),
        })
    }

    /// Endpoint URL for a lookup key
    pub fn card_url(&self, key: &LookupKey) -> String {
        let base = &self.base_url;
        match key {
            LookupKey::Id(id) => format!("{}/cards/{}", base, urlencoding::encode(id)),
            LookupKey::Mtgo(id) | LookupKey::MtgoFoil(id) => {
                format!("{}/cards/mtgo/{}", base, id)
            }
            LookupKey::Multiverse(id) => format!("{}/cards/multiverse/{}", base, id),
            LookupKey::SetNumber { set, number } => format!(
                "{}/cards/{}/{}",
                base,
                urlencoding::encode(&set.to_lowercase()),
                urlencoding::encode(number)
            ),
            LookupKey::Name { name, set } => {
                let mut url = format!("{}/cards/named?exact={}", base, urlencoding::encode(name));
                if let Some(set) = set {
                    url.push_str("&set=");
                    url.push_str(&urlencoding::encode(&set.to_lowercase()));
                }
                url
            }
        }
    }

    /// Wait until the minimum interval since the previous request has passed
    async fn throttle(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, FetchError> {
        self.throttle().await;
        let response = self.http.get(url).send().await?;

        match response.status() {
            status if status.is_success() => Ok(response),
            StatusCode::NOT_FOUND => {
                log::debug!("Scryfall returned 404 for {}", url);
                Err(FetchError::NotFound)
            }
            status => {
                let detail = match response.json::<ScryfallError>().await {
                    Ok(error) => format!("{} ({}): {}", status, error.code, error.details),
                    Err(_) => status.to_string(),
                };
                log::warn!("Scryfall request failed for {}: {}", url, detail);
                Err(FetchError::Transient(detail))
            }
        }
    }

    async fn get_card(&self, url: &str) -> Result<CardRecord, FetchError> {
        log::info!("Fetching card from Scryfall: {}", url);
        let response = self.get(url).await?;
        response
            .json::<CardRecord>()
            .await
            .map_err(|e| FetchError::Transient(format!("malformed card response: {}", e)))
    }
}

impl CatalogClient for ScryfallClient {
    async fn fetch_by_id(&self, id: &str) -> Result<CardRecord, FetchError> {
        self.get_card(&self.card_url(&LookupKey::id(id))).await
    }

    async fn fetch_by_foreign_key(&self, key: &LookupKey) -> Result<CardRecord, FetchError> {
        self.get_card(&self.card_url(key)).await
    }

    async fn download_image(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        log::debug!("Fetching image: {}", url);
        let response = self.get(url).await?;
        Ok(response.bytes().await?.to_vec())
    }
}

#[cfg(test)]
#[path = "scryfall_tests.rs"]
mod tests;
