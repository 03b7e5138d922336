//! Cache facade: card lookups served from disk, fetched from Scryfall on a miss

use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::inflight::InFlight;
use crate::models::{CardRecord, ImageFormat, LookupKey};
use crate::scryfall::{CatalogClient, FetchError, ScryfallClient};
use crate::store::RecordStore;
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

struct Inner<C> {
    store: RecordStore,
    client: C,
    cards: InFlight<String, CardRecord>,
    images: InFlight<(String, ImageFormat), PathBuf>,
}

/// Local cache in front of a card catalog
///
/// Cheap to clone; clones share the store, the client and the table of
/// running fetches. Concurrent lookups of the same card collapse into a
/// single remote request.
pub struct ScryfallCache<C = ScryfallClient> {
    inner: Arc<Inner<C>>,
}

impl<C> Clone for ScryfallCache<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl ScryfallCache<ScryfallClient> {
    /// Open the cache for `application` with default settings
    pub fn new(application: &str) -> Result<Self> {
        Self::from_config(&CacheConfig::new(application))
    }

    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        let client = ScryfallClient::new(config)?;
        Self::with_client(config, client)
    }
}

impl<C: CatalogClient> ScryfallCache<C> {
    /// Open the cache described by `config`, fetching through `client`
    pub fn with_client(config: &CacheConfig, client: C) -> Result<Self> {
        config.validate()?;
        let store = RecordStore::open(&config.cache_dir())?;
        Ok(Self::with_store(store, client))
    }

    pub fn with_store(store: RecordStore, client: C) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                client,
                cards: InFlight::new(),
                images: InFlight::new(),
            }),
        }
    }

    /// Top-level directory of this cache
    pub fn cache_directory(&self) -> &Path {
        self.inner.store.root()
    }

    pub fn store(&self) -> &RecordStore {
        &self.inner.store
    }

    /// Resolve a card, from disk if possible
    ///
    /// Foreign keys seen before resolve through the stored key table without
    /// a remote call. Cards Scryfall does not know are never cached.
    /// Concurrent lookups are shared per key, so a foreign key and the ID it
    /// resolves to may still fetch the same card twice.
    pub async fn get_card(&self, key: LookupKey) -> Result<CardHandle<C>> {
        let record = match self.inner.store.resolve_key(&key)? {
            Some(id) => match cached(&self.inner.store, &id)? {
                Some(record) => {
                    log::debug!("Cache hit for {}", key);
                    record
                }
                None => self.fetch_by_id(id).await?,
            },
            None => self.fetch_by_foreign_key(key).await?,
        };

        Ok(CardHandle {
            cache: self.clone(),
            record,
        })
    }

    async fn fetch_by_id(&self, id: String) -> Result<CardRecord> {
        log::info!("Cache miss for {}, fetching from Scryfall", id);
        let dedup_key = LookupKey::id(id.as_str()).cache_key();
        self.inner
            .cards
            .run(dedup_key, fetch_card_by_id(Arc::clone(&self.inner), id))
            .await
    }

    async fn fetch_by_foreign_key(&self, key: LookupKey) -> Result<CardRecord> {
        log::info!("No cached mapping for {}, asking Scryfall", key);
        let dedup_key = key.cache_key();
        self.inner
            .cards
            .run(dedup_key, fetch_card_by_key(Arc::clone(&self.inner), key))
            .await
    }

    /// Local path of a card image, downloading it on first use
    pub async fn image_path(&self, record: &CardRecord, format: ImageFormat) -> Result<PathBuf> {
        let store = &self.inner.store;
        if store.has_image(&record.id, format)? {
            let path = store.resolve_path(&record.id, format);
            log::debug!("[{}] Local image path for {}: {}", record, format, path.display());
            return Ok(path);
        }

        let url = record
            .image_url(format)
            .ok_or_else(|| {
                log::error!("[{}] Format {} not found", record, format);
                CacheError::ImageNotAvailable {
                    id: record.id.clone(),
                    format: format.to_string(),
                }
            })?
            .to_string();

        log::info!("Image cache miss for {} ({}), fetching from Scryfall", record.id, format);
        let id = record.id.clone();
        self.inner
            .images
            .run(
                (id.clone(), format),
                download_image(Arc::clone(&self.inner), id, format, url),
            )
            .await
    }
}

// The fetches below run detached from the caller and re-check the store
// first: another fetch may have stored the value since the caller looked.

async fn fetch_card_by_id<C: CatalogClient>(inner: Arc<Inner<C>>, id: String) -> Result<CardRecord> {
    if let Some(record) = cached(&inner.store, &id)? {
        return Ok(record);
    }
    let record = inner
        .client
        .fetch_by_id(&id)
        .await
        .map_err(|e| remote_error(e, &LookupKey::id(id.as_str())))?
        .normalized();
    inner.store.store(&record)?;
    Ok(record)
}

async fn fetch_card_by_key<C: CatalogClient>(
    inner: Arc<Inner<C>>,
    key: LookupKey,
) -> Result<CardRecord> {
    if let Some(id) = inner.store.resolve_key(&key)? {
        if let Some(record) = cached(&inner.store, &id)? {
            return Ok(record);
        }
    }
    let record = inner
        .client
        .fetch_by_foreign_key(&key)
        .await
        .map_err(|e| remote_error(e, &key))?
        .normalized();
    log::debug!("Resolved {} to {}", key, record.id);
    inner.store.store_with_key(&key, &record)?;
    Ok(record)
}

async fn download_image<C: CatalogClient>(
    inner: Arc<Inner<C>>,
    id: String,
    format: ImageFormat,
    url: String,
) -> Result<PathBuf> {
    if inner.store.has_image(&id, format)? {
        return Ok(inner.store.resolve_path(&id, format));
    }
    let bytes = inner
        .client
        .download_image(&url)
        .await
        .map_err(|e| match e {
            FetchError::NotFound => CacheError::ImageNotAvailable {
                id: id.clone(),
                format: format.to_string(),
            },
            FetchError::Transient(msg) => CacheError::UpstreamUnavailable(msg),
        })?;
    inner.store.store_image(&id, format, &bytes)
}

/// Load a record, treating an unreadable one as absent so it gets refetched
fn cached(store: &RecordStore, id: &str) -> Result<Option<CardRecord>> {
    match store.load(id) {
        Err(CacheError::CorruptRecord { id, message }) => {
            log::warn!("Discarding corrupt cache record for {}: {}", id, message);
            Ok(None)
        }
        other => other,
    }
}

fn remote_error(err: FetchError, key: &LookupKey) -> CacheError {
    match err {
        FetchError::NotFound => CacheError::CardNotFound(key.to_string()),
        FetchError::Transient(msg) => {
            log::error!("Failed to fetch {} from Scryfall: {}", key, msg);
            CacheError::UpstreamUnavailable(msg)
        }
    }
}

/// A resolved card, tied to the cache it came from
pub struct CardHandle<C = ScryfallClient> {
    cache: ScryfallCache<C>,
    record: CardRecord,
}

impl<C: CatalogClient> CardHandle<C> {
    /// Scryfall ID
    pub fn id(&self) -> &str {
        &self.record.id
    }

    pub fn name(&self) -> &str {
        &self.record.name
    }

    pub fn record(&self) -> &CardRecord {
        &self.record
    }

    pub fn into_record(self) -> CardRecord {
        self.record
    }

    /// Raw metadata field not promoted to a named field
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.record.field(name)
    }

    /// Local path of the image in `format` ("png", "art_crop", ...),
    /// downloading it if needed
    pub async fn get_image_path(&self, format: &str) -> Result<PathBuf> {
        self.image_path(format.parse()?).await
    }

    pub async fn image_path(&self, format: ImageFormat) -> Result<PathBuf> {
        self.cache.image_path(&self.record, format).await
    }
}

impl<C> fmt::Debug for CardHandle<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CardHandle")
            .field("record", &self.record)
            .finish()
    }
}

impl<C> fmt::Display for CardHandle<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Card[{}]", self.record)
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
