//! Scryfall Cache - local cache for Scryfall card data
//!
//! Minimizes requests to the Scryfall API: card metadata and images are
//! fetched on demand, persisted in a per-application cache directory and
//! served from disk afterwards.

pub mod cache;
pub mod config;
pub mod error;
pub mod inflight;
pub mod models;
pub mod scryfall;
pub mod store;

pub use cache::{CardHandle, ScryfallCache};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use models::{CardRecord, ImageFormat, LookupKey};
pub use scryfall::{CatalogClient, FetchError, ScryfallClient};
pub use store::{RecordStore, StoreStats};
