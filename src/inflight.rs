//! Deduplication of concurrent fetches
//!
//! Maps a key to the pending result of the one fetch currently running for
//! it. Later callers for the same key attach to that result instead of
//! starting their own fetch. The fetch runs on its own task, so a caller that
//! gives up does not cancel it for the others.

use crate::error::{CacheError, Result};
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

type Slot<T> = watch::Receiver<Option<Result<T>>>;
type Table<K, T> = Arc<Mutex<HashMap<K, Slot<T>>>>;

pub struct InFlight<K, T> {
    pending: Table<K, T>,
}

impl<K, T> Default for InFlight<K, T> {
    fn default() -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

/// Clears the table entry when the fetch task ends, even by panic or abort
struct Release<K: Eq + Hash, T> {
    pending: Table<K, T>,
    key: K,
}

impl<K: Eq + Hash, T> Drop for Release<K, T> {
    fn drop(&mut self) {
        lock(&self.pending).remove(&self.key);
    }
}

fn lock<K, T>(table: &Table<K, T>) -> MutexGuard<'_, HashMap<K, Slot<T>>> {
    // Map operations cannot leave the table half-updated
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<K, T> InFlight<K, T>
where
    K: Eq + Hash + Clone + Send + 'static,
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `fetch` for `key` unless a fetch for it is already running, and
    /// return that fetch's result either way
    pub async fn run<F>(&self, key: K, fetch: F) -> Result<T>
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let mut rx = {
            let mut pending = lock(&self.pending);
            match pending.get(&key) {
                Some(rx) => rx.clone(),
                None => {
                    let (tx, rx) = watch::channel(None);
                    pending.insert(key.clone(), rx.clone());

                    let release = Release {
                        pending: Arc::clone(&self.pending),
                        key,
                    };
                    tokio::spawn(async move {
                        let result = fetch.await;
                        let _ = tx.send(Some(result));
                        drop(release);
                    });
                    rx
                }
            }
        };

        let result = rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| CacheError::UpstreamUnavailable("fetch task was aborted".to_string()))?;
        let value: Option<Result<T>> = (*result).clone();
        value.unwrap_or_else(|| {
            Err(CacheError::UpstreamUnavailable(
                "fetch produced no result".to_string(),
            ))
        })
    }

    /// Number of keys with a fetch currently running
    pub fn pending(&self) -> usize {
        lock(&self.pending).len()
    }
}
