// src/query.rs
use std::{
    collections::HashMap,
    fmt::Display,
    future::Future,
    hash::Hash,
    sync::{Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use serde::Serialize;
use tracing::{debug, warn};

/// State of a single fetch.
///
/// `Error` counts as fetched: the request settled, there is just no data.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "data", rename_all = "lowercase")]
pub enum Query<T> {
    Loading,
    Error(String),
    Ready(T),
}

impl<T> Query<T> {
    pub fn is_fetched(&self) -> bool {
        !matches!(self, Query::Loading)
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            Query::Ready(data) => Some(data),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Query::Error(e) => Some(e),
            _ => None,
        }
    }
}

/// Logical AND over completion flags
pub fn all_fetched<'a, T: 'a>(queries: impl IntoIterator<Item = &'a Query<T>>) -> bool {
    queries.into_iter().all(Query::is_fetched)
}

/// First error among already-fetched queries, if any
pub fn first_error<'a, T: 'a>(queries: impl IntoIterator<Item = &'a Query<T>>) -> Option<String> {
    queries
        .into_iter()
        .find_map(|q| q.error().map(str::to_string))
}

struct Entry<V> {
    state: Query<V>,
    updated_at: Instant,
}

/// Keyed query results with a stale-time refetch policy.
///
/// A stale `Ready` entry keeps serving its data while a refetch is in flight.
pub struct QueryCache<K, V> {
    name: &'static str,
    stale_after: Duration,
    entries: Mutex<HashMap<K, Entry<V>>>,
}

impl<K, V> QueryCache<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
    V: Clone,
{
    pub fn new(name: &'static str, stale_after: Duration) -> Self {
        Self {
            name,
            stale_after,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<K, Entry<V>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, key: &K) -> Query<V> {
        self.entries()
            .get(key)
            .map(|e| e.state.clone())
            .unwrap_or(Query::Loading)
    }

    pub fn is_stale(&self, key: &K) -> bool {
        match self.entries().get(key) {
            Some(Entry { state: Query::Ready(_), updated_at }) => {
                updated_at.elapsed() >= self.stale_after
            }
            _ => true,
        }
    }

    pub fn set(&self, key: K, state: Query<V>) {
        self.entries().insert(
            key,
            Entry {
                state,
                updated_at: Instant::now(),
            },
        );
    }

    pub fn invalidate(&self, key: &K) {
        self.entries().remove(key);
    }

    /// Serve a fresh cached value, or run `fetch` and store what it settles to.
    pub async fn fetch_with<F, E>(&self, key: K, fetch: F) -> Query<V>
    where
        F: Future<Output = Result<V, E>>,
        E: Display,
    {
        if !self.is_stale(&key) {
            return self.get(&key);
        }
        match self.refresh(key.clone(), fetch).await {
            Ok(state) => state,
            Err(_) => self.get(&key),
        }
    }

    /// Run `fetch` regardless of staleness.
    ///
    /// A failure is returned to the caller even when the cache keeps serving
    /// the previous `Ready` data.
    pub async fn refresh<F, E>(&self, key: K, fetch: F) -> Result<Query<V>, E>
    where
        F: Future<Output = Result<V, E>>,
        E: Display,
    {
        {
            let mut entries = self.entries();
            entries.entry(key.clone()).or_insert_with(|| Entry {
                state: Query::Loading,
                updated_at: Instant::now(),
            });
        }

        debug!("[{}] fetching {:?}", self.name, key);
        match fetch.await {
            Ok(data) => {
                let state = Query::Ready(data);
                self.set(key, state.clone());
                Ok(state)
            }
            Err(e) => {
                warn!("[{}] fetch failed for {:?}: {}", self.name, key, e);
                // keep serving previous data on a failed refetch
                if !matches!(self.get(&key), Query::Ready(_)) {
                    self.set(key, Query::Error(e.to_string()));
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_counts_as_fetched_but_has_no_data() {
        let q: Query<u32> = Query::Error("boom".into());
        assert!(q.is_fetched());
        assert_eq!(q.data(), None);
        assert!(!Query::<u32>::Loading.is_fetched());
        assert_eq!(Query::Ready(3).data(), Some(&3));
    }

    #[test]
    fn all_fetched_is_false_when_any_is_loading() {
        let queries = vec![Query::Ready(1), Query::Error("x".into()), Query::Loading];
        assert!(!all_fetched(&queries));
        assert!(all_fetched(&queries[..2]));
        assert_eq!(first_error(&queries), Some("x".to_string()));
        assert!(all_fetched(&Vec::<Query<u8>>::new()));
    }

    #[tokio::test]
    async fn fresh_entries_are_served_from_cache() {
        let cache: QueryCache<&str, u32> = QueryCache::new("test", Duration::from_secs(60));
        assert_eq!(cache.get(&"a"), Query::Loading);

        let first = cache.fetch_with("a", async { Ok::<_, String>(1) }).await;
        assert_eq!(first, Query::Ready(1));

        // would return 2 if refetched
        let second = cache.fetch_with("a", async { Ok::<_, String>(2) }).await;
        assert_eq!(second, Query::Ready(1));

        let forced = cache.refresh("a", async { Ok::<_, String>(3) }).await;
        assert_eq!(forced, Ok(Query::Ready(3)));
    }

    #[tokio::test]
    async fn stale_entries_are_refetched_and_failures_keep_old_data() {
        let cache: QueryCache<u8, u32> = QueryCache::new("test", Duration::ZERO);
        cache.fetch_with(1, async { Ok::<_, String>(10) }).await;
        assert!(cache.is_stale(&1));

        let after_error = cache.fetch_with(1, async { Err::<u32, _>("rpc down") }).await;
        assert_eq!(after_error, Query::Ready(10));

        let fresh_error = cache.fetch_with(2, async { Err::<u32, _>("rpc down") }).await;
        assert_eq!(fresh_error, Query::Error("rpc down".into()));

        cache.invalidate(&1);
        assert_eq!(cache.get(&1), Query::Loading);
    }

    #[tokio::test]
    async fn refresh_reports_failures_while_serving_old_data() {
        let cache: QueryCache<u8, u32> = QueryCache::new("test", Duration::from_secs(60));
        assert_eq!(cache.refresh(1, async { Ok::<_, String>(10) }).await, Ok(Query::Ready(10)));

        let failed = cache.refresh(1, async { Err::<u32, _>("rpc down".to_string()) }).await;
        assert_eq!(failed, Err("rpc down".to_string()));
        assert_eq!(cache.get(&1), Query::Ready(10));

        let first = cache.refresh(2, async { Err::<u32, _>("rpc down".to_string()) }).await;
        assert!(first.is_err());
        assert_eq!(cache.get(&2), Query::Error("rpc down".into()));
    }
}
