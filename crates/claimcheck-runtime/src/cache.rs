//! Caching layer for fact-check lookups.
//!
//! The same claim text often appears more than once in a document; caching
//! index responses by normalized query avoids repeated remote calls.

use claimcheck_core::text::normalize_whitespace;
use claimcheck_core::FactCheckEntry;
use moka::future::Cache;
use std::time::Duration;

/// Cache key for a lookup: whitespace-collapsed, lowercased query.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct QueryKey(String);

impl QueryKey {
    pub fn new(query: &str) -> Self {
        Self(normalize_whitespace(query).to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Fact-check response cache using moka.
pub struct LookupCache {
    cache: Cache<QueryKey, Vec<FactCheckEntry>>,
}

impl LookupCache {
    pub fn new(max_entries: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();

        Self { cache }
    }

    pub async fn get(&self, key: &QueryKey) -> Option<Vec<FactCheckEntry>> {
        self.cache.get(key).await
    }

    pub async fn insert(&self, key: QueryKey, entries: Vec<FactCheckEntry>) {
        self.cache.insert(key, entries).await;
    }

    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

impl Default for LookupCache {
    fn default() -> Self {
        Self::new(10_000, Duration::from_secs(3600))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_normalization() {
        assert_eq!(
            QueryKey::new("  The Sky\n is   BLUE "),
            QueryKey::new("the sky is blue")
        );
        assert_eq!(QueryKey::new("A  b").as_str(), "a b");
    }

    #[tokio::test]
    async fn test_cache_operations() {
        let cache = LookupCache::default();
        let key = QueryKey::new("Vaccines cause autism");

        assert!(cache.get(&key).await.is_none());

        let entries = vec![FactCheckEntry {
            rating: "False".to_string(),
            publisher: "Snopes".to_string(),
            url: "https://snopes.com/x".to_string(),
        }];
        cache.insert(key.clone(), entries.clone()).await;

        let cached = cache.get(&QueryKey::new("vaccines  cause autism")).await;
        assert_eq!(cached, Some(entries));
    }
}
