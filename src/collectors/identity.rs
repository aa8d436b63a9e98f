use crate::data::InsiderIdentity;
use crate::utils::config::IdentityCacheConfig;
use dashmap::DashMap;
use std::time::{Duration, Instant};
use tracing::debug;

/// Result of a cache probe
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    /// A completed enrichment is cached; `None` means the enricher found nothing
    Hit(Option<InsiderIdentity>),
    Miss,
}

#[derive(Debug, Clone)]
struct CachedIdentity {
    identity: Option<InsiderIdentity>,
    stored_at: Instant,
}

/// Insider identity cache shared by collectors across requests
///
/// Entries expire after `ttl`; once `max_entries` is reached, expired entries
/// are purged and then the oldest entry is evicted to make room. Only
/// completed lookups belong here: timeouts and errors are never cached.
pub struct IdentityCache {
    entries: DashMap<String, CachedIdentity>,
    ttl: Duration,
    max_entries: usize,
}

impl IdentityCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    pub fn from_config(config: &IdentityCacheConfig) -> Self {
        Self::new(Duration::from_secs(config.ttl_secs), config.max_entries)
    }

    fn key(ticker: &str, insider_id: &str) -> String {
        format!("{}:{}", ticker.to_ascii_uppercase(), insider_id.to_ascii_lowercase())
    }

    pub fn get(&self, ticker: &str, insider_id: &str) -> CacheLookup {
        let key = Self::key(ticker, insider_id);

        let expired = match self.entries.get(&key) {
            Some(entry) if entry.stored_at.elapsed() < self.ttl => {
                return CacheLookup::Hit(entry.identity.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            self.entries.remove(&key);
        }
        CacheLookup::Miss
    }

    pub fn insert(&self, ticker: &str, insider_id: &str, identity: Option<InsiderIdentity>) {
        let key = Self::key(ticker, insider_id);

        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_entries {
            self.evict();
        }

        self.entries.insert(
            key,
            CachedIdentity {
                identity,
                stored_at: Instant::now(),
            },
        );
    }

    /// Drop a single entry, e.g. after an upstream identity correction
    pub fn invalidate(&self, ticker: &str, insider_id: &str) {
        self.entries.remove(&Self::key(ticker, insider_id));
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict(&self) {
        let ttl = self.ttl;
        self.entries.retain(|_, entry| entry.stored_at.elapsed() < ttl);

        if self.entries.len() < self.max_entries {
            return;
        }

        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.value().stored_at)
            .map(|entry| entry.key().clone());

        if let Some(key) = oldest {
            debug!("Evicting oldest identity cache entry {}", key);
            self.entries.remove(&key);
        }
    }
}
