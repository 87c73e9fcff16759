//! Bounded TTL cache over a `DashMap`.

use std::hash::Hash;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

#[derive(Debug)]
pub struct TtlCache<K, V>
where
    K: Eq + Hash,
{
    entries: DashMap<K, (Instant, V)>,
    ttl: Duration,
    max_entries: usize,
}

impl<K, V> TtlCache<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    /// Fresh value for `key`, if any. Expired entries are removed on read.
    pub fn get(&self, key: &K) -> Option<V> {
        let fetched_at = self.entries.get(key).map(|entry| entry.0)?;
        if fetched_at.elapsed() > self.ttl {
            self.entries.remove(key);
            return None;
        }
        self.entries.get(key).map(|entry| entry.1.clone())
    }

    pub fn insert(&self, key: K, value: V) {
        self.entries.insert(key, (Instant::now(), value));
        if self.entries.len() > self.max_entries {
            self.prune();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop expired entries, then the oldest ones until within capacity.
    pub fn prune(&self) {
        let mut by_age: Vec<(K, Instant)> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().0))
            .collect();

        by_age.retain(|(key, fetched_at)| {
            let expired = fetched_at.elapsed() > self.ttl;
            if expired {
                self.entries.remove(key);
            }
            !expired
        });
        if self.entries.len() <= self.max_entries {
            return;
        }

        by_age.sort_by_key(|(_, fetched_at)| *fetched_at);
        for (key, _) in by_age {
            if self.entries.len() <= self.max_entries {
                break;
            }
            self.entries.remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let cache = TtlCache::new(Duration::from_secs(60), 10);
        cache.insert("A1".to_string(), 1);
        assert_eq!(cache.get(&"A1".to_string()), Some(1));

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(cache.get(&"A1".to_string()), None);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn oldest_entries_evicted_over_capacity() {
        let cache = TtlCache::new(Duration::from_secs(60), 2);
        cache.insert("A1".to_string(), 1);
        tokio::time::advance(Duration::from_millis(10)).await;
        cache.insert("B2".to_string(), 2);
        tokio::time::advance(Duration::from_millis(10)).await;
        cache.insert("C3".to_string(), 3);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&"A1".to_string()), None);
        assert_eq!(cache.get(&"C3".to_string()), Some(3));
    }
}
