use std::{
    collections::{BTreeMap, HashMap},
    hash::Hash,
    sync::{Mutex, MutexGuard},
    time::Duration,
};

use tokio::time::Instant;

/// Key-value cache used for qualified segments.
///
/// Methods take `&self` so a cache can be shared between the SDK and the host.
pub trait Cache<K, V>: Send + Sync {
    fn lookup(&self, key: &K) -> Option<V>;
    fn save(&self, key: K, value: V);
    fn reset(&self);
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Fixed-capacity cache that evicts the least recently used entry and expires entries after a
/// timeout.
///
/// A capacity of zero disables caching. A timeout of `None` keeps entries until evicted.
pub struct LruCache<K, V> {
    capacity: usize,
    timeout: Option<Duration>,
    inner: Mutex<Entries<K, V>>,
}

struct Entries<K, V> {
    map: HashMap<K, Entry<V>>,
    /// Access order: smallest tick is the least recently used key.
    recency: BTreeMap<u64, K>,
    tick: u64,
}

struct Entry<V> {
    value: V,
    saved_at: Instant,
    tick: u64,
}

impl<K, V> LruCache<K, V> {
    pub fn new(capacity: usize, timeout: Option<Duration>) -> LruCache<K, V> {
        LruCache {
            capacity,
            timeout,
            inner: Mutex::new(Entries {
                map: HashMap::new(),
                recency: BTreeMap::new(),
                tick: 0,
            }),
        }
    }

    fn entries(&self) -> MutexGuard<'_, Entries<K, V>> {
        self.inner
            .lock()
            .expect("thread holding cache lock should not panic")
    }

    fn is_expired(&self, entry: &Entry<V>) -> bool {
        self.timeout
            .is_some_and(|timeout| entry.saved_at.elapsed() >= timeout)
    }
}

impl<K: Eq + Hash + Clone, V> Entries<K, V> {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn remove(&mut self, key: &K) -> Option<Entry<V>> {
        let entry = self.map.remove(key)?;
        self.recency.remove(&entry.tick);
        Some(entry)
    }
}

impl<K, V> Cache<K, V> for LruCache<K, V>
where
    K: Eq + Hash + Clone + Send,
    V: Clone + Send,
{
    fn lookup(&self, key: &K) -> Option<V> {
        let mut entries = self.entries();

        let entry = entries.map.get(key)?;
        if self.is_expired(entry) {
            entries.remove(key);
            return None;
        }

        let old_tick = entry.tick;
        let tick = entries.next_tick();
        entries.recency.remove(&old_tick);
        entries.recency.insert(tick, key.clone());

        let entry = entries.map.get_mut(key)?;
        entry.tick = tick;
        Some(entry.value.clone())
    }

    fn save(&self, key: K, value: V) {
        if self.capacity == 0 {
            return;
        }
        let mut entries = self.entries();

        entries.remove(&key);
        let tick = entries.next_tick();
        entries.recency.insert(tick, key.clone());
        entries.map.insert(
            key,
            Entry {
                value,
                saved_at: Instant::now(),
                tick,
            },
        );

        while entries.map.len() > self.capacity {
            let Some((_, oldest)) = entries.recency.pop_first() else {
                break;
            };
            entries.map.remove(&oldest);
        }
    }

    fn reset(&self) {
        let mut entries = self.entries();
        entries.map.clear();
        entries.recency.clear();
    }

    fn len(&self) -> usize {
        self.entries().map.len()
    }
}
