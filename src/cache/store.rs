//! Cache Store Module
//!
//! Main cache engine: two rotating generations approximating LRU, with lazy
//! TTL expiration and resize-by-rebuild.

use std::borrow::Borrow;
use std::fmt;
use std::hash::Hash;
use std::mem;
use std::time::Duration;

use tracing::{debug, trace};

use crate::cache::clock::lifetime_to_ms;
use crate::cache::{CacheEntry, CacheStats, Clock, ExpiresIn, Generation, SystemClock};
use crate::config::{validate_max_size, CacheConfig};
use crate::error::Result;

/// Callback receiving entries that leave the cache without an explicit `delete`.
pub type EvictionCallback<K, V> = Box<dyn FnMut(&K, V)>;

// == Segmented Cache ==
/// Bounded cache approximating LRU with two generations.
///
/// New writes land in the *recent* generation. Once `max_size` new keys
/// have been written there, the *retiring* generation is evicted wholesale
/// and *recent* takes its place. Reading a key out of *retiring* promotes
/// it back into *recent*, so anything touched at least once per rotation
/// window survives.
///
/// Expired entries are removed lazily, by whichever read touches them first.
/// Rotation, resize truncation and expiration all go through the eviction
/// callback; `delete` and `clear` do not.
///
/// Not thread-safe: wrap the whole cache in one lock to share it.
pub struct SegmentedCache<K, V, C = SystemClock> {
    /// Receives every new write
    recent: Generation<K, V>,
    /// Previous `recent`, serving reads until the next rotation
    retiring: Generation<K, V>,
    /// New keys written into `recent` since the last rotation
    writes: usize,
    max_size: usize,
    max_age: Option<Duration>,
    on_eviction: Option<EvictionCallback<K, V>>,
    stats: CacheStats,
    clock: C,
}

impl<K, V> SegmentedCache<K, V, SystemClock>
where
    K: Hash + Eq + Clone,
{
    // == Constructors ==
    /// Creates a cache holding about `max_size` entries, with no default expiration.
    pub fn new(max_size: usize) -> Result<Self> {
        Self::with_config(CacheConfig::new(max_size))
    }

    /// Creates a cache from a configuration, using the system clock.
    pub fn with_config(config: CacheConfig) -> Result<Self> {
        Self::with_clock(config, SystemClock::new())
    }
}

impl<K, V, C> SegmentedCache<K, V, C>
where
    K: Hash + Eq + Clone,
    C: Clock,
{
    /// Creates a cache from a configuration and a custom clock.
    ///
    /// # Errors
    /// `InvalidConfiguration` if `max_size` is zero or `max_age` is under 1ms.
    pub fn with_clock(config: CacheConfig, clock: C) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            recent: Generation::new(),
            retiring: Generation::new(),
            writes: 0,
            max_size: config.max_size,
            max_age: config.max_age,
            on_eviction: None,
            stats: CacheStats::new(),
            clock,
        })
    }

    /// Installs the callback invoked for every implicitly removed entry.
    pub fn on_eviction<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&K, V) + 'static,
    {
        self.on_eviction = Some(Box::new(callback));
        self
    }

    // == Set ==
    /// Stores a value using the default lifetime from the configuration.
    ///
    /// Returns the cache so calls can be chained.
    pub fn set(&mut self, key: K, value: V) -> &mut Self {
        let ttl = self.max_age;
        self.set_with_ttl(key, value, ttl)
    }

    /// Stores a value with an explicit lifetime, overriding the default.
    ///
    /// `None` stores an entry that never expires, even when the cache has a
    /// default `max_age`. A partial millisecond is rounded up.
    ///
    /// Overwriting a key already in the recent generation updates it in place
    /// and does not count toward rotation. Any other key is a new write.
    pub fn set_with_ttl(&mut self, key: K, value: V, ttl: Option<Duration>) -> &mut Self {
        let expires_at = ttl.map(|ttl| self.clock.now_ms().saturating_add(lifetime_to_ms(ttl)));
        let entry = CacheEntry::new(value, expires_at);

        match self.recent.get_mut(&key) {
            Some(existing) => *existing = entry,
            None => self.insert_recent(key, entry),
        }
        self
    }

    // == Get ==
    /// Retrieves a value, marking it as recently used.
    ///
    /// A hit in the retiring generation moves the entry into the recent one
    /// with its original expiry; this counts as a write and may rotate.
    pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        if self.expire_if_due(key) {
            self.stats.record_miss();
            return None;
        }

        if !self.recent.contains_key(key) {
            match self.retiring.remove_entry(key) {
                Some((owned_key, entry)) => self.insert_recent(owned_key, entry),
                None => {
                    self.stats.record_miss();
                    return None;
                }
            }
        }

        self.stats.record_hit();
        // A promotion that triggered rotation leaves the entry in `retiring`
        self.lookup(key).map(|entry| &entry.value)
    }

    // == Has ==
    /// Checks if a live entry exists, without promoting it.
    pub fn has<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        !self.expire_if_due(key) && self.lookup(key).is_some()
    }

    // == Peek ==
    /// Retrieves a value without marking it as recently used.
    pub fn peek<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        if self.expire_if_due(key) {
            return None;
        }
        self.lookup(key).map(|entry| &entry.value)
    }

    // == Expires In ==
    /// Returns the remaining lifetime of a resident entry.
    ///
    /// Pure inspection: an overdue entry is reported with a negative count
    /// and left in place. `None` means the key is not resident at all.
    pub fn expires_in<Q>(&self, key: &Q) -> Option<ExpiresIn>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = self.clock.now_ms();
        self.lookup(key).map(|entry| entry.expires_in(now))
    }

    // == Delete ==
    /// Removes a key from both generations.
    ///
    /// Returns true if it was present in either. The eviction callback is
    /// not invoked.
    pub fn delete<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let in_recent = self.recent.remove(key).is_some();
        if in_recent {
            self.writes = self.writes.saturating_sub(1);
        }
        let in_retiring = self.retiring.remove(key).is_some();
        in_recent || in_retiring
    }

    // == Clear ==
    /// Removes every entry without invoking the eviction callback.
    pub fn clear(&mut self) {
        self.recent.clear();
        self.retiring.clear();
        self.writes = 0;
    }

    // == Resize ==
    /// Changes the capacity in place, evicting the oldest entries if needed.
    ///
    /// Survivors of a shrink are placed in the retiring generation, so the
    /// next write rotates on the usual schedule.
    ///
    /// # Errors
    /// `InvalidConfiguration` if `new_max_size` is zero.
    pub fn resize(&mut self, new_max_size: usize) -> Result<()> {
        validate_max_size(new_max_size)?;
        self.purge_expired();

        let recent = mem::take(&mut self.recent);
        let retiring = mem::take(&mut self.retiring);
        let mut entries: Vec<(K, CacheEntry<V>)> = retiring
            .into_entries()
            .filter(|(key, _)| !recent.contains_key(key))
            .collect();
        entries.extend(recent.into_entries());

        let count = entries.len();
        if count < new_max_size {
            self.recent = entries.into_iter().collect();
            self.writes = count;
        } else {
            let survivors = entries.split_off(count - new_max_size);
            self.stats.record_evictions(entries.len());
            for (key, entry) in entries {
                self.notify_eviction(&key, entry.value);
            }
            self.retiring = survivors.into_iter().collect();
            self.writes = 0;
        }

        debug!(
            from = self.max_size,
            to = new_max_size,
            retained = count.min(new_max_size),
            "resized cache"
        );
        self.max_size = new_max_size;
        Ok(())
    }

    // == Purge Expired ==
    /// Removes every expired entry now instead of waiting for a read.
    ///
    /// Returns the number of entries removed; each goes through the
    /// eviction callback.
    pub fn purge_expired(&mut self) -> usize {
        let now = self.clock.now_ms();
        let expired: Vec<K> = self
            .recent
            .iter()
            .chain(
                self.retiring
                    .iter()
                    .filter(|(key, _)| !self.recent.contains_key(*key)),
            )
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        expired
            .iter()
            .filter(|key| self.expire_if_due(*key))
            .count()
    }

    // == Iteration ==
    /// Iterates live entries, recent generation first.
    ///
    /// Expired entries are purged before iteration starts. Each key is
    /// yielded once even if both generations hold it.
    pub fn iter(&mut self) -> impl Iterator<Item = (&K, &V)> + '_ {
        self.purge_expired();
        let recent = &self.recent;
        recent
            .iter()
            .chain(
                self.retiring
                    .iter()
                    .filter(move |(key, _)| !recent.contains_key(*key)),
            )
            .map(|(key, entry)| (key, &entry.value))
    }

    /// Iterates live keys in the same order as `iter`.
    pub fn keys(&mut self) -> impl Iterator<Item = &K> + '_ {
        self.iter().map(|(key, _)| key)
    }

    /// Iterates live values in the same order as `iter`.
    pub fn values(&mut self) -> impl Iterator<Item = &V> + '_ {
        self.iter().map(|(_, value)| value)
    }

    /// Iterates live entries from least to most recently used.
    pub fn entries_ascending(&mut self) -> impl Iterator<Item = (&K, &V)> + '_ {
        self.purge_expired();
        let recent = &self.recent;
        self.retiring
            .iter()
            .filter(move |(key, _)| !recent.contains_key(*key))
            .chain(recent.iter())
            .map(|(key, entry)| (key, &entry.value))
    }

    /// Iterates live entries from most to least recently used.
    pub fn entries_descending(&mut self) -> impl Iterator<Item = (&K, &V)> + '_ {
        self.purge_expired();
        let recent = &self.recent;
        recent
            .iter()
            .rev()
            .chain(
                self.retiring
                    .iter()
                    .rev()
                    .filter(move |(key, _)| !recent.contains_key(*key)),
            )
            .map(|(key, entry)| (key, &entry.value))
    }

    // == Length ==
    /// Returns the logical number of entries.
    ///
    /// Keys held by both generations count once. The result is clamped to
    /// `max_size`, and may include expired entries no read has touched yet.
    pub fn len(&self) -> usize {
        if self.writes == 0 {
            return self.retiring.len();
        }
        let unshadowed = self
            .retiring
            .keys()
            .filter(|key| !self.recent.contains_key(*key))
            .count();
        (self.writes + unshadowed).min(self.max_size)
    }

    // == Is Empty ==
    /// Returns true if no entries are resident.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // == Max Size ==
    /// Returns the current capacity.
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    // == Max Age ==
    /// Returns the default lifetime applied by `set`, if any.
    pub fn max_age(&self) -> Option<Duration> {
        self.max_age
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.len());
        stats
    }

    // == Internals ==
    fn lookup<Q>(&self, key: &Q) -> Option<&CacheEntry<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.recent.get(key).or_else(|| self.retiring.get(key))
    }

    /// Writes a key that is not live in `recent`, rotating once the write
    /// counter reaches capacity.
    fn insert_recent(&mut self, key: K, entry: CacheEntry<V>) {
        self.recent.insert(key, entry);
        self.writes += 1;
        if self.writes >= self.max_size {
            self.rotate();
        }
    }

    /// Evicts the retiring generation and moves `recent` into its place.
    fn rotate(&mut self) {
        self.writes = 0;
        let recent = mem::take(&mut self.recent);
        let retired = mem::replace(&mut self.retiring, recent);

        let evicted = retired.len();
        self.stats.record_rotation();
        self.stats.record_evictions(evicted);
        for (key, entry) in retired.into_entries() {
            self.notify_eviction(&key, entry.value);
        }
        debug!(evicted, max_size = self.max_size, "rotated cache generations");
    }

    /// Drops `key` if its authoritative entry has expired.
    ///
    /// The copy in `recent` wins over one in `retiring`. On expiry both are
    /// removed and the authoritative value is reported as evicted. Returns
    /// true if the key was dropped.
    fn expire_if_due<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = self.clock.now_ms();
        let expired = self
            .lookup(key)
            .is_some_and(|entry| entry.is_expired_at(now));
        if !expired {
            return false;
        }

        let removed = match self.recent.remove_entry(key) {
            Some(pair) => {
                self.writes = self.writes.saturating_sub(1);
                self.retiring.remove(key);
                Some(pair)
            }
            None => self.retiring.remove_entry(key),
        };

        if let Some((owned_key, entry)) = removed {
            trace!("lazily expired cache entry");
            self.stats.record_expiration();
            self.notify_eviction(&owned_key, entry.value);
        }
        true
    }

    fn notify_eviction(&mut self, key: &K, value: V) {
        if let Some(callback) = self.on_eviction.as_mut() {
            callback(key, value);
        }
    }
}

impl<K, V, C> fmt::Debug for SegmentedCache<K, V, C>
where
    K: Hash + Eq + fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SegmentedCache")
            .field("recent", &self.recent)
            .field("retiring", &self.retiring)
            .field("writes", &self.writes)
            .field("max_size", &self.max_size)
            .field("max_age", &self.max_age)
            .field("on_eviction", &self.on_eviction.is_some())
            .field("stats", &self.stats)
            .finish()
    }
}

impl<K, V, C> fmt::Display for SegmentedCache<K, V, C>
where
    K: Hash + Eq + Clone,
    C: Clock,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cache({}/{})", self.len(), self.max_size)
    }
}
