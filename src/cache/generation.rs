//! Generation Module
//!
//! An insertion-ordered key to entry map, one half of the segmented cache.

use std::borrow::Borrow;
use std::hash::Hash;
use std::mem;

use indexmap::map::Entry;
use indexmap::IndexMap;

use crate::cache::CacheEntry;

/// Vacated positions are only swept once there are at least this many.
const COMPACT_THRESHOLD: usize = 32;

/// A live entry and where it sits in the insertion order.
#[derive(Debug)]
struct Slot<V> {
    position: usize,
    entry: CacheEntry<V>,
}

// == Generation ==
/// Insertion-ordered storage for one cache generation.
///
/// Every key keeps a fixed index in `slots`, and `order` lists those indices
/// oldest first. Removing a key vacates its position in `order`; writing it
/// again appends a new position. Both are O(1), and the remaining keys keep
/// their relative order. Vacated positions are swept once they outnumber
/// the live entries.
///
/// - Updating a live key keeps its position
/// - Inserting a removed or unknown key places it last
#[derive(Debug)]
pub struct Generation<K, V> {
    /// Keys seen since the last sweep; `None` marks a removed key
    slots: IndexMap<K, Option<Slot<V>>>,
    /// Indices into `slots` in insertion order; `None` marks a vacated position
    order: Vec<Option<usize>>,
    /// Number of live entries
    live: usize,
}

impl<K, V> Default for Generation<K, V> {
    fn default() -> Self {
        Self {
            slots: IndexMap::new(),
            order: Vec::new(),
            live: 0,
        }
    }
}

impl<K: Hash + Eq, V> Generation<K, V> {
    // == Constructor ==
    /// Creates a new empty generation.
    pub fn new() -> Self {
        Self::default()
    }

    // == Length ==
    /// Returns the number of live entries.
    pub fn len(&self) -> usize {
        self.live
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    // == Contains ==
    /// Checks if a live entry exists for the key.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get(key).is_some()
    }

    // == Get ==
    pub fn get<Q>(&self, key: &Q) -> Option<&CacheEntry<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.slots.get(key)?.as_ref().map(|slot| &slot.entry)
    }

    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut CacheEntry<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.slots.get_mut(key)?.as_mut().map(|slot| &mut slot.entry)
    }

    // == Insert ==
    /// Inserts an entry, returning the entry it replaced.
    ///
    /// A live key is updated in place. A key that was removed earlier is
    /// appended to the end, as if it had never been seen.
    pub fn insert(&mut self, key: K, entry: CacheEntry<V>) -> Option<CacheEntry<V>> {
        let position = self.order.len();
        let index = match self.slots.entry(key) {
            Entry::Occupied(mut occupied) => {
                if let Some(slot) = occupied.get_mut() {
                    return Some(mem::replace(&mut slot.entry, entry));
                }
                occupied.insert(Some(Slot { position, entry }));
                occupied.index()
            }
            Entry::Vacant(vacant) => {
                let index = vacant.index();
                vacant.insert(Some(Slot { position, entry }));
                index
            }
        };
        self.order.push(Some(index));
        self.live += 1;
        None
    }

    // == Remove ==
    /// Removes a key, vacating its position in the insertion order.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<CacheEntry<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let slot = self.slots.get_mut(key)?.take()?;
        Some(self.vacate(slot))
    }

    /// Removes a key and returns an owned copy of it along with the entry.
    pub fn remove_entry<Q>(&mut self, key: &Q) -> Option<(K, CacheEntry<V>)>
    where
        K: Borrow<Q> + Clone,
        Q: Hash + Eq + ?Sized,
    {
        let (_, owned_key, slot) = self.slots.get_full_mut(key)?;
        let slot = slot.take()?;
        let owned_key = owned_key.clone();
        Some((owned_key, self.vacate(slot)))
    }

    // == Clear ==
    pub fn clear(&mut self) {
        self.slots.clear();
        self.order.clear();
        self.live = 0;
    }

    // == Iteration ==
    /// Iterates live entries, oldest insertion first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (&K, &CacheEntry<V>)> + '_ {
        self.order.iter().flatten().filter_map(move |&index| {
            let (key, slot) = self.slots.get_index(index)?;
            slot.as_ref().map(|slot| (key, &slot.entry))
        })
    }

    /// Iterates live keys, oldest insertion first.
    pub fn keys(&self) -> impl DoubleEndedIterator<Item = &K> + '_ {
        self.iter().map(|(key, _)| key)
    }

    /// Consumes the generation, yielding live entries oldest first.
    pub fn into_entries(self) -> impl Iterator<Item = (K, CacheEntry<V>)> {
        let mut slots = Self::take_slots(self.slots);
        self.order.into_iter().flatten().filter_map(move |index| {
            match slots.get_mut(index)?.take()? {
                (key, Some(slot)) => Some((key, slot.entry)),
                (_, None) => None,
            }
        })
    }

    fn vacate(&mut self, slot: Slot<V>) -> CacheEntry<V> {
        self.order[slot.position] = None;
        self.live -= 1;
        self.compact_if_sparse();
        slot.entry
    }

    /// Rebuilds both tables from the live entries once vacated positions
    /// outnumber them. Amortized over the removals that caused it.
    fn compact_if_sparse(&mut self) {
        let vacated = self.order.len() - self.live;
        if vacated < COMPACT_THRESHOLD || vacated <= self.live {
            return;
        }

        let mut slots = Self::take_slots(mem::take(&mut self.slots));
        let order = mem::replace(&mut self.order, Vec::with_capacity(self.live));
        self.slots.reserve(self.live);
        for index in order.into_iter().flatten() {
            if let Some((key, Some(mut slot))) = slots.get_mut(index).and_then(Option::take) {
                slot.position = self.order.len();
                let (new_index, _) = self.slots.insert_full(key, Some(slot));
                self.order.push(Some(new_index));
            }
        }
    }

    fn take_slots(slots: IndexMap<K, Option<Slot<V>>>) -> Vec<Option<(K, Option<Slot<V>>)>> {
        slots.into_iter().map(Some).collect()
    }
}

impl<K: Hash + Eq, V> FromIterator<(K, CacheEntry<V>)> for Generation<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, CacheEntry<V>)>>(iter: I) -> Self {
        let mut generation = Self::new();
        for (key, entry) in iter {
            generation.insert(key, entry);
        }
        generation
    }
}
