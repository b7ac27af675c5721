//! Cache Module
//!
//! Provides an approximate-LRU cache built from two rotating generations,
//! with lazy TTL expiration and live resizing.

mod clock;
mod entry;
mod generation;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::{CacheEntry, ExpiresIn};
pub use generation::Generation;
pub use stats::CacheStats;
pub use store::{EvictionCallback, SegmentedCache};
