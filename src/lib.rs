//! Segmented LRU - a bounded in-process cache
//!
//! Approximates least-recently-used eviction with two rotating generations,
//! and supports per-entry and default TTL expiration, live resizing and
//! eviction notification.

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{Clock, ExpiresIn, SegmentedCache, SystemClock};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
