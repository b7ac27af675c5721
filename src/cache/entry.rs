//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with expiry support.

// == Cache Entry ==
/// A stored value together with its absolute expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// Expiration timestamp in clock milliseconds, None = no expiration
    pub expires_at: Option<u64>,
}

// == Expires In ==
/// Remaining lifetime of a resident entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiresIn {
    /// The entry has no expiry
    Never,
    /// Milliseconds left; zero or negative once the expiry has passed
    Millis(i64),
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates a new cache entry with an optional absolute expiry.
    pub fn new(value: V, expires_at: Option<u64>) -> Self {
        Self { value, expires_at }
    }

    // == Is Expired ==
    /// Checks if the entry has expired at `now`.
    ///
    /// Boundary condition: an entry is expired once `now` reaches its
    /// expiry, so a zero lifetime is expired immediately.
    pub fn is_expired_at(&self, now: u64) -> bool {
        match self.expires_at {
            Some(expires) => now >= expires,
            None => false,
        }
    }

    // == Time To Live ==
    /// Returns the remaining lifetime measured from `now`.
    ///
    /// Unlike `is_expired_at`, this does not clamp: an overdue entry
    /// reports how long ago it expired as a negative count.
    pub fn expires_in(&self, now: u64) -> ExpiresIn {
        match self.expires_at {
            Some(expires) => {
                let remaining = i128::from(expires) - i128::from(now);
                ExpiresIn::Millis(remaining.clamp(i64::MIN.into(), i64::MAX.into()) as i64)
            }
            None => ExpiresIn::Never,
        }
    }
}
