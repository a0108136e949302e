//! Cache Entry Module
//!
//! A single serialized value held by the in-process store, with the expiry
//! that store enforces.

use std::time::Duration;

use tokio::time::Instant;

// == Cache Entry ==
/// Represents a single stored value with its expiry deadline.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The serialized value
    pub value: String,
    /// When the entry was written
    pub created_at: Instant,
    /// Deadline after which the entry must not be returned
    pub expires_at: Instant,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new entry expiring `ttl_seconds` from now.
    ///
    /// A deadline past what the clock can represent is clamped to the
    /// furthest representable one.
    pub fn new(value: String, ttl_seconds: u64) -> Self {
        let now = Instant::now();
        Self {
            value,
            created_at: now,
            expires_at: deadline_after(now, Duration::from_secs(ttl_seconds)),
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is expired once the current time reaches its deadline, so an
    /// entry is never observable for longer than its TTL.
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    // == Time To Live ==
    /// Remaining lifetime, zero once expired.
    pub fn ttl_remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }
}

fn deadline_after(now: Instant, ttl: Duration) -> Instant {
    if let Some(deadline) = now.checked_add(ttl) {
        return deadline;
    }
    // Halve the step until it fits
    let mut deadline = now;
    let mut step = ttl;
    while !step.is_zero() {
        match deadline.checked_add(step) {
            Some(later) => deadline = later,
            None => step /= 2,
        }
    }
    deadline
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_creation() {
        let entry = CacheEntry::new("test_value".to_string(), 60);

        assert_eq!(entry.value, "test_value");
        assert!(entry.expires_at > entry.created_at);
        assert!(!entry.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expiration() {
        let entry = CacheEntry::new("test_value".to_string(), 1);

        assert!(!entry.is_expired());

        tokio::time::advance(Duration::from_secs(1)).await;

        assert!(entry.is_expired());
        assert_eq!(entry.ttl_remaining(), Duration::ZERO);
    }

    #[test]
    fn test_ttl_remaining() {
        let entry = CacheEntry::new("test_value".to_string(), 10);

        let remaining = entry.ttl_remaining();
        assert!(remaining <= Duration::from_secs(10));
        assert!(remaining >= Duration::from_secs(9));
    }

    #[test]
    fn test_huge_ttl_does_not_overflow() {
        let entry = CacheEntry::new("forever".to_string(), u64::MAX);

        assert!(!entry.is_expired());
        assert!(entry.expires_at > entry.created_at);
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let now = Instant::now();
        let entry = CacheEntry {
            value: "test".to_string(),
            created_at: now,
            expires_at: now,
        };

        // Expired exactly at the deadline
        assert!(entry.is_expired(), "Entry should be expired at boundary");
    }
}
