use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::QuotaStore;
use crate::errors::AuthError;
use crate::model::{QuotaKey, QuotaOutcome, RateLimit};

#[derive(Default)]
struct Bucket {
    window: Duration,
    admitted: VecDeque<Instant>,
    // set once pruned out of the map; holders must look the key up again
    retired: bool,
}

impl Bucket {
    fn evict(&mut self, now: Instant) {
        while let Some(oldest) = self.admitted.front() {
            if now.saturating_duration_since(*oldest) >= self.window {
                self.admitted.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Sliding-window log per `(identity, category)`.
///
/// Each key has its own lock, so admissions for one key never wait on another.
#[derive(Default)]
pub struct SlidingWindowLimiter {
    buckets: DashMap<QuotaKey, Arc<Mutex<Bucket>>>,
}

impl SlidingWindowLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check_and_consume_at(
        &self,
        key: &QuotaKey,
        limit: &RateLimit,
        now: Instant,
    ) -> QuotaOutcome {
        loop {
            let bucket = match self.buckets.get(key) {
                Some(bucket) => bucket.clone(),
                None => self.buckets.entry(key.clone()).or_default().clone(),
            };
            let mut bucket = bucket.lock();
            if bucket.retired {
                continue;
            }
            return Self::admit(&mut bucket, limit, now);
        }
    }

    fn admit(bucket: &mut Bucket, limit: &RateLimit, now: Instant) -> QuotaOutcome {
        bucket.window = limit.window;
        bucket.evict(now);

        let used = bucket.admitted.len();
        if used < limit.count as usize {
            bucket.admitted.push_back(now);
            return QuotaOutcome::Allowed {
                remaining: limit.count - used as u32 - 1,
            };
        }
        let retry_after = bucket
            .admitted
            .front()
            .map(|oldest| (*oldest + limit.window).saturating_duration_since(now))
            .unwrap_or(limit.window);
        QuotaOutcome::RateLimited { retry_after }
    }

    /// Whether anything has been recorded for `key`.
    pub fn is_tracked(&self, key: &QuotaKey) -> bool {
        self.buckets.contains_key(key)
    }

    /// Drops buckets whose window holds no admissions. Returns how many were dropped.
    pub fn prune_idle(&self) -> usize {
        let now = Instant::now();
        let before = self.buckets.len();
        self.buckets.retain(|_, bucket| {
            let mut bucket = bucket.lock();
            bucket.evict(now);
            bucket.retired = bucket.admitted.is_empty();
            !bucket.retired
        });
        before.saturating_sub(self.buckets.len())
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

#[async_trait]
impl QuotaStore for SlidingWindowLimiter {
    async fn check_and_consume(
        &self,
        key: &QuotaKey,
        limit: &RateLimit,
    ) -> Result<QuotaOutcome, AuthError> {
        Ok(self.check_and_consume_at(key, limit, Instant::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatekeep_types::prelude::Category;

    #[test]
    fn window_slides() {
        let limiter = SlidingWindowLimiter::new();
        let key = QuotaKey::new("p1", Category::Search);
        let limit = RateLimit::new(2, Duration::from_secs(10));
        let t0 = Instant::now();

        assert_eq!(
            limiter.check_and_consume_at(&key, &limit, t0),
            QuotaOutcome::Allowed { remaining: 1 }
        );
        let t1 = t0 + Duration::from_secs(4);
        assert_eq!(
            limiter.check_and_consume_at(&key, &limit, t1),
            QuotaOutcome::Allowed { remaining: 0 }
        );
        let t2 = t0 + Duration::from_secs(6);
        assert_eq!(
            limiter.check_and_consume_at(&key, &limit, t2),
            QuotaOutcome::RateLimited {
                retry_after: Duration::from_secs(4)
            }
        );
        // the first admission leaves the window at t0 + 10s
        let t3 = t0 + Duration::from_secs(10);
        assert!(matches!(
            limiter.check_and_consume_at(&key, &limit, t3),
            QuotaOutcome::Allowed { .. }
        ));
    }

    #[test]
    fn categories_are_separate_buckets() {
        let limiter = SlidingWindowLimiter::new();
        let limit = RateLimit::new(1, Duration::from_secs(60));
        let now = Instant::now();
        let search = QuotaKey::new("p1", Category::Search);
        let docs = QuotaKey::new("p1", Category::Docs);
        assert!(matches!(
            limiter.check_and_consume_at(&search, &limit, now),
            QuotaOutcome::Allowed { .. }
        ));
        assert!(matches!(
            limiter.check_and_consume_at(&search, &limit, now),
            QuotaOutcome::RateLimited { .. }
        ));
        assert!(matches!(
            limiter.check_and_consume_at(&docs, &limit, now),
            QuotaOutcome::Allowed { .. }
        ));
    }

    #[test]
    fn zero_count_always_limits() {
        let limiter = SlidingWindowLimiter::new();
        let limit = RateLimit::new(0, Duration::from_secs(5));
        let key = QuotaKey::new("p1", Category::Docs);
        assert_eq!(
            limiter.check_and_consume_at(&key, &limit, Instant::now()),
            QuotaOutcome::RateLimited {
                retry_after: Duration::from_secs(5)
            }
        );
    }

    #[test]
    fn prune_drops_empty_buckets() {
        let limiter = SlidingWindowLimiter::new();
        let key = QuotaKey::new("p1", Category::Docs);
        let limit = RateLimit::new(5, Duration::from_millis(1));
        let past = Instant::now() - Duration::from_secs(1);
        limiter.check_and_consume_at(&key, &limit, past);
        assert!(limiter.is_tracked(&key));
        assert_eq!(limiter.prune_idle(), 1);
        assert!(!limiter.is_tracked(&key));
    }
}
