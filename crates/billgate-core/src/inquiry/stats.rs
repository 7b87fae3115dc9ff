//! Process-lifetime inquiry counters.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;

/// Shared counters for the inquiry service.
///
/// One mutex guards every field so the latency read-modify-write cannot
/// interleave with a counter update.
#[derive(Debug, Default)]
pub struct InquiryStats {
    inner: Mutex<StatsInner>,
}

#[derive(Debug, Default, Clone, Copy)]
struct StatsInner {
    total_requests: u64,
    cache_hits: u64,
    cache_misses: u64,
    upstream_requests: u64,
    error_count: u64,
    average_latency: Duration,
}

/// Point-in-time copy of [`InquiryStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct InquiryStatsSnapshot {
    pub total_requests: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub upstream_requests: u64,
    pub error_count: u64,
    pub average_latency_ms: f64,
}

impl InquiryStatsSnapshot {
    pub fn hit_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }
        self.cache_hits as f64 / self.total_requests as f64
    }
}

impl InquiryStats {
    pub fn new() -> Self {
        Self::default()
    }

    // Poisoned counters are still readable.
    fn lock(&self) -> MutexGuard<'_, StatsInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn record_hit(&self, latency: Duration) {
        let mut s = self.lock();
        s.total_requests += 1;
        s.cache_hits += 1;
        s.update_latency(latency);
    }

    /// Miss or bypass: the request goes upstream.
    pub(crate) fn record_miss(&self) {
        let mut s = self.lock();
        s.total_requests += 1;
        s.cache_misses += 1;
        s.upstream_requests += 1;
    }

    pub(crate) fn record_error(&self) {
        self.lock().error_count += 1;
    }

    pub(crate) fn record_latency(&self, latency: Duration) {
        self.lock().update_latency(latency);
    }

    pub fn snapshot(&self) -> InquiryStatsSnapshot {
        let s = *self.lock();
        InquiryStatsSnapshot {
            total_requests: s.total_requests,
            cache_hits: s.cache_hits,
            cache_misses: s.cache_misses,
            upstream_requests: s.upstream_requests,
            error_count: s.error_count,
            average_latency_ms: s.average_latency.as_nanos() as f64 / 1_000_000.0,
        }
    }
}

impl StatsInner {
    /// Two-point running average, `(old + new) / 2`. Recent samples weigh
    /// more than a true mean would give them.
    fn update_latency(&mut self, latency: Duration) {
        self.average_latency = if self.average_latency.is_zero() {
            latency
        } else {
            (self.average_latency + latency) / 2
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_running_average() {
        let stats = InquiryStats::new();
        stats.record_latency(Duration::from_millis(100));
        assert_eq!(stats.snapshot().average_latency_ms, 100.0);

        stats.record_latency(Duration::from_millis(50));
        assert_eq!(stats.snapshot().average_latency_ms, 75.0);

        stats.record_latency(Duration::from_millis(25));
        assert_eq!(stats.snapshot().average_latency_ms, 50.0);
    }

    #[test]
    fn test_hit_and_miss_counting() {
        let stats = InquiryStats::new();
        stats.record_miss();
        stats.record_hit(Duration::from_millis(1));
        stats.record_hit(Duration::from_millis(1));
        stats.record_error();

        let snap = stats.snapshot();
        assert_eq!(snap.total_requests, 3);
        assert_eq!(snap.cache_hits, 2);
        assert_eq!(snap.cache_misses, 1);
        assert_eq!(snap.upstream_requests, 1);
        assert_eq!(snap.error_count, 1);
        assert!((snap.hit_rate() - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_concurrent_updates_are_not_lost() {
        let stats = Arc::new(InquiryStats::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let stats = Arc::clone(&stats);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        stats.record_miss();
                        stats.record_hit(Duration::from_micros(10));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let snap = stats.snapshot();
        assert_eq!(snap.total_requests, 16_000);
        assert_eq!(snap.cache_hits + snap.cache_misses, snap.total_requests);
    }
}
