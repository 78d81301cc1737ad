//! Block range chunking and batched concurrent execution.
//!
//! Log queries are limited by the provider's maximum block range and by rate limits,
//! so a block span is split into chunks which run `concurrency` at a time with a pause
//! between batches.

use futures::future::join_all;
use std::future::Future;
use std::time::Duration;

/// Chunking and pacing for log queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    /// Blocks per query, inclusive.
    pub chunk_size: u64,
    /// Chunks queried concurrently.
    pub concurrency: usize,
    /// Pause between batches.
    pub delay: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            chunk_size: 499,
            concurrency: 10,
            delay: Duration::from_millis(200),
        }
    }
}

impl BatchConfig {
    /// Settings for the farm deposit discovery fallback.
    #[must_use]
    pub fn discovery() -> Self {
        Self {
            chunk_size: 2_000,
            concurrency: 20,
            delay: Duration::from_millis(200),
        }
    }

    /// Sets the chunk size.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Sets the concurrency.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Sets the pause between batches.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Splits `[start, end]` into ascending inclusive ranges of at most `chunk_size` blocks.
///
/// Returns nothing when `start > end`. A zero chunk size is treated as one.
#[must_use]
pub fn chunk_ranges(start: u64, end: u64, chunk_size: u64) -> Vec<(u64, u64)> {
    let chunk_size = chunk_size.max(1);
    let mut ranges = Vec::new();
    let mut from = start;
    while from <= end {
        let to = from.saturating_add(chunk_size - 1).min(end);
        ranges.push((from, to));
        if to == u64::MAX {
            break;
        }
        from = to + 1;
    }
    ranges
}

/// Runs `job` over every range, `concurrency` at a time, pausing between batches.
///
/// Results come back in range order.
pub async fn run_batched<T, F, Fut>(ranges: &[(u64, u64)], config: &BatchConfig, job: F) -> Vec<T>
where
    F: Fn(u64, u64) -> Fut,
    Fut: Future<Output = T>,
{
    let mut results = Vec::with_capacity(ranges.len());
    let mut batches = ranges.chunks(config.concurrency.max(1)).peekable();
    while let Some(batch) = batches.next() {
        results.extend(join_all(batch.iter().map(|&(from, to)| job(from, to))).await);
        if batches.peek().is_some() && !config.delay.is_zero() {
            tokio::time::sleep(config.delay).await;
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_chunk_ranges_cover_span() {
        let ranges = chunk_ranges(100, 1_100, 499);
        assert_eq!(ranges, vec![(100, 598), (599, 1_097), (1_098, 1_100)]);
    }

    #[test]
    fn test_chunk_ranges_single_block() {
        assert_eq!(chunk_ranges(7, 7, 499), vec![(7, 7)]);
    }

    #[test]
    fn test_chunk_ranges_empty_when_start_after_end() {
        assert!(chunk_ranges(10, 9, 499).is_empty());
    }

    #[test]
    fn test_chunk_ranges_exact_multiple() {
        let ranges = chunk_ranges(0, 9, 5);
        assert_eq!(ranges, vec![(0, 4), (5, 9)]);
    }

    #[tokio::test]
    async fn test_run_batched_keeps_order_and_bounds_concurrency() {
        let ranges = chunk_ranges(0, 99, 10);
        let config = BatchConfig::default()
            .with_concurrency(3)
            .with_delay(Duration::ZERO);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let results = run_batched(&ranges, &config, |from, to| {
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::task::yield_now().await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                (from, to)
            }
        })
        .await;

        assert_eq!(results, ranges);
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }
}
