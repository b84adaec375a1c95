//! Rolling outcome window
//!
//! Fixed ring of time buckets holding success/failure/timeout counts. The
//! ring rotates lazily on access; buckets older than the window span are
//! zeroed before they are reused, so totals only ever cover the configured
//! span.

use std::time::Duration;

/// Counts for one time bucket
#[derive(Debug, Default, Clone, Copy)]
struct Bucket {
    success: u64,
    failure: u64,
    timeout: u64,
}

impl Bucket {
    fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Aggregated counts over the whole window
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WindowTotals {
    /// Successful calls in the window
    pub success: u64,
    /// Failed calls in the window
    pub failure: u64,
    /// Timed-out calls in the window
    pub timeout: u64,
}

impl WindowTotals {
    /// Total executed calls in the window
    #[must_use]
    pub fn total(&self) -> u64 {
        self.success + self.failure + self.timeout
    }

    /// Failures plus timeouts
    #[must_use]
    pub fn errors(&self) -> u64 {
        self.failure + self.timeout
    }

    /// Error percentage over the window, zero when empty
    #[must_use]
    pub fn error_percentage(&self) -> u64 {
        let total = self.total();
        if total == 0 {
            return 0;
        }
        self.errors() * 100 / total
    }
}

/// Time-bucketed rolling window of call outcomes
#[derive(Debug)]
pub struct RollingWindow {
    buckets: Vec<Bucket>,
    /// Width of one bucket in milliseconds
    bucket_width_ms: u64,
    /// Index of the bucket currently being written
    head: usize,
    /// Start timestamp of the head bucket, milliseconds on the caller's clock
    head_start_ms: u64,
}

impl RollingWindow {
    /// Create a window spanning `span` split into `buckets` buckets
    ///
    /// `buckets` and `span` must be positive; config validation enforces
    /// this before a window is ever built.
    #[must_use]
    pub fn new(span: Duration, buckets: usize) -> Self {
        let bucket_width_ms = (span.as_millis() as u64 / buckets as u64).max(1);
        Self {
            buckets: vec![Bucket::default(); buckets],
            bucket_width_ms,
            head: 0,
            head_start_ms: 0,
        }
    }

    /// Record a success at `now_ms`
    pub fn record_success(&mut self, now_ms: u64) {
        self.rotate(now_ms);
        self.buckets[self.head].success += 1;
    }

    /// Record a failure at `now_ms`
    pub fn record_failure(&mut self, now_ms: u64) {
        self.rotate(now_ms);
        self.buckets[self.head].failure += 1;
    }

    /// Record a timeout at `now_ms`
    pub fn record_timeout(&mut self, now_ms: u64) {
        self.rotate(now_ms);
        self.buckets[self.head].timeout += 1;
    }

    /// Aggregate the counts still inside the window at `now_ms`
    pub fn totals(&mut self, now_ms: u64) -> WindowTotals {
        self.rotate(now_ms);
        let mut totals = WindowTotals::default();
        for bucket in &self.buckets {
            totals.success += bucket.success;
            totals.failure += bucket.failure;
            totals.timeout += bucket.timeout;
        }
        totals
    }

    /// Zero every bucket
    pub fn reset(&mut self, now_ms: u64) {
        for bucket in &mut self.buckets {
            bucket.clear();
        }
        self.head = 0;
        self.head_start_ms = now_ms - now_ms % self.bucket_width_ms;
    }

    /// Advance the head so it covers `now_ms`, zeroing buckets that fall
    /// out of the window.
    fn rotate(&mut self, now_ms: u64) {
        if now_ms < self.head_start_ms {
            // Clock went backwards relative to the anchor; keep writing the
            // current bucket.
            return;
        }
        let steps = (now_ms - self.head_start_ms) / self.bucket_width_ms;
        if steps == 0 {
            return;
        }
        if steps as usize >= self.buckets.len() {
            self.reset(now_ms);
            return;
        }
        for _ in 0..steps {
            self.head = (self.head + 1) % self.buckets.len();
            self.buckets[self.head].clear();
            self.head_start_ms += self.bucket_width_ms;
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn counts_accumulate_within_span() {
        let mut window = RollingWindow::new(Duration::from_secs(10), 10);
        window.record_success(0);
        window.record_failure(500);
        window.record_timeout(900);

        let totals = window.totals(999);
        assert_eq!(totals.success, 1);
        assert_eq!(totals.failure, 1);
        assert_eq!(totals.timeout, 1);
        assert_eq!(totals.total(), 3);
    }

    #[test]
    fn old_buckets_age_out() {
        let mut window = RollingWindow::new(Duration::from_secs(10), 10);
        window.record_failure(0);
        window.record_failure(100);

        // Still visible just inside the span
        assert_eq!(window.totals(9_000).failure, 2);

        // One full span later, the counts are gone
        assert_eq!(window.totals(11_000).failure, 0);
    }

    #[test]
    fn error_percentage_is_integer_ratio() {
        let mut window = RollingWindow::new(Duration::from_secs(10), 10);
        for _ in 0..3 {
            window.record_failure(0);
        }
        for _ in 0..2 {
            window.record_success(0);
        }
        assert_eq!(window.totals(0).error_percentage(), 60);
    }

    #[test]
    fn empty_window_reports_zero_percentage() {
        let mut window = RollingWindow::new(Duration::from_secs(10), 10);
        assert_eq!(window.totals(0).error_percentage(), 0);
    }

    #[test]
    fn reset_clears_everything() {
        let mut window = RollingWindow::new(Duration::from_secs(10), 10);
        window.record_failure(0);
        window.record_success(0);
        window.reset(0);
        assert_eq!(window.totals(0), WindowTotals::default());
    }

    #[test]
    fn long_gap_resets_instead_of_walking_every_bucket() {
        let mut window = RollingWindow::new(Duration::from_secs(10), 10);
        window.record_failure(0);
        // A gap far larger than the span
        assert_eq!(window.totals(1_000_000).total(), 0);
        window.record_success(1_000_100);
        assert_eq!(window.totals(1_000_200).success, 1);
    }
}
