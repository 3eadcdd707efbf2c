//! # Rolling Risk Window
//! Time-bounded view of recently computed risk scores, used by `/stats`
//! to report average risk over the last 24 hours.

use std::collections::VecDeque;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use serde::Serialize;

/// Summary of the window, as exposed by the stats endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct RollingStats {
    pub window_secs: u64,
    pub average_score: f64,
    pub count: usize,
}

#[derive(Debug, Default)]
struct Inner {
    /// Stored samples as `(unix_seconds, score)`, oldest first.
    buf: VecDeque<(u64, f64)>,
}

/// Thread-safe rolling time window over risk scores. Entries older than
/// the window are pruned on write; reads also skip anything stale so the
/// average never counts expired samples.
#[derive(Debug)]
pub struct RollingRisk {
    inner: Mutex<Inner>,
    window: Duration,
}

impl RollingRisk {
    /// Create a new rolling window with the given duration.
    pub fn with_window(window: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            window,
        }
    }

    /// Convenience constructor for the 24h stats window.
    pub fn new_24h() -> Self {
        Self::with_window(Duration::from_secs(24 * 3600))
    }

    /// Record a new score. If `ts_unix` is `None`, current time is used.
    pub fn record(&self, score: f64, ts_unix: Option<u64>) {
        let now = now_unix();
        let ts = ts_unix.unwrap_or(now);
        let cutoff = now.saturating_sub(self.window.as_secs());

        let mut inner = self.inner.lock();
        inner.buf.push_back((ts, score));
        while let Some(&(t, _)) = inner.buf.front() {
            if t < cutoff {
                inner.buf.pop_front();
            } else {
                break;
            }
        }
    }

    /// Average score and number of samples within the window.
    pub fn average_and_count(&self) -> (f64, usize) {
        let cutoff = now_unix().saturating_sub(self.window.as_secs());

        let inner = self.inner.lock();
        let mut sum = 0.0;
        let mut n: usize = 0;

        for &(t, s) in inner.buf.iter().rev() {
            if t < cutoff {
                break; // older values are at the front; can stop early
            }
            sum += s;
            n += 1;
        }

        let avg = if n > 0 { sum / n as f64 } else { 0.0 };
        (avg, n)
    }

    /// Length of the window in seconds.
    pub fn window_secs(&self) -> u64 {
        self.window.as_secs()
    }

    pub fn stats(&self) -> RollingStats {
        let (average_score, count) = self.average_and_count();
        RollingStats {
            window_secs: self.window_secs(),
            average_score,
            count,
        }
    }
}

/// Current UNIX time in seconds.
fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0))
        .as_secs()
}
