//! Rate-limit pacing from `x-ratelimit-*` and `retry-after` response headers

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Remaining-request threshold below which calls pause until the reset
pub const LOW_WATERMARK: u64 = 50;

/// Longest wait honoured for a single rate-limited response
pub const MAX_RESET_WAIT: Duration = Duration::from_secs(60 * 60);

/// Rate-limit state reported by a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub remaining: u64,
    /// Reset time as Unix seconds
    pub reset: u64,
}

impl RateLimit {
    /// Parse the header values, `None` if either is missing or malformed
    pub fn parse(remaining: Option<&str>, reset: Option<&str>) -> Option<Self> {
        Some(Self {
            remaining: remaining?.trim().parse().ok()?,
            reset: reset?.trim().parse().ok()?,
        })
    }

    /// How long to wait before the next call, given the current Unix time
    ///
    /// Waits until one second past the reset once fewer than
    /// [`LOW_WATERMARK`] requests remain.
    pub fn pause_at(&self, now: u64) -> Option<Duration> {
        if self.remaining >= LOW_WATERMARK {
            return None;
        }
        let resume = self.reset.saturating_add(1);
        (resume > now).then(|| Duration::from_secs(resume - now))
    }

    /// Time from `now` until one second past the reset
    pub fn until_reset(&self, now: u64) -> Duration {
        Duration::from_secs(self.reset.saturating_add(1).saturating_sub(now))
    }

    /// [`pause_at`](Self::pause_at) using the system clock
    pub fn pause(&self) -> Option<Duration> {
        self.pause_at(unix_now())
    }
}

/// Wait requested by a rate-limited response
///
/// `retry-after` (seconds) wins. Otherwise an exhausted limit waits for its
/// reset. Capped at [`MAX_RESET_WAIT`].
pub fn limited_wait(retry_after: Option<&str>, limit: Option<RateLimit>, now: u64) -> Option<Duration> {
    let wait = retry_after
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .or_else(|| {
            limit
                .filter(|l| l.remaining == 0)
                .map(|l| l.until_reset(now))
        })?;
    Some(wait.min(MAX_RESET_WAIT))
}

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
