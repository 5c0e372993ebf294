//! Minimum spacing between provider calls.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::debug;

/// Free-tier Alpha Vantage allows five calls a minute.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(13);

/// Blocks callers so that consecutive calls are at least `interval` apart.
#[derive(Debug)]
pub struct Pacer {
    interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl Pacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_call: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Time a call made now would have to wait.
    pub fn pending_delay(&self) -> Duration {
        let last = self.last_call.lock().unwrap_or_else(|e| e.into_inner());
        match *last {
            Some(at) => self.interval.saturating_sub(at.elapsed()),
            None => Duration::ZERO,
        }
    }

    /// Sleep until the next call is allowed, then record it.
    pub fn wait(&self) {
        let mut last = self.last_call.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(at) = *last {
            let delay = self.interval.saturating_sub(at.elapsed());
            if !delay.is_zero() {
                debug!(?delay, "pacing provider call");
                std::thread::sleep(delay);
            }
        }
        *last = Some(Instant::now());
    }
}

impl Default for Pacer {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL)
    }
}
