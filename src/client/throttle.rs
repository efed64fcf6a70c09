// src/client/throttle.rs

use log::info;
use std::time::Duration;

/// Cooperative pause point that keeps request volume under the provider's
/// rate ceiling. Not driven by response headers: after every `every`
/// non-skipped records the caller sleeps for `pause`.
#[derive(Debug, Clone)]
pub struct RequestThrottle {
    every: usize,
    pause: Duration,
    pauses_taken: usize,
}

impl RequestThrottle {
    pub fn new(every: usize, pause: Duration) -> Self {
        Self {
            every: every.max(1),
            pause,
            pauses_taken: 0,
        }
    }

    /// Called once per non-skipped record with the running count of
    /// non-skipped records. Sleeps when the count hits a multiple of `every`;
    /// returns whether it slept.
    pub async fn after_record(&mut self, not_skipped: usize) -> bool {
        if not_skipped == 0 || not_skipped % self.every != 0 {
            return false;
        }
        info!("SLEEPING {}", self.pause.as_secs());
        if !self.pause.is_zero() {
            tokio::time::sleep(self.pause).await;
        }
        self.pauses_taken += 1;
        true
    }

    pub fn pauses_taken(&self) -> usize {
        self.pauses_taken
    }
}
