//! Inter-send pacing
//!
//! Spacing is uniform between consecutive actual transport calls: no delay
//! before the first real send, and duplicate skips are free - they neither
//! wait nor push the next real send's delay away.

use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

/// Pacing policy applied by the campaign loop
#[derive(Debug)]
pub struct Pacer {
    delay: Duration,
    sent_before: bool,
}

impl Pacer {
    /// Create a pacer with the campaign's inter-send delay
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            sent_before: false,
        }
    }

    /// Wait the configured delay before a real send attempt
    ///
    /// Suspends only when a real send already happened in this run.
    pub async fn pace(&mut self) {
        if self.sent_before && !self.delay.is_zero() {
            debug!(delay_secs = self.delay.as_secs(), "Pacing before next send");
            sleep(self.delay).await;
        }
    }

    /// Record that a real send attempt was made
    pub fn note_sent(&mut self) {
        self.sent_before = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn no_delay_before_first_send() {
        let mut pacer = Pacer::new(Duration::from_secs(20));

        let start = Instant::now();
        pacer.pace().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn full_delay_between_real_sends() {
        let mut pacer = Pacer::new(Duration::from_secs(20));

        pacer.pace().await;
        pacer.note_sent();

        let start = Instant::now();
        pacer.pace().await;
        assert_eq!(start.elapsed(), Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_skip_does_not_reset_spacing() {
        let mut pacer = Pacer::new(Duration::from_secs(20));

        // first real send
        pacer.pace().await;
        pacer.note_sent();

        // a duplicate skip happens here: no pace() call, no state change

        // next real send still waits the full delay
        let start = Instant::now();
        pacer.pace().await;
        assert_eq!(start.elapsed(), Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_delay_never_sleeps() {
        let mut pacer = Pacer::new(Duration::ZERO);
        pacer.note_sent();

        let start = Instant::now();
        pacer.pace().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
