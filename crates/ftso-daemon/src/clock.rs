//! Wall clock mapped onto the tokio timer.
//!
//! The clock is anchored once to Unix time and then advances with
//! `tokio::time::Instant`, so tests running with paused time see round
//! boundaries pass deterministically.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::time::Instant;

/// Unix-time clock driven by the tokio timer.
#[derive(Clone, Copy, Debug)]
pub struct Clock {
    base_ms: u64,
    base: Instant,
}

impl Clock {
    /// Clock anchored to the system time.
    pub fn system() -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self {
            base_ms: now.as_millis() as u64,
            base: Instant::now(),
        }
    }

    /// Clock that reads `ts` (Unix seconds) right now.
    pub fn starting_at(ts: u64) -> Self {
        Self {
            base_ms: ts * 1000,
            base: Instant::now(),
        }
    }

    /// Current Unix time in milliseconds.
    pub fn now_ms(&self) -> u64 {
        self.base_ms + self.base.elapsed().as_millis() as u64
    }

    /// Current Unix time in seconds.
    pub fn now(&self) -> u64 {
        self.now_ms() / 1000
    }

    /// Sleep until the Unix second `ts` has started.
    pub async fn sleep_until(&self, ts: u64) {
        let target = ts * 1000;
        let now = self.now_ms();
        if target > now {
            tokio::time::sleep(Duration::from_millis(target - now)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_clock_follows_tokio_time() {
        let clock = Clock::starting_at(1_000);
        assert_eq!(clock.now(), 1_000);
        tokio::time::advance(Duration::from_millis(2_500)).await;
        assert_eq!(clock.now(), 1_002);
        assert_eq!(clock.now_ms(), 1_002_500);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_until() {
        let clock = Clock::starting_at(50);
        clock.sleep_until(60).await;
        assert_eq!(clock.now(), 60);
        // already passed
        clock.sleep_until(10).await;
        assert_eq!(clock.now(), 60);
    }

    #[test]
    fn test_system_clock_is_recent() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .expect("runtime");
        rt.block_on(async {
            // after 2023-01-01
            assert!(Clock::system().now() > 1_672_531_200);
        });
    }
}
