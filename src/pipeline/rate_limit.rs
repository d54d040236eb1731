//! Sliding-window admission control for extraction calls.
//!
//! At most `requests_per_minute` calls may be admitted in any trailing
//! 60-second window. [`RateLimiter::wait_for_slot`] suspends the caller until
//! the oldest admission leaves the window, then re-checks: another waiter may
//! have taken the slot in the meantime.
//!
//! Time comes from [`tokio::time::Instant`], so tests can drive the window
//! with a paused clock.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use tokio::time::{sleep, Duration, Instant};
use tracing::{debug, warn};

/// Length of the sliding window.
pub const WINDOW: Duration = Duration::from_secs(60);

/// Process-lifetime throttle shared by every extraction call.
#[derive(Debug)]
pub struct RateLimiter {
    requests_per_minute: AtomicU32,
    window: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// A limiter admitting `requests_per_minute` calls per window (min 1).
    pub fn new(requests_per_minute: u32) -> Self {
        Self {
            requests_per_minute: AtomicU32::new(requests_per_minute.max(1)),
            window: Mutex::new(VecDeque::new()),
        }
    }

    pub fn requests_per_minute(&self) -> u32 {
        self.requests_per_minute.load(Ordering::Relaxed)
    }

    /// Change the limit for all future admissions. History is kept, so
    /// lowering the limit does not evict admissions already in the window.
    pub fn set_requests_per_minute(&self, rpm: u32) {
        let rpm = rpm.max(1);
        let old = self.requests_per_minute.swap(rpm, Ordering::Relaxed);
        if old != rpm {
            debug!("Rate limit changed: {} → {} requests/min", old, rpm);
        }
    }

    /// Suspend until a slot is free, then record the admission.
    pub async fn wait_for_slot(&self) {
        loop {
            let wait = {
                let mut window = self.lock();
                let now = Instant::now();
                purge(&mut window, now);

                if window.len() < self.requests_per_minute() as usize {
                    window.push_back(now);
                    return;
                }
                match window.front() {
                    Some(&oldest) => WINDOW.saturating_sub(now.duration_since(oldest)),
                    None => Duration::ZERO,
                }
            };
            warn!(
                "Rate limit reached ({} requests/min), waiting {:.1}s",
                self.requests_per_minute(),
                wait.as_secs_f64()
            );
            sleep(wait).await;
        }
    }

    /// Admissions currently inside the window.
    pub fn queue_length(&self) -> usize {
        let mut window = self.lock();
        purge(&mut window, Instant::now());
        window.len()
    }

    /// Forget all admissions.
    pub fn reset(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Instant>> {
        self.window.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_REQUESTS_PER_MINUTE)
    }
}

fn purge(window: &mut VecDeque<Instant>, now: Instant) {
    while let Some(&oldest) = window.front() {
        if now.duration_since(oldest) >= WINDOW {
            window.pop_front();
        } else {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn third_call_waits_for_window() {
        let limiter = RateLimiter::new(2);
        let start = Instant::now();
        limiter.wait_for_slot().await;
        limiter.wait_for_slot().await;
        assert!(start.elapsed() < Duration::from_secs(1));

        limiter.wait_for_slot().await;
        assert!(start.elapsed() >= WINDOW, "elapsed {:?}", start.elapsed());
        // both first admissions aged out exactly as the third was admitted
        assert_eq!(limiter.queue_length(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_is_measured_from_oldest_admission() {
        let limiter = RateLimiter::new(2);
        let start = Instant::now();
        limiter.wait_for_slot().await;
        sleep(Duration::from_secs(20)).await;
        limiter.wait_for_slot().await;

        limiter.wait_for_slot().await;
        let elapsed = start.elapsed();
        assert!(elapsed >= WINDOW);
        assert!(elapsed < WINDOW + Duration::from_secs(1), "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_waiters_respect_limit() {
        let limiter = Arc::new(RateLimiter::new(1));
        let start = Instant::now();
        let handles: Vec<_> = (0..3)
            .map(|_| {
                let l = Arc::clone(&limiter);
                tokio::spawn(async move {
                    l.wait_for_slot().await;
                    Instant::now()
                })
            })
            .collect();
        let mut admitted = Vec::new();
        for h in handles {
            admitted.push(h.await.unwrap());
        }
        admitted.sort();
        assert!(admitted[1].duration_since(start) >= WINDOW);
        assert!(admitted[2].duration_since(start) >= WINDOW * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn raising_limit_admits_immediately() {
        let limiter = RateLimiter::new(1);
        let start = Instant::now();
        limiter.wait_for_slot().await;
        limiter.set_requests_per_minute(5);
        limiter.wait_for_slot().await;
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(limiter.queue_length(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn window_expires_and_reset_clears() {
        let limiter = RateLimiter::new(3);
        limiter.wait_for_slot().await;
        limiter.wait_for_slot().await;
        assert_eq!(limiter.queue_length(), 2);
        sleep(WINDOW).await;
        assert_eq!(limiter.queue_length(), 0);

        limiter.wait_for_slot().await;
        limiter.reset();
        assert_eq!(limiter.queue_length(), 0);
    }

    #[test]
    fn limit_is_clamped_to_one() {
        let limiter = RateLimiter::new(0);
        assert_eq!(limiter.requests_per_minute(), 1);
        limiter.set_requests_per_minute(0);
        assert_eq!(limiter.requests_per_minute(), 1);
    }
}
