//! Bound on submitted-but-unfinished frames.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::{trace, warn};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum InFlightError {
    #[error("Timed out after {waited:?} waiting for one of {max} in-flight command buffers to finish")]
    Timeout { max: usize, waited: Duration },
}

/// Hands out at most `max` [`InFlightSlot`]s at a time.
///
/// A slot is released when it is dropped. Retaining it in a command buffer's
/// completion handlers ties the release to the GPU finishing that buffer.
#[derive(Debug, Clone)]
pub struct InFlightLimiter {
    max: usize,
    in_flight: Arc<AtomicUsize>,
    timeout: Duration,
}

impl InFlightLimiter {
    /// `max` is clamped to at least one.
    pub fn new(max: usize) -> Self {
        Self {
            max: max.max(1),
            in_flight: Arc::new(AtomicUsize::new(0)),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Take a slot if one is free.
    pub fn try_acquire(&self) -> Option<InFlightSlot> {
        self.in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                (count < self.max).then_some(count + 1)
            })
            .ok()
            .map(|_| InFlightSlot {
                in_flight: Arc::clone(&self.in_flight),
            })
    }

    /// Take a slot, polling `device` until one frees up.
    ///
    /// Completion callbacks only run while the device is polled, so this keeps
    /// polling rather than parking the thread.
    pub fn acquire(&self, device: &wgpu::Device) -> Result<InFlightSlot, InFlightError> {
        let start = Instant::now();
        loop {
            if let Some(slot) = self.try_acquire() {
                trace!(in_flight = self.in_flight(), max = self.max, "Acquired in-flight slot");
                return Ok(slot);
            }

            let _ = device.poll(wgpu::PollType::Poll);

            let waited = start.elapsed();
            if waited > self.timeout {
                warn!(max = self.max, ?waited, "In-flight command buffers did not finish");
                return Err(InFlightError::Timeout {
                    max: self.max,
                    waited,
                });
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }
}

/// Permission to have one more command buffer in flight.
#[derive(Debug)]
pub struct InFlightSlot {
    in_flight: Arc<AtomicUsize>,
}

impl Drop for InFlightSlot {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CompletionHandlers;

    #[test]
    fn test_try_acquire_respects_max() {
        let limiter = InFlightLimiter::new(2);
        let first = limiter.try_acquire().expect("first slot");
        let _second = limiter.try_acquire().expect("second slot");
        assert!(limiter.try_acquire().is_none());
        assert_eq!(limiter.in_flight(), 2);

        drop(first);
        assert_eq!(limiter.in_flight(), 1);
        assert!(limiter.try_acquire().is_some());
    }

    #[test]
    fn test_zero_max_is_clamped_to_single_buffering() {
        let limiter = InFlightLimiter::new(0);
        assert_eq!(limiter.max(), 1);
        let _slot = limiter.try_acquire().expect("one slot");
        assert!(limiter.try_acquire().is_none());
    }

    #[test]
    fn test_slot_released_by_completion_handler() {
        let limiter = InFlightLimiter::new(1);
        let mut handlers = CompletionHandlers::new();
        handlers.retain(limiter.try_acquire().expect("slot"));

        assert!(limiter.try_acquire().is_none());
        handlers.fire();
        assert_eq!(limiter.in_flight(), 0);
        assert!(limiter.try_acquire().is_some());
    }

    #[test]
    fn test_clones_share_the_count() {
        let limiter = InFlightLimiter::new(1);
        let clone = limiter.clone();
        let _slot = limiter.try_acquire().expect("slot");
        assert!(clone.try_acquire().is_none());
    }

    #[test]
    fn test_acquire_times_out_when_nothing_completes() {
        let Some((device, _queue)) = crate::test_support::test_device() else {
            return;
        };

        let limiter = InFlightLimiter::new(1).with_timeout(Duration::from_millis(20));
        let _held = limiter.try_acquire().expect("slot");
        let result = limiter.acquire(&device);
        assert!(matches!(result, Err(InFlightError::Timeout { max: 1, .. })));
    }
}
