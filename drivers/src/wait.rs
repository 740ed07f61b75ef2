/*++

Licensed under the Apache-2.0 license.

File Name:

    wait.rs

Abstract:

    File contains the clock abstraction and the polling routines used to
    wait on the engine.

--*/

use std::time::{Duration, Instant};

/// Time source used by every bounded wait in the driver.
pub trait Clock: Send + Sync {
    /// Monotonic time since an arbitrary origin.
    fn now(&self) -> Duration;

    /// Pauses the calling thread for `duration`.
    fn delay(&self, duration: Duration);
}

/// Wall-clock implementation of [`Clock`].
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn delay(&self, duration: Duration) {
        if duration.is_zero() {
            std::thread::yield_now();
        } else {
            std::thread::sleep(duration);
        }
    }
}

/// Polls `predicate` every `interval` until it holds or `timeout` elapses on
/// `clock`. The predicate is evaluated once more after the deadline so a
/// late completion is not reported as a timeout.
///
/// Returns true if the predicate held.
pub fn until_deadline<F>(
    clock: &dyn Clock,
    interval: Duration,
    timeout: Duration,
    mut predicate: F,
) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = clock.now().saturating_add(timeout);
    loop {
        if predicate() {
            return true;
        }
        if clock.now() >= deadline {
            return predicate();
        }
        clock.delay(interval);
    }
}

/// Spins on `predicate` at most `limit` times.
///
/// Returns true if the predicate held.
pub fn until_bounded<F>(limit: u32, mut predicate: F) -> bool
where
    F: FnMut() -> bool,
{
    for _ in 0..limit {
        if predicate() {
            return true;
        }
        core::hint::spin_loop();
    }
    false
}
