// Licensed under the Apache-2.0 license

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use hwcrypto_drivers::Clock;

/// A [`Clock`] that only moves when someone waits on it, so timeout paths
/// run instantly and deterministically.
#[derive(Debug, Default)]
pub struct FakeClock {
    now: Mutex<Duration>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self::default()
    }

    fn now_mut(&self) -> MutexGuard<'_, Duration> {
        self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn advance(&self, by: Duration) {
        *self.now_mut() += by;
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Duration {
        *self.now_mut()
    }

    fn delay(&self, duration: Duration) {
        self.advance(duration);
        std::thread::yield_now();
    }
}
