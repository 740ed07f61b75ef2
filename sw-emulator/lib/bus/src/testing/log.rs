/*++

Licensed under the Apache-2.0 license.

File Name:

    log.rs

Abstract:

    File contains a shared text log for recording bus activity in tests.

--*/
use std::{
    fmt::Write,
    ops::Deref,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

/// A type for logging actions without needing &mut self.
///
/// Clones share the same buffer, and the buffer can be written from any
/// thread, so a test can keep one clone while the driver under test logs
/// through another.
///
/// * Example
///
/// ```
/// use hwcrypto_emu_bus::testing::Log;
/// use std::fmt::Write;
///
/// let log = Log::new();
/// writeln!(log.w(), "Line 1").unwrap();
/// writeln!(log.w(), "Line 2").unwrap();
/// assert_eq!("Line 1\nLine 2\n", &*log.as_str());
/// assert_eq!("Line 1\nLine 2\n", log.take());
/// assert_eq!("", log.take());
/// ```
#[derive(Clone, Default)]
pub struct Log {
    log: Arc<Mutex<String>>,
}

impl Log {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, String> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Access the contents of the log without modifying it.
    pub fn as_str(&self) -> impl Deref<Target = str> + '_ {
        LogRef { guard: self.lock() }
    }

    /// Replaces the contents of the log with an empty string and returns the
    /// previous contents.
    pub fn take(&self) -> String {
        std::mem::take(&mut *self.lock())
    }

    /// Returns a writer that can be used with write!() or writeln!().
    pub fn w(&self) -> impl Write + '_ {
        LogWriter { log: self }
    }
}

struct LogRef<'a> {
    guard: MutexGuard<'a, String>,
}

impl Deref for LogRef<'_> {
    type Target = str;

    fn deref(&self) -> &str {
        self.guard.as_str()
    }
}

struct LogWriter<'a> {
    log: &'a Log,
}

impl Write for LogWriter<'_> {
    fn write_str(&mut self, s: &str) -> std::fmt::Result {
        self.log.lock().write_str(s)
    }
}
