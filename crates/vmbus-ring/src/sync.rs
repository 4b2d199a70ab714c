#[cfg(not(feature = "loom"))]
pub use core::hint::spin_loop;
#[cfg(feature = "loom")]
pub use loom::hint::spin_loop;

#[cfg(not(feature = "loom"))]
pub use core::sync::atomic::{AtomicU32, Ordering, fence};
#[cfg(feature = "loom")]
pub use loom::sync::atomic::{AtomicU32, Ordering, fence};

#[cfg(feature = "loom")]
pub use loom::thread;
#[cfg(not(feature = "loom"))]
pub use std::thread;

/// Mutual exclusion for the write path.
///
/// Wraps `parking_lot::Mutex` normally and `loom::sync::Mutex` under loom, so
/// callers get the same guard-returning `lock()` either way.
pub struct Mutex<T> {
    #[cfg(not(feature = "loom"))]
    inner: parking_lot::Mutex<T>,
    #[cfg(feature = "loom")]
    inner: loom::sync::Mutex<T>,
}

#[cfg(not(feature = "loom"))]
pub type MutexGuard<'a, T> = parking_lot::MutexGuard<'a, T>;
#[cfg(feature = "loom")]
pub type MutexGuard<'a, T> = loom::sync::MutexGuard<'a, T>;

impl<T> Mutex<T> {
    pub fn new(value: T) -> Self {
        Self {
            #[cfg(not(feature = "loom"))]
            inner: parking_lot::Mutex::new(value),
            #[cfg(feature = "loom")]
            inner: loom::sync::Mutex::new(value),
        }
    }

    #[inline]
    pub fn lock(&self) -> MutexGuard<'_, T> {
        #[cfg(not(feature = "loom"))]
        {
            self.inner.lock()
        }
        #[cfg(feature = "loom")]
        {
            // Poisoning only happens if a writer panicked mid-copy; the ring
            // indices were not published in that case, so the data is intact.
            self.inner.lock().unwrap_or_else(|e| e.into_inner())
        }
    }
}
