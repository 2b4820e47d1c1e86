//! Global memory budget for in-flight transfer buffers.

use std::pin::pin;
use std::sync::Mutex;
use tokio::sync::Notify;

/// Bounded pool of bytes available for in-flight chunk buffers.
///
/// The per-client concurrency cap bounds how many transfers one client may
/// run; this bounds how much buffer memory *all* transfers together may
/// hold. `used_bytes <= max_bytes` at every instant. Callers must release
/// exactly what they acquired.
pub struct MemoryBudget {
    max_bytes: u64,
    used_bytes: Mutex<u64>,
    released: Notify,
}

impl MemoryBudget {
    pub fn new(max_bytes: u64) -> Self {
        Self {
            max_bytes,
            used_bytes: Mutex::new(0),
            released: Notify::new(),
        }
    }

    /// Reserve `bytes`, suspending until the reservation fits.
    ///
    /// No ordering among waiters is promised beyond eventual admission once
    /// capacity allows.
    pub async fn acquire(&self, bytes: u64) {
        loop {
            // Register for the wakeup before checking, so a release between
            // the failed check and the await cannot be missed.
            let mut notified = pin!(self.released.notified());
            notified.as_mut().enable();

            if self.try_acquire(bytes) {
                return;
            }
            notified.await;
        }
    }

    /// Reserve `bytes` if they fit right now.
    pub fn try_acquire(&self, bytes: u64) -> bool {
        let mut used = self.used_bytes.lock().unwrap();
        if *used + bytes <= self.max_bytes {
            *used += bytes;
            true
        } else {
            false
        }
    }

    /// Return `bytes` to the pool and wake waiters.
    pub fn release(&self, bytes: u64) {
        {
            let mut used = self.used_bytes.lock().unwrap();
            *used = used.saturating_sub(bytes);
        }
        self.released.notify_waiters();
    }

    pub fn used_bytes(&self) -> u64 {
        *self.used_bytes.lock().unwrap()
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }
}
