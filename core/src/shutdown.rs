use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

/// Cooperative cancellation token shared between the controller, its cycle
/// thread and any outside owner.
///
/// A fresh signal never fires on its own. [`wait_timeout`](Self::wait_timeout)
/// replaces a plain `thread::sleep` so a pending shutdown cuts the sleep short.
#[derive(Clone, Default)]
pub struct ShutdownSignal {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    flag: AtomicBool,
    mutex: Mutex<()>,
    condvar: Condvar,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown and wake every thread sleeping in `wait_timeout`.
    pub fn shutdown(&self) {
        // Flip the flag under the mutex so a waiter cannot check it and then
        // miss the notification.
        let _guard = self.inner.mutex.lock().unwrap_or_else(PoisonError::into_inner);
        self.inner.flag.store(true, Ordering::SeqCst);
        self.inner.condvar.notify_all();
    }

    pub fn is_shutdown(&self) -> bool {
        self.inner.flag.load(Ordering::SeqCst)
    }

    /// Sleep for at most `duration`. Returns `true` if shutdown was requested.
    pub fn wait_timeout(&self, duration: Duration) -> bool {
        let guard = self.inner.mutex.lock().unwrap_or_else(PoisonError::into_inner);
        let (_guard, _timeout) = self
            .inner
            .condvar
            .wait_timeout_while(guard, duration, |_| !self.is_shutdown())
            .unwrap_or_else(PoisonError::into_inner);
        self.is_shutdown()
    }
}

impl std::fmt::Debug for ShutdownSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownSignal")
            .field("shutdown", &self.is_shutdown())
            .finish()
    }
}
