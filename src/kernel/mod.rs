pub mod arbiter;
pub mod audio;
pub mod cancel;
pub mod distress;
pub mod emergency;
pub mod event;
pub mod navigation;
pub mod perception;
pub mod reactor;
pub mod scheduler;
pub mod state;
pub mod telemetry;
pub mod time;
pub mod watchdog;

mod command;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Locks a kernel mutex. Critical sections never span an await, so a poisoned
/// lock still holds consistent data and is recovered rather than propagated.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
