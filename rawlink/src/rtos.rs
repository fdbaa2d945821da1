//! Scheduler services consumed by the transport layer.
//!
//! The crate is designed to run under a preemptive RTOS but does not bind
//! to one. Everything it needs from the scheduler — a mutex with a bounded
//! acquire, a binary wakeup signal that can be posted from interrupt
//! context, and the monotonic tick counter — is expressed as the [`Rtos`]
//! trait, which the platform integration implements. A host implementation
//! backed by `std` is available as [`StdRtos`] when the `std` feature is
//! enabled.

use core::time::Duration;

use crate::time::Instant;

/// Mutual exclusion over `T` with a bounded acquire time.
///
/// The closure-based shape guarantees the lock is released on every exit
/// path; there is no guard to forget.
pub trait TimedMutex<T>: Send + Sync {
    /// Runs `f` with exclusive access to the protected value.
    ///
    /// Returns `None` if the lock could not be acquired within `timeout`;
    /// `f` is not called in that case.
    fn with<R>(&self, timeout: Duration, f: impl FnOnce(&mut T) -> R) -> Option<R>;
}

/// A binary wakeup signal.
///
/// Posting is safe from interrupt context and never blocks. The signal is
/// count-capped at one: posting while already pending is a no-op, and a
/// post with no waiter is simply consumed by the next [`wait`](Self::wait).
/// Single-consumer semantics — see the interface documentation.
pub trait Signal: Send + Sync {
    /// Marks the signal pending and wakes a waiter if there is one.
    fn post(&self);

    /// Waits until the signal is pending, consuming it.
    ///
    /// Returns `false` on expiry of `timeout`. A zero timeout polls.
    fn wait(&self, timeout: Duration) -> bool;
}

/// The scheduler primitive set.
///
/// The factory methods return `None` when the scheduler cannot allocate
/// the object, which initialization reports as a resource failure.
pub trait Rtos {
    type Mutex<T: Send>: TimedMutex<T>;
    type Signal: Signal;

    fn new_mutex<T: Send>(&self, value: T) -> Option<Self::Mutex<T>>;

    fn new_signal(&self) -> Option<Self::Signal>;

    /// The current monotonic tick.
    fn now(&self) -> Instant;
}

#[cfg(feature = "std")]
mod host {
    use std::sync::{Condvar, Mutex, TryLockError};
    use std::time::Instant as SysInstant;

    use super::*;

    /// Tick period of the host lock's acquire loop.
    const POLL_TICK: Duration = Duration::from_micros(100);

    /// Host scheduler shim backed by `std`, for tests and bench rigs.
    #[derive(Debug)]
    pub struct StdRtos {
        epoch: SysInstant,
    }

    impl StdRtos {
        pub fn new() -> Self {
            Self {
                epoch: SysInstant::now(),
            }
        }
    }

    impl Default for StdRtos {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Rtos for StdRtos {
        type Mutex<T: Send> = StdMutex<T>;
        type Signal = StdSignal;

        fn new_mutex<T: Send>(&self, value: T) -> Option<StdMutex<T>> {
            Some(StdMutex {
                inner: Mutex::new(value),
            })
        }

        fn new_signal(&self) -> Option<StdSignal> {
            Some(StdSignal {
                pending: Mutex::new(false),
                notify: Condvar::new(),
            })
        }

        fn now(&self) -> Instant {
            Instant::from_millis(self.epoch.elapsed().as_millis() as u64)
        }
    }

    /// [`TimedMutex`] over a `std` mutex.
    ///
    /// `std` locks have no acquire timeout, so the bound is implemented as
    /// a tick-polled `try_lock` loop, much like a tick-based RTOS wait.
    #[derive(Debug)]
    pub struct StdMutex<T> {
        inner: Mutex<T>,
    }

    impl<T: Send> TimedMutex<T> for StdMutex<T> {
        fn with<R>(&self, timeout: Duration, f: impl FnOnce(&mut T) -> R) -> Option<R> {
            let deadline = SysInstant::now() + timeout;
            loop {
                match self.inner.try_lock() {
                    Ok(mut value) => return Some(f(&mut value)),
                    Err(TryLockError::Poisoned(poisoned)) => {
                        return Some(f(&mut poisoned.into_inner()))
                    }
                    Err(TryLockError::WouldBlock) => {}
                }
                if SysInstant::now() >= deadline {
                    return None;
                }
                std::thread::sleep(POLL_TICK);
            }
        }
    }

    /// [`Signal`] over a flag and condition variable.
    #[derive(Debug)]
    pub struct StdSignal {
        pending: Mutex<bool>,
        notify: Condvar,
    }

    impl Signal for StdSignal {
        fn post(&self) {
            let mut pending = self
                .pending
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            *pending = true;
            self.notify.notify_one();
        }

        fn wait(&self, timeout: Duration) -> bool {
            let pending = self
                .pending
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let (mut pending, _) = self
                .notify
                .wait_timeout_while(pending, timeout, |pending| !*pending)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if *pending {
                *pending = false;
                true
            } else {
                false
            }
        }
    }
}

#[cfg(feature = "std")]
pub use host::{StdMutex, StdRtos, StdSignal};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_is_binary() {
        let rtos = StdRtos::new();
        let signal = rtos.new_signal().unwrap();

        signal.post();
        signal.post();
        assert!(signal.wait(Duration::ZERO));
        // the second post collapsed into the first
        assert!(!signal.wait(Duration::ZERO));
    }

    #[test]
    fn signal_wait_zero_is_prompt() {
        let rtos = StdRtos::new();
        let signal = rtos.new_signal().unwrap();

        let start = std::time::Instant::now();
        assert!(!signal.wait(Duration::ZERO));
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn mutex_contention_times_out() {
        let rtos = StdRtos::new();
        let mutex = std::sync::Arc::new(rtos.new_mutex(0u32).unwrap());

        std::thread::scope(|scope| {
            let held = mutex.clone();
            let (tx, rx) = std::sync::mpsc::channel();
            scope.spawn(move || {
                held.with(Duration::from_secs(1), |_| {
                    tx.send(()).unwrap();
                    std::thread::sleep(Duration::from_millis(100));
                });
            });

            rx.recv().unwrap();
            assert_eq!(mutex.with(Duration::from_millis(5), |value| *value), None);
        });

        // uncontended again
        assert_eq!(mutex.with(Duration::from_millis(5), |value| *value), Some(0));
    }

    #[test]
    fn now_is_monotonic() {
        let rtos = StdRtos::new();
        let first = rtos.now();
        std::thread::sleep(Duration::from_millis(5));
        assert!(rtos.now() >= first);
    }
}
