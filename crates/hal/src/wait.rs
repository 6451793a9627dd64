//! Sleep/wakeup primitives for interrupt-driven waits.
//! Behaviors: [W1]-[W4] epoch-based wait queue
//!
//! A waiter samples [`WaitQueue::epoch`] while it still holds the lock that
//! guards its condition, drops the lock, then calls [`WaitQueue::wait`] with
//! the sampled value. A wakeup that lands between the unlock and the sleep has
//! already moved the epoch on, so `wait` returns at once instead of missing it.

use core::marker::PhantomData;
use core::sync::atomic::{AtomicU32, Ordering};
use core::time::Duration;
use spin::relax::{RelaxStrategy, Spin};

/// Monotonic time source.
pub trait Clock: Send + Sync {
    fn now(&self) -> Duration;
}

/// Why a [`WaitQueue::wait`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitResult {
    /// The epoch moved past the observed value.
    Woken,
    /// The deadline passed first.
    TimedOut,
}

pub trait WaitQueue: Send + Sync {
    /// Current wakeup generation.
    fn epoch(&self) -> u32;

    /// [W1] Returns immediately if the epoch already differs from `observed`,
    /// [W2] otherwise blocks until it does or `deadline` (on [`Self::now`]'s
    /// timeline) passes.
    fn wait(&self, observed: u32, deadline: Option<Duration>) -> WaitResult;

    /// [W3] Bumps the epoch and releases every waiter.
    fn wake_all(&self);

    fn now(&self) -> Duration;
}

/// Busy-polling wait queue for contexts without a scheduler.
pub struct SpinWaitQueue<C: Clock, R: RelaxStrategy = Spin> {
    epoch: AtomicU32,
    clock: C,
    relax: PhantomData<fn() -> R>,
}

impl<C: Clock, R: RelaxStrategy> SpinWaitQueue<C, R> {
    pub const fn new(clock: C) -> Self {
        Self {
            epoch: AtomicU32::new(0),
            clock,
            relax: PhantomData,
        }
    }
}

impl<C: Clock, R: RelaxStrategy> WaitQueue for SpinWaitQueue<C, R> {
    fn epoch(&self) -> u32 {
        self.epoch.load(Ordering::Acquire)
    }

    fn wait(&self, observed: u32, deadline: Option<Duration>) -> WaitResult {
        loop {
            if self.epoch.load(Ordering::Acquire) != observed {
                return WaitResult::Woken;
            }
            if deadline.is_some_and(|d| self.clock.now() >= d) {
                return WaitResult::TimedOut;
            }
            R::relax();
        }
    }

    fn wake_all(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
    }

    fn now(&self) -> Duration {
        self.clock.now()
    }
}

/// Condvar-backed wait queue for hosted builds.
#[cfg(any(test, feature = "std"))]
pub struct StdWaitQueue {
    epoch: std::sync::Mutex<u32>,
    cond: std::sync::Condvar,
    origin: std::time::Instant,
}

#[cfg(any(test, feature = "std"))]
impl Default for StdWaitQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "std"))]
impl StdWaitQueue {
    pub fn new() -> Self {
        Self {
            epoch: std::sync::Mutex::new(0),
            cond: std::sync::Condvar::new(),
            origin: std::time::Instant::now(),
        }
    }

    fn guard(&self) -> std::sync::MutexGuard<'_, u32> {
        self.epoch
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(any(test, feature = "std"))]
impl WaitQueue for StdWaitQueue {
    fn epoch(&self) -> u32 {
        *self.guard()
    }

    fn wait(&self, observed: u32, deadline: Option<Duration>) -> WaitResult {
        let mut epoch = self.guard();
        while *epoch == observed {
            match deadline {
                None => {
                    epoch = self
                        .cond
                        .wait(epoch)
                        .unwrap_or_else(std::sync::PoisonError::into_inner);
                }
                Some(deadline) => {
                    let now = self.now();
                    if now >= deadline {
                        return WaitResult::TimedOut;
                    }
                    epoch = self
                        .cond
                        .wait_timeout(epoch, deadline - now)
                        .unwrap_or_else(std::sync::PoisonError::into_inner)
                        .0;
                }
            }
        }
        WaitResult::Woken
    }

    fn wake_all(&self) {
        let mut epoch = self.guard();
        *epoch = epoch.wrapping_add(1);
        self.cond.notify_all();
    }

    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
