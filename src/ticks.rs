//! Monotonic tick counter and wrap-safe deadline arithmetic.
//!
//! `Ticks` is the width-configurable unsigned counter type (`u32` by
//! default, `u64` with the `ticks64` feature). All comparisons against it
//! use the wrap-safe rule from the source scheduler: a deadline is "past"
//! iff `deadline - currentTime - 1` (mod 2^W) exceeds half the counter's
//! range.

use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};

cfg_if::cfg_if! {
    if #[cfg(feature = "ticks64")] {
        /// Absolute or relative tick count.
        pub type Ticks = u64;
    } else {
        /// Absolute or relative tick count.
        pub type Ticks = u32;
    }
}

/// An absolute tick value at which a sleeping task becomes runnable.
pub type Deadline = Ticks;

const TICKS_MAX: Ticks = Ticks::MAX;

/// Returns true iff `deadline` lies in the past relative to `now`, using
/// wrap-safe unsigned arithmetic. Undefined classification (by spec, a
/// caller bug) for deadlines outside `(now, now + TicksMax/2]` is not
/// checked here; callers are expected to install only in-window deadlines.
#[inline]
pub fn is_past(deadline: Deadline, now: Ticks) -> bool {
    let d = deadline.wrapping_sub(now).wrapping_sub(1);
    d > TICKS_MAX / 2
}

/// Forms the deadline `ticks` ticks from `now`, absorbing the fractional
/// time until the next tick edge the way the source scheduler does
/// (`currentTime + ticks + 1`).
#[inline]
pub fn deadline_for_ticks(now: Ticks, ticks: Ticks) -> Deadline {
    now.wrapping_add(ticks).wrapping_add(1)
}

/// ISR-shared scheduling state: the monotonic counter and the next pending
/// wake deadline. Mutated by `Tick()` from interrupt context and by
/// scheduler entries under `IntState`; `AtomicU64` gives it the defensive
/// hygiene the source's own `#warning TODO: these should be volatile no?`
/// asked for, at zero cost on every target this crate supports.
pub struct IsrState {
    current_time: AtomicU64,
    next_wake: AtomicU64,
    next_wake_set: AtomicBool,
    next_wake_dirty: AtomicBool,
}

/// Sentinel stored in `next_wake` when no deadline is pending. Combined
/// with `next_wake_set` so a real deadline of `0` is never mistaken for
/// "empty".
const NO_WAKE: u64 = 0;

impl IsrState {
    pub const fn new() -> Self {
        Self {
            current_time: AtomicU64::new(0),
            next_wake: AtomicU64::new(NO_WAKE),
            next_wake_set: AtomicBool::new(false),
            next_wake_dirty: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn current_time(&self) -> Ticks {
        self.current_time.load(Ordering::Relaxed) as Ticks
    }

    #[inline]
    pub(crate) fn set_current_time(&self, t: Ticks) {
        self.current_time.store(t as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn next_wake(&self) -> Option<Deadline> {
        if self.next_wake_set.load(Ordering::Relaxed) {
            Some(self.next_wake.load(Ordering::Relaxed) as Deadline)
        } else {
            None
        }
    }

    #[inline]
    pub fn set_next_wake(&self, deadline: Option<Deadline>) {
        match deadline {
            Some(d) => {
                self.next_wake.store(d as u64, Ordering::Relaxed);
                self.next_wake_set.store(true, Ordering::Relaxed);
            }
            None => {
                self.next_wake_set.store(false, Ordering::Relaxed);
            }
        }
    }

    /// Marks that a wait primitive installed or cleared a deadline, so the
    /// next `Tick` recomputes `next_wake` from scratch.
    #[inline]
    pub fn mark_dirty(&self) {
        self.next_wake_dirty.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn take_dirty(&self) -> bool {
        self.next_wake_dirty.swap(false, Ordering::Relaxed)
    }

    #[inline]
    pub fn tick_required(&self) -> bool {
        self.next_wake_set.load(Ordering::Relaxed) || self.next_wake_dirty.load(Ordering::Relaxed)
    }

    /// Advances `current_time` by one tick and reports whether the
    /// scheduler core should sweep TCBs for expired deadlines (dirty flag
    /// was set, or `next_wake` matches the new time). The actual sweep
    /// needs the task table, so it lives in
    /// [`crate::scheduler::Scheduler::tick`]; this just does the counter
    /// bookkeeping shared by every instantiation.
    #[inline]
    pub(crate) fn advance(&self) -> (Ticks, bool) {
        let now = self.current_time().wrapping_add(1);
        self.set_current_time(now);
        let due = self.next_wake() == Some(now);
        (now, self.take_dirty() || due)
    }
}

impl Default for IsrState {
    fn default() -> Self {
        Self::new()
    }
}
