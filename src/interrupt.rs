//! Scoped interrupt-enable state, restored on every exit path.
//!
//! Mirrors the source's `IntState`/`IRQState`: a guard snapshots the
//! current interrupt-enable flag and restores it on drop, regardless of
//! whether the scope exits normally, via a wait-induced context switch, or
//! a panic unwind (not applicable in `no_std` abort-on-panic builds, but
//! the `Drop` impl makes the intent explicit either way).

use crate::host::Host;
use core::marker::PhantomData;

/// RAII interrupt-enable guard. Two construction modes:
/// - [`IntState::set`]: snapshot the current flag, then set a new one.
/// - [`IntState::snapshot`]: snapshot only; the caller later calls
///   [`IntState::enable`] or [`IntState::disable`] explicitly.
///
/// Calling `enable`/`disable` more than once on a guard built via
/// `snapshot` is a caller bug matching the source's "fails fatally if a
/// single scope attempts to snapshot twice": the second call panics.
pub struct IntState<H: Host> {
    saved: bool,
    armed: bool,
    _host: PhantomData<H>,
}

impl<H: Host> IntState<H> {
    /// Snapshots the current interrupt-enable flag and immediately sets it
    /// to `enabled`.
    pub fn set(enabled: bool) -> Self {
        let saved = H::set_interrupts_enabled(enabled);
        Self {
            saved,
            armed: true,
            _host: PhantomData,
        }
    }

    /// Snapshots the current interrupt-enable flag without changing it.
    /// The caller must follow up with exactly one [`Self::enable`] or
    /// [`Self::disable`] call before the guard drops.
    pub fn snapshot() -> Self {
        Self {
            saved: H::interrupts_enabled(),
            armed: false,
            _host: PhantomData,
        }
    }

    /// Applies the snapshot-and-set step deferred by [`Self::snapshot`].
    pub fn enable(&mut self) {
        self.apply(true);
    }

    /// Applies the snapshot-and-set step deferred by [`Self::snapshot`].
    pub fn disable(&mut self) {
        self.apply(false);
    }

    fn apply(&mut self, enabled: bool) {
        if self.armed {
            panic!("Error: IntState: scope already snapshotted");
        }
        H::set_interrupts_enabled(enabled);
        self.armed = true;
    }
}

impl<H: Host> Drop for IntState<H> {
    fn drop(&mut self) {
        H::set_interrupts_enabled(self.saved);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::test_host::TestHost;

    #[test]
    #[sequential_test::sequential]
    fn restores_on_drop() {
        TestHost::reset(true);
        {
            let _g = IntState::<TestHost>::set(false);
            assert!(!TestHost::interrupts_enabled());
        }
        assert!(TestHost::interrupts_enabled());
    }

    #[test]
    #[sequential_test::sequential]
    #[should_panic(expected = "Error: IntState: scope already snapshotted")]
    fn double_snapshot_is_fatal() {
        TestHost::reset(true);
        let mut g = IntState::<TestHost>::snapshot();
        g.disable();
        g.enable();
    }
}
