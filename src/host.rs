//! The primitives an embedder must supply for the scheduler to run.
//!
//! A real port implements [`Host`] against its own interrupt controller and
//! low-power intrinsic; [`test_host::TestHost`] is a do-nothing backend so
//! the crate builds and tests on a workstation. Expressing the port as a
//! trait (rather than a single hardwired set of free functions) lets one
//! process host more than one `Scheduler` instantiation, e.g. one per test,
//! without symbol clashes.

/// Host-provided primitives consumed only by scheduler code, never by task
/// bodies directly.
pub trait Host {
    /// Reads the current interrupt-enable flag.
    fn interrupts_enabled() -> bool;

    /// Atomically sets the interrupt-enable flag and returns the previous
    /// value.
    fn set_interrupts_enabled(enabled: bool) -> bool;

    /// CPU low-power intrinsic. Called with interrupts disabled; may
    /// briefly enable interrupts internally but must return with them
    /// disabled again.
    fn sleep();

    /// Fatal stack-overflow handler. Never returns.
    fn stack_overflow() -> !;
}

/// A host backend usable on `std` targets for development and testing. It
/// has no real interrupts to disable, so it tracks the flag in a static
/// and treats `sleep()` as a no-op yield to the OS scheduler.
#[cfg(any(test, feature = "std-host"))]
pub mod test_host {
    extern crate std;

    use super::Host;
    use core::sync::atomic::{AtomicBool, Ordering};

    static INTERRUPTS_ENABLED: AtomicBool = AtomicBool::new(true);

    pub struct TestHost;

    impl TestHost {
        /// Resets the shared interrupt flag. Tests that share this backend
        /// must run under `#[sequential_test::sequential]`.
        pub fn reset(enabled: bool) {
            INTERRUPTS_ENABLED.store(enabled, Ordering::SeqCst);
        }

        pub fn interrupts_enabled() -> bool {
            INTERRUPTS_ENABLED.load(Ordering::SeqCst)
        }
    }

    impl Host for TestHost {
        fn interrupts_enabled() -> bool {
            INTERRUPTS_ENABLED.load(Ordering::SeqCst)
        }

        fn set_interrupts_enabled(enabled: bool) -> bool {
            INTERRUPTS_ENABLED.swap(enabled, Ordering::SeqCst)
        }

        fn sleep() {
            std::thread::yield_now();
        }

        fn stack_overflow() -> ! {
            panic!("Error: TestHost: stack overflow");
        }
    }
}
