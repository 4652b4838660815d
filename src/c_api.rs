//! `extern "C"` surface over a concrete `Scheduler` instantiation, for
//! embedders writing task bodies in C. Because `Scheduler` is generic over
//! its host backend and compile-time task count, this crate cannot export
//! fixed `#[no_mangle]` symbols itself (there is no single concrete type);
//! instead [`define_c_api!`] generates them once the embedder has chosen
//! one concrete instantiation to commit to.

/// Generates a `#[no_mangle] extern "C"` wrapper for each scheduler entry
/// point, calling through to `$sched`, an expression yielding `&'static
/// mut Scheduler<H, N, GUARD>`.
///
/// ```ignore
/// static mut SCHEDULER: Scheduler<MyHost, 4, 4> = Scheduler::new(STACKS, None);
/// define_c_api!(unsafe { &mut SCHEDULER });
/// ```
#[macro_export]
macro_rules! define_c_api {
    ($sched:expr) => {
        #[no_mangle]
        pub extern "C" fn reveille_run() -> ! {
            ($sched).run()
        }

        #[no_mangle]
        pub extern "C" fn reveille_yield() {
            ($sched).yield_now()
        }

        #[no_mangle]
        pub extern "C" fn reveille_sleep(ticks: $crate::ticks::Ticks) {
            ($sched).sleep(ticks)
        }

        #[no_mangle]
        pub extern "C" fn reveille_tick() -> bool {
            ($sched).tick()
        }

        #[no_mangle]
        pub extern "C" fn reveille_tick_required() -> bool {
            ($sched).tick_required()
        }

        #[no_mangle]
        pub extern "C" fn reveille_current_time() -> $crate::ticks::Ticks {
            ($sched).current_time()
        }
    };
}
