#[cfg(all(test, feature = "std-host"))]
mod scheduler_tests {
    use reveille::host::test_host::TestHost;
    use reveille::scheduler::Scheduler;
    use reveille::task::RunnableFn;
    use reveille::define_tasks;
    use sequential_test::sequential;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::time::{Duration, Instant};

    const STACK_SIZE: usize = 32 * 1024;

    fn leak_stack() -> &'static mut [u8] {
        Box::leak(vec![0u8; STACK_SIZE].into_boxed_slice())
    }

    fn task_a_idle() {}
    fn task_b_idle() {}

    define_tasks! {
        TaskA = 0 => task_a_idle,
        TaskB = 1 => task_b_idle,
    }

    /// Polls `cond` until it's true or `timeout` elapses, returning whether
    /// it converged. Scheduler state itself is single-threaded; this only
    /// ever touches atomics set by task bodies running on the scheduler's
    /// own thread.
    fn wait_for(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < timeout {
            if cond() {
                return true;
            }
            std::thread::yield_now();
        }
        cond()
    }

    static COUNTER_A: AtomicU32 = AtomicU32::new(0);
    static COUNTER_B: AtomicU32 = AtomicU32::new(0);

    fn round_robin_a() {
        let s = unsafe { SCHED.as_mut().unwrap() };
        for _ in 0..20 {
            COUNTER_A.fetch_add(1, Ordering::SeqCst);
            s.yield_now();
        }
    }

    fn round_robin_b() {
        let s = unsafe { SCHED.as_mut().unwrap() };
        for _ in 0..20 {
            COUNTER_B.fetch_add(1, Ordering::SeqCst);
            s.yield_now();
        }
    }

    type TestScheduler = Scheduler<TestHost, 2, 0>;
    static mut SCHED: Option<TestScheduler> = None;

    unsafe fn spawn_scheduler(run_a: reveille::task::TaskFn, run_b: reveille::task::TaskFn) {
        SCHED = Some(Scheduler::new([leak_stack(), leak_stack()], None));
        let s = SCHED.as_mut().unwrap();
        s.start::<TaskA>(Some(run_a));
        s.start::<TaskB>(Some(run_b));
        std::thread::spawn(|| {
            let s = unsafe { SCHED.as_mut().unwrap() };
            s.run()
        });
    }

    #[test]
    #[sequential]
    fn round_robin_shares_cpu_fairly() {
        TestHost::reset(true);
        COUNTER_A.store(0, Ordering::SeqCst);
        COUNTER_B.store(0, Ordering::SeqCst);
        unsafe { spawn_scheduler(round_robin_a, round_robin_b) };

        let converged = wait_for(Duration::from_secs(2), || {
            COUNTER_A.load(Ordering::SeqCst) == 20 && COUNTER_B.load(Ordering::SeqCst) == 20
        });
        assert!(converged, "both tasks should finish their 20 iterations");
        assert_eq!(COUNTER_A.load(Ordering::SeqCst), 20);
        assert_eq!(COUNTER_B.load(Ordering::SeqCst), 20);
    }

    static SLEEP_START: AtomicU32 = AtomicU32::new(0);
    static SLEEP_END: AtomicU32 = AtomicU32::new(0);
    static SLEEP_DONE: AtomicBool = AtomicBool::new(false);

    fn sleeper_main() {
        let s = unsafe { SCHED.as_mut().unwrap() };
        SLEEP_START.store(s.current_time(), Ordering::SeqCst);
        s.sleep(5);
        SLEEP_END.store(s.current_time(), Ordering::SeqCst);
        SLEEP_DONE.store(true, Ordering::SeqCst);
    }

    fn ticker_main() {
        let s = unsafe { SCHED.as_mut().unwrap() };
        for _ in 0..200 {
            s.tick();
            s.yield_now();
            if SLEEP_DONE.load(Ordering::SeqCst) {
                break;
            }
        }
    }

    #[test]
    #[sequential]
    fn sleep_returns_no_earlier_than_requested_ticks() {
        TestHost::reset(true);
        SLEEP_START.store(0, Ordering::SeqCst);
        SLEEP_END.store(0, Ordering::SeqCst);
        SLEEP_DONE.store(false, Ordering::SeqCst);
        unsafe { spawn_scheduler(sleeper_main, ticker_main) };

        let converged = wait_for(Duration::from_secs(2), || SLEEP_DONE.load(Ordering::SeqCst));
        assert!(converged, "sleeper should wake up once the ticker advances time");
        let elapsed = SLEEP_END
            .load(Ordering::SeqCst)
            .wrapping_sub(SLEEP_START.load(Ordering::SeqCst));
        assert!(elapsed >= 5, "elapsed={elapsed}, expected at least 5 ticks");
    }

    static WAIT_FLAG: AtomicBool = AtomicBool::new(false);
    static WAIT_RESULT: AtomicBool = AtomicBool::new(false);
    static WAIT_DONE: AtomicBool = AtomicBool::new(false);

    fn wait_flag_cond(_ctx: usize) -> bool {
        WAIT_FLAG.load(Ordering::SeqCst)
    }

    fn waiter_on_flag_main() {
        let s = unsafe { SCHED.as_mut().unwrap() };
        let ok = s.wait_ticks(1_000_000, RunnableFn::Cond(wait_flag_cond));
        WAIT_RESULT.store(ok, Ordering::SeqCst);
        WAIT_DONE.store(true, Ordering::SeqCst);
    }

    fn flag_setter_main() {
        let s = unsafe { SCHED.as_mut().unwrap() };
        WAIT_FLAG.store(true, Ordering::SeqCst);
        for _ in 0..10 {
            s.yield_now();
            if WAIT_DONE.load(Ordering::SeqCst) {
                break;
            }
        }
    }

    #[test]
    #[sequential]
    fn wait_wakes_on_condition_before_deadline() {
        TestHost::reset(true);
        WAIT_FLAG.store(false, Ordering::SeqCst);
        WAIT_RESULT.store(false, Ordering::SeqCst);
        WAIT_DONE.store(false, Ordering::SeqCst);
        unsafe { spawn_scheduler(waiter_on_flag_main, flag_setter_main) };

        let converged = wait_for(Duration::from_secs(2), || WAIT_DONE.load(Ordering::SeqCst));
        assert!(converged, "waiter should observe the condition becoming true");
        assert!(WAIT_RESULT.load(Ordering::SeqCst));
    }

    static TIMEOUT_RESULT: AtomicBool = AtomicBool::new(true);
    static TIMEOUT_DONE: AtomicBool = AtomicBool::new(false);

    fn never_cond(_ctx: usize) -> bool {
        false
    }

    fn waiter_timeout_main() {
        let s = unsafe { SCHED.as_mut().unwrap() };
        let ok = s.wait_ticks(5, RunnableFn::Cond(never_cond));
        TIMEOUT_RESULT.store(ok, Ordering::SeqCst);
        TIMEOUT_DONE.store(true, Ordering::SeqCst);
    }

    fn timeout_ticker_main() {
        let s = unsafe { SCHED.as_mut().unwrap() };
        for _ in 0..50 {
            s.tick();
            s.yield_now();
            if TIMEOUT_DONE.load(Ordering::SeqCst) {
                break;
            }
        }
    }

    #[test]
    #[sequential]
    fn wait_times_out_when_condition_never_holds() {
        TestHost::reset(true);
        TIMEOUT_RESULT.store(true, Ordering::SeqCst);
        TIMEOUT_DONE.store(false, Ordering::SeqCst);
        unsafe { spawn_scheduler(waiter_timeout_main, timeout_ticker_main) };

        let converged = wait_for(Duration::from_secs(2), || TIMEOUT_DONE.load(Ordering::SeqCst));
        assert!(converged, "waiter should give up once its deadline elapses");
        assert!(!TIMEOUT_RESULT.load(Ordering::SeqCst));
    }

    #[test]
    fn stop_clears_runnable_and_deadline() {
        let mut sched: TestScheduler = Scheduler::new([leak_stack(), leak_stack()], None);
        sched.start::<TaskA>(None);
        sched.start::<TaskB>(None);
        assert!(sched.running::<TaskA>());

        sched.stop::<TaskA>();
        assert!(!sched.running::<TaskA>());
    }

    static ASLEEP_OBSERVED_RUNNING: AtomicBool = AtomicBool::new(false);
    static ASLEEP_CHECK_DONE: AtomicBool = AtomicBool::new(false);

    fn long_sleeper_main() {
        let s = unsafe { SCHED.as_mut().unwrap() };
        s.sleep(50);
    }

    fn observer_main() {
        let s = unsafe { SCHED.as_mut().unwrap() };
        ASLEEP_OBSERVED_RUNNING.store(s.running::<TaskA>(), Ordering::SeqCst);
        ASLEEP_CHECK_DONE.store(true, Ordering::SeqCst);
    }

    #[test]
    #[sequential]
    fn sleeping_task_reports_running() {
        TestHost::reset(true);
        ASLEEP_OBSERVED_RUNNING.store(false, Ordering::SeqCst);
        ASLEEP_CHECK_DONE.store(false, Ordering::SeqCst);
        unsafe { spawn_scheduler(long_sleeper_main, observer_main) };

        let converged = wait_for(Duration::from_secs(2), || {
            ASLEEP_CHECK_DONE.load(Ordering::SeqCst)
        });
        assert!(converged, "observer task never ran");
        assert!(
            ASLEEP_OBSERVED_RUNNING.load(Ordering::SeqCst),
            "a task blocked on a wake deadline must still report as running"
        );
    }

    type GuardedScheduler = Scheduler<TestHost, 2, 4>;
    static mut GUARDED_SCHED: Option<GuardedScheduler> = None;

    fn guarded_a() {
        let s = unsafe { GUARDED_SCHED.as_mut().unwrap() };
        for _ in 0..10 {
            s.yield_now();
        }
    }

    fn guarded_b() {
        let s = unsafe { GUARDED_SCHED.as_mut().unwrap() };
        for _ in 0..10 {
            s.yield_now();
        }
        GUARD_PASS_DONE.store(true, Ordering::SeqCst);
    }

    static GUARD_PASS_DONE: AtomicBool = AtomicBool::new(false);

    #[test]
    #[sequential]
    fn stack_guards_enabled_do_not_false_positive() {
        TestHost::reset(true);
        GUARD_PASS_DONE.store(false, Ordering::SeqCst);
        unsafe {
            GUARDED_SCHED = Some(Scheduler::new([leak_stack(), leak_stack()], None));
            let s = GUARDED_SCHED.as_mut().unwrap();
            s.start::<TaskA>(Some(guarded_a));
            s.start::<TaskB>(Some(guarded_b));
            std::thread::spawn(|| unsafe { GUARDED_SCHED.as_mut().unwrap().run() });
        }

        let converged = wait_for(Duration::from_secs(2), || {
            GUARD_PASS_DONE.load(Ordering::SeqCst)
        });
        assert!(
            converged,
            "well-behaved tasks must not trip stack guards and must run to completion"
        );
    }

    static ABORT_RESULT: AtomicBool = AtomicBool::new(true);
    static ABORT_AFTER_REACHED: AtomicBool = AtomicBool::new(false);
    static ABORT_DONE: AtomicBool = AtomicBool::new(false);

    fn self_aborting_main() {
        let s = unsafe { SCHED.as_mut().unwrap() };
        s.abort::<TaskA>();
        ABORT_AFTER_REACHED.store(true, Ordering::SeqCst);
    }

    fn abort_observer_main() {
        let s = unsafe { SCHED.as_mut().unwrap() };
        ABORT_RESULT.store(s.running::<TaskA>(), Ordering::SeqCst);
        ABORT_DONE.store(true, Ordering::SeqCst);
    }

    #[test]
    #[sequential]
    fn abort_current_task_switches_away_without_returning() {
        TestHost::reset(true);
        ABORT_RESULT.store(true, Ordering::SeqCst);
        ABORT_AFTER_REACHED.store(false, Ordering::SeqCst);
        ABORT_DONE.store(false, Ordering::SeqCst);
        unsafe { spawn_scheduler(self_aborting_main, abort_observer_main) };

        let converged = wait_for(Duration::from_secs(2), || ABORT_DONE.load(Ordering::SeqCst));
        assert!(converged, "observer task never ran after the abort");
        assert!(!ABORT_RESULT.load(Ordering::SeqCst));
        assert!(
            !ABORT_AFTER_REACHED.load(Ordering::SeqCst),
            "code after Abort::<Self>() must never execute"
        );
    }

    static WRAP_START: AtomicU32 = AtomicU32::new(0);
    static WRAP_END: AtomicU32 = AtomicU32::new(0);
    static WRAP_DONE: AtomicBool = AtomicBool::new(false);

    fn wrap_sleeper_main() {
        let s = unsafe { SCHED.as_mut().unwrap() };
        s.set_current_time_for_test(reveille::ticks::Ticks::MAX - 2);
        WRAP_START.store(s.current_time(), Ordering::SeqCst);
        s.sleep(5);
        WRAP_END.store(s.current_time(), Ordering::SeqCst);
        WRAP_DONE.store(true, Ordering::SeqCst);
    }

    fn wrap_ticker_main() {
        let s = unsafe { SCHED.as_mut().unwrap() };
        for _ in 0..200 {
            s.tick();
            s.yield_now();
            if WRAP_DONE.load(Ordering::SeqCst) {
                break;
            }
        }
    }

    #[test]
    #[sequential]
    fn sleep_deadline_fires_across_tick_counter_wraparound() {
        TestHost::reset(true);
        WRAP_START.store(0, Ordering::SeqCst);
        WRAP_END.store(0, Ordering::SeqCst);
        WRAP_DONE.store(false, Ordering::SeqCst);
        unsafe { spawn_scheduler(wrap_sleeper_main, wrap_ticker_main) };

        let converged = wait_for(Duration::from_secs(2), || WRAP_DONE.load(Ordering::SeqCst));
        assert!(converged, "sleeper should wake up after the counter wraps through zero");
        let elapsed = WRAP_END.load(Ordering::SeqCst).wrapping_sub(WRAP_START.load(Ordering::SeqCst));
        assert!(elapsed >= 5, "elapsed={elapsed}, expected at least 5 ticks across the wrap");
    }

    static GUARD_TRIP_OBSERVED: AtomicBool = AtomicBool::new(false);

    fn guard_corrupting_a() {
        let s = unsafe { GUARDED_SCHED.as_mut().unwrap() };
        s.yield_now();
        s.corrupt_guard_for_test();
        s.yield_now();
    }

    fn guard_corrupting_b() {
        let s = unsafe { GUARDED_SCHED.as_mut().unwrap() };
        for _ in 0..10 {
            s.yield_now();
        }
        GUARD_TRIP_OBSERVED.store(true, Ordering::SeqCst);
    }

    #[test]
    #[sequential]
    fn corrupted_stack_guard_trips_stack_overflow_hook() {
        TestHost::reset(true);
        GUARD_TRIP_OBSERVED.store(false, Ordering::SeqCst);
        let handle = unsafe {
            GUARDED_SCHED = Some(Scheduler::new([leak_stack(), leak_stack()], None));
            let s = GUARDED_SCHED.as_mut().unwrap();
            s.start::<TaskA>(Some(guard_corrupting_a));
            s.start::<TaskB>(Some(guard_corrupting_b));
            std::thread::spawn(|| unsafe { GUARDED_SCHED.as_mut().unwrap().run() })
        };

        let tripped = wait_for(Duration::from_secs(2), || handle.is_finished());
        assert!(
            tripped,
            "a corrupted stack guard must reach TestHost::stack_overflow and panic the scheduler thread"
        );
        assert!(
            !GUARD_TRIP_OBSERVED.load(Ordering::SeqCst),
            "TaskB must never finish its 10 iterations once the guard trip panics the scheduler thread"
        );
    }
}
