//! Scheduler core: run loop, task selection, waiting primitives, sleep,
//! yield, start/stop/abort, and the tick/deadline sweep.
//!
//! One `Scheduler<H, N, GUARD>` instance owns the whole task table; it is
//! meant to be placed in a single process-wide `static mut`, the pattern
//! cooperative kernels for constrained targets converge on.

use core::marker::PhantomData;
use core::sync::atomic::{AtomicUsize, Ordering};

use crate::context;
use crate::host::Host;
use crate::interrupt::IntState;
use crate::stack_guard;
use crate::task::{RunnableFn, TaskFn, TaskId, Tcb};
use crate::ticks::{self, Deadline, IsrState, Ticks};

/// The cooperative scheduler. `N` is the compile-time task count, `GUARD`
/// the number of pointer-sized stack-guard words (`0` disables guards).
pub struct Scheduler<H: Host, const N: usize, const GUARD: usize> {
    tasks: [Tcb; N],
    current: usize,
    isr: IsrState,
    int_stack_guard: Option<&'static mut [usize]>,
    _host: PhantomData<H>,
}

impl<H: Host, const N: usize, const GUARD: usize> Scheduler<H, N, GUARD> {
    /// Builds a scheduler over `stacks`, one caller-provided buffer per
    /// task in declaration order. `int_stack_guard`, when present, is
    /// scanned alongside every task's own guard before each context
    /// switch.
    pub const fn new(
        mut stacks: [&'static mut [u8]; N],
        int_stack_guard: Option<&'static mut [usize]>,
    ) -> Self {
        let mut tasks = [Tcb::empty(); N];
        let mut i = 0;
        while i < N {
            tasks[i].stack = stacks[i].as_mut_ptr();
            tasks[i].stack_len = stacks[i].len();
            i += 1;
        }
        Self {
            tasks,
            current: 0,
            isr: IsrState::new(),
            int_stack_guard,
            _host: PhantomData,
        }
    }

    fn registry() -> &'static AtomicUsize {
        static PTR: AtomicUsize = AtomicUsize::new(0);
        &PTR
    }

    fn register(&mut self) {
        Self::registry().store(self as *mut Self as usize, Ordering::SeqCst);
    }

    unsafe fn instance() -> &'static mut Self {
        let addr = Self::registry().load(Ordering::SeqCst);
        if addr == 0 {
            #[cfg(feature = "log")]
            log::error!("trampoline invoked before a Scheduler called run()");
            crate::error::fatal("Scheduler", "trampoline invoked before Run");
        }
        unsafe { &mut *(addr as *mut Self) }
    }

    fn stack_of(&mut self, index: usize) -> &mut [u8] {
        let t = &self.tasks[index];
        unsafe { core::slice::from_raw_parts_mut(t.stack, t.stack_len) }
    }

    fn check_guards(&mut self) {
        if GUARD > 0 {
            let idx = self.current;
            if !stack_guard::check(self.tasks[idx].guard(GUARD)) {
                #[cfg(feature = "log")]
                log::error!("stack guard tripped on task {}", idx);
                H::stack_overflow();
            }
        }
        if let Some(guard) = self.int_stack_guard.as_deref() {
            if !stack_guard::check(guard) {
                #[cfg(feature = "log")]
                log::error!("interrupt stack guard tripped");
                H::stack_overflow();
            }
        }
    }

    fn init_guards(&mut self) {
        if GUARD > 0 {
            for t in self.tasks.iter_mut() {
                stack_guard::init(t.guard_mut(GUARD));
            }
        }
        if let Some(guard) = self.int_stack_guard.as_deref_mut() {
            stack_guard::init(guard);
        }
    }

    /// Swaps from the current task to `new_index`, checking stack guards
    /// first. Returns once someone swaps back into the outgoing task.
    fn switch_to(&mut self, new_index: usize) {
        self.check_guards();
        let prev = self.current;
        self.current = new_index;
        let prev_slot: *mut *mut u8 = &mut self.tasks[prev].sp;
        let new_sp = self.tasks[new_index].sp;
        unsafe {
            context::task_swap(prev_slot, new_sp);
        }
    }

    /// Starting from `current + 1`, finds the next runnable task over one
    /// full cycle. `None` means no task is currently runnable.
    fn select_next(&self) -> Option<usize> {
        for step in 1..=N {
            let idx = (self.current + step) % N;
            if self.tasks[idx].runnable.evaluate(self.tasks[idx].ctx) {
                return Some(idx);
            }
        }
        None
    }

    /// Repeatedly selects and switches to the next runnable task, sleeping
    /// the host between failed sweeps, until one is found.
    fn reschedule(&mut self) {
        loop {
            if let Some(idx) = self.select_next() {
                self.switch_to(idx);
                return;
            }
            H::sleep();
        }
    }

    extern "C" fn trampoline() -> ! {
        unsafe {
            let this = Self::instance();
            let idx = this.current;
            #[cfg(feature = "log")]
            log::trace!("task {} entered", idx);
            H::set_interrupts_enabled(true);
            if let Some(run) = this.tasks[idx].run {
                run();
            }
            this.tasks[idx].runnable = RunnableFn::AlwaysFalse;
            this.tasks[idx].wake_deadline = None;
            H::set_interrupts_enabled(false);
            #[cfg(feature = "log")]
            log::trace!("task {} returned, stopping", idx);
            this.reschedule();
        }
        loop {
            H::sleep();
        }
    }

    /// Scheduler entry point. Initializes stack guards and switches into
    /// task 0, which must already have been `Start`ed. Never returns.
    pub fn run(&mut self) -> ! {
        self.register();
        self.init_guards();
        self.current = 0;
        let mut discard: *mut u8 = core::ptr::null_mut();
        let first_sp = self.tasks[0].sp;
        unsafe {
            context::task_swap(&mut discard, first_sp);
        }
        loop {
            H::sleep();
        }
    }

    /// (Re)initializes task `T`: sets its entry point, marks it runnable,
    /// clears any pending deadline, and seeds its stack so the next switch
    /// into it enters the trampoline. `fn_override` replaces `T::RUN` when
    /// `Some`.
    pub fn start<T: TaskId>(&mut self, fn_override: Option<TaskFn>) {
        let entry = fn_override.unwrap_or(T::RUN);
        let idx = T::INDEX;
        #[cfg(feature = "log")]
        log::debug!("task {} started", idx);
        self.tasks[idx].run = Some(entry);
        self.tasks[idx].runnable = RunnableFn::AlwaysTrue;
        self.tasks[idx].wake_deadline = None;
        let stack = self.stack_of(idx);
        let sp = unsafe { context::seed_stack(stack, Self::trampoline) };
        self.tasks[idx].sp = sp;
    }

    fn stop_index(&mut self, idx: usize) {
        #[cfg(feature = "log")]
        log::debug!("task {} stopped", idx);
        self.tasks[idx].runnable = RunnableFn::AlwaysFalse;
        self.tasks[idx].wake_deadline = None;
    }

    /// Stops task `T`. Does not affect the current task even if `T` is
    /// current.
    pub fn stop<T: TaskId>(&mut self) {
        self.stop_index(T::INDEX);
    }

    /// Stops every index in `indices`.
    pub fn stop_many(&mut self, indices: &[usize]) {
        for &idx in indices {
            self.stop_index(idx);
        }
    }

    /// Stops task `T`; if `T` is the current task, immediately switches
    /// away (never returns in the calling path for that case).
    pub fn abort<T: TaskId>(&mut self) {
        self.abort_many(&[T::INDEX]);
    }

    /// Stops every index in `indices`; if the current task is among them,
    /// immediately switches away.
    pub fn abort_many(&mut self, indices: &[usize]) {
        let _guard = IntState::<H>::set(false);
        self.stop_many(indices);
        if indices.contains(&self.current) {
            #[cfg(feature = "log")]
            log::trace!("task {} aborted itself, rescheduling", self.current);
            self.reschedule();
        }
    }

    /// True iff task `T` is runnable or has a pending wake deadline.
    pub fn running<T: TaskId>(&self) -> bool {
        self.running_many(&[T::INDEX])
    }

    /// True iff any index in `indices` is runnable or has a pending wake
    /// deadline.
    pub fn running_many(&self, indices: &[usize]) -> bool {
        indices.iter().any(|&idx| {
            !self.tasks[idx].runnable.is_always_false() || self.tasks[idx].wake_deadline.is_some()
        })
    }

    /// True iff task `T` is the currently executing task.
    pub fn current_is<T: TaskId>(&self) -> bool {
        self.current == T::INDEX
    }

    /// True iff the currently executing task's index is in `indices`.
    pub fn current_is_any(&self, indices: &[usize]) -> bool {
        indices.contains(&self.current)
    }

    /// Disables interrupts, marks the current task runnable, and switches
    /// away. On a single-task system this round-trips immediately.
    pub fn yield_now(&mut self) {
        let _guard = IntState::<H>::set(false);
        let idx = self.current;
        self.tasks[idx].runnable = RunnableFn::AlwaysTrue;
        self.reschedule();
    }

    /// Blocks until `cond` is true. `cond` must be pure w.r.t. scheduler
    /// state: it must not make other tasks runnable.
    pub fn wait(&mut self, cond: RunnableFn) {
        let _guard = IntState::<H>::set(false);
        let idx = self.current;
        if cond.evaluate(self.tasks[idx].ctx) {
            return;
        }
        self.tasks[idx].runnable = cond;
        self.reschedule();
    }

    /// Blocks until `cond` is true or `ticks` elapse, whichever comes
    /// first. Returns `true` if `cond` was observed true, `false` on
    /// timeout.
    pub fn wait_ticks(&mut self, ticks: Ticks, cond: RunnableFn) -> bool {
        let _guard = IntState::<H>::set(false);
        let idx = self.current;
        if cond.evaluate(self.tasks[idx].ctx) {
            return true;
        }
        let deadline = ticks::deadline_for_ticks(self.isr.current_time(), ticks);
        self.install_deadline(idx, deadline, cond);
        self.reschedule();
        self.take_wait_result(idx)
    }

    /// As [`Self::wait_ticks`] but against an absolute deadline; if
    /// `deadline` is already past, returns `false` (timed out) without
    /// switching.
    pub fn wait_deadline(&mut self, deadline: Deadline, cond: RunnableFn) -> bool {
        let _guard = IntState::<H>::set(false);
        let idx = self.current;
        if ticks::is_past(deadline, self.isr.current_time()) {
            return false;
        }
        if cond.evaluate(self.tasks[idx].ctx) {
            return true;
        }
        self.install_deadline(idx, deadline, cond);
        self.reschedule();
        self.take_wait_result(idx)
    }

    fn install_deadline(&mut self, idx: usize, deadline: Deadline, cond: RunnableFn) {
        self.tasks[idx].runnable = cond;
        self.tasks[idx].wake_deadline = Some(deadline);
        self.isr.mark_dirty();
    }

    /// A timed-out wait is distinguished from a condition-satisfied wait
    /// by the final state of `wake_deadline`: the tick engine clears it
    /// only on the timeout path (where it also forces `runnable` to
    /// always-true); a condition-wake leaves it untouched until this call
    /// clears it here.
    fn take_wait_result(&mut self, idx: usize) -> bool {
        let timed_out = self.tasks[idx].wake_deadline.is_none();
        self.tasks[idx].wake_deadline = None;
        !timed_out
    }

    /// Equivalent to `wait_ticks(ticks, always-false)`.
    pub fn sleep(&mut self, ticks: Ticks) {
        self.wait_ticks(ticks, RunnableFn::AlwaysFalse);
    }

    /// Blocks the current task for `ticks` without relinquishing the CPU:
    /// installs a deadline and busy-polls the host sleep intrinsic until
    /// the tick engine clears it.
    pub fn delay(&mut self, ticks: Ticks) {
        let idx;
        let deadline;
        {
            let _guard = IntState::<H>::set(false);
            idx = self.current;
            deadline = ticks::deadline_for_ticks(self.isr.current_time(), ticks);
            self.tasks[idx].wake_deadline = Some(deadline);
            self.isr.mark_dirty();
        }
        loop {
            let done = {
                let _guard = IntState::<H>::set(false);
                self.tasks[idx].wake_deadline.is_none()
            };
            if done {
                return;
            }
            H::sleep();
        }
    }

    /// ISR hook: advances the tick counter by one and, when due, sweeps
    /// the task table for expired deadlines. Always returns `true`; a host
    /// that wants to skip a wake-up on an empty sweep can check
    /// [`Self::tick_required`] instead of branching on this return value.
    pub fn tick(&mut self) -> bool {
        let (now, sweep) = self.isr.advance();
        if sweep {
            let mut candidate: Option<Deadline> = None;
            for t in self.tasks.iter_mut() {
                if let Some(wd) = t.wake_deadline {
                    if wd == now {
                        t.wake_deadline = None;
                        t.runnable = RunnableFn::AlwaysTrue;
                    } else {
                        let better = match candidate {
                            None => true,
                            Some(c) => wd.wrapping_sub(now) < c.wrapping_sub(now),
                        };
                        if better {
                            candidate = Some(wd);
                        }
                    }
                }
            }
            self.isr.set_next_wake(candidate);
        }
        true
    }

    /// True iff a task is waiting on time, so the host may pause the tick
    /// source otherwise.
    pub fn tick_required(&self) -> bool {
        self.isr.tick_required()
    }

    pub fn current_time(&self) -> Ticks {
        self.isr.current_time()
    }

    /// Test-only hook: jumps the tick counter straight to `t`, so a wraparound
    /// case doesn't need billions of real `tick()` calls to reach.
    #[cfg(any(test, feature = "std-host"))]
    pub fn set_current_time_for_test(&mut self, t: Ticks) {
        self.isr.set_current_time(t);
    }

    /// Test-only hook: stomps the first word of the current task's stack
    /// guard, to exercise [`Self::check_guards`]'s overflow trip without a
    /// real stack overflow.
    #[cfg(any(test, feature = "std-host"))]
    pub fn corrupt_guard_for_test(&mut self) {
        if GUARD > 0 {
            let idx = self.current;
            if let Some(word) = self.tasks[idx].guard_mut(GUARD).first_mut() {
                *word = 0;
            }
        }
    }

    /// Reads the current task's opaque `ctx` word as `T`.
    pub fn ctx<T: Copy>(&self) -> T {
        debug_assert!(core::mem::size_of::<T>() <= core::mem::size_of::<usize>());
        let word = self.tasks[self.current].ctx;
        unsafe { core::ptr::read(&word as *const usize as *const T) }
    }

    /// Writes `value` into the current task's opaque `ctx` word.
    pub fn set_ctx<T: Copy>(&mut self, value: T) {
        debug_assert!(core::mem::size_of::<T>() <= core::mem::size_of::<usize>());
        let idx = self.current;
        self.tasks[idx].ctx = 0;
        unsafe {
            core::ptr::write(&mut self.tasks[idx].ctx as *mut usize as *mut T, value);
        }
    }
}
