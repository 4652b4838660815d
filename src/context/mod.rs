//! Architecture-specific context switch primitive.
//!
//! Each backend exports `task_swap` and `seed_stack` with the same
//! contract (§4.D): `task_swap` saves the current architecture's
//! callee-saved registers onto the active stack, records the active stack
//! pointer through `prev_sp_slot`, loads `new_sp` into the stack pointer,
//! pops the callee-saved set back, and returns — which means it returns
//! into whatever code last called `task_swap` on behalf of the task now
//! resuming. `seed_stack` prepares a fresh stack so the first `task_swap`
//! into it instead "returns" into a trampoline.
//!
//! Both functions must never be inlined (the compiler must not reorder
//! register saves around the stack pointer swap), hence `#[naked]` /
//! `#[unsafe(naked)]` bodies wherever the target supports it.

cfg_if::cfg_if! {
    if #[cfg(target_arch = "x86_64")] {
        mod x86_64;
        pub use self::x86_64::{seed_stack, task_swap};
    } else if #[cfg(any(target_arch = "arm", target_arch = "thumbv7em"))] {
        mod arm;
        pub use self::arm::{seed_stack, task_swap};
    } else if #[cfg(any(target_arch = "riscv32", target_arch = "riscv64"))] {
        mod riscv;
        pub use self::riscv::{seed_stack, task_swap};
    } else {
        mod generic;
        pub use self::generic::{seed_stack, task_swap};
    }
}

/// A task entry point reachable from the seeded stack's return slot. Must
/// never return (the trampoline stops the task and swaps away instead).
pub type TrampolineFn = extern "C" fn() -> !;
