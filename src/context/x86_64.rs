//! x86-64 System V context switch: `rbp`, `rbx`, `r12`-`r15` are
//! callee-saved; everything else is caller-saved and need not be preserved
//! across the swap. This backend also runs on the host (Linux/macOS
//! x86-64), which is what makes this crate's scheduler tests real stack
//! switches rather than a mocked-out stand-in.

use core::arch::naked_asm;

use super::TrampolineFn;

/// Saves the outgoing task's callee-saved registers and stack pointer,
/// switches to `new_sp`, and restores the incoming task's registers.
///
/// # Safety
/// `prev_sp_slot` must point to a valid, writable `*mut u8` slot. `new_sp`
/// must be a stack pointer previously produced by [`seed_stack`] or
/// previously saved into a TCB's `sp` field by a prior `task_swap`.
#[unsafe(naked)]
pub unsafe extern "C" fn task_swap(prev_sp_slot: *mut *mut u8, new_sp: *mut u8) {
    naked_asm!(
        "push rbp",
        "push rbx",
        "push r12",
        "push r13",
        "push r14",
        "push r15",
        "mov [rdi], rsp",
        "mov rsp, rsi",
        "pop r15",
        "pop r14",
        "pop r13",
        "pop r12",
        "pop rbx",
        "pop rbp",
        "ret",
    )
}

/// Number of callee-saved 8-byte registers pushed by [`task_swap`], plus
/// the return-address slot `seed_stack` must also reserve.
const SAVED_REGS: usize = 6;

/// Builds an initial stack image in `stack` so that the first `task_swap`
/// into the returned stack pointer "returns" into `trampoline` instead of
/// an earlier `task_swap` call, with six zeroed callee-saved register
/// slots below it matching what `task_swap`'s pop sequence expects.
///
/// The System V ABI requires `rsp % 16 == 8` on entry to a function reached
/// via `call`/`ret` (the return address itself accounts for 8 of the 16).
/// `task_swap`'s `ret` pops one 8-byte word off of 7 reserved words total
/// (6 registers + return address), an odd count, so seeding straight off a
/// 16-aligned top would leave `trampoline` entered on a 16-aligned `rsp`
/// instead. One extra 8-byte pad below the 16-aligned top corrects the
/// parity without the pad ever being read.
///
/// # Safety
/// `stack` must be valid for the lifetime of the task using it.
pub unsafe fn seed_stack(stack: &mut [u8], trampoline: TrampolineFn) -> *mut u8 {
    let top = stack.as_mut_ptr().add(stack.len()) as usize;
    let aligned = top & !0xF;
    let mut sp = (aligned - 8) as *mut u64;

    sp = sp.sub(1);
    core::ptr::write(sp, trampoline as usize as u64);

    for _ in 0..SAVED_REGS {
        sp = sp.sub(1);
        core::ptr::write(sp, 0);
    }

    sp as *mut u8
}
