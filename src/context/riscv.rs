//! RISC-V (riscv32/riscv64) context switch. Callee-saved: `ra`, `s0`-`s11`.
//! First and second arguments arrive in `a0`/`a1` per the RISC-V calling
//! convention.

use core::arch::naked_asm;

use super::TrampolineFn;

cfg_if::cfg_if! {
    if #[cfg(target_arch = "riscv64")] {
        const REG_BYTES: usize = 8;

        /// # Safety
        /// See [`super::x86_64::task_swap`]'s contract.
        #[unsafe(naked)]
        pub unsafe extern "C" fn task_swap(prev_sp_slot: *mut *mut u8, new_sp: *mut u8) {
            naked_asm!(
                "addi sp, sp, -104",
                "sd ra,   0(sp)",
                "sd s0,   8(sp)",
                "sd s1,  16(sp)",
                "sd s2,  24(sp)",
                "sd s3,  32(sp)",
                "sd s4,  40(sp)",
                "sd s5,  48(sp)",
                "sd s6,  56(sp)",
                "sd s7,  64(sp)",
                "sd s8,  72(sp)",
                "sd s9,  80(sp)",
                "sd s10, 88(sp)",
                "sd s11, 96(sp)",
                "sd sp, 0(a0)",
                "mv sp, a1",
                "ld ra,   0(sp)",
                "ld s0,   8(sp)",
                "ld s1,  16(sp)",
                "ld s2,  24(sp)",
                "ld s3,  32(sp)",
                "ld s4,  40(sp)",
                "ld s5,  48(sp)",
                "ld s6,  56(sp)",
                "ld s7,  64(sp)",
                "ld s8,  72(sp)",
                "ld s9,  80(sp)",
                "ld s10, 88(sp)",
                "ld s11, 96(sp)",
                "addi sp, sp, 104",
                "ret",
            )
        }
    } else {
        const REG_BYTES: usize = 4;

        /// # Safety
        /// See [`super::x86_64::task_swap`]'s contract.
        #[unsafe(naked)]
        pub unsafe extern "C" fn task_swap(prev_sp_slot: *mut *mut u8, new_sp: *mut u8) {
            naked_asm!(
                "addi sp, sp, -52",
                "sw ra,   0(sp)",
                "sw s0,   4(sp)",
                "sw s1,   8(sp)",
                "sw s2,  12(sp)",
                "sw s3,  16(sp)",
                "sw s4,  20(sp)",
                "sw s5,  24(sp)",
                "sw s6,  28(sp)",
                "sw s7,  32(sp)",
                "sw s8,  36(sp)",
                "sw s9,  40(sp)",
                "sw s10, 44(sp)",
                "sw s11, 48(sp)",
                "sw sp, 0(a0)",
                "mv sp, a1",
                "lw ra,   0(sp)",
                "lw s0,   4(sp)",
                "lw s1,   8(sp)",
                "lw s2,  12(sp)",
                "lw s3,  16(sp)",
                "lw s4,  20(sp)",
                "lw s5,  24(sp)",
                "lw s6,  28(sp)",
                "lw s7,  32(sp)",
                "lw s8,  36(sp)",
                "lw s9,  40(sp)",
                "lw s10, 44(sp)",
                "lw s11, 48(sp)",
                "addi sp, sp, 52",
                "ret",
            )
        }
    }
}

/// `ra` plus `s0`-`s11`.
const SAVED_REGS: usize = 13;

/// # Safety
/// See [`super::x86_64::seed_stack`].
pub unsafe fn seed_stack(stack: &mut [u8], trampoline: TrampolineFn) -> *mut u8 {
    let top = stack.as_mut_ptr().add(stack.len()) as usize;
    let aligned = top & !0xF;
    let mut sp = aligned;

    for _ in 0..(SAVED_REGS - 1) {
        sp -= REG_BYTES;
        core::ptr::write(sp as *mut usize, 0);
    }

    // `ra` sits at offset 0, the lowest address in the frame, since
    // `task_swap`'s restore sequence loads it first via `ld ra, 0(sp)`.
    sp -= REG_BYTES;
    core::ptr::write(sp as *mut usize, trampoline as usize);

    sp as *mut u8
}
