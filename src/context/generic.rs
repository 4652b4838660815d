//! Fallback for architectures without a dedicated context-switch backend.
//! Mirrors the source's `#error Task: Unsupported architecture`: a missing
//! backend is a build-time failure, not a runtime one.

use super::TrampolineFn;

compile_error!("reveille: unsupported target architecture; add a context::arch backend");

pub unsafe extern "C" fn task_swap(_prev_sp_slot: *mut *mut u8, _new_sp: *mut u8) {
    unreachable!()
}

pub unsafe fn seed_stack(_stack: &mut [u8], _trampoline: TrampolineFn) -> *mut u8 {
    unreachable!()
}
