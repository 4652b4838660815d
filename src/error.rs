//! Fatal error paths. The scheduler has no runtime error codes — every
//! failure here is unrecoverable: a stack guard trip calls the host's
//! `stack_overflow` hook (which never returns), and every other
//! caller-contract violation is a `panic!` with an `"Error: <where>: ..."`
//! message.

/// Panics with the crate-wide `"Error: <context>: <message>"` convention.
#[inline]
#[track_caller]
pub fn fatal(context: &str, message: &str) -> ! {
    panic!("Error: {}: {}", context, message);
}
