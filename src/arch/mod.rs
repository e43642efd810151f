//! Architecture-specific context switching.
//!
//! Everything the scheduler knows about the CPU lives behind two entry
//! points: [`Frame`], the saved register file of a suspended coroutine, and
//! [`switch`], which persists the caller's registers into one frame and
//! installs another. `Frame::init` primes a fresh stack so that the first
//! switch into it enters a trampoline function with a chosen argument.
//!
//! The switch routine is a naked function containing a single assembly
//! block. A regular function would only be correct if the compiler emitted
//! no prologue touching the saved registers, which is why runtimes of this
//! shape traditionally refuse to build without optimization; a naked
//! function has no compiler-generated prologue or epilogue at any
//! optimization level, so the hazard does not exist here.

#[cfg(target_arch = "x86_64")]
mod x86_64;
#[cfg(target_arch = "x86_64")]
pub use x86_64::{switch, Frame};

#[cfg(target_arch = "aarch64")]
mod aarch64;
#[cfg(target_arch = "aarch64")]
pub use aarch64::{switch, Frame};

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
compile_error!("coropool only supports x86_64 (System V) and aarch64 targets");
