//! The trap, interrupt and time handling of a guest that runs directly on
//! top of a hypervisor without an operating system.
//!
//! Everything the runtime needs at run time lives in a [`Runtime`] value
//! that is built once during boot. On bare metal the [`entry`] module keeps
//! that value in a static so that the trap stubs and the panic handler can
//! reach it.

#![cfg_attr(not(test), no_std)]

pub mod dump;
#[cfg(target_os = "none")]
pub mod entry;
pub mod error;
pub mod exception;
pub mod hw;
pub mod interrupts;
pub mod logging;
#[cfg(all(target_os = "none", not(test), feature = "panic-handler"))]
mod panic;
mod runtime;
pub mod shared;
#[cfg(test)]
mod test_utils;
pub mod time;

pub use runtime::Runtime;
