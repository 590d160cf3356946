//! Glue between the boot code, the assembly trap stubs and the runtime.

use log::{LevelFilter, debug};
use spin::Once;

#[cfg(target_arch = "aarch64")]
use guest_types::aarch64::TrapFrame;
#[cfg(target_arch = "x86_64")]
use guest_types::amd64::TrapRegs;

use crate::{
    Runtime, exception,
    hw::Native,
    logging::{self, Console},
    shared::ClockRegions,
};

static RUNTIME: Once<Runtime<Native>> = Once::new();

unsafe extern "C" {
    #[cfg(target_arch = "aarch64")]
    static cpu_exception_vectors: u8;
    #[cfg(target_arch = "x86_64")]
    static cpu_idt: u8;
}

fn vector_base() -> u64 {
    #[cfg(target_arch = "aarch64")]
    let base = unsafe { &raw const cpu_exception_vectors };
    #[cfg(target_arch = "x86_64")]
    let base = unsafe { &raw const cpu_idt };
    base as u64
}

/// Set up logging and the runtime. Later calls return the runtime created by
/// the first call.
///
/// Interrupts are still masked when this returns.
///
/// # Safety
///
/// The vector table the stubs are linked into must be complete, i.e. every
/// slot must enter [`cpu_trap_handler`] through a stub.
pub unsafe fn boot(
    console: &'static dyn Console,
    level: LevelFilter,
    regions: ClockRegions,
) -> &'static Runtime<Native> {
    if cfg!(not(feature = "harden")) {
        logging::init(console, level);
        debug!("initialized logger");
    }

    RUNTIME.call_once(|| {
        let result = unsafe {
            Runtime::init(
                Native::default(),
                vector_base(),
                regions.time_info,
                regions.wall_clock,
            )
        };
        match result {
            Ok(runtime) => runtime,
            Err(err) => panic!("failed to initialize the runtime: {err}"),
        }
    })
}

/// Returns the runtime once [`boot`] has completed.
pub fn runtime() -> Option<&'static Runtime<Native>> {
    RUNTIME.get()
}

/// Called by the trap stubs with the saved register frame.
#[cfg(target_arch = "aarch64")]
#[unsafe(no_mangle)]
extern "C" fn cpu_trap_handler(frame: &TrapFrame, el: u64, mode: u64, is_valid: u64) -> ! {
    exception::handle_aarch64(&Native::default(), frame, el, mode, is_valid != 0)
}

/// Called by the trap stubs with the vector number and the saved registers.
#[cfg(target_arch = "x86_64")]
#[unsafe(no_mangle)]
extern "C" fn cpu_trap_handler(vector: u64, regs: &TrapRegs) -> ! {
    exception::handle_amd64(&Native::default(), vector as u8, regs)
}
