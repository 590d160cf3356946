//! This module is responsible for handling CPU exceptions.
//!
//! The runtime doesn't recover from any trap: every trap is reported with as
//! much of the machine state as the stub saved and then terminates the guest.

use guest_types::{
    aarch64::{TrapFrame, TrapKind},
    amd64::{TrapRegs, Vector},
};
use log::{debug, error};

use crate::{
    dump::{NamedRegister, register_groups},
    hw::HardwareOps,
};

const GPRS_PER_LINE: usize = 4;

/// Install the trap vector table.
///
/// # Safety
///
/// `vector_base` must be the address of a vector table that stays valid for
/// the rest of the process' lifetime. This must be called before interrupts
/// are unmasked for the first time.
pub unsafe fn init(hw: &impl HardwareOps, vector_base: u64) {
    debug!("installing trap vectors at {vector_base:#x}");
    unsafe {
        hw.install_vector_base(vector_base);
    }
}

/// Report a trap taken on aarch64 and terminate.
///
/// `mode` is the slot of the vector table the stub was entered through and
/// `is_valid` is false for the slots of exception levels and stack pointers
/// the runtime never expects to take traps from.
pub fn handle_aarch64(
    hw: &impl HardwareOps,
    frame: &TrapFrame,
    el: u64,
    mode: u64,
    is_valid: bool,
) -> ! {
    let invalid = if is_valid { "" } else { "Invalid " };
    match TrapKind::from_mode(mode) {
        Some(kind) => error!("Trap: EL{el} {invalid}{kind} caught"),
        None => error!("Trap: EL{el} {invalid}Unknown mode {mode} caught"),
    }

    let syndrome = frame.syndrome();
    let class = syndrome.exception_class();
    error!("Exception class: {class:?} (ISS {:#x})", syndrome.iss());

    if class.is_data_abort() {
        let far = hw.read_fault_address();
        error!("Data Abort Address: 0x{far:016x}");
    }

    error!("Dump registers:");
    for register in [
        NamedRegister {
            name: "ESR",
            value: frame.esr(),
        },
        NamedRegister {
            name: "PC",
            value: frame.elr(),
        },
        NamedRegister {
            name: "LR",
            value: frame.lr(),
        },
        NamedRegister {
            name: "PSTATE",
            value: frame.spsr(),
        },
    ] {
        error!("{register}");
    }
    for group in register_groups(frame.gprs(), GPRS_PER_LINE) {
        error!("{group}");
    }

    panic!("Fatal trap");
}

/// Report a trap taken on x86-64 and terminate.
pub fn handle_amd64(hw: &impl HardwareOps, vector: u8, regs: &TrapRegs) -> ! {
    let vector = Vector::from(vector);
    error!(
        "Trap: {:?} {vector} caught (error code {:#x})",
        regs.privilege_level(),
        regs.error_code()
    );

    if vector == Vector::Page {
        let cr2 = hw.read_fault_address();
        error!(
            "Page Fault Address: 0x{cr2:016x} ({:?})",
            regs.page_fault_error_code()
        );
    }

    error!("Dump registers:");
    let named = |name, value| NamedRegister { name, value };
    error!("{}", named("CR2", regs.cr2()));
    error!("{}", named("EC", regs.error_code()));
    error!("{}", named("RIP", regs.rip()));
    error!("{}", named("CS", regs.cs()));
    error!("{} {:?}", named("RFLAGS", regs.rflags()), regs.flags());
    error!("{}", named("RSP", regs.rsp()));
    error!("{}", named("SS", regs.ss()));

    panic!("Fatal trap");
}
