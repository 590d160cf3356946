use core::arch::asm;

use super::HardwareOps;

/// An aarch64 CPU running at EL1.
#[derive(Debug, Clone, Copy, Default)]
pub struct Aarch64;

impl HardwareOps for Aarch64 {
    fn read_cycle_counter(&self) -> u64 {
        let count: u64;
        unsafe {
            // The isb keeps the counter read from being speculated ahead of
            // preceding instructions.
            asm!(
                "isb",
                "mrs {}, cntvct_el0",
                out(reg) count,
                options(nomem, nostack, preserves_flags),
            );
        }
        count
    }

    fn read_fault_address(&self) -> u64 {
        let address: u64;
        unsafe {
            asm!("mrs {}, far_el1", out(reg) address, options(nomem, nostack, preserves_flags));
        }
        address
    }

    fn mask_interrupts(&self) {
        unsafe {
            asm!("msr daifset, #2", options(nostack, preserves_flags));
        }
    }

    fn unmask_interrupts(&self) {
        unsafe {
            asm!("msr daifclr, #2", options(nostack, preserves_flags));
        }
    }

    fn wait_for_interrupt(&self) {
        unsafe {
            asm!("wfi", options(nomem, nostack, preserves_flags));
        }
    }

    unsafe fn install_vector_base(&self, base: u64) {
        unsafe {
            asm!(
                "msr vbar_el1, {}",
                "isb",
                in(reg) base,
                options(nostack, preserves_flags),
            );
        }
    }
}
