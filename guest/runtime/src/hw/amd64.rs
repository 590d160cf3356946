use core::arch::{asm, x86_64::_rdtsc};

use guest_types::amd64::IDT_LIMIT;
use x86_64::{
    VirtAddr,
    instructions::{hlt, interrupts, tables::lidt},
    registers::control::Cr2,
    structures::DescriptorTablePointer,
};

use super::HardwareOps;

/// An x86-64 CPU running in long mode at CPL 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct Amd64;

impl HardwareOps for Amd64 {
    fn read_cycle_counter(&self) -> u64 {
        unsafe { _rdtsc() }
    }

    fn read_fault_address(&self) -> u64 {
        Cr2::read_raw()
    }

    fn mask_interrupts(&self) {
        interrupts::disable();
    }

    fn unmask_interrupts(&self) {
        interrupts::enable();
    }

    fn wait_for_interrupt(&self) {
        hlt();
    }

    unsafe fn install_vector_base(&self, base: u64) {
        let pointer = DescriptorTablePointer {
            limit: IDT_LIMIT,
            base: VirtAddr::new(base),
        };
        unsafe {
            lidt(&pointer);
        }
    }

    fn mul64_32(&self, a: u64, b: u32, shift: u8) -> u64 {
        let product: u64;
        unsafe {
            asm!(
                // rdx:rax = a * b
                "mul rdx",
                "shrd rax, rdx, cl",
                inout("rax") a => product,
                inout("rdx") u64::from(b) => _,
                in("cl") shift,
                options(pure, nomem, nostack),
            );
        }
        product
    }
}
