//! The primitive CPU operations the rest of the runtime is written against.
//!
//! Exactly one implementation is compiled for the target architecture and
//! exported as [`Native`].

#[cfg(target_arch = "aarch64")]
pub mod aarch64;
#[cfg(target_arch = "x86_64")]
pub mod amd64;

#[cfg(target_arch = "aarch64")]
pub type Native = aarch64::Aarch64;
#[cfg(target_arch = "x86_64")]
pub type Native = amd64::Amd64;

pub trait HardwareOps {
    /// Read the free-running counter the hypervisor's time info refers to.
    fn read_cycle_counter(&self) -> u64;

    /// Read the address that caused the most recent memory abort.
    fn read_fault_address(&self) -> u64;

    fn mask_interrupts(&self);

    fn unmask_interrupts(&self);

    /// Wait until the next interrupt arrives. Returns immediately if one is
    /// already pending.
    fn wait_for_interrupt(&self);

    /// Point the CPU at a new trap vector table.
    ///
    /// # Safety
    ///
    /// `base` must be the address of a vector table that stays valid for the
    /// rest of the process' lifetime.
    unsafe fn install_vector_base(&self, base: u64);

    /// Multiply `a` and `b` and shift the 96-bit product right by `shift`.
    /// Only the low 64 bits of the result are kept.
    fn mul64_32(&self, a: u64, b: u32, shift: u8) -> u64 {
        ((u128::from(a) * u128::from(b)) >> shift) as u64
    }
}
