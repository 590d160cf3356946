//! Nested masking of hardware interrupts.

use core::sync::atomic::{AtomicUsize, Ordering};

use crate::hw::HardwareOps;

/// Counts how many callers currently need interrupts to be masked.
///
/// Interrupts are considered masked until the boot code enables them for the
/// first time, so the depth starts out at 1.
pub struct InterruptDepth {
    depth: AtomicUsize,
}

impl InterruptDepth {
    pub const fn new() -> Self {
        Self {
            depth: AtomicUsize::new(1),
        }
    }

    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    /// Mask interrupts and increase the depth.
    pub fn disable(&self, hw: &impl HardwareOps) {
        hw.mask_interrupts();
        self.depth.fetch_add(1, Ordering::Relaxed);
    }

    /// Decrease the depth and unmask interrupts once it reaches zero.
    ///
    /// # Panics
    ///
    /// Panics if interrupts are already enabled.
    pub fn enable(&self, hw: &impl HardwareOps) {
        // Interrupts are masked while the depth is non-zero, so nothing can
        // run between the load and the store.
        let depth = self.depth.load(Ordering::Relaxed);
        assert!(depth > 0, "interrupts were enabled more often than disabled");
        self.depth.store(depth - 1, Ordering::Relaxed);

        if depth == 1 {
            hw.unmask_interrupts();
        }
    }

    pub fn without_interrupts<R>(&self, hw: &impl HardwareOps, f: impl FnOnce() -> R) -> R {
        self.disable(hw);
        let result = f();
        self.enable(hw);
        result
    }

    /// Park the CPU forever.
    pub fn halt(&self, hw: &impl HardwareOps) -> ! {
        self.disable(hw);
        loop {
            hw.wait_for_interrupt();
        }
    }
}
