use crate::{
    error::RegionError,
    exception,
    hw::HardwareOps,
    interrupts::InterruptDepth,
    shared::{SharedRegion, VolatileRegion},
    time::TimeSource,
};

/// The state the runtime keeps for the lifetime of the guest.
pub struct Runtime<H, R = VolatileRegion> {
    hw: H,
    interrupts: InterruptDepth,
    time: TimeSource<R>,
}

impl<H, R> Runtime<H, R>
where
    H: HardwareOps,
    R: SharedRegion,
{
    /// Install the trap vectors and set up the time source.
    ///
    /// Interrupts stay masked until the caller enables them.
    ///
    /// # Safety
    ///
    /// The requirements of [`exception::init`] apply to `vector_base`.
    pub unsafe fn init(
        hw: H,
        vector_base: u64,
        time_info: R,
        wall_clock: R,
    ) -> Result<Self, RegionError> {
        unsafe {
            exception::init(&hw, vector_base);
        }
        let time = TimeSource::init(time_info, wall_clock)?;
        Ok(Self {
            hw,
            interrupts: InterruptDepth::new(),
            time,
        })
    }

    pub fn hw(&self) -> &H {
        &self.hw
    }

    pub fn interrupt_depth(&self) -> usize {
        self.interrupts.depth()
    }

    pub fn disable_interrupts(&self) {
        self.interrupts.disable(&self.hw);
    }

    pub fn enable_interrupts(&self) {
        self.interrupts.enable(&self.hw);
    }

    pub fn without_interrupts<T>(&self, f: impl FnOnce() -> T) -> T {
        self.interrupts.without_interrupts(&self.hw, f)
    }

    pub fn halt(&self) -> ! {
        self.interrupts.halt(&self.hw)
    }

    pub fn monotonic(&self) -> u64 {
        self.time.monotonic(&self.hw)
    }

    pub fn epoch_offset(&self) -> u64 {
        self.time.epoch_offset()
    }

    pub fn wall_clock_now(&self) -> u64 {
        self.time.wall_clock_now(&self.hw)
    }
}
