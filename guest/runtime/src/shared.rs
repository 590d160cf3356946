//! Read-only access to memory owned by the hypervisor.

use core::{
    mem::{align_of, size_of},
    ptr::NonNull,
};

use guest_types::{
    pvclock::{VcpuTimeInfo, WallClock},
    xen,
};
use volatile::VolatilePtr;

use crate::error::RegionError;

/// Memory that another party may modify at any time.
///
/// All accesses go through loads at fixed byte offsets. Every load is a
/// separate access to memory, so two loads of the same offset may return
/// different values.
pub trait SharedRegion {
    fn size(&self) -> usize;

    fn load_u8(&self, offset: usize) -> u8;

    fn load_u32(&self, offset: usize) -> u32;

    fn load_u64(&self, offset: usize) -> u64;
}

/// A shared region accessed with volatile loads.
#[derive(Debug)]
pub struct VolatileRegion {
    base: NonNull<u8>,
    len: usize,
}

// The region is only ever read.
unsafe impl Send for VolatileRegion {}
unsafe impl Sync for VolatileRegion {}

impl VolatileRegion {
    /// The alignment required for the base of a region.
    pub const ALIGN: usize = 8;

    /// # Safety
    ///
    /// `base` must point to `len` bytes of memory that stay mapped and
    /// readable for the rest of the process' lifetime.
    pub unsafe fn new(base: NonNull<u8>, len: usize) -> Result<Self, RegionError> {
        let address = base.as_ptr() as usize;
        if address % Self::ALIGN != 0 {
            return Err(RegionError::Misaligned {
                address,
                align: Self::ALIGN,
            });
        }
        Ok(Self { base, len })
    }

    fn load<T: Copy>(&self, offset: usize) -> T {
        assert!(
            offset
                .checked_add(size_of::<T>())
                .is_some_and(|end| end <= self.len),
            "load at offset {offset:#x} is outside of the shared region"
        );
        assert_eq!(offset % align_of::<T>(), 0, "unaligned shared region load");

        let ptr = unsafe { self.base.add(offset) }.cast::<T>();
        unsafe { VolatilePtr::new_read_only(ptr) }.read()
    }
}

impl SharedRegion for VolatileRegion {
    fn size(&self) -> usize {
        self.len
    }

    fn load_u8(&self, offset: usize) -> u8 {
        self.load(offset)
    }

    fn load_u32(&self, offset: usize) -> u32 {
        self.load(offset)
    }

    fn load_u64(&self, offset: usize) -> u64 {
        self.load(offset)
    }
}

/// The locations of the hypervisor's time structures.
#[derive(Debug)]
pub struct ClockRegions {
    pub time_info: VolatileRegion,
    pub wall_clock: VolatileRegion,
}

impl ClockRegions {
    /// Locate the time structures in a Xen shared info page.
    ///
    /// # Safety
    ///
    /// `shared_info` must point to the mapped shared info page and the page
    /// must stay mapped for the rest of the process' lifetime.
    pub unsafe fn xen(shared_info: NonNull<u8>, vcpu: usize) -> Result<Self, RegionError> {
        let offset = xen::vcpu_time_info_offset(vcpu).ok_or(RegionError::NoSuchVcpu(vcpu))?;
        unsafe {
            Ok(Self {
                time_info: VolatileRegion::new(shared_info.add(offset), VcpuTimeInfo::SIZE)?,
                wall_clock: VolatileRegion::new(
                    shared_info.add(xen::WALL_CLOCK_OFFSET),
                    WallClock::SIZE,
                )?,
            })
        }
    }
}
