//! Time derived from the hypervisor's paravirtual clock.
//!
//! The hypervisor publishes a reference point (a cycle counter value and the
//! corresponding system time) together with the factor that converts cycles
//! to nanoseconds. The structures are updated without any coordination with
//! the guest, so every read uses the seqlock protocol: sample the version,
//! read the fields, and retry if the version was odd or changed in between.

use core::{
    hint::spin_loop,
    sync::atomic::{Ordering, fence},
};

use guest_types::{
    NSEC_PER_SEC,
    pvclock::{PvclockFlags, VcpuTimeInfo, WallClock, update_in_progress},
};
use log::debug;

use crate::{
    error::RegionError,
    hw::HardwareOps,
    shared::{SharedRegion, VolatileRegion},
};

pub struct TimeSource<R = VolatileRegion> {
    time_info: R,
    wall_clock: R,
    /// The wall time at the origin of the monotonic clock in ns.
    epoch_offset: u64,
}

impl<R> TimeSource<R>
where
    R: SharedRegion,
{
    pub fn init(time_info: R, wall_clock: R) -> Result<Self, RegionError> {
        check_size(&time_info, VcpuTimeInfo::SIZE)?;
        check_size(&wall_clock, WallClock::SIZE)?;

        let flags = PvclockFlags::from_bits_retain(time_info.load_u8(VcpuTimeInfo::FLAGS));
        debug!("pvclock flags: {flags:?}");

        let epoch_offset = read_wall_clock(&wall_clock);
        debug!("epoch offset: {epoch_offset} ns");

        Ok(Self {
            time_info,
            wall_clock,
            epoch_offset,
        })
    }

    /// Returns the nanoseconds since the origin of the monotonic clock.
    pub fn monotonic(&self, hw: &impl HardwareOps) -> u64 {
        let ti = &self.time_info;
        loop {
            let version = ti.load_u32(VcpuTimeInfo::VERSION);
            fence(Ordering::Acquire);

            let delta = hw
                .read_cycle_counter()
                .wrapping_sub(ti.load_u64(VcpuTimeInfo::TSC_TIMESTAMP));
            let delta = shift(delta, ti.load_u8(VcpuTimeInfo::TSC_SHIFT) as i8);
            let scaled = hw.mul64_32(delta, ti.load_u32(VcpuTimeInfo::TSC_TO_SYSTEM_MUL), 32);
            let time_now = scaled.wrapping_add(ti.load_u64(VcpuTimeInfo::SYSTEM_TIME));

            fence(Ordering::Acquire);
            let current = ti.load_u32(VcpuTimeInfo::VERSION);
            if !update_in_progress(current) && current == version {
                return time_now;
            }
            spin_loop();
        }
    }

    /// Read the wall clock published by the hypervisor in ns since the Unix
    /// epoch.
    pub fn read_wall_clock(&self) -> u64 {
        read_wall_clock(&self.wall_clock)
    }

    /// Returns the wall time at the origin of the monotonic clock as it was
    /// observed during initialization.
    pub fn epoch_offset(&self) -> u64 {
        self.epoch_offset
    }

    /// Returns the current wall time in ns since the Unix epoch.
    pub fn wall_clock_now(&self, hw: &impl HardwareOps) -> u64 {
        self.epoch_offset.wrapping_add(self.monotonic(hw))
    }
}

fn check_size(region: &impl SharedRegion, required: usize) -> Result<(), RegionError> {
    let size = region.size();
    if size < required {
        return Err(RegionError::TooSmall { size, required });
    }
    Ok(())
}

/// Apply the power-of-two part of the scaling. Shifting out all bits yields
/// zero.
fn shift(delta: u64, shift: i8) -> u64 {
    let amount = u32::from(shift.unsigned_abs());
    if shift < 0 {
        delta.checked_shr(amount).unwrap_or(0)
    } else {
        delta.checked_shl(amount).unwrap_or(0)
    }
}

fn read_wall_clock(wc: &impl SharedRegion) -> u64 {
    loop {
        let version = wc.load_u32(WallClock::VERSION);
        fence(Ordering::Acquire);

        let sec = u64::from(wc.load_u32(WallClock::SEC));
        let nsec = u64::from(wc.load_u32(WallClock::NSEC));
        let wall = sec * NSEC_PER_SEC + nsec;

        fence(Ordering::Acquire);
        let current = wc.load_u32(WallClock::VERSION);
        if !update_in_progress(current) && current == version {
            return wall;
        }
        spin_loop();
    }
}

#[cfg(test)]
mod tests {
    use guest_types::pvclock::{PvclockFlags, VcpuTimeInfo, WallClock};

    use super::{TimeSource, shift};
    use crate::{
        error::RegionError,
        test_utils::{MockHardware, ScriptedRegion},
    };

    const WALL_CLOCK: WallClock = WallClock {
        version: 8,
        sec: 1_600_000_000,
        nsec: 250,
    };

    fn time_info(
        version: u32,
        tsc_timestamp: u64,
        system_time: u64,
        mul: u32,
        tsc_shift: i8,
    ) -> VcpuTimeInfo {
        VcpuTimeInfo {
            version,
            tsc_timestamp,
            system_time,
            tsc_to_system_mul: mul,
            tsc_shift,
            flags: PvclockFlags::TSC_STABLE,
        }
    }

    fn source(info: VcpuTimeInfo) -> TimeSource<ScriptedRegion> {
        TimeSource::init(
            ScriptedRegion::new(&info.to_bytes()),
            ScriptedRegion::new(&WALL_CLOCK.to_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_scaling() {
        // 0x8000_0000 is 0.5 in 32.32 fixed point.
        let source = source(time_info(2, 5000, 1_000_000, 0x8000_0000, 3));
        let hw = MockHardware::new();
        hw.cycles.set(5100);

        assert_eq!(source.monotonic(&hw), 1_000_400);
    }

    #[test]
    fn test_negative_shift() {
        let source = source(time_info(2, 0, 10, 0x8000_0000, -2));
        let hw = MockHardware::new();
        hw.cycles.set(1000);

        // 1000 >> 2 = 250, times 0.5 = 125.
        assert_eq!(source.monotonic(&hw), 135);
    }

    #[test]
    fn test_shift() {
        assert_eq!(shift(100, 3), 800);
        assert_eq!(shift(100, -3), 12);
        assert_eq!(shift(100, 0), 100);
        assert_eq!(shift(u64::MAX, -63), 1);
        assert_eq!(shift(u64::MAX, -64), 0);
        assert_eq!(shift(1, 64), 0);
        assert_eq!(shift(1, i8::MIN), 0);
    }

    #[test]
    fn test_retries_torn_read() {
        // The hypervisor is in the middle of an update when the reader
        // starts and finishes it after the first two loads.
        let torn = time_info(5, 0xffff_0000_0000_0000, 0xdead_dead, 0xffff_ffff, 10);
        let settled = time_info(6, 5000, 1_000_000, 0x8000_0000, 3);

        let source = source(settled);
        source.time_info.set(&torn.to_bytes());
        let reads_before = source.time_info.reads();
        source.time_info.schedule(reads_before + 2, &settled.to_bytes());

        let hw = MockHardware::new();
        hw.cycles.set(5100);
        assert_eq!(source.monotonic(&hw), 1_000_400);
        // Two passes with six loads each.
        assert_eq!(source.time_info.reads() - reads_before, 12);
    }

    #[test]
    fn test_retries_on_version_change() {
        let old = time_info(4, 0, 0, 0x8000_0000, 0);
        let new = time_info(6, 1000, 7_000, 0x8000_0000, 0);

        let source = source(old);
        let reads_before = source.time_info.reads();
        // The version is read as 4, everything after it comes from the
        // completed update.
        source.time_info.schedule(reads_before + 1, &new.to_bytes());

        let hw = MockHardware::new();
        hw.cycles.set(3000);
        // Mixing the old version's timestamp with the new system time would
        // give 1500 + 7000.
        assert_eq!(source.monotonic(&hw), 8000);
        assert_eq!(source.time_info.reads() - reads_before, 12);
    }

    #[test]
    fn test_monotonic_never_decreases() {
        let mut info = time_info(2, 0, 0, 0x9000_0000, 1);
        let source = source(info);
        let hw = MockHardware::new();

        let mut last = 0;
        for step in 1..=500u64 {
            hw.cycles.set(hw.cycles.get() + step % 7 * 13);

            // Every few steps the hypervisor moves the reference point
            // forward and adjusts the rate, like it does after a migration.
            if step % 25 == 0 {
                info.system_time = source.monotonic(&hw);
                info.tsc_timestamp = hw.cycles.get();
                info.tsc_to_system_mul = 0x8000_0000 + (step as u32 % 5) * 0x1000_0000;
                info.tsc_shift = (step % 3) as i8 - 1;
                info.version += 2;
                source.time_info.set(&info.to_bytes());
            }

            let now = source.monotonic(&hw);
            assert!(now >= last, "time went backwards: {last} -> {now}");
            last = now;
        }
        assert!(last > 0);
    }

    #[test]
    fn test_epoch_offset() {
        let source = source(time_info(2, 0, 0, 0, 0));
        assert_eq!(source.epoch_offset(), 1_600_000_000_000_000_250);

        let later = WallClock {
            version: 10,
            sec: 1_700_000_000,
            nsec: 0,
        };
        source.wall_clock.set(&later.to_bytes());
        assert_eq!(source.epoch_offset(), 1_600_000_000_000_000_250);
        assert_eq!(source.read_wall_clock(), 1_700_000_000_000_000_000);
    }

    #[test]
    fn test_wall_clock_retries() {
        let updating = WallClock {
            version: 9,
            sec: 1,
            nsec: 2,
        };
        let wall_clock = ScriptedRegion::new(&updating.to_bytes());
        // The update completes after the version and seconds were read.
        wall_clock.schedule(2, &WALL_CLOCK.to_bytes());

        let source = TimeSource::init(
            ScriptedRegion::new(&time_info(2, 0, 0, 0, 0).to_bytes()),
            wall_clock,
        )
        .unwrap();
        assert_eq!(source.epoch_offset(), 1_600_000_000_000_000_250);
    }

    #[test]
    fn test_wall_clock_now() {
        let source = source(time_info(2, 0, 1_000, 0x8000_0000, 0));
        let hw = MockHardware::new();
        hw.cycles.set(200);
        assert_eq!(source.wall_clock_now(&hw), 1_600_000_000_000_000_250 + 1_100);
    }

    #[test]
    fn test_region_too_small() {
        let result = TimeSource::init(
            ScriptedRegion::new(&[0; 16]),
            ScriptedRegion::new(&WALL_CLOCK.to_bytes()),
        );
        assert_eq!(
            result.err(),
            Some(RegionError::TooSmall {
                size: 16,
                required: VcpuTimeInfo::SIZE
            })
        );
    }

    #[test]
    fn test_volatile_regions() {
        use std::{boxed::Box, ptr::NonNull};

        use crate::shared::VolatileRegion;

        let mut info = Box::new([0u64; 4]);
        bytemuck::bytes_of_mut(&mut *info)
            .copy_from_slice(&time_info(2, 5000, 1_000_000, 0x8000_0000, 3).to_bytes());
        let mut wall_clock = Box::new([0u64; 2]);
        bytemuck::bytes_of_mut(&mut *wall_clock)[..WallClock::SIZE]
            .copy_from_slice(&WALL_CLOCK.to_bytes());

        let source = unsafe {
            TimeSource::init(
                VolatileRegion::new(NonNull::from(&mut *info).cast(), VcpuTimeInfo::SIZE).unwrap(),
                VolatileRegion::new(NonNull::from(&mut *wall_clock).cast(), WallClock::SIZE)
                    .unwrap(),
            )
        }
        .unwrap();

        let hw = MockHardware::new();
        hw.cycles.set(5100);
        assert_eq!(source.monotonic(&hw), 1_000_400);
        assert_eq!(source.epoch_offset(), 1_600_000_000_000_000_250);
    }
}
