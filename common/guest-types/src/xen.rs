//! Offsets into the Xen shared info page (x86-64 layout).

use crate::pvclock::{VcpuTimeInfo, WallClock};

pub const SHARED_INFO_SIZE: usize = 0x1000;

/// The number of `vcpu_info` slots embedded in the shared info page.
pub const LEGACY_MAX_VCPUS: usize = 32;

const VCPU_INFO_SIZE: usize = 64;
/// `vcpu_info.time` follows the event channel bits and the arch specific
/// state (cr2 and padding).
const VCPU_INFO_TIME: usize = 32;

/// `wc_version`, `wc_sec` and `wc_nsec` follow the vcpu_info array and the
/// two event channel bitmaps.
pub const WALL_CLOCK_OFFSET: usize = LEGACY_MAX_VCPUS * VCPU_INFO_SIZE + 2 * 64 * 8;

/// Returns the offset of the time info of `vcpu` or `None` if the vCPU
/// doesn't have a slot in the shared info page.
pub const fn vcpu_time_info_offset(vcpu: usize) -> Option<usize> {
    if vcpu >= LEGACY_MAX_VCPUS {
        return None;
    }
    Some(vcpu * VCPU_INFO_SIZE + VCPU_INFO_TIME)
}

const _: () = assert!(VCPU_INFO_TIME + VcpuTimeInfo::SIZE <= VCPU_INFO_SIZE);
const _: () = assert!(WALL_CLOCK_OFFSET + WallClock::SIZE <= SHARED_INFO_SIZE);
