//! The paravirtual clock ABI shared by Xen and KVM.
//!
//! Both structures are owned by the hypervisor and may be rewritten at any
//! time. The hypervisor makes `version` odd before it starts updating the
//! other fields and bumps it to the next even value once it's done.

use bitflags::bitflags;
use bytemuck::pod_read_unaligned;

use crate::NSEC_PER_SEC;

/// Returns whether the hypervisor is in the middle of updating a structure
/// with the given version.
pub const fn update_in_progress(version: u32) -> bool {
    version & 1 != 0
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PvclockFlags: u8 {
        const TSC_STABLE = 1 << 0;
        const GUEST_STOPPED = 1 << 1;
    }
}

/// The per-vCPU time info (`pvclock_vcpu_time_info`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VcpuTimeInfo {
    pub version: u32,
    /// The cycle counter value at which `system_time` was sampled.
    pub tsc_timestamp: u64,
    /// Nanoseconds since the origin of the monotonic clock.
    pub system_time: u64,
    /// 32.32 fixed-point factor converting cycles to nanoseconds.
    pub tsc_to_system_mul: u32,
    pub tsc_shift: i8,
    pub flags: PvclockFlags,
}

impl VcpuTimeInfo {
    pub const SIZE: usize = 32;

    pub const VERSION: usize = 0;
    pub const TSC_TIMESTAMP: usize = 8;
    pub const SYSTEM_TIME: usize = 16;
    pub const TSC_TO_SYSTEM_MUL: usize = 24;
    pub const TSC_SHIFT: usize = 28;
    pub const FLAGS: usize = 29;

    pub fn from_bytes(bytes: &[u8; Self::SIZE]) -> Self {
        Self {
            version: pod_read_unaligned(&bytes[Self::VERSION..][..4]),
            tsc_timestamp: pod_read_unaligned(&bytes[Self::TSC_TIMESTAMP..][..8]),
            system_time: pod_read_unaligned(&bytes[Self::SYSTEM_TIME..][..8]),
            tsc_to_system_mul: pod_read_unaligned(&bytes[Self::TSC_TO_SYSTEM_MUL..][..4]),
            tsc_shift: bytes[Self::TSC_SHIFT] as i8,
            flags: PvclockFlags::from_bits_retain(bytes[Self::FLAGS]),
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0; Self::SIZE];
        bytes[Self::VERSION..][..4].copy_from_slice(&self.version.to_ne_bytes());
        bytes[Self::TSC_TIMESTAMP..][..8].copy_from_slice(&self.tsc_timestamp.to_ne_bytes());
        bytes[Self::SYSTEM_TIME..][..8].copy_from_slice(&self.system_time.to_ne_bytes());
        bytes[Self::TSC_TO_SYSTEM_MUL..][..4]
            .copy_from_slice(&self.tsc_to_system_mul.to_ne_bytes());
        bytes[Self::TSC_SHIFT] = self.tsc_shift as u8;
        bytes[Self::FLAGS] = self.flags.bits();
        bytes
    }
}

/// The wall clock (`pvclock_wall_clock`): the wall time at the origin of the
/// monotonic clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WallClock {
    pub version: u32,
    pub sec: u32,
    pub nsec: u32,
}

impl WallClock {
    pub const SIZE: usize = 12;

    pub const VERSION: usize = 0;
    pub const SEC: usize = 4;
    pub const NSEC: usize = 8;

    pub fn from_bytes(bytes: &[u8; Self::SIZE]) -> Self {
        Self {
            version: pod_read_unaligned(&bytes[Self::VERSION..][..4]),
            sec: pod_read_unaligned(&bytes[Self::SEC..][..4]),
            nsec: pod_read_unaligned(&bytes[Self::NSEC..][..4]),
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0; Self::SIZE];
        bytes[Self::VERSION..][..4].copy_from_slice(&self.version.to_ne_bytes());
        bytes[Self::SEC..][..4].copy_from_slice(&self.sec.to_ne_bytes());
        bytes[Self::NSEC..][..4].copy_from_slice(&self.nsec.to_ne_bytes());
        bytes
    }

    pub fn as_nanos(&self) -> u64 {
        u64::from(self.sec) * NSEC_PER_SEC + u64::from(self.nsec)
    }
}
