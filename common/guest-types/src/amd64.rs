//! Layouts for exceptions delivered through the IDT on x86-64.

use core::fmt;

use bytemuck::{Pod, Zeroable};
use x86_64::{
    PrivilegeLevel,
    registers::rflags::RFlags,
    structures::{gdt::SegmentSelector, idt::PageFaultErrorCode},
};

/// The number of gates in the IDT the trap stubs are installed in.
pub const IDT_NUM_ENTRIES: usize = 48;

/// The limit of the IDT descriptor table pointer.
pub const IDT_LIMIT: u16 = (IDT_NUM_ENTRIES * 16 - 1) as u16;

const FRAME_WORDS: usize = 7;

/// The registers the trap stub saves before calling into the runtime.
///
/// The stub pushes CR2 and the error code (zero for vectors without one) in
/// front of the hardware interrupt stack frame (RIP, CS, RFLAGS, RSP, SS).
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(transparent)]
pub struct TrapRegs([u64; FRAME_WORDS]);

impl TrapRegs {
    const CR2: usize = 0;
    const EC: usize = 1;
    const RIP: usize = 2;
    const CS: usize = 3;
    const RFLAGS: usize = 4;
    const RSP: usize = 5;
    const SS: usize = 6;

    pub const WORDS: usize = FRAME_WORDS;
    pub const SIZE: usize = Self::WORDS * 8;

    pub const fn new(cr2: u64, ec: u64, rip: u64, cs: u64, rflags: u64, rsp: u64, ss: u64) -> Self {
        let mut words = [0; Self::WORDS];
        words[Self::CR2] = cr2;
        words[Self::EC] = ec;
        words[Self::RIP] = rip;
        words[Self::CS] = cs;
        words[Self::RFLAGS] = rflags;
        words[Self::RSP] = rsp;
        words[Self::SS] = ss;
        Self(words)
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<&Self> {
        bytemuck::try_from_bytes(bytes).ok()
    }

    /// The fault linear address, only meaningful for page faults.
    pub fn cr2(&self) -> u64 {
        self.0[Self::CR2]
    }

    pub fn error_code(&self) -> u64 {
        self.0[Self::EC]
    }

    pub fn rip(&self) -> u64 {
        self.0[Self::RIP]
    }

    pub fn cs(&self) -> u64 {
        self.0[Self::CS]
    }

    pub fn rflags(&self) -> u64 {
        self.0[Self::RFLAGS]
    }

    pub fn rsp(&self) -> u64 {
        self.0[Self::RSP]
    }

    pub fn ss(&self) -> u64 {
        self.0[Self::SS]
    }

    /// The privilege level the trapped code was running at.
    pub fn privilege_level(&self) -> PrivilegeLevel {
        SegmentSelector(self.cs() as u16).rpl()
    }

    pub fn flags(&self) -> RFlags {
        RFlags::from_bits_truncate(self.rflags())
    }

    pub fn page_fault_error_code(&self) -> PageFaultErrorCode {
        PageFaultErrorCode::from_bits_truncate(self.error_code())
    }
}

/// An interrupt vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vector {
    Division,
    Debug,
    NonMaskableInterrupt,
    Breakpoint,
    Overflow,
    BoundRange,
    InvalidOpcode,
    DeviceNotAvailable,
    DoubleFault,
    InvalidTss,
    SegmentNotPresent,
    StackSegment,
    GeneralProtection,
    Page,
    X87FloatingPoint,
    AlignmentCheck,
    MachineCheck,
    SimdFloatingPoint,
    Virtualization,
    ControlProtection,
    HypervisorInjection,
    VmmCommunication,
    Security,
    /// An exception vector the architecture doesn't define.
    Reserved(u8),
    /// An external or software interrupt (vector 32 and above).
    Interrupt(u8),
}

impl Vector {
    pub const fn mnemonic(self) -> Option<&'static str> {
        Some(match self {
            Self::Division => "#DE",
            Self::Debug => "#DB",
            Self::NonMaskableInterrupt => "#NMI",
            Self::Breakpoint => "#BP",
            Self::Overflow => "#OF",
            Self::BoundRange => "#BR",
            Self::InvalidOpcode => "#UD",
            Self::DeviceNotAvailable => "#NM",
            Self::DoubleFault => "#DF",
            Self::InvalidTss => "#TS",
            Self::SegmentNotPresent => "#NP",
            Self::StackSegment => "#SS",
            Self::GeneralProtection => "#GP",
            Self::Page => "#PF",
            Self::X87FloatingPoint => "#MF",
            Self::AlignmentCheck => "#AC",
            Self::MachineCheck => "#MC",
            Self::SimdFloatingPoint => "#XM",
            Self::Virtualization => "#VE",
            Self::ControlProtection => "#CP",
            Self::HypervisorInjection => "#HV",
            Self::VmmCommunication => "#VC",
            Self::Security => "#SX",
            Self::Reserved(_) | Self::Interrupt(_) => return None,
        })
    }
}

impl From<u8> for Vector {
    fn from(vector: u8) -> Self {
        match vector {
            0x00 => Self::Division,
            0x01 => Self::Debug,
            0x02 => Self::NonMaskableInterrupt,
            0x03 => Self::Breakpoint,
            0x04 => Self::Overflow,
            0x05 => Self::BoundRange,
            0x06 => Self::InvalidOpcode,
            0x07 => Self::DeviceNotAvailable,
            0x08 => Self::DoubleFault,
            0x0a => Self::InvalidTss,
            0x0b => Self::SegmentNotPresent,
            0x0c => Self::StackSegment,
            0x0d => Self::GeneralProtection,
            0x0e => Self::Page,
            0x10 => Self::X87FloatingPoint,
            0x11 => Self::AlignmentCheck,
            0x12 => Self::MachineCheck,
            0x13 => Self::SimdFloatingPoint,
            0x14 => Self::Virtualization,
            0x15 => Self::ControlProtection,
            0x1c => Self::HypervisorInjection,
            0x1d => Self::VmmCommunication,
            0x1e => Self::Security,
            0x00..0x20 => Self::Reserved(vector),
            0x20.. => Self::Interrupt(vector),
        }
    }
}

impl fmt::Display for Vector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Reserved(vector) => write!(f, "#{vector}"),
            Self::Interrupt(vector) => write!(f, "IRQ {vector:#04x}"),
            _ => f.write_str(self.mnemonic().unwrap_or_default()),
        }
    }
}
