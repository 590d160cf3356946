//! Layouts for exceptions taken to EL1 on aarch64.

use core::fmt;

use bit_field::BitField;
use bytemuck::{Pod, Zeroable};

/// The number of general purpose registers saved by the trap stub (x0-x29).
pub const GPR_COUNT: usize = 30;

const FRAME_WORDS: usize = GPR_COUNT + 4;

/// The register frame the trap stub stores on the stack before calling into
/// the runtime.
///
/// The stub writes consecutive 64-bit words: x0-x29, x30 (the link register),
/// ELR_EL1, SPSR_EL1 and ESR_EL1. The fields are only accessed through their
/// word index so that the layout is fixed by this type alone.
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(transparent)]
pub struct TrapFrame([u64; FRAME_WORDS]);

impl TrapFrame {
    const LR: usize = GPR_COUNT;
    const ELR: usize = GPR_COUNT + 1;
    const SPSR: usize = GPR_COUNT + 2;
    const ESR: usize = GPR_COUNT + 3;

    pub const WORDS: usize = FRAME_WORDS;
    pub const SIZE: usize = Self::WORDS * 8;

    pub const fn new(gprs: [u64; GPR_COUNT], lr: u64, elr: u64, spsr: u64, esr: u64) -> Self {
        let mut words = [0; Self::WORDS];
        let mut i = 0;
        while i < GPR_COUNT {
            words[i] = gprs[i];
            i += 1;
        }
        words[Self::LR] = lr;
        words[Self::ELR] = elr;
        words[Self::SPSR] = spsr;
        words[Self::ESR] = esr;
        Self(words)
    }

    /// Reinterpret a frame written by the trap stub.
    ///
    /// Returns `None` if `bytes` doesn't have the size or alignment of a
    /// frame.
    pub fn from_bytes(bytes: &[u8]) -> Option<&Self> {
        bytemuck::try_from_bytes(bytes).ok()
    }

    pub fn gprs(&self) -> &[u64] {
        &self.0[..GPR_COUNT]
    }

    pub fn lr(&self) -> u64 {
        self.0[Self::LR]
    }

    /// The exception link register, i.e. the faulting program counter.
    pub fn elr(&self) -> u64 {
        self.0[Self::ELR]
    }

    pub fn spsr(&self) -> u64 {
        self.0[Self::SPSR]
    }

    pub fn esr(&self) -> u64 {
        self.0[Self::ESR]
    }

    pub fn syndrome(&self) -> Syndrome {
        Syndrome(self.esr())
    }
}

/// The kind of exception, i.e. which quarter of the vector table slot the
/// exception was delivered to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrapKind {
    Synchronous,
    Irq,
    Fiq,
    SError,
}

impl TrapKind {
    /// Map the mode number passed by the trap stub. Returns `None` for values
    /// the vector table never produces.
    pub const fn from_mode(mode: u64) -> Option<Self> {
        Some(match mode {
            0 => Self::Synchronous,
            1 => Self::Irq,
            2 => Self::Fiq,
            3 => Self::SError,
            _ => return None,
        })
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Synchronous => "Synchronous Abort",
            Self::Irq => "IRQ",
            Self::Fiq => "FIQ",
            Self::SError => "Error",
        }
    }
}

impl fmt::Display for TrapKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The value of ESR_EL1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Syndrome(pub u64);

impl Syndrome {
    pub fn exception_class(self) -> ExceptionClass {
        ExceptionClass::from(self.0.get_bits(26..32) as u8)
    }

    /// Whether the trapped instruction was 32 bits wide.
    pub fn instruction_length(self) -> bool {
        self.0.get_bit(25)
    }

    /// The instruction specific syndrome.
    pub fn iss(self) -> u32 {
        self.0.get_bits(0..25) as u32
    }
}

/// The EC field of ESR_EL1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionClass {
    Unknown,
    Wfx,
    IllegalExecutionState,
    Svc64,
    Hvc64,
    Smc64,
    SysReg,
    InstructionAbortLower,
    InstructionAbortCurrent,
    PcAlignment,
    DataAbortLower,
    DataAbortCurrent,
    SpAlignment,
    Fp64,
    SError,
    BreakpointLower,
    BreakpointCurrent,
    SoftwareStepLower,
    SoftwareStepCurrent,
    WatchpointLower,
    WatchpointCurrent,
    Brk64,
    Other(u8),
}

impl ExceptionClass {
    pub const fn is_data_abort(self) -> bool {
        matches!(self, Self::DataAbortLower | Self::DataAbortCurrent)
    }
}

impl From<u8> for ExceptionClass {
    fn from(ec: u8) -> Self {
        match ec {
            0b00_0000 => Self::Unknown,
            0b00_0001 => Self::Wfx,
            0b00_1110 => Self::IllegalExecutionState,
            0b01_0101 => Self::Svc64,
            0b01_0110 => Self::Hvc64,
            0b01_0111 => Self::Smc64,
            0b01_1000 => Self::SysReg,
            0b10_0000 => Self::InstructionAbortLower,
            0b10_0001 => Self::InstructionAbortCurrent,
            0b10_0010 => Self::PcAlignment,
            0b10_0100 => Self::DataAbortLower,
            0b10_0101 => Self::DataAbortCurrent,
            0b10_0110 => Self::SpAlignment,
            0b10_1100 => Self::Fp64,
            0b10_1111 => Self::SError,
            0b11_0000 => Self::BreakpointLower,
            0b11_0001 => Self::BreakpointCurrent,
            0b11_0010 => Self::SoftwareStepLower,
            0b11_0011 => Self::SoftwareStepCurrent,
            0b11_0100 => Self::WatchpointLower,
            0b11_0101 => Self::WatchpointCurrent,
            0b11_1100 => Self::Brk64,
            ec => Self::Other(ec),
        }
    }
}
