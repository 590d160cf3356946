use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RegionError {
    #[error("shared region at {address:#x} isn't aligned to {align} bytes")]
    Misaligned { address: usize, align: usize },
    #[error("shared region is {size} bytes, but the layout needs {required}")]
    TooSmall { size: usize, required: usize },
    #[error("vCPU {0} doesn't have a time info slot in the shared info page")]
    NoSuchVcpu(usize),
}
