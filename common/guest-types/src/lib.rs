//! This crate contains the fixed layouts shared between the guest runtime,
//! the assembly trap stubs and the hypervisor.
#![cfg_attr(not(test), no_std)]

pub mod aarch64;
pub mod amd64;
pub mod pvclock;
pub mod xen;

pub const NSEC_PER_SEC: u64 = 1_000_000_000;
