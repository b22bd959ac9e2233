//! # Typed `AArch64` Translation Registers
//!
//! Bitfield views of the system registers that control stage 1 address
//! translation:
//!
//! | Register | Type | Purpose |
//! |----------|------|---------|
//! | `TCR_ELx` | [`Tcr`] | Input size (T0SZ), granule, walk cacheability, output size |
//! | `MAIR_ELx` | [`Mair`] | Memory types selected by a descriptor's `AttrIndx` |
//! | `SCTLR_ELx` | [`Sctlr`] | MMU and cache enables |
//!
//! The load/store traits are only implemented for the real registers when the
//! `asm` feature is enabled and the target is `aarch64`. Everything else is
//! plain value manipulation and can be used (and tested) on any host.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod mair;
pub mod sctlr;
pub mod tcr;

pub use mair::{Mair, MemoryType};
pub use sctlr::Sctlr;
pub use tcr::{Cacheability, Granule, PhysicalAddressSize, Shareability, Tcr};

/// Exception level whose registers are accessed.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub enum ExceptionLevel {
    #[default]
    El1,
    El2,
}

pub trait LoadRegisterUnsafe: Sized {
    /// # Safety
    /// The caller must uphold the implementation-specific safety requirements.
    /// The access is privileged and must be issued at or above `level`.
    unsafe fn load_unsafe(level: ExceptionLevel) -> Self;
}

pub trait StoreRegisterUnsafe {
    /// # Safety
    /// The caller must uphold the implementation-specific safety requirements.
    /// Writing translation registers changes how every subsequent memory
    /// access is translated.
    unsafe fn store_unsafe(self, level: ExceptionLevel);
}
