#[cfg(all(feature = "asm", target_arch = "aarch64"))]
use crate::{ExceptionLevel, LoadRegisterUnsafe, StoreRegisterUnsafe};
use bitfield_struct::bitfield;

/// `SCTLR_ELx` — System Control Register.
///
/// Only the bits that matter for bringing up translation are named. The
/// remaining bits must be preserved on read-modify-write.
#[bitfield(u64)]
pub struct Sctlr {
    /// Bit 0 — M: stage 1 translation enable.
    pub mmu: bool,

    /// Bit 1 — A: alignment check enable.
    pub alignment_check: bool,

    /// Bit 2 — C: data and unified cache enable.
    pub data_cache: bool,

    /// Bit 3 — SA: stack alignment check.
    pub stack_alignment_check: bool,

    /// Bits 4–11.
    #[bits(8)]
    pub other0: u8,

    /// Bit 12 — I: instruction cache enable.
    pub instruction_cache: bool,

    /// Bits 13–18.
    #[bits(6)]
    pub other1: u8,

    /// Bit 19 — WXN: writable implies execute-never.
    pub wxn: bool,

    /// Bits 20–63.
    #[bits(44)]
    pub other2: u64,
}

impl Sctlr {
    /// Sets M, C and I, keeping every other bit.
    #[must_use]
    pub const fn with_translation_enabled(self) -> Self {
        self.with_mmu(true)
            .with_data_cache(true)
            .with_instruction_cache(true)
    }
}

#[cfg(all(feature = "asm", target_arch = "aarch64"))]
impl LoadRegisterUnsafe for Sctlr {
    unsafe fn load_unsafe(level: ExceptionLevel) -> Self {
        let sctlr: u64;
        unsafe {
            match level {
                ExceptionLevel::El1 => {
                    core::arch::asm!("mrs {}, sctlr_el1", out(reg) sctlr, options(nomem, nostack, preserves_flags));
                }
                ExceptionLevel::El2 => {
                    core::arch::asm!("mrs {}, sctlr_el2", out(reg) sctlr, options(nomem, nostack, preserves_flags));
                }
            }
        }
        Self::from_bits(sctlr)
    }
}

#[cfg(all(feature = "asm", target_arch = "aarch64"))]
impl StoreRegisterUnsafe for Sctlr {
    unsafe fn store_unsafe(self, level: ExceptionLevel) {
        let sctlr = self.into_bits();
        unsafe {
            match level {
                ExceptionLevel::El1 => {
                    core::arch::asm!("dsb sy", "msr sctlr_el1, {}", "isb", in(reg) sctlr, options(nostack, preserves_flags));
                }
                ExceptionLevel::El2 => {
                    core::arch::asm!("dsb sy", "msr sctlr_el2, {}", "isb", in(reg) sctlr, options(nostack, preserves_flags));
                }
            }
        }
    }
}
