#[cfg(all(feature = "asm", target_arch = "aarch64"))]
use crate::{ExceptionLevel, LoadRegisterUnsafe, StoreRegisterUnsafe};
use bitfield_struct::bitfield;

/// Memory type encodings used by the firmware.
///
/// A descriptor does not carry a memory type itself; its `AttrIndx` field
/// selects one of the eight bytes of [`Mair`].
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[repr(u8)]
pub enum MemoryType {
    /// Device memory, non-gathering, non-reordering, no early write ack.
    DeviceNgnrne = 0x00,
    /// Normal memory, inner and outer non-cacheable.
    NormalNonCacheable = 0x44,
    /// Normal memory, inner and outer write-through, read/write allocate.
    NormalWriteThrough = 0xBB,
    /// Normal memory, inner and outer write-back, read/write allocate.
    NormalWriteBack = 0xFF,
}

impl MemoryType {
    #[inline]
    #[must_use]
    pub const fn into_bits(self) -> u8 {
        self as u8
    }

    /// Decodes one of the supported encodings.
    #[must_use]
    pub const fn try_from_bits(v: u8) -> Option<Self> {
        match v {
            0x00 => Some(Self::DeviceNgnrne),
            0x44 => Some(Self::NormalNonCacheable),
            0xBB => Some(Self::NormalWriteThrough),
            0xFF => Some(Self::NormalWriteBack),
            _ => None,
        }
    }
}

/// `MAIR_ELx` — Memory Attribute Indirection Register.
#[bitfield(u64)]
#[derive(PartialEq, Eq)]
pub struct Mair {
    /// Bits 0–7 — Attr0.
    pub attr0: u8,
    /// Bits 8–15 — Attr1.
    pub attr1: u8,
    /// Bits 16–23 — Attr2.
    pub attr2: u8,
    /// Bits 24–31 — Attr3.
    pub attr3: u8,
    /// Bits 32–39 — Attr4.
    pub attr4: u8,
    /// Bits 40–47 — Attr5.
    pub attr5: u8,
    /// Bits 48–55 — Attr6.
    pub attr6: u8,
    /// Bits 56–63 — Attr7.
    pub attr7: u8,
}

impl Mair {
    /// `AttrIndx` of [`MemoryType::DeviceNgnrne`] in [`Mair::firmware_default`].
    pub const INDEX_DEVICE: u8 = 0;
    /// `AttrIndx` of [`MemoryType::NormalNonCacheable`].
    pub const INDEX_NON_CACHEABLE: u8 = 1;
    /// `AttrIndx` of [`MemoryType::NormalWriteThrough`].
    pub const INDEX_WRITE_THROUGH: u8 = 2;
    /// `AttrIndx` of [`MemoryType::NormalWriteBack`].
    pub const INDEX_WRITE_BACK: u8 = 3;

    /// The attribute layout assumed by the descriptor attribute encodings.
    ///
    /// ```rust
    /// # use xlat_registers::{Mair, MemoryType};
    /// let mair = Mair::firmware_default();
    /// assert_eq!(mair.memory_type(Mair::INDEX_WRITE_BACK), Some(MemoryType::NormalWriteBack));
    /// assert_eq!(mair.into_bits(), 0xFF_BB_44_00);
    /// ```
    #[must_use]
    pub const fn firmware_default() -> Self {
        Self::new()
            .with_memory_type(Self::INDEX_DEVICE, MemoryType::DeviceNgnrne)
            .with_memory_type(Self::INDEX_NON_CACHEABLE, MemoryType::NormalNonCacheable)
            .with_memory_type(Self::INDEX_WRITE_THROUGH, MemoryType::NormalWriteThrough)
            .with_memory_type(Self::INDEX_WRITE_BACK, MemoryType::NormalWriteBack)
    }

    /// Sets the byte selected by `index` (taken modulo 8).
    #[must_use]
    pub const fn with_memory_type(self, index: u8, ty: MemoryType) -> Self {
        let shift = (index & 0b111) as u32 * 8;
        let bits = self.into_bits() & !(0xFF << shift);
        Self::from_bits(bits | ((ty.into_bits() as u64) << shift))
    }

    /// Memory type selected by `index`, if it is one of the supported encodings.
    #[must_use]
    pub const fn memory_type(self, index: u8) -> Option<MemoryType> {
        let shift = (index & 0b111) as u32 * 8;
        #[allow(clippy::cast_possible_truncation)]
        let byte = (self.into_bits() >> shift) as u8;
        MemoryType::try_from_bits(byte)
    }
}

#[cfg(all(feature = "asm", target_arch = "aarch64"))]
impl LoadRegisterUnsafe for Mair {
    unsafe fn load_unsafe(level: ExceptionLevel) -> Self {
        let mair: u64;
        unsafe {
            match level {
                ExceptionLevel::El1 => {
                    core::arch::asm!("mrs {}, mair_el1", out(reg) mair, options(nomem, nostack, preserves_flags));
                }
                ExceptionLevel::El2 => {
                    core::arch::asm!("mrs {}, mair_el2", out(reg) mair, options(nomem, nostack, preserves_flags));
                }
            }
        }
        Self::from_bits(mair)
    }
}

#[cfg(all(feature = "asm", target_arch = "aarch64"))]
impl StoreRegisterUnsafe for Mair {
    unsafe fn store_unsafe(self, level: ExceptionLevel) {
        let mair = self.into_bits();
        unsafe {
            match level {
                ExceptionLevel::El1 => {
                    core::arch::asm!("msr mair_el1, {}", "isb", in(reg) mair, options(nostack, preserves_flags));
                }
                ExceptionLevel::El2 => {
                    core::arch::asm!("msr mair_el2, {}", "isb", in(reg) mair, options(nostack, preserves_flags));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replacing_a_slot_keeps_the_others() {
        let mair = Mair::firmware_default()
            .with_memory_type(Mair::INDEX_DEVICE, MemoryType::NormalWriteBack);
        assert_eq!(mair.attr0(), 0xFF);
        assert_eq!(mair.attr1(), 0x44);
        assert_eq!(mair.attr3(), 0xFF);
    }

    #[test]
    fn unknown_encoding_is_none() {
        let mair = Mair::new().with_attr5(0x04);
        assert_eq!(mair.memory_type(5), None);
        assert_eq!(mair.memory_type(6), Some(MemoryType::DeviceNgnrne));
    }
}
