use crate::{MemoryAddress, VirtualAddress};
use core::fmt;
use core::ptr::NonNull;

/// Physical memory address.
///
/// Denotes translation table **output** addresses, and the location of the
/// table pages themselves.
///
/// ### Examples
/// ```rust
/// # use xlat_addresses::*;
/// let pa = PhysicalAddress::new(0x4000_0000);
/// assert!(pa.is_aligned_to_shift(30));
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysicalAddress(MemoryAddress);

impl PhysicalAddress {
    #[inline]
    #[must_use]
    pub const fn new(v: u64) -> Self {
        Self(MemoryAddress::new(v))
    }

    #[inline]
    #[must_use]
    pub const fn from_nonnull<T>(ptr: NonNull<T>) -> Self {
        Self(MemoryAddress::from_nonnull(ptr))
    }

    /// Physical address equal to `va` under an identity mapping.
    #[inline]
    #[must_use]
    pub const fn from_identity(va: VirtualAddress) -> Self {
        Self::new(va.as_u64())
    }

    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0.as_u64()
    }

    #[inline]
    #[must_use]
    pub const fn align_down_to_shift(self, shift: u32) -> Self {
        Self(self.0.align_down_to_shift(shift))
    }

    #[inline]
    #[must_use]
    pub const fn is_aligned_to_shift(self, shift: u32) -> bool {
        self.0.is_aligned_to_shift(shift)
    }

    /// Byte offset into this address. Table slots are located this way.
    #[inline]
    #[must_use]
    pub const fn offset(self, bytes: u64) -> Self {
        Self::new(self.as_u64() + bytes)
    }
}

impl fmt::Debug for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PA(0x{:016X})", self.as_u64())
    }
}

impl fmt::Display for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016X}", self.as_u64())
    }
}

impl fmt::LowerHex for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.as_u64(), f)
    }
}

impl From<u64> for PhysicalAddress {
    #[inline]
    fn from(v: u64) -> Self {
        Self::new(v)
    }
}

impl From<PhysicalAddress> for u64 {
    #[inline]
    fn from(v: PhysicalAddress) -> Self {
        v.as_u64()
    }
}

impl From<PhysicalAddress> for MemoryAddress {
    #[inline]
    fn from(v: PhysicalAddress) -> Self {
        v.0
    }
}
