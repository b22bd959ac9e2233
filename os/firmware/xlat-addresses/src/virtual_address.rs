use crate::MemoryAddress;
use core::fmt;

/// Virtual memory address.
///
/// A thin wrapper around [`MemoryAddress`] that denotes translation table
/// **input** addresses. It carries no canonicality check; the upper bound is
/// given by the configured T0SZ and enforced where ranges are validated.
///
/// ### Examples
/// ```rust
/// # use xlat_addresses::*;
/// let va = VirtualAddress::new(0x8020_0000);
/// assert!(va.is_aligned_to_shift(21));
/// assert_eq!(va.checked_add(0x1000).unwrap().as_u64(), 0x8020_1000);
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VirtualAddress(MemoryAddress);

impl VirtualAddress {
    #[inline]
    #[must_use]
    pub const fn new(v: u64) -> Self {
        Self(MemoryAddress::new(v))
    }

    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self::new(0)
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

    #[inline]
    #[must_use]
    pub const fn block_last(self, mask: u64) -> Self {
        Self(self.0.block_last(mask))
    }

    #[inline]
    #[must_use]
    pub const fn checked_add(self, rhs: u64) -> Option<Self> {
        match self.0.checked_add(rhs) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }
}

impl fmt::Debug for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VA(0x{:016X})", self.as_u64())
    }
}

impl fmt::Display for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016X}", self.as_u64())
    }
}

impl fmt::LowerHex for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.as_u64(), f)
    }
}

impl From<u64> for VirtualAddress {
    #[inline]
    fn from(v: u64) -> Self {
        Self::new(v)
    }
}

impl From<VirtualAddress> for u64 {
    #[inline]
    fn from(v: VirtualAddress) -> Self {
        v.as_u64()
    }
}

impl From<VirtualAddress> for MemoryAddress {
    #[inline]
    fn from(v: VirtualAddress) -> Self {
        v.0
    }
}
