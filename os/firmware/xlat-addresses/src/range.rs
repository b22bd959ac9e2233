use crate::VirtualAddress;
use core::fmt;

/// Half-open range `[start, end)` of virtual addresses.
///
/// Construction rejects ranges whose end would wrap past `2^64`.
///
/// ```rust
/// # use xlat_addresses::*;
/// let r = AddressRange::new(VirtualAddress::new(0x1000), 0x2000).unwrap();
/// assert_eq!(r.end().as_u64(), 0x3000);
/// assert_eq!(r.last().as_u64(), 0x2FFF);
/// assert!(AddressRange::new(VirtualAddress::new(u64::MAX), 2).is_none());
/// ```
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct AddressRange {
    start: VirtualAddress,
    end: VirtualAddress,
}

impl AddressRange {
    /// Range of `length` bytes starting at `start`, or `None` on overflow.
    #[inline]
    #[must_use]
    pub const fn new(start: VirtualAddress, length: u64) -> Option<Self> {
        match start.checked_add(length) {
            Some(end) => Some(Self { start, end }),
            None => None,
        }
    }

    #[inline]
    #[must_use]
    pub const fn start(&self) -> VirtualAddress {
        self.start
    }

    /// Exclusive end.
    #[inline]
    #[must_use]
    pub const fn end(&self) -> VirtualAddress {
        self.end
    }

    /// Inclusive end. Meaningless for an empty range.
    #[inline]
    #[must_use]
    pub const fn last(&self) -> VirtualAddress {
        VirtualAddress::new(self.end.as_u64().wrapping_sub(1))
    }

    #[inline]
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.end.as_u64() - self.start.as_u64()
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    #[must_use]
    pub const fn contains(&self, va: VirtualAddress) -> bool {
        va.as_u64() >= self.start.as_u64() && va.as_u64() < self.end.as_u64()
    }
}

impl fmt::Debug for AddressRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[0x{:016X}, 0x{:016X})",
            self.start.as_u64(),
            self.end.as_u64()
        )
    }
}
