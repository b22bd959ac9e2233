//! # Tree Geometry
//!
//! The shape of a translation table tree: page size, bits resolved per level
//! and number of levels. Everything the walker needs to know about block sizes
//! and slot indices is derived from these three numbers and the configured
//! T0SZ.
//!
//! For the AArch64 4 KiB granule:
//!
//! ```text
//! | 47‒39 | 38‒30 | 29‒21 | 20‒12 | 11‒0   |
//! |  L0   |  L1   |  L2   |  L3   | Offset |
//! ```
//!
//! | Level | Block size | Holds blocks |
//! |:------|:-----------|:-------------|
//! | 0 | 512 GiB | no, tables only |
//! | 1 | 1 GiB | yes |
//! | 2 | 2 MiB | yes |
//! | 3 | 4 KiB | yes (pages) |
//!
//! A larger T0SZ shrinks the input address space. The walk then starts at a
//! deeper level, and the root table may hold fewer than 512 entries:
//!
//! ```rust
//! # use xlat_table::Geometry;
//! let g = Geometry::AARCH64_4K;
//! let root = g.root_table_info(20);
//! assert_eq!((root.level, root.entry_count), (0, 32));
//! ```

use crate::XlatError;

/// Parameters of a radix translation tree.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Geometry {
    page_shift: u32,
    bits_per_level: u32,
    levels: u32,
    first_block_level: u32,
}

/// Where the walk starts for a given T0SZ.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RootTableInfo {
    /// Level of the root table.
    pub level: u32,
    /// Number of entries used in the root table.
    pub entry_count: usize,
}

impl Geometry {
    /// AArch64 with a 4 KiB translation granule.
    pub const AARCH64_4K: Self = Self::new(12, 9, 4, 1);

    /// # Panics
    /// If the levels do not fit into a 64-bit address, or if
    /// `first_block_level` is not a valid level.
    #[must_use]
    pub const fn new(page_shift: u32, bits_per_level: u32, levels: u32, first_block_level: u32) -> Self {
        assert!(bits_per_level > 0 && levels > 0, "empty geometry");
        assert!(
            page_shift + levels * bits_per_level < 64,
            "geometry exceeds the 64-bit address space"
        );
        assert!(first_block_level < levels, "first block level out of range");
        Self {
            page_shift,
            bits_per_level,
            levels,
            first_block_level,
        }
    }

    #[inline]
    #[must_use]
    pub const fn page_shift(&self) -> u32 {
        self.page_shift
    }

    #[inline]
    #[must_use]
    pub const fn page_size(&self) -> u64 {
        1 << self.page_shift
    }

    #[inline]
    #[must_use]
    pub const fn bits_per_level(&self) -> u32 {
        self.bits_per_level
    }

    #[inline]
    #[must_use]
    pub const fn levels(&self) -> u32 {
        self.levels
    }

    /// Shallowest level allowed to hold block descriptors.
    #[inline]
    #[must_use]
    pub const fn first_block_level(&self) -> u32 {
        self.first_block_level
    }

    /// Deepest level, holding page descriptors.
    #[inline]
    #[must_use]
    pub const fn last_level(&self) -> u32 {
        self.levels - 1
    }

    #[inline]
    #[must_use]
    pub const fn entries_per_table(&self) -> usize {
        1 << self.bits_per_level
    }

    /// Bytes occupied by a full table.
    #[inline]
    #[must_use]
    pub const fn table_size(&self) -> u64 {
        (self.entries_per_table() * size_of::<u64>()) as u64
    }

    /// T0SZ translating the most address bits.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn min_t0sz(&self) -> u8 {
        (64 - self.page_shift - self.levels * self.bits_per_level) as u8
    }

    /// T0SZ translating the fewest address bits, with a single-entry
    /// table at the last level as root.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn max_t0sz(&self) -> u8 {
        self.min_t0sz() + (self.levels * self.bits_per_level - 1) as u8
    }

    /// # Errors
    /// [`XlatError::InvalidT0sz`] if `t0sz` is outside
    /// [`min_t0sz`](Self::min_t0sz)`..=`[`max_t0sz`](Self::max_t0sz).
    pub const fn validate_t0sz(&self, t0sz: u8) -> Result<u8, XlatError> {
        if t0sz < self.min_t0sz() || t0sz > self.max_t0sz() {
            return Err(XlatError::InvalidT0sz(t0sz));
        }
        Ok(t0sz)
    }

    /// Root level and root entry count for a validated `t0sz`.
    ///
    /// # Panics
    /// If `t0sz` is below [`min_t0sz`](Self::min_t0sz). Run it through
    /// [`validate_t0sz`](Self::validate_t0sz) first.
    #[must_use]
    pub const fn root_table_info(&self, t0sz: u8) -> RootTableInfo {
        assert!(t0sz >= self.min_t0sz(), "T0SZ below the geometry minimum");
        let extra = (t0sz - self.min_t0sz()) as u32;
        RootTableInfo {
            level: extra / self.bits_per_level,
            entry_count: self.entries_per_table() >> (extra % self.bits_per_level),
        }
    }

    /// Number of high address bits above the offset into a block at `level`.
    #[inline]
    #[must_use]
    pub const fn block_shift(&self, level: u32) -> u32 {
        (level + 1) * self.bits_per_level + self.min_t0sz() as u32
    }

    /// Offset bits of a block at `level`.
    #[inline]
    #[must_use]
    pub const fn block_mask(&self, level: u32) -> u64 {
        u64::MAX >> self.block_shift(level)
    }

    #[inline]
    #[must_use]
    pub const fn block_size(&self, level: u32) -> u64 {
        self.block_mask(level) + 1
    }

    /// Slot of `va` in a table at `level`.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn index(&self, va: u64, level: u32) -> usize {
        ((va >> (64 - self.block_shift(level))) & (self.entries_per_table() as u64 - 1)) as usize
    }

    /// Output address bits `[47:page_shift]` of a descriptor.
    #[inline]
    #[must_use]
    pub const fn output_address_mask(&self) -> u64 {
        ((1 << 48) - 1) & !(self.page_size() - 1)
    }

    /// Exclusive upper bound of the input address space for `t0sz`.
    ///
    /// # Panics
    /// If `t0sz` is zero, which leaves no representable bound.
    #[inline]
    #[must_use]
    pub const fn va_limit(&self, t0sz: u8) -> u64 {
        assert!(t0sz > 0, "T0SZ 0 has no 64-bit address limit");
        1 << (64 - t0sz as u32)
    }

    /// Smallest input address space covering `max_address`, clamped to the
    /// supported range.
    ///
    /// ```rust
    /// # use xlat_table::Geometry;
    /// let g = Geometry::AARCH64_4K;
    /// assert_eq!(g.t0sz_for_max_address((1 << 48) - 1), 16);
    /// assert_eq!(g.t0sz_for_max_address((1 << 30) - 1), 34);
    /// assert_eq!(g.t0sz_for_max_address(u64::MAX), 16);
    /// ```
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn t0sz_for_max_address(&self, max_address: u64) -> u8 {
        let bits = 64 - max_address.leading_zeros();
        let t0sz = (64 - bits) as u8;
        if t0sz < self.min_t0sz() {
            self.min_t0sz()
        } else if t0sz > self.max_t0sz() {
            self.max_t0sz()
        } else {
            t0sz
        }
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Self::AARCH64_4K
    }
}

const _: () = assert!(Geometry::AARCH64_4K.min_t0sz() == 16);
const _: () = assert!(Geometry::AARCH64_4K.max_t0sz() == 51);
const _: () = assert!(Geometry::AARCH64_4K.entries_per_table() == 512);
const _: () = assert!(Geometry::AARCH64_4K.table_size() == Geometry::AARCH64_4K.page_size());
const _: () = assert!(Geometry::AARCH64_4K.block_size(1) == 1 << 30);
const _: () = assert!(Geometry::AARCH64_4K.block_size(3) == 4096);
