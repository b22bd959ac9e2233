//! # VMSAv8-64 Stage 1 Descriptors
//!
//! Every slot of a translation table is a 64-bit descriptor whose low two
//! bits select its kind:
//!
//! | `[1:0]` | Levels 0‒2 | Last level |
//! |:--------|:-----------|:-----------|
//! | `00` / `10` | invalid | invalid |
//! | `01` | block (from the first block level) | invalid |
//! | `11` | table | page |
//!
//! The page tag of the last level is the table tag of every other level, so
//! a raw descriptor can only be interpreted together with its level. The
//! walker therefore never looks at raw bits directly; it [decodes](Descriptor::decode)
//! into a [`Descriptor`] and [encodes](Descriptor::encode) back when writing.
//!
//! ```text
//!  63      52 51  48 47                    12 11        2 1 0
//! ┌──────────┬──────┬────────────────────────┬───────────┬───┐
//! │ upper    │ res0 │ output / next table    │ lower     │tag│
//! │ attrs    │      │ address                │ attrs     │   │
//! └──────────┴──────┴────────────────────────┴───────────┴───┘
//! ```

use crate::Geometry;
use bitfield_struct::bitfield;
use bitflags::bitflags;
use xlat_addresses::PhysicalAddress;
use xlat_registers::Shareability;

/// Lower (`[11:2]`) and upper (`[63:52]`) attribute bits of a block or page.
pub const ATTRIBUTES_MASK: u64 = (0xFFF << 52) | (0x3FF << 2);

/// Descriptor kind bits.
pub const TYPE_MASK: u64 = 0b11;
/// Block descriptor tag, levels below the last.
pub const TYPE_BLOCK: u64 = 0b01;
/// Table descriptor tag, levels below the last.
pub const TYPE_TABLE: u64 = 0b11;
/// Page descriptor tag, last level only.
pub const TYPE_PAGE: u64 = 0b11;

bitflags! {
    /// Attribute bits of a block or page descriptor.
    ///
    /// Update masks are built from these. `AP_READ_ONLY` is `AP[2]`; the
    /// execute-never bits to use depend on the translation regime (see
    /// [`TranslationRegime::execute_never`](crate::TranslationRegime::execute_never)).
    #[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
    pub struct DescriptorAttributes: u64 {
        /// Bits 2–4 — AttrIndx: index into `MAIR_ELx`.
        const ATTR_INDEX = 0b111 << 2;
        /// Bit 5 — NS: non-secure output address.
        const NON_SECURE = 1 << 5;
        /// Bit 6 — `AP[1]`: accessible from EL0.
        const AP_UNPRIVILEGED = 1 << 6;
        /// Bit 7 — `AP[2]`: read-only.
        const AP_READ_ONLY = 1 << 7;
        /// Bits 6–7 — both access permission bits.
        const AP = 0b11 << 6;
        /// Bits 8–9 — SH = `10`. Also contained in `INNER_SHAREABLE`.
        const OUTER_SHAREABLE = 0b10 << 8;
        /// Bits 8–9 — SH = `11`.
        const INNER_SHAREABLE = 0b11 << 8;
        /// Bit 10 — AF: access flag.
        const ACCESS_FLAG = 1 << 10;
        /// Bit 11 — nG: not global.
        const NOT_GLOBAL = 1 << 11;
        /// Bit 52 — Contiguous hint.
        const CONTIGUOUS = 1 << 52;
        /// Bit 53 — PXN: privileged execute-never (EL1 regime).
        const PXN = 1 << 53;
        /// Bit 54 — UXN at EL1, XN at EL2.
        const UXN = 1 << 54;
        /// Bits 55–58 — reserved for software.
        const SOFTWARE = 0xF << 55;
        /// Bits 59–63 — ignored by the walker (PBHA on some cores).
        const IGNORED = 0x1F << 59;
    }
}

const _: () = assert!(DescriptorAttributes::all().bits() == ATTRIBUTES_MASK);

impl DescriptorAttributes {
    /// Attribute bits of a raw descriptor.
    #[inline]
    #[must_use]
    pub const fn from_descriptor(raw: u64) -> Self {
        Self::from_bits_retain(raw & ATTRIBUTES_MASK)
    }

    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn attr_index(self) -> u8 {
        ((self.bits() >> 2) & 0b111) as u8
    }

    #[inline]
    #[must_use]
    pub const fn with_attr_index(self, index: u8) -> Self {
        let bits = self.bits() & !Self::ATTR_INDEX.bits();
        Self::from_bits_retain(bits | (((index & 0b111) as u64) << 2))
    }
}

/// Field view of a block or page descriptor (4 KiB granule layout).
#[bitfield(u64)]
pub struct BlockDescriptor {
    /// Bit 0 — valid.
    pub valid: bool,

    /// Bit 1 — set for last-level pages, clear for blocks.
    pub page: bool,

    /// Bits 2–4 — AttrIndx.
    #[bits(3)]
    pub attr_index: u8,

    /// Bit 5 — NS.
    pub non_secure: bool,

    /// Bits 6–7 — `AP[2:1]`.
    #[bits(2)]
    pub access_permissions: u8,

    /// Bits 8–9 — SH.
    #[bits(2, default = Shareability::NonShareable)]
    pub shareability: Shareability,

    /// Bit 10 — AF.
    pub access_flag: bool,

    /// Bit 11 — nG.
    pub not_global: bool,

    /// Bits 12–47 — output address >> 12.
    #[bits(36)]
    pub output_frame: u64,

    /// Bits 48–50 — Reserved.
    #[bits(3)]
    pub reserved0: u8,

    /// Bit 51 — DBM: dirty bit modifier.
    pub dirty_bit_modifier: bool,

    /// Bit 52 — Contiguous.
    pub contiguous: bool,

    /// Bit 53 — PXN.
    pub pxn: bool,

    /// Bit 54 — UXN / XN.
    pub uxn: bool,

    /// Bits 55–58 — software use.
    #[bits(4)]
    pub software: u8,

    /// Bits 59–63 — ignored.
    #[bits(5)]
    pub ignored: u8,
}

/// Field view of a table descriptor (4 KiB granule layout).
///
/// The hierarchical controls in the top bits are never set by this crate;
/// all attributes live on the leaves.
#[bitfield(u64)]
pub struct TableDescriptor {
    /// Bit 0 — valid.
    pub valid: bool,

    /// Bit 1 — table (always set for a table descriptor).
    pub table: bool,

    /// Bits 2–11 — ignored.
    #[bits(10)]
    pub ignored0: u16,

    /// Bits 12–47 — next-level table address >> 12.
    #[bits(36)]
    pub next_frame: u64,

    /// Bits 48–51 — Reserved.
    #[bits(4)]
    pub reserved0: u8,

    /// Bits 52–58 — ignored.
    #[bits(7)]
    pub ignored1: u8,

    /// Bit 59 — PXNTable.
    pub pxn_table: bool,

    /// Bit 60 — XNTable / UXNTable.
    pub xn_table: bool,

    /// Bits 61–62 — APTable.
    #[bits(2)]
    pub ap_table: u8,

    /// Bit 63 — NSTable.
    pub ns_table: bool,
}

/// A decoded descriptor.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Descriptor {
    Invalid,
    /// A block or last-level page.
    Block {
        output: PhysicalAddress,
        attributes: DescriptorAttributes,
    },
    /// A pointer to the next-level table.
    Table { next: PhysicalAddress },
}

impl Descriptor {
    /// Tag of a leaf written at `level`.
    #[inline]
    #[must_use]
    pub const fn block_type(level: u32, geometry: &Geometry) -> u64 {
        if level == geometry.last_level() {
            TYPE_PAGE
        } else {
            TYPE_BLOCK
        }
    }

    /// Interprets `raw` as found in a table at `level`.
    ///
    /// ```rust
    /// # use xlat_table::{Descriptor, Geometry};
    /// let g = Geometry::AARCH64_4K;
    /// // the same bits are a table at level 2 and a page at level 3
    /// assert!(matches!(Descriptor::decode(0x4000_0003, 2, &g), Descriptor::Table { .. }));
    /// assert!(matches!(Descriptor::decode(0x4000_0003, 3, &g), Descriptor::Block { .. }));
    /// ```
    #[must_use]
    pub const fn decode(raw: u64, level: u32, geometry: &Geometry) -> Self {
        let address = PhysicalAddress::new(raw & geometry.output_address_mask());
        let last = level == geometry.last_level();
        match (raw & TYPE_MASK, last) {
            (TYPE_PAGE, true) => Self::Block {
                output: address,
                attributes: DescriptorAttributes::from_descriptor(raw),
            },
            (TYPE_TABLE, false) => Self::Table { next: address },
            (TYPE_BLOCK, false) if level >= geometry.first_block_level() => Self::Block {
                output: address,
                attributes: DescriptorAttributes::from_descriptor(raw),
            },
            _ => Self::Invalid,
        }
    }

    /// Raw form for a table at `level`.
    #[must_use]
    pub const fn encode(self, level: u32, geometry: &Geometry) -> u64 {
        let mask = geometry.output_address_mask();
        match self {
            Self::Invalid => 0,
            Self::Block { output, attributes } => {
                (attributes.bits() & ATTRIBUTES_MASK)
                    | (output.as_u64() & mask)
                    | Self::block_type(level, geometry)
            }
            Self::Table { next } => {
                let tag = TableDescriptor::new().with_valid(true).with_table(true);
                tag.into_bits() | (next.as_u64() & mask)
            }
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        !matches!(self, Self::Invalid)
    }

    #[inline]
    #[must_use]
    pub const fn is_block(&self) -> bool {
        matches!(self, Self::Block { .. })
    }

    #[inline]
    #[must_use]
    pub const fn is_table(&self) -> bool {
        matches!(self, Self::Table { .. })
    }
}
