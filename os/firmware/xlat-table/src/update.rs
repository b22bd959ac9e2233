//! # Region Walker
//!
//! Applies an [`AttributeUpdate`] to every leaf translating `[start, end)`,
//! reshaping the tree on the way:
//!
//! - A slot whose block is only partly covered is **split**: a new table is
//!   allocated, populated with the block's attributes over its whole range,
//!   and then updated for the covered part.
//! - A table fully covered by an update that retains nothing is
//!   **collapsed** into a single block and its subtree freed.
//! - Any other fully covered slot is rewritten as a block in place.
//!
//! ```text
//!   before                          after set_read_only(0x1000, 0x1000)
//!
//!   L1[0] ── block 0..1G  RW        L1[0] ── table
//!                                             ├─ L2[0] ── table
//!                                             │            ├─ L3[0]   page RW
//!                                             │            ├─ L3[1]   page RO
//!                                             │            └─ L3[2..] pages RW
//!                                             └─ L2[1..] blocks 2M RW
//! ```
//!
//! A table reachable from the active translation is *live*. Tables created
//! during the walk are not live until linked, so everything written into
//! them uses plain stores.

use crate::descriptor::{ATTRIBUTES_MASK, Descriptor};
use crate::replace::{TlbScope, replace_table_entry};
use crate::table::{TranslationTable, allocate_table};
use crate::teardown::free_page_tables_recursive;
use crate::{Geometry, PlatformOps, XlatError};
use log::trace;
use xlat_addresses::{PhysicalAddress, VirtualAddress};

/// Attribute change applied to every leaf of a region.
///
/// The new attributes of a leaf are `(existing & retain) | set`, restricted
/// to the descriptor attribute bits. `retain` names the existing bits that
/// survive; a `retain` of zero overwrites the attributes completely and is
/// the only kind of update allowed to collapse a table into a block.
///
/// ```rust
/// # use xlat_table::{AttributeUpdate, DescriptorAttributes};
/// let ro = DescriptorAttributes::AP_READ_ONLY.bits();
/// let update = AttributeUpdate::new(ro, !ro);
/// assert_eq!(update.apply(0x0000_0000_4000_0705), 0x0000_0000_0000_0784);
/// assert!(!update.allows_collapse());
/// ```
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AttributeUpdate {
    pub set: u64,
    pub retain: u64,
}

impl AttributeUpdate {
    #[inline]
    #[must_use]
    pub const fn new(set: u64, retain: u64) -> Self {
        Self { set, retain }
    }

    /// Replaces all attributes with `set`.
    #[inline]
    #[must_use]
    pub const fn overwrite(set: u64) -> Self {
        Self { set, retain: 0 }
    }

    #[inline]
    #[must_use]
    pub const fn allows_collapse(&self) -> bool {
        self.retain == 0
    }

    /// Attribute bits of a leaf previously holding `existing`.
    #[inline]
    #[must_use]
    pub const fn apply(&self, existing: u64) -> u64 {
        (existing & self.retain & ATTRIBUTES_MASK) | self.set
    }
}

/// One slot visited by the walker.
#[derive(Copy, Clone)]
struct Slot {
    index: usize,
    raw: u64,
    existing: Descriptor,
    start: u64,
    end: u64,
}

pub(crate) struct RegionWalker<'p, P: PlatformOps + ?Sized> {
    platform: &'p mut P,
    geometry: Geometry,
}

impl<'p, P: PlatformOps + ?Sized> RegionWalker<'p, P> {
    pub(crate) const fn new(platform: &'p mut P, geometry: Geometry) -> Self {
        Self { platform, geometry }
    }

    /// Updates `[start, end)` within `table` at `level`.
    ///
    /// Both bounds must be page aligned and lie within the range covered by
    /// `table`.
    pub(crate) fn update(
        &mut self,
        start: u64,
        end: u64,
        update: AttributeUpdate,
        table: PhysicalAddress,
        level: u32,
        table_is_live: bool,
    ) -> Result<(), XlatError> {
        let geometry = self.geometry;
        let block_mask = geometry.block_mask(level);
        let mut view =
            unsafe { TranslationTable::open(&*self.platform, table, geometry.entries_per_table()) };

        let mut start = start;
        while start < end {
            let index = geometry.index(start, level);
            let raw = view.get(index);
            let slot = Slot {
                index,
                raw,
                existing: Descriptor::decode(raw, level, &geometry),
                start,
                end: end.min((start | block_mask).saturating_add(1)),
            };

            let partial = (slot.start | slot.end) & block_mask != 0;
            let keeps_table = slot.existing.is_table() && !update.allows_collapse();
            if level < geometry.first_block_level() || partial || keeps_table {
                self.descend(&mut view, slot, update, level, table_is_live)?;
            } else {
                self.write_block(&mut view, slot, update, level, table_is_live);
            }

            start = slot.end;
        }

        Ok(())
    }

    fn descend(
        &mut self,
        table: &mut TranslationTable,
        slot: Slot,
        update: AttributeUpdate,
        level: u32,
        table_is_live: bool,
    ) -> Result<(), XlatError> {
        let geometry = self.geometry;
        assert!(
            level < geometry.last_level(),
            "region {:#x}..{:#x} needs a table below level {level}",
            slot.start,
            slot.end
        );

        if let Descriptor::Table { next } = slot.existing {
            return self.update(slot.start, slot.end, update, next, level + 1, table_is_live);
        }

        let block_mask = geometry.block_mask(level);
        let block_start = slot.start & !block_mask;
        let child = allocate_table(self.platform, &geometry, level + 1)?;

        if let Descriptor::Block { attributes, .. } = slot.existing {
            // The whole block is rewritten at a level that holds blocks, which
            // never allocates, so only the new page needs releasing.
            let populate = AttributeUpdate::overwrite(attributes.bits());
            let block_end = (slot.start | block_mask).saturating_add(1);
            if let Err(err) = self.update(block_start, block_end, populate, child, level + 1, false) {
                self.platform.free_page(child);
                return Err(err);
            }
            trace!("split level {level} block at {block_start:#x}");
        }

        if let Err(err) = self.update(slot.start, slot.end, update, child, level + 1, false) {
            free_page_tables_recursive(self.platform, &geometry, child, level + 1);
            return Err(err);
        }

        let value = Descriptor::Table { next: child }.encode(level, &geometry);
        let live = table_is_live && slot.existing.is_block();
        replace_table_entry(
            self.platform,
            table,
            slot.index,
            value,
            TlbScope::Entry(VirtualAddress::new(block_start)),
            live,
        );
        Ok(())
    }

    fn write_block(
        &mut self,
        table: &mut TranslationTable,
        slot: Slot,
        update: AttributeUpdate,
        level: u32,
        table_is_live: bool,
    ) {
        let geometry = self.geometry;
        let value = update.apply(slot.raw)
            | (slot.start & geometry.output_address_mask())
            | Descriptor::block_type(level, &geometry);
        let live = table_is_live && slot.existing.is_valid();
        let scope = if slot.existing.is_table() {
            TlbScope::Range {
                base: VirtualAddress::new(slot.start),
                length: geometry.block_size(level),
            }
        } else {
            TlbScope::Entry(VirtualAddress::new(slot.start))
        };
        replace_table_entry(self.platform, table, slot.index, value, scope, live);

        if let Descriptor::Table { next } = slot.existing {
            trace!("collapsed level {level} table at {:#x} into a block", slot.start);
            free_page_tables_recursive(self.platform, &geometry, next, level + 1);
        }
    }
}
