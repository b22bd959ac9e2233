//! # Queries
//!
//! Read-only walks of the installed tree. None of these write to a table or
//! call any maintenance operation of the platform.

use crate::descriptor::{Descriptor, DescriptorAttributes};
use crate::table::TranslationTable;
use crate::tables::validate_range;
use crate::{Geometry, MemoryAttributes, PlatformOps, TranslationRegime, TranslationTables, XlatError, from_descriptor_attributes};
use xlat_addresses::{PhysicalAddress, VirtualAddress};

/// A valid leaf of the tree.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Mapping {
    /// First address translated by the leaf.
    pub base: VirtualAddress,
    pub output: PhysicalAddress,
    /// Size of the block or page.
    pub length: u64,
    pub level: u32,
    pub attributes: DescriptorAttributes,
}

impl Mapping {
    #[must_use]
    pub fn memory_attributes(&self, regime: TranslationRegime) -> MemoryAttributes {
        from_descriptor_attributes(self.attributes, regime)
    }

    /// Exclusive end of the translated range.
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.base.as_u64().saturating_add(self.length)
    }
}

impl<P: PlatformOps> TranslationTables<P> {
    /// The leaf translating `address`, if any.
    #[must_use]
    pub fn lookup(&self, address: VirtualAddress) -> Option<Mapping> {
        let geometry = self.geometry();
        let root = self.root().ok()?;
        let va = address.as_u64();
        if va >= geometry.va_limit(root.t0sz) {
            return None;
        }

        let mut table = root.table;
        let mut level = root.info.level;
        loop {
            let view = unsafe { TranslationTable::open(self.platform(), table, geometry.entries_per_table()) };
            match Descriptor::decode(view.get(geometry.index(va, level)), level, &geometry) {
                Descriptor::Invalid => return None,
                Descriptor::Block { output, attributes } => {
                    let mask = geometry.block_mask(level);
                    return Some(Mapping {
                        base: VirtualAddress::new(va & !mask),
                        output,
                        length: mask + 1,
                        level,
                        attributes,
                    });
                }
                Descriptor::Table { next } => {
                    table = next;
                    level += 1;
                }
            }
        }
    }

    /// Attributes shared by every leaf of `[base, base + length)`.
    ///
    /// # Errors
    /// - [`XlatError::InvalidArgument`] for an empty, unaligned or
    ///   out-of-range request.
    /// - [`XlatError::NotMapped`] with the first address without a valid leaf.
    /// - [`XlatError::InconsistentAttributes`] with the first address whose
    ///   leaf differs from the leaf at `base`.
    pub fn query_attributes(&self, base: VirtualAddress, length: u64) -> Result<DescriptorAttributes, XlatError> {
        let root = self.root()?;
        let range = validate_range(&self.geometry(), root.t0sz, base, length)?;
        if range.is_empty() {
            return Err(XlatError::InvalidArgument { base, length });
        }

        let mut common = None;
        let mut va = range.start().as_u64();
        while va < range.end().as_u64() {
            let address = VirtualAddress::new(va);
            let Some(mapping) = self.lookup(address) else {
                return Err(XlatError::NotMapped(address));
            };
            match common {
                None => common = Some(mapping.attributes),
                Some(attributes) if attributes != mapping.attributes => {
                    return Err(XlatError::InconsistentAttributes(address));
                }
                Some(_) => {}
            }
            va = mapping.end();
        }

        common.ok_or(XlatError::InvalidArgument { base, length })
    }

    /// Calls `f` for every valid leaf, in address order.
    pub fn for_each_leaf<F: FnMut(&Mapping)>(&self, mut f: F) {
        let Ok(root) = self.root() else {
            return;
        };
        self.visit_leaves(root.table, root.info.level, root.info.entry_count, 0, &mut f);
    }

    /// Number of table pages reachable from the root, the root included.
    #[must_use]
    pub fn table_count(&self) -> usize {
        let Ok(root) = self.root() else {
            return 0;
        };
        let mut count = 0;
        visit_tables(self.platform(), &self.geometry(), root.table, root.info.level, &mut |_| count += 1);
        count
    }

    fn visit_leaves(&self, table: PhysicalAddress, level: u32, entries: usize, base: u64, f: &mut dyn FnMut(&Mapping)) {
        let geometry = self.geometry();
        let view = unsafe { TranslationTable::open(self.platform(), table, geometry.entries_per_table()) };
        let length = geometry.block_size(level);

        for index in 0..entries {
            let va = base + index as u64 * length;
            match Descriptor::decode(view.get(index), level, &geometry) {
                Descriptor::Invalid => {}
                Descriptor::Block { output, attributes } => f(&Mapping {
                    base: VirtualAddress::new(va),
                    output,
                    length,
                    level,
                    attributes,
                }),
                Descriptor::Table { next } => {
                    self.visit_leaves(next, level + 1, geometry.entries_per_table(), va, f);
                }
            }
        }
    }
}

/// Calls `f` with `table` and every table below it, parents first.
pub(crate) fn visit_tables<P: PlatformOps + ?Sized>(
    platform: &P,
    geometry: &Geometry,
    table: PhysicalAddress,
    level: u32,
    f: &mut dyn FnMut(PhysicalAddress),
) {
    f(table);
    if level == geometry.last_level() {
        return;
    }

    let view = unsafe { TranslationTable::open(platform, table, geometry.entries_per_table()) };
    for index in 0..view.len() {
        if let Descriptor::Table { next } = Descriptor::decode(view.get(index), level, geometry) {
            visit_tables(platform, geometry, next, level + 1, f);
        }
    }
}
