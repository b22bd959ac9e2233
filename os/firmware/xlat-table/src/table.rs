use crate::{Geometry, PlatformOps, XlatError};
use core::ptr::NonNull;
use log::{trace, warn};
use xlat_addresses::PhysicalAddress;

/// View of one translation table page.
///
/// Entries are read and written with volatile accesses since hardware walkers
/// may observe the page at any time. The view does not own the page;
/// ownership follows the table descriptors of the tree.
pub struct TranslationTable {
    base: PhysicalAddress,
    entries: NonNull<u64>,
    len: usize,
}

impl TranslationTable {
    /// Opens the table at `base` through the platform's table pointer.
    ///
    /// # Safety
    /// `base` must be a table page of at least `len` entries that stays
    /// allocated, and is not accessed through any other view, while the
    /// returned view is used.
    ///
    /// # Panics
    /// If the platform maps `base` to a null pointer.
    pub unsafe fn open<P: PlatformOps + ?Sized>(platform: &P, base: PhysicalAddress, len: usize) -> Self {
        let Some(entries) = NonNull::new(platform.table_pointer(base)) else {
            panic!("translation table at {base} maps to a null pointer");
        };
        Self { base, entries, len }
    }

    #[inline]
    #[must_use]
    pub const fn base(&self) -> PhysicalAddress {
        self.base
    }

    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// # Panics
    /// If `index` is out of bounds.
    #[inline]
    #[must_use]
    pub fn get(&self, index: usize) -> u64 {
        assert!(index < self.len, "table index {index} out of bounds");
        unsafe { self.entries.add(index).read_volatile() }
    }

    /// # Panics
    /// If `index` is out of bounds.
    #[inline]
    pub fn set(&mut self, index: usize, value: u64) {
        unsafe { self.slot_ptr(index).write_volatile(value) }
    }

    /// Raw pointer to the slot, for live replacement sequences.
    ///
    /// # Panics
    /// If `index` is out of bounds.
    #[inline]
    #[must_use]
    pub fn slot_ptr(&mut self, index: usize) -> *mut u64 {
        assert!(index < self.len, "table index {index} out of bounds");
        unsafe { self.entries.add(index).as_ptr() }
    }

    /// Address of the slot as seen by the hardware walker.
    #[inline]
    #[must_use]
    pub const fn slot_address(&self, index: usize) -> PhysicalAddress {
        self.base.offset((index * size_of::<u64>()) as u64)
    }

    pub fn zero(&mut self) {
        for index in 0..self.len {
            self.set(index, 0);
        }
    }
}

/// Allocates and clears a table page for `level`.
///
/// While translation is off the page's cache lines are invalidated first, so
/// no stale line is written back over the cleared entries later.
pub(crate) fn allocate_table<P: PlatformOps + ?Sized>(
    platform: &mut P,
    geometry: &Geometry,
    level: u32,
) -> Result<PhysicalAddress, XlatError> {
    let Some(page) = platform.allocate_page() else {
        warn!("out of memory allocating a level {level} translation table");
        return Err(XlatError::OutOfMemory);
    };

    if !platform.is_translation_active() {
        platform.invalidate_cache_range(page, geometry.page_size());
    }

    let mut table = unsafe { TranslationTable::open(&*platform, page, geometry.entries_per_table()) };
    table.zero();
    trace!("allocated level {level} translation table at {page}");
    Ok(page)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HeapPlatform;

    #[test]
    fn allocated_tables_are_zeroed() {
        let mut platform = HeapPlatform::new();
        let g = Geometry::AARCH64_4K;
        let page = allocate_table(&mut platform, &g, 1).unwrap();
        let mut table = unsafe { TranslationTable::open(&platform, page, g.entries_per_table()) };
        assert!((0..table.len()).all(|i| table.get(i) == 0));

        table.set(511, 0xDEAD_0003);
        assert_eq!(table.get(511), 0xDEAD_0003);
        assert_eq!(table.slot_address(511).as_u64(), page.as_u64() + 511 * 8);
        platform.free_page(page);
    }

    #[test]
    fn allocation_failure_is_out_of_memory() {
        let mut platform = HeapPlatform::new().fail_after(0);
        let g = Geometry::AARCH64_4K;
        assert_eq!(allocate_table(&mut platform, &g, 2), Err(XlatError::OutOfMemory));
        assert_eq!(platform.live_pages(), 0);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn index_is_bounds_checked() {
        let mut platform = HeapPlatform::new();
        let g = Geometry::AARCH64_4K;
        let page = allocate_table(&mut platform, &g, 1).unwrap();
        let table = unsafe { TranslationTable::open(&platform, page, g.entries_per_table()) };
        let _ = table.get(512);
    }
}
