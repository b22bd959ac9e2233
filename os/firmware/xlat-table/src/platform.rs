//! # Platform Operations
//!
//! Everything the engine needs from the machine it runs on: table memory,
//! cache and TLB maintenance, and the current translation configuration.
//! Threading these through a trait instead of calling global routines lets
//! the same walker run on hardware and in host tests
//! (see [`HeapPlatform`](crate::HeapPlatform)).

use crate::replace::{TlbScope, break_before_make};
use xlat_addresses::{PhysicalAddress, VirtualAddress};
use xlat_registers::{Mair, Tcr};

/// Capabilities the translation table engine borrows from the platform.
///
/// Only a single mutator may drive an implementation at a time. Hardware
/// table walkers on other cores may read the tables concurrently.
pub trait PlatformOps {
    /// Size of the pages handed out by [`allocate_page`](Self::allocate_page).
    fn page_size(&self) -> u64;

    /// Allocates one naturally aligned page of [`page_size`](Self::page_size)
    /// bytes for a translation table.
    fn allocate_page(&mut self) -> Option<PhysicalAddress>;

    /// Returns a page obtained from [`allocate_page`](Self::allocate_page).
    fn free_page(&mut self, page: PhysicalAddress);

    /// Pointer through which the table at `page` is accessed.
    ///
    /// Identity by default, which is how firmware sees its own tables.
    #[allow(clippy::cast_possible_truncation)]
    fn table_pointer(&self, page: PhysicalAddress) -> *mut u64 {
        core::ptr::with_exposed_provenance_mut(page.as_u64() as usize)
    }

    /// Discards cached lines for `length` bytes at `base`.
    fn invalidate_cache_range(&mut self, _base: PhysicalAddress, _length: u64) {}

    /// Cleans cached lines for `length` bytes at `base` to the point of coherency.
    fn write_back_cache_range(&mut self, _base: PhysicalAddress, _length: u64) {}

    /// Whether the executing core currently translates through these tables.
    fn is_translation_active(&self) -> bool;

    /// Synchronization hook after a direct store to `slot`, a descriptor
    /// translating `va`.
    fn update_translation_table_entry(&mut self, _slot: PhysicalAddress, _va: VirtualAddress) {}

    /// Drops any cached translation of `va`.
    fn invalidate_tlb_entry(&mut self, va: VirtualAddress);

    /// Drops cached translations and walk cache entries for every address in
    /// `[base, base + length)`.
    fn invalidate_tlb_range(&mut self, base: VirtualAddress, length: u64);

    /// Full data synchronization and instruction barrier.
    fn barrier(&mut self);

    /// Replaces a descriptor that a hardware walker may be using.
    ///
    /// The default is a break-before-make sequence. Platforms that must not
    /// lose the mapping of the code performing the update (for example when
    /// remapping their own text) override this with a routine that runs with
    /// translation briefly disabled.
    ///
    /// # Safety
    /// `slot` must point at a descriptor inside a table owned by the caller,
    /// and `scope` must cover every address the old descriptor translates.
    unsafe fn replace_live_entry(&mut self, slot: *mut u64, value: u64, scope: TlbScope) {
        unsafe { break_before_make(self, slot, value, scope) }
    }

    /// Currently configured T0SZ.
    fn t0sz(&self) -> u8;

    /// Root table of the current translation.
    fn root_table(&self) -> PhysicalAddress;

    /// Programs the translation registers for a new root table.
    fn install_translation(&mut self, root: PhysicalAddress, tcr: Tcr, mair: Mair);

    /// Turns translation on.
    fn enable_translation(&mut self);
}

impl<T: PlatformOps + ?Sized> PlatformOps for &mut T {
    fn page_size(&self) -> u64 {
        (**self).page_size()
    }

    fn allocate_page(&mut self) -> Option<PhysicalAddress> {
        (**self).allocate_page()
    }

    fn free_page(&mut self, page: PhysicalAddress) {
        (**self).free_page(page);
    }

    fn table_pointer(&self, page: PhysicalAddress) -> *mut u64 {
        (**self).table_pointer(page)
    }

    fn invalidate_cache_range(&mut self, base: PhysicalAddress, length: u64) {
        (**self).invalidate_cache_range(base, length);
    }

    fn write_back_cache_range(&mut self, base: PhysicalAddress, length: u64) {
        (**self).write_back_cache_range(base, length);
    }

    fn is_translation_active(&self) -> bool {
        (**self).is_translation_active()
    }

    fn update_translation_table_entry(&mut self, slot: PhysicalAddress, va: VirtualAddress) {
        (**self).update_translation_table_entry(slot, va);
    }

    fn invalidate_tlb_entry(&mut self, va: VirtualAddress) {
        (**self).invalidate_tlb_entry(va);
    }

    fn invalidate_tlb_range(&mut self, base: VirtualAddress, length: u64) {
        (**self).invalidate_tlb_range(base, length);
    }

    fn barrier(&mut self) {
        (**self).barrier();
    }

    unsafe fn replace_live_entry(&mut self, slot: *mut u64, value: u64, scope: TlbScope) {
        unsafe { (**self).replace_live_entry(slot, value, scope) }
    }

    fn t0sz(&self) -> u8 {
        (**self).t0sz()
    }

    fn root_table(&self) -> PhysicalAddress {
        (**self).root_table()
    }

    fn install_translation(&mut self, root: PhysicalAddress, tcr: Tcr, mair: Mair) {
        (**self).install_translation(root, tcr, mair);
    }

    fn enable_translation(&mut self) {
        (**self).enable_translation();
    }
}
