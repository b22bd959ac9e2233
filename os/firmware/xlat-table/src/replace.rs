//! # Entry Replacement
//!
//! A descriptor is either written directly or, when a hardware walker may be
//! translating through it, replaced with break-before-make:
//!
//! ```text
//!  store invalid ─► barrier ─► TLBI scope ─► barrier ─► store new ─► barrier
//! ```
//!
//! Between the two stores no walker can hold the old translation, so it
//! never observes a mix of old and new attributes for the same address. A
//! replaced block is dropped from the TLB by its address. A replaced table may
//! have left translations for any address below it, so its whole range is
//! invalidated, walk caches included, before the table can be freed.
//! Slots that were invalid cannot be cached by a walker and always take the
//! direct path.

use crate::table::TranslationTable;
use crate::PlatformOps;
use xlat_addresses::VirtualAddress;

/// Translations the old descriptor of a slot may have left cached.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TlbScope {
    /// A leaf translating the block at this address.
    Entry(VirtualAddress),
    /// A table translating `length` bytes at `base`.
    Range { base: VirtualAddress, length: u64 },
}

impl TlbScope {
    /// First address translated through the slot.
    #[inline]
    #[must_use]
    pub const fn base(self) -> VirtualAddress {
        match self {
            Self::Entry(va) => va,
            Self::Range { base, .. } => base,
        }
    }
}

/// Writes `value` into slot `index` of `table`.
///
/// `live` states that the slot held a valid descriptor in a table reachable
/// from the active translation; combined with the platform's translation
/// state it selects the break-before-make path.
pub(crate) fn replace_table_entry<P: PlatformOps + ?Sized>(
    platform: &mut P,
    table: &mut TranslationTable,
    index: usize,
    value: u64,
    scope: TlbScope,
    live: bool,
) {
    if live && platform.is_translation_active() {
        let slot = table.slot_ptr(index);
        unsafe { platform.replace_live_entry(slot, value, scope) }
    } else {
        table.set(index, value);
        platform.update_translation_table_entry(table.slot_address(index), scope.base());
    }
}

/// Break-before-make replacement of the descriptor at `slot`.
///
/// # Safety
/// `slot` must be valid for volatile reads and writes.
pub unsafe fn break_before_make<P: PlatformOps + ?Sized>(
    platform: &mut P,
    slot: *mut u64,
    value: u64,
    scope: TlbScope,
) {
    unsafe { slot.write_volatile(0) };
    platform.barrier();
    match scope {
        TlbScope::Entry(va) => platform.invalidate_tlb_entry(va),
        TlbScope::Range { base, length } => platform.invalidate_tlb_range(base, length),
    }
    platform.barrier();
    unsafe { slot.write_volatile(value) };
    platform.barrier();
}
