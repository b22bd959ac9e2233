//! # Heap-backed Platform
//!
//! A [`PlatformOps`] implementation that keeps table pages in host memory and
//! records every maintenance call instead of executing it. Physical addresses
//! are frame numbers offset by [`HeapPlatform::FRAME_BASE`], so the tree's
//! addresses are stable from run to run. With the default 4 KiB pages:
//!
//! ```text
//!   PA 0x8000_0000 ─► frames[0]
//!   PA 0x8000_1000 ─► frames[1]
//!   ...
//! ```
//!
//! Other page sizes are chosen with [`HeapPlatform::with_page_shift`].
//!
//! Used by this crate's tests, and useful for building a tree on a host and
//! inspecting it before it goes anywhere near an MMU.

use crate::PlatformOps;
use crate::replace::TlbScope;
use alloc::alloc::{Layout, alloc_zeroed, dealloc};
use alloc::vec::Vec;
use core::ptr::NonNull;
use log::trace;
use xlat_addresses::{PhysicalAddress, VirtualAddress};
use xlat_registers::{Mair, Sctlr, Tcr};

/// One recorded platform call.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PlatformEvent {
    Allocate(PhysicalAddress),
    Free(PhysicalAddress),
    InvalidateCache { base: PhysicalAddress, length: u64 },
    WriteBackCache { base: PhysicalAddress, length: u64 },
    /// A direct store to the descriptor at `slot`.
    EntryUpdated { slot: PhysicalAddress, va: VirtualAddress },
    /// Start of a break-before-make replacement.
    LiveReplace { slot: PhysicalAddress, value: u64, va: VirtualAddress },
    TlbInvalidate(VirtualAddress),
    TlbInvalidateRange { base: VirtualAddress, length: u64 },
    Barrier,
    InstallTranslation { root: PhysicalAddress, tcr: u64, mair: u64 },
    EnableTranslation,
}

/// A zeroed, naturally aligned table page on the heap.
struct Frame {
    memory: NonNull<u64>,
    layout: Layout,
}

impl Frame {
    fn new_zeroed(layout: Layout) -> Option<Self> {
        let memory = NonNull::new(unsafe { alloc_zeroed(layout) })?;
        Some(Self {
            memory: memory.cast(),
            layout,
        })
    }

    fn contains(&self, addr: usize) -> bool {
        let base = self.memory.as_ptr().addr();
        (base..base + self.layout.size()).contains(&addr)
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        unsafe { dealloc(self.memory.as_ptr().cast(), self.layout) }
    }
}

/// Host memory platform with an event log.
pub struct HeapPlatform {
    page: Layout,
    frames: Vec<Option<Frame>>,
    allocations: usize,
    fail_after: Option<usize>,
    events: Vec<PlatformEvent>,
    sctlr: Sctlr,
    t0sz: u8,
    root: PhysicalAddress,
    tcr: Tcr,
    mair: Mair,
}

impl HeapPlatform {
    /// Physical address of the first frame.
    pub const FRAME_BASE: u64 = 0x8000_0000;

    /// A platform with 4 KiB pages.
    #[must_use]
    pub fn new() -> Self {
        Self::with_page_shift(12)
    }

    /// A platform handing out pages of `1 << page_shift` bytes.
    ///
    /// # Panics
    /// If the page size is not between 8 bytes and 1 GiB.
    #[must_use]
    pub fn with_page_shift(page_shift: u32) -> Self {
        assert!((3..=30).contains(&page_shift), "unsupported page shift {page_shift}");
        let size = 1_usize << page_shift;
        let Ok(page) = Layout::from_size_align(size, size) else {
            panic!("unsupported page shift {page_shift}");
        };
        Self {
            page,
            frames: Vec::new(),
            allocations: 0,
            fail_after: None,
            events: Vec::new(),
            sctlr: Sctlr::new(),
            t0sz: 0,
            root: PhysicalAddress::new(0),
            tcr: Tcr::new(),
            mair: Mair::new(),
        }
    }

    /// Fails every allocation once `allocations` pages have been handed out
    /// in total.
    #[must_use]
    pub fn fail_after(mut self, allocations: usize) -> Self {
        self.fail_after = Some(allocations);
        self
    }

    /// Pages currently allocated.
    #[must_use]
    pub fn live_pages(&self) -> usize {
        self.frames.iter().filter(|frame| frame.is_some()).count()
    }

    /// Pages handed out since creation.
    #[must_use]
    pub const fn total_allocations(&self) -> usize {
        self.allocations
    }

    #[must_use]
    pub fn events(&self) -> &[PlatformEvent] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<PlatformEvent> {
        core::mem::take(&mut self.events)
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    /// Pretends the core translates through the installed tables (or not).
    pub const fn set_translation_active(&mut self, active: bool) {
        self.sctlr = self.sctlr.with_mmu(active);
    }

    /// The simulated `SCTLR_ELx`.
    #[must_use]
    pub const fn sctlr(&self) -> Sctlr {
        self.sctlr
    }

    #[must_use]
    pub const fn tcr(&self) -> Tcr {
        self.tcr
    }

    #[must_use]
    pub const fn mair(&self) -> Mair {
        self.mair
    }

    const fn frame_size(&self) -> u64 {
        self.page.size() as u64
    }

    fn frame_index(&self, page: PhysicalAddress) -> Option<usize> {
        let offset = page.as_u64().checked_sub(Self::FRAME_BASE)?;
        if offset % self.frame_size() != 0 {
            return None;
        }
        usize::try_from(offset / self.frame_size()).ok()
    }

    const fn frame_address(&self, index: usize) -> PhysicalAddress {
        PhysicalAddress::new(Self::FRAME_BASE + index as u64 * self.frame_size())
    }
}

impl Default for HeapPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformOps for HeapPlatform {
    fn page_size(&self) -> u64 {
        self.frame_size()
    }

    fn allocate_page(&mut self) -> Option<PhysicalAddress> {
        if self.fail_after.is_some_and(|limit| self.allocations >= limit) {
            return None;
        }

        let frame = Frame::new_zeroed(self.page)?;
        let index = match self.frames.iter().position(Option::is_none) {
            Some(index) => {
                self.frames[index] = Some(frame);
                index
            }
            None => {
                self.frames.push(Some(frame));
                self.frames.len() - 1
            }
        };

        self.allocations += 1;
        let page = self.frame_address(index);
        trace!("heap platform: allocated {page}");
        self.events.push(PlatformEvent::Allocate(page));
        Some(page)
    }

    fn free_page(&mut self, page: PhysicalAddress) {
        match self.frame_index(page).and_then(|index| self.frames.get_mut(index)) {
            Some(frame) if frame.is_some() => *frame = None,
            _ => panic!("freeing unknown table page {page}"),
        }
        self.events.push(PlatformEvent::Free(page));
    }

    fn table_pointer(&self, page: PhysicalAddress) -> *mut u64 {
        let frame = self
            .frame_index(page)
            .and_then(|index| self.frames.get(index))
            .and_then(Option::as_ref);
        match frame {
            Some(frame) => frame.memory.as_ptr(),
            None => core::ptr::null_mut(),
        }
    }

    fn invalidate_cache_range(&mut self, base: PhysicalAddress, length: u64) {
        self.events.push(PlatformEvent::InvalidateCache { base, length });
    }

    fn write_back_cache_range(&mut self, base: PhysicalAddress, length: u64) {
        self.events.push(PlatformEvent::WriteBackCache { base, length });
    }

    fn is_translation_active(&self) -> bool {
        self.sctlr.mmu()
    }

    fn update_translation_table_entry(&mut self, slot: PhysicalAddress, va: VirtualAddress) {
        self.events.push(PlatformEvent::EntryUpdated { slot, va });
    }

    fn invalidate_tlb_entry(&mut self, va: VirtualAddress) {
        self.events.push(PlatformEvent::TlbInvalidate(va));
    }

    fn invalidate_tlb_range(&mut self, base: VirtualAddress, length: u64) {
        self.events.push(PlatformEvent::TlbInvalidateRange { base, length });
    }

    fn barrier(&mut self) {
        self.events.push(PlatformEvent::Barrier);
    }

    unsafe fn replace_live_entry(&mut self, slot: *mut u64, value: u64, scope: TlbScope) {
        let address = self.slot_address(slot);
        self.events.push(PlatformEvent::LiveReplace {
            slot: address,
            value,
            va: scope.base(),
        });
        unsafe { crate::break_before_make(self, slot, value, scope) }
    }

    fn t0sz(&self) -> u8 {
        self.t0sz
    }

    fn root_table(&self) -> PhysicalAddress {
        self.root
    }

    fn install_translation(&mut self, root: PhysicalAddress, tcr: Tcr, mair: Mair) {
        self.root = root;
        self.t0sz = tcr.t0sz();
        self.tcr = tcr;
        self.mair = mair;
        self.events.push(PlatformEvent::InstallTranslation {
            root,
            tcr: tcr.into_bits(),
            mair: mair.into_bits(),
        });
    }

    fn enable_translation(&mut self) {
        self.sctlr = self.sctlr.with_translation_enabled();
        self.events.push(PlatformEvent::EnableTranslation);
    }
}

impl HeapPlatform {
    /// Physical address of a slot pointer handed out through [`table_pointer`](PlatformOps::table_pointer).
    fn slot_address(&self, slot: *mut u64) -> PhysicalAddress {
        let addr = slot.addr();
        for (index, frame) in self.frames.iter().enumerate() {
            if let Some(frame) = frame
                && frame.contains(addr)
            {
                let offset = addr - frame.memory.as_ptr().addr();
                return self.frame_address(index).offset(offset as u64);
            }
        }
        PhysicalAddress::new(addr as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_are_reused_after_free() {
        let mut platform = HeapPlatform::new();
        let a = platform.allocate_page().unwrap();
        let b = platform.allocate_page().unwrap();
        assert_eq!(a.as_u64(), HeapPlatform::FRAME_BASE);
        assert_eq!(b.as_u64(), HeapPlatform::FRAME_BASE + 0x1000);

        platform.free_page(a);
        assert_eq!(platform.live_pages(), 1);
        assert_eq!(platform.allocate_page(), Some(a));
        assert_eq!(platform.total_allocations(), 3);
    }

    #[test]
    fn allocation_limit_counts_all_allocations() {
        let mut platform = HeapPlatform::new().fail_after(2);
        let a = platform.allocate_page().unwrap();
        platform.free_page(a);
        assert!(platform.allocate_page().is_some());
        assert_eq!(platform.allocate_page(), None);
    }

    #[test]
    fn table_pointer_is_page_aligned() {
        let mut platform = HeapPlatform::new();
        let page = platform.allocate_page().unwrap();
        let ptr = platform.table_pointer(page);
        assert_eq!(ptr.addr() % 4096, 0);
        assert!(platform.table_pointer(PhysicalAddress::new(0x1000)).is_null());
    }

    #[test]
    fn frames_follow_the_page_size() {
        let mut platform = HeapPlatform::with_page_shift(14);
        assert_eq!(platform.page_size(), 0x4000);

        let a = platform.allocate_page().unwrap();
        let b = platform.allocate_page().unwrap();
        assert_eq!(b.as_u64() - a.as_u64(), 0x4000);

        let ptr = platform.table_pointer(b);
        assert_eq!(ptr.addr() % 0x4000, 0);
        let last = unsafe { ptr.add(2047) };
        unsafe { last.write_volatile(7) };
        let entries: Vec<u64> = (0..2048).map(|i| unsafe { ptr.add(i).read_volatile() }).collect();
        assert_eq!(entries.iter().filter(|&&e| e == 0).count(), 2047);
        assert_eq!(entries[2047], 7);
        assert!(platform.table_pointer(a.offset(0x1000)).is_null());
    }

    #[test]
    fn enabling_translation_sets_the_control_bits() {
        let mut platform = HeapPlatform::new();
        assert!(!platform.is_translation_active());

        platform.enable_translation();
        let sctlr = platform.sctlr();
        assert!(sctlr.mmu() && sctlr.data_cache() && sctlr.instruction_cache());
        assert!(platform.is_translation_active());

        platform.set_translation_active(false);
        assert!(!platform.is_translation_active());
        assert!(platform.sctlr().data_cache());
    }

    #[test]
    #[should_panic(expected = "unknown table page")]
    fn double_free_panics() {
        let mut platform = HeapPlatform::new();
        let page = platform.allocate_page().unwrap();
        platform.free_page(page);
        platform.free_page(page);
    }

    #[test]
    fn live_replacement_is_logged_with_the_slot_address() {
        let mut platform = HeapPlatform::new();
        let page = platform.allocate_page().unwrap();
        let slot = unsafe { platform.table_pointer(page).add(3) };
        platform.clear_events();

        let va = VirtualAddress::new(0x4000_0000);
        unsafe { platform.replace_live_entry(slot, 0x4000_0401, TlbScope::Entry(va)) };

        assert_eq!(
            platform.events(),
            [
                PlatformEvent::LiveReplace {
                    slot: page.offset(24),
                    value: 0x4000_0401,
                    va
                },
                PlatformEvent::Barrier,
                PlatformEvent::TlbInvalidate(va),
                PlatformEvent::Barrier,
                PlatformEvent::Barrier,
            ]
        );
        assert_eq!(unsafe { slot.read_volatile() }, 0x4000_0401);
    }
}
