//! # Virtual and Physical Addresses for Translation Tables
//!
//! Strongly typed wrappers for the raw 64-bit addresses that flow through the
//! AArch64 translation table code.
//!
//! ## Overview
//!
//! Translation table maintenance deals with two address spaces at once: the
//! *input* addresses being mapped (virtual) and the *output* addresses that
//! descriptors point at (physical, including the pages that hold the tables
//! themselves). Mixing them up is an easy mistake, so this crate gives each a
//! distinct zero-cost type built on one principal type:
//!
//! | Type | Description |
//! |------|-------------|
//! | [`MemoryAddress`] | A raw 64-bit address, either physical or virtual. |
//! | [`VirtualAddress`] | An input address translated by the tables. |
//! | [`PhysicalAddress`] | An output address, or the location of a table page. |
//! | [`AddressRange`] | A half-open `[start, end)` range of virtual addresses. |
//!
//! ## Runtime Granularity
//!
//! Block sizes depend on the configured input size (T0SZ) and are only known
//! at runtime, so alignment helpers take a *mask* or a *shift* instead of a
//! type-level page size:
//!
//! ```rust
//! # use xlat_addresses::*;
//! let va = VirtualAddress::new(0x4020_1234);
//!
//! // 2 MiB block containing the address
//! let block = va.align_down_to_shift(21);
//! assert_eq!(block.as_u64(), 0x4020_0000);
//! assert!(!va.is_aligned_to_shift(12));
//!
//! // Last byte of the enclosing 2 MiB block
//! assert_eq!(va.block_last(0x1F_FFFF).as_u64(), 0x403F_FFFF);
//! ```
//!
//! ## Design Notes
//!
//! - The types are `#[repr(transparent)]` and implement `Copy`, `Eq`, `Ord`,
//!   and `Hash`.
//! - All helpers are `const fn`.
//! - Ranges are half-open and [`AddressRange::new`] rejects ranges whose
//!   exclusive end does not fit in 64 bits.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod memory_address;
mod physical_address;
mod range;
mod virtual_address;

pub use memory_address::MemoryAddress;
pub use physical_address::PhysicalAddress;
pub use range::AddressRange;
pub use virtual_address::VirtualAddress;
