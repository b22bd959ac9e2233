//! # AArch64 Translation Tables
//!
//! Maintenance of VMSAv8-64 stage 1 translation tables for firmware: building
//! an identity map for a platform memory map, and changing the attributes of
//! arbitrary page-aligned regions afterwards.
//!
//! ## What you get
//! - A [`Geometry`] describing the tree (4 KiB granule by default) and the
//!   T0SZ arithmetic that places the root table.
//! - Decoded [`Descriptor`]s, field-level [`BlockDescriptor`] and
//!   [`TableDescriptor`] views, and [`DescriptorAttributes`] to build masks.
//! - [`TranslationTables`], the entry point: region updates, permission
//!   helpers, firmware [`MemoryAttributes`], configuration and queries.
//! - A [`PlatformOps`] trait for everything that touches the machine, and a
//!   [`HeapPlatform`] that runs the engine on a host.
//!
//! ## Region updates
//!
//! Every update is a pair of masks applied to each leaf in the range:
//!
//! ```text
//!   new attributes = (old attributes & retain) | set
//! ```
//!
//! The walker visits one slot per covered block of each level:
//!
//! ```text
//!            start                                         end
//!              │                                            │
//!   L1   ──────┼──────────────────[ 1 GiB ]─────────────────┼──────
//!              │      partial: split into a table           │
//!   L2   ──[ 2M ]──[ 2M ]──[ 2M ]── ... ──[ 2M ]──[ 2M ]────┼──[ 2M ]
//!           partial  full    full            full   partial │
//!   L3   [4K][4K]                                    [4K][4K]
//! ```
//!
//! Fully covered slots become blocks, partially covered ones are split into
//! a next-level table. Descriptors of the running translation are replaced
//! with break-before-make (see [`break_before_make`]).
//!
//! ### Levels for the 4 KiB granule
//!
//! | Level | Entry maps | Leaf allowed |
//! |:------|:-----------|:-------------|
//! | 0 | 512 GiB | no |
//! | 1 | 1 GiB | block |
//! | 2 | 2 MiB | block |
//! | 3 | 4 KiB | page |
//!
//! ## Concurrency
//!
//! A single mutator at a time, enforced by `&mut self`. Hardware walkers may
//! read the tables at any point, so entries are accessed with volatile
//! operations and replaced in an order the walkers can follow.

#![cfg_attr(not(test), no_std)]
#![allow(unsafe_code)]

extern crate alloc;

mod attributes;
mod config;
mod configure;
mod descriptor;
mod error;
mod geometry;
mod heap;
mod platform;
mod query;
mod replace;
mod table;
mod tables;
mod teardown;
mod update;

pub use crate::attributes::{
    MemoryAttributes, MemoryRegionDescriptor, RegionAttribute, TranslationRegime, from_descriptor_attributes,
    permission_attributes, to_descriptor_attributes,
};
pub use crate::config::MmuConfig;
pub use crate::descriptor::{
    ATTRIBUTES_MASK, BlockDescriptor, Descriptor, DescriptorAttributes, TYPE_BLOCK, TYPE_MASK, TYPE_PAGE,
    TYPE_TABLE, TableDescriptor,
};
pub use crate::error::XlatError;
pub use crate::geometry::{Geometry, RootTableInfo};
pub use crate::heap::{HeapPlatform, PlatformEvent};
pub use crate::platform::PlatformOps;
pub use crate::query::Mapping;
pub use crate::replace::{TlbScope, break_before_make};
pub use crate::table::TranslationTable;
pub use crate::tables::TranslationTables;
pub use crate::update::AttributeUpdate;

pub use xlat_addresses::{AddressRange, PhysicalAddress, VirtualAddress};
pub use xlat_registers::{ExceptionLevel, Granule, Mair, MemoryType, PhysicalAddressSize, Tcr};
