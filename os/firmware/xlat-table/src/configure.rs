//! # MMU Configuration
//!
//! Builds an identity-mapped translation for a platform memory map and turns
//! it on:
//!
//! ```text
//!  regions ─► root table ─► map each region ─► clean tables ─► TCR / MAIR ─► enable
//!                               (not live)      (MMU off only)
//! ```
//!
//! The tree is not reachable by any walker until it is installed, so every
//! entry is written directly.

use crate::descriptor::DescriptorAttributes;
use crate::query::visit_tables;
use crate::table::allocate_table;
use crate::teardown::free_page_tables_recursive;
use crate::tables::{check_page_size, validate_range};
use crate::update::RegionWalker;
use crate::{AttributeUpdate, MemoryRegionDescriptor, MmuConfig, PlatformOps, TranslationTables, XlatError};
use alloc::vec::Vec;
use log::debug;
use xlat_addresses::PhysicalAddress;
use xlat_registers::{Granule, Mair, PhysicalAddressSize, Tcr};

impl<P: PlatformOps> TranslationTables<P> {
    /// Maps `regions` into a fresh tree, installs it and enables translation.
    ///
    /// # Errors
    /// - [`XlatError::InvalidT0sz`] if the configured address space does not
    ///   fit the geometry.
    /// - [`XlatError::UnsupportedGeometry`] if the geometry's page size is not
    ///   a translation granule.
    /// - [`XlatError::PageSizeMismatch`] if the platform's pages do not match
    ///   the geometry.
    /// - [`XlatError::InvalidArgument`] for a region that is not page aligned
    ///   or lies outside the address space.
    /// - [`XlatError::OutOfMemory`] if the tables could not be allocated.
    ///
    /// On error every page allocated so far is freed and the platform's
    /// translation registers are left alone.
    pub fn configure(
        mut platform: P,
        regions: &[MemoryRegionDescriptor],
        config: &MmuConfig,
    ) -> Result<Self, XlatError> {
        let geometry = config.geometry();
        let max_address = config.max_address();
        let t0sz = geometry.validate_t0sz(config.t0sz())?;
        let Some(granule) = Granule::for_page_shift(geometry.page_shift()) else {
            return Err(XlatError::UnsupportedGeometry(geometry));
        };
        check_page_size(&platform, &geometry)?;
        let root = geometry.root_table_info(t0sz);
        debug!(
            "configuring translation: T0SZ {t0sz}, root level {}, {} root entries",
            root.level, root.entry_count
        );

        let root_table = allocate_table(&mut platform, &geometry, root.level)?;
        if let Err(err) = map_regions(&mut platform, config, t0sz, root_table, regions) {
            free_page_tables_recursive(&mut platform, &geometry, root_table, root.level);
            return Err(err);
        }

        if !platform.is_translation_active() {
            // the walker reads the tables from memory before the caches are on
            let mut tables = Vec::new();
            visit_tables(&platform, &geometry, root_table, root.level, &mut |table| tables.push(table));
            for table in tables {
                platform.write_back_cache_range(table, geometry.page_size());
            }
        }

        let tcr = Tcr::for_identity_map(t0sz, granule, PhysicalAddressSize::covering(max_address));
        platform.install_translation(root_table, tcr, Mair::firmware_default());
        platform.enable_translation();
        debug!("translation enabled with root table at {root_table}");

        Ok(Self::from_parts(platform, geometry, config.regime()))
    }
}

fn map_regions<P: PlatformOps>(
    platform: &mut P,
    config: &MmuConfig,
    t0sz: u8,
    root_table: PhysicalAddress,
    regions: &[MemoryRegionDescriptor],
) -> Result<(), XlatError> {
    let geometry = config.geometry();
    let level = geometry.root_table_info(t0sz).level;
    let mut walker = RegionWalker::new(platform, geometry);

    for region in regions {
        let range = validate_range(&geometry, t0sz, region.base, region.length)?;
        if range.is_empty() {
            continue;
        }

        let attributes = region.attribute.descriptor_attributes(config.regime()) | DescriptorAttributes::ACCESS_FLAG;
        debug!("mapping {range:?} as {:?}", region.attribute);
        walker.update(
            range.start().as_u64(),
            range.end().as_u64(),
            AttributeUpdate::overwrite(attributes.bits()),
            root_table,
            level,
            false,
        )?;
    }

    Ok(())
}
