//! # Translation Tables
//!
//! [`TranslationTables`] owns the platform handle and is the entry point for
//! every operation on the active tree. The tree itself is found through the
//! platform: [`PlatformOps::root_table`] and [`PlatformOps::t0sz`] describe the
//! translation currently installed.
//!
//! ```rust
//! # use xlat_table::*;
//! let regions = [MemoryRegionDescriptor::new(0, 1 << 30, RegionAttribute::WriteBack)];
//! let mut platform = HeapPlatform::new();
//! let mut tables = TranslationTables::configure(&mut platform, &regions, &MmuConfig::default())?;
//!
//! tables.set_read_only(VirtualAddress::new(0x20_0000), 0x1000)?;
//! let page = tables.lookup(VirtualAddress::new(0x20_0000)).unwrap();
//! assert_eq!(page.length, 0x1000);
//! assert!(page.attributes.contains(DescriptorAttributes::AP_READ_ONLY));
//! # Ok::<(), XlatError>(())
//! ```

use crate::attributes::memory_attribute_update;
use crate::descriptor::{ATTRIBUTES_MASK, DescriptorAttributes};
use crate::update::RegionWalker;
use crate::{AttributeUpdate, Geometry, MemoryAttributes, PlatformOps, RootTableInfo, TranslationRegime, XlatError};
use log::debug;
use xlat_addresses::{AddressRange, PhysicalAddress, VirtualAddress};

/// The translation tables reachable through a platform.
pub struct TranslationTables<P: PlatformOps> {
    platform: P,
    geometry: Geometry,
    regime: TranslationRegime,
}

/// Root of the installed translation.
#[derive(Copy, Clone, Debug)]
pub(crate) struct Root {
    pub(crate) t0sz: u8,
    pub(crate) info: RootTableInfo,
    pub(crate) table: PhysicalAddress,
}

impl<P: PlatformOps> TranslationTables<P> {
    /// Manages the tables `platform` currently has installed.
    ///
    /// # Errors
    /// [`XlatError::PageSizeMismatch`] if the platform's pages are not the
    /// geometry's pages or cannot hold a full table.
    pub fn new(platform: P, geometry: Geometry, regime: TranslationRegime) -> Result<Self, XlatError> {
        check_page_size(&platform, &geometry)?;
        Ok(Self::from_parts(platform, geometry, regime))
    }

    pub(crate) const fn from_parts(platform: P, geometry: Geometry, regime: TranslationRegime) -> Self {
        Self {
            platform,
            geometry,
            regime,
        }
    }

    #[inline]
    pub const fn platform(&self) -> &P {
        &self.platform
    }

    #[inline]
    pub const fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    #[inline]
    pub fn into_platform(self) -> P {
        self.platform
    }

    #[inline]
    pub const fn geometry(&self) -> Geometry {
        self.geometry
    }

    #[inline]
    pub const fn regime(&self) -> TranslationRegime {
        self.regime
    }

    /// Rewrites the attributes of every page and block in `[base, base + length)`.
    ///
    /// Each leaf ends up with `(existing & retain) | set`. Blocks straddling the
    /// range boundaries are split, and tables are collapsed into blocks where
    /// `retain` is zero.
    ///
    /// # Errors
    /// - [`XlatError::InvalidArgument`] if the range is not page aligned, wraps
    ///   or exceeds the input address space. Nothing is modified.
    /// - [`XlatError::InvalidAttributes`] if `set` has non-attribute bits.
    /// - [`XlatError::InvalidT0sz`] if the installed T0SZ is unusable.
    /// - [`XlatError::OutOfMemory`] if a table could not be allocated. The part
    ///   of the range before the failure may already be updated.
    pub fn set_region_attributes(
        &mut self,
        base: VirtualAddress,
        length: u64,
        set: u64,
        retain: u64,
    ) -> Result<(), XlatError> {
        let root = self.root()?;
        let range = validate_range(&self.geometry, root.t0sz, base, length)?;
        if set & !ATTRIBUTES_MASK != 0 {
            return Err(XlatError::InvalidAttributes(set));
        }
        if range.is_empty() {
            return Ok(());
        }

        debug!("updating {range:?}: set {set:#x}, retain {retain:#x}");
        RegionWalker::new(&mut self.platform, self.geometry).update(
            range.start().as_u64(),
            range.end().as_u64(),
            AttributeUpdate::new(set, retain),
            root.table,
            root.info.level,
            true,
        )
    }

    /// Marks the range non-executable.
    ///
    /// # Errors
    /// See [`set_region_attributes`](Self::set_region_attributes).
    pub fn set_no_exec(&mut self, base: VirtualAddress, length: u64) -> Result<(), XlatError> {
        let xn = self.regime.execute_never().bits();
        self.set_region_attributes(base, length, xn, ATTRIBUTES_MASK)
    }

    /// # Errors
    /// See [`set_region_attributes`](Self::set_region_attributes).
    pub fn clear_no_exec(&mut self, base: VirtualAddress, length: u64) -> Result<(), XlatError> {
        let xn = self.regime.execute_never().bits();
        self.set_region_attributes(base, length, 0, ATTRIBUTES_MASK & !xn)
    }

    /// # Errors
    /// See [`set_region_attributes`](Self::set_region_attributes).
    pub fn set_read_only(&mut self, base: VirtualAddress, length: u64) -> Result<(), XlatError> {
        let ro = DescriptorAttributes::AP_READ_ONLY.bits();
        self.set_region_attributes(base, length, ro, ATTRIBUTES_MASK)
    }

    /// Makes the range writable again, for privileged access only.
    ///
    /// # Errors
    /// See [`set_region_attributes`](Self::set_region_attributes).
    pub fn clear_read_only(&mut self, base: VirtualAddress, length: u64) -> Result<(), XlatError> {
        let ap = DescriptorAttributes::AP.bits();
        self.set_region_attributes(base, length, 0, ATTRIBUTES_MASK & !ap)
    }

    /// Applies firmware memory attributes to the range.
    ///
    /// Only the attributes selected by `mask` change. If the mask names a
    /// cache type, the range is remapped with exactly `attrs`; otherwise only
    /// the named access protections change and cacheability is kept. An empty
    /// mask selects everything `attrs` can express.
    ///
    /// # Errors
    /// [`XlatError::InvalidAttributes`] for attributes without a descriptor
    /// encoding, plus everything [`set_region_attributes`](Self::set_region_attributes)
    /// reports.
    pub fn set_memory_attributes(
        &mut self,
        base: VirtualAddress,
        length: u64,
        attrs: MemoryAttributes,
        mask: MemoryAttributes,
    ) -> Result<(), XlatError> {
        let update = memory_attribute_update(attrs, mask, self.regime)?;
        self.set_region_attributes(base, length, update.set, update.retain)
    }

    /// The installed root, validated against the geometry.
    pub(crate) fn root(&self) -> Result<Root, XlatError> {
        let t0sz = self.geometry.validate_t0sz(self.platform.t0sz())?;
        Ok(Root {
            t0sz,
            info: self.geometry.root_table_info(t0sz),
            table: self.platform.root_table(),
        })
    }
}

/// Checks that the platform's pages hold exactly the geometry's tables.
pub(crate) fn check_page_size<P: PlatformOps + ?Sized>(platform: &P, geometry: &Geometry) -> Result<(), XlatError> {
    let page_size = platform.page_size();
    if page_size != geometry.page_size() || geometry.table_size() > page_size {
        return Err(XlatError::PageSizeMismatch {
            table_size: geometry.table_size(),
            page_size,
        });
    }
    Ok(())
}

/// Checks that `[base, base + length)` is page aligned and translatable with `t0sz`.
pub(crate) fn validate_range(
    geometry: &Geometry,
    t0sz: u8,
    base: VirtualAddress,
    length: u64,
) -> Result<AddressRange, XlatError> {
    let invalid = XlatError::InvalidArgument { base, length };
    let page_mask = geometry.page_size() - 1;
    if !base.is_aligned_to_shift(geometry.page_shift()) || length & page_mask != 0 {
        return Err(invalid);
    }

    let Some(range) = AddressRange::new(base, length) else {
        return Err(invalid);
    };
    if range.end().as_u64() > geometry.va_limit(t0sz) {
        return Err(invalid);
    }
    Ok(range)
}
