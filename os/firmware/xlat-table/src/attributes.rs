//! # Memory Attributes
//!
//! Conversion between firmware-level memory attributes (UEFI-style cache type
//! and access protection bits) and descriptor attribute bits.
//!
//! | Memory attribute | Descriptor bits |
//! |:-----------------|:----------------|
//! | `UC` | AttrIndx device, execute-never |
//! | `WC` | AttrIndx normal non-cacheable |
//! | `WT` | AttrIndx normal write-through, inner shareable |
//! | `WB` | AttrIndx normal write-back, inner shareable |
//! | `RO` | `AP[2]` |
//! | `XP` | the regime's execute-never bits |
//! | `RP` | AF cleared |
//!
//! The attribute indices assume the `MAIR` layout of
//! [`Mair::firmware_default`], which [`configure`](crate::TranslationTables::configure)
//! installs.

use crate::descriptor::{ATTRIBUTES_MASK, BlockDescriptor, DescriptorAttributes};
use crate::{AttributeUpdate, XlatError};
use bitflags::bitflags;
use xlat_addresses::VirtualAddress;
use xlat_registers::{ExceptionLevel, Mair, MemoryType, Shareability};

bitflags! {
    /// Firmware memory attributes, with the UEFI bit assignments.
    #[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
    pub struct MemoryAttributes: u64 {
        /// Uncacheable; mapped as device memory.
        const UC = 0x0000_0001;
        /// Write-combining; mapped as normal non-cacheable memory.
        const WC = 0x0000_0002;
        /// Write-through.
        const WT = 0x0000_0004;
        /// Write-back.
        const WB = 0x0000_0008;
        /// Uncacheable, exported. Has no descriptor encoding.
        const UCE = 0x0000_0010;
        /// Write-protected. Has no descriptor encoding.
        const WP = 0x0000_1000;
        /// Read-protected.
        const RP = 0x0000_2000;
        /// Execute-protected.
        const XP = 0x0000_4000;
        /// Read-only.
        const RO = 0x0002_0000;

        const CACHE_TYPE_MASK = Self::UC.bits()
            | Self::WC.bits()
            | Self::WT.bits()
            | Self::WB.bits()
            | Self::UCE.bits();
        const ACCESS_MASK = Self::RP.bits() | Self::XP.bits() | Self::RO.bits();
    }
}

impl MemoryAttributes {
    /// The memory type named by the cache type bits, if exactly one
    /// encodable cache type is set.
    #[must_use]
    pub fn memory_type(self) -> Option<MemoryType> {
        let cache = self & Self::CACHE_TYPE_MASK;
        if cache == Self::UC {
            Some(MemoryType::DeviceNgnrne)
        } else if cache == Self::WC {
            Some(MemoryType::NormalNonCacheable)
        } else if cache == Self::WT {
            Some(MemoryType::NormalWriteThrough)
        } else if cache == Self::WB {
            Some(MemoryType::NormalWriteBack)
        } else {
            None
        }
    }

    #[inline]
    #[must_use]
    pub const fn has_cache_type(self) -> bool {
        self.intersects(Self::CACHE_TYPE_MASK)
    }
}

/// Exception level whose stage 1 translation is managed.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum TranslationRegime {
    /// EL1&0: separate privileged and unprivileged execute-never bits.
    #[default]
    El1,
    /// EL2: a single execute-never bit.
    El2,
}

impl TranslationRegime {
    /// Descriptor bits that make a mapping non-executable in this regime.
    #[must_use]
    pub const fn execute_never(self) -> DescriptorAttributes {
        match self {
            Self::El1 => DescriptorAttributes::PXN.union(DescriptorAttributes::UXN),
            Self::El2 => DescriptorAttributes::UXN,
        }
    }
}

impl From<TranslationRegime> for ExceptionLevel {
    fn from(regime: TranslationRegime) -> Self {
        match regime {
            TranslationRegime::El1 => Self::El1,
            TranslationRegime::El2 => Self::El2,
        }
    }
}

/// `AttrIndx` selecting `ty` in [`Mair::firmware_default`].
const fn attr_index(ty: MemoryType) -> u8 {
    match ty {
        MemoryType::DeviceNgnrne => Mair::INDEX_DEVICE,
        MemoryType::NormalNonCacheable => Mair::INDEX_NON_CACHEABLE,
        MemoryType::NormalWriteThrough => Mair::INDEX_WRITE_THROUGH,
        MemoryType::NormalWriteBack => Mair::INDEX_WRITE_BACK,
    }
}

/// Descriptor attributes for `attrs`.
///
/// ```rust
/// # use xlat_table::{to_descriptor_attributes, DescriptorAttributes, MemoryAttributes, TranslationRegime};
/// let attrs = to_descriptor_attributes(MemoryAttributes::WB | MemoryAttributes::RO, TranslationRegime::El1)?;
/// assert_eq!(attrs.attr_index(), 3);
/// assert!(attrs.contains(DescriptorAttributes::AP_READ_ONLY | DescriptorAttributes::ACCESS_FLAG));
/// # Ok::<(), xlat_table::XlatError>(())
/// ```
///
/// # Errors
/// [`XlatError::InvalidAttributes`] unless exactly one of `UC`, `WC`, `WT`
/// and `WB` is set.
pub fn to_descriptor_attributes(
    attrs: MemoryAttributes,
    regime: TranslationRegime,
) -> Result<DescriptorAttributes, XlatError> {
    let Some(ty) = attrs.memory_type() else {
        return Err(XlatError::InvalidAttributes(attrs.bits()));
    };

    let shareability = match ty {
        MemoryType::NormalWriteThrough | MemoryType::NormalWriteBack => Shareability::InnerShareable,
        MemoryType::DeviceNgnrne | MemoryType::NormalNonCacheable => Shareability::NonShareable,
    };
    let block = BlockDescriptor::new()
        .with_attr_index(attr_index(ty))
        .with_shareability(shareability);

    let mut bits = DescriptorAttributes::from_descriptor(block.into_bits()) | permission_attributes(attrs, regime);
    if ty == MemoryType::DeviceNgnrne {
        bits |= regime.execute_never();
    }
    Ok(bits)
}

/// Access flag, read-only and execute-never bits for the access part of `attrs`.
#[must_use]
pub fn permission_attributes(attrs: MemoryAttributes, regime: TranslationRegime) -> DescriptorAttributes {
    let mut bits = DescriptorAttributes::empty();
    if !attrs.contains(MemoryAttributes::RP) {
        bits |= DescriptorAttributes::ACCESS_FLAG;
    }
    if attrs.contains(MemoryAttributes::RO) {
        bits |= DescriptorAttributes::AP_READ_ONLY;
    }
    if attrs.contains(MemoryAttributes::XP) {
        bits |= regime.execute_never();
    }
    bits
}

/// Memory attributes described by the descriptor bits `bits`.
///
/// Attribute indices outside [`Mair::firmware_default`] yield no cache type.
#[must_use]
pub fn from_descriptor_attributes(bits: DescriptorAttributes, regime: TranslationRegime) -> MemoryAttributes {
    let mut attrs = match Mair::firmware_default().memory_type(bits.attr_index()) {
        Some(MemoryType::DeviceNgnrne) => MemoryAttributes::UC,
        Some(MemoryType::NormalNonCacheable) => MemoryAttributes::WC,
        Some(MemoryType::NormalWriteThrough) => MemoryAttributes::WT,
        Some(MemoryType::NormalWriteBack) => MemoryAttributes::WB,
        None => MemoryAttributes::empty(),
    };

    if !bits.contains(DescriptorAttributes::ACCESS_FLAG) {
        attrs |= MemoryAttributes::RP;
    }
    if bits.contains(DescriptorAttributes::AP_READ_ONLY) {
        attrs |= MemoryAttributes::RO;
    }
    if bits.intersects(regime.execute_never()) {
        attrs |= MemoryAttributes::XP;
    }
    attrs
}

/// Builds the update applying `attrs` under `mask`.
///
/// An empty `mask` covers the access bits, plus the cache type if `attrs`
/// names one. A mask touching the cache type replaces all attributes of the
/// region. Any other mask only rewrites the descriptor bits backing the
/// access bits it names and keeps everything else, cacheability included.
pub(crate) fn memory_attribute_update(
    attrs: MemoryAttributes,
    mask: MemoryAttributes,
    regime: TranslationRegime,
) -> Result<AttributeUpdate, XlatError> {
    let supported = MemoryAttributes::CACHE_TYPE_MASK | MemoryAttributes::ACCESS_MASK;
    let unsupported = (attrs | mask).difference(supported);
    if !unsupported.is_empty() {
        return Err(XlatError::InvalidAttributes(unsupported.bits()));
    }

    let mask = if !mask.is_empty() {
        mask
    } else if attrs.has_cache_type() {
        supported
    } else {
        MemoryAttributes::ACCESS_MASK
    };

    if mask.has_cache_type() {
        let bits = to_descriptor_attributes(attrs, regime)?;
        return Ok(AttributeUpdate::overwrite(bits.bits()));
    }

    let mut managed = DescriptorAttributes::empty();
    if mask.contains(MemoryAttributes::RP) {
        managed |= DescriptorAttributes::ACCESS_FLAG;
    }
    if mask.contains(MemoryAttributes::RO) {
        managed |= DescriptorAttributes::AP;
    }
    if mask.contains(MemoryAttributes::XP) {
        managed |= regime.execute_never();
    }
    let set = permission_attributes(attrs, regime) & managed;
    Ok(AttributeUpdate::new(set.bits(), ATTRIBUTES_MASK & !managed.bits()))
}

/// Memory-map attribute of a platform region.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum RegionAttribute {
    /// Normal memory, non-cacheable.
    Uncached,
    /// Normal memory, write-back, inner shareable.
    WriteBack,
    /// Normal memory, write-back, not shared.
    WriteBackNonShareable,
    WriteBackRo,
    WriteBackXp,
    WriteThrough,
    /// Device-nGnRnE, never executable.
    Device,
    NonSecureUncached,
    NonSecureWriteBack,
    NonSecureWriteBackNonShareable,
    NonSecureWriteBackRo,
    NonSecureWriteBackXp,
    NonSecureWriteThrough,
    NonSecureDevice,
}

impl RegionAttribute {
    #[must_use]
    pub const fn is_non_secure(self) -> bool {
        matches!(
            self,
            Self::NonSecureUncached
                | Self::NonSecureWriteBack
                | Self::NonSecureWriteBackNonShareable
                | Self::NonSecureWriteBackRo
                | Self::NonSecureWriteBackXp
                | Self::NonSecureWriteThrough
                | Self::NonSecureDevice
        )
    }

    /// The secure counterpart of a non-secure attribute.
    #[must_use]
    pub const fn secure(self) -> Self {
        match self {
            Self::NonSecureUncached => Self::Uncached,
            Self::NonSecureWriteBack => Self::WriteBack,
            Self::NonSecureWriteBackNonShareable => Self::WriteBackNonShareable,
            Self::NonSecureWriteBackRo => Self::WriteBackRo,
            Self::NonSecureWriteBackXp => Self::WriteBackXp,
            Self::NonSecureWriteThrough => Self::WriteThrough,
            Self::NonSecureDevice => Self::Device,
            other => other,
        }
    }

    /// Descriptor attributes of the region, without the access flag.
    #[must_use]
    pub fn descriptor_attributes(self, regime: TranslationRegime) -> DescriptorAttributes {
        let write_back = BlockDescriptor::new().with_attr_index(Mair::INDEX_WRITE_BACK);
        let inner = write_back.with_shareability(Shareability::InnerShareable);

        let (block, xn) = match self.secure() {
            Self::Uncached => (BlockDescriptor::new().with_attr_index(Mair::INDEX_NON_CACHEABLE), false),
            Self::WriteBackNonShareable => (write_back, false),
            Self::WriteBackRo => (inner.with_access_permissions(0b10), false),
            Self::WriteBackXp => (inner, true),
            Self::WriteThrough => (
                BlockDescriptor::new()
                    .with_attr_index(Mair::INDEX_WRITE_THROUGH)
                    .with_shareability(Shareability::InnerShareable),
                false,
            ),
            Self::Device => (BlockDescriptor::new().with_attr_index(Mair::INDEX_DEVICE), true),
            _ => (inner, false),
        };

        let mut bits = DescriptorAttributes::from_descriptor(block.with_non_secure(self.is_non_secure()).into_bits());
        if xn {
            bits |= regime.execute_never();
        }
        bits
    }
}

/// A region of the platform memory map, identity mapped.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MemoryRegionDescriptor {
    pub base: VirtualAddress,
    pub length: u64,
    pub attribute: RegionAttribute,
}

impl MemoryRegionDescriptor {
    #[must_use]
    pub const fn new(base: u64, length: u64, attribute: RegionAttribute) -> Self {
        Self {
            base: VirtualAddress::new(base),
            length,
            attribute,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EL1: TranslationRegime = TranslationRegime::El1;
    const EL2: TranslationRegime = TranslationRegime::El2;

    fn update_for(attrs: MemoryAttributes, mask: MemoryAttributes) -> Result<AttributeUpdate, XlatError> {
        memory_attribute_update(attrs, mask, EL1)
    }

    #[test]
    fn cache_types_select_mair_indices() {
        let wb = to_descriptor_attributes(MemoryAttributes::WB, EL1).unwrap();
        assert_eq!(wb.bits(), 0x70C);

        let wt = to_descriptor_attributes(MemoryAttributes::WT, EL1).unwrap();
        assert_eq!(wt.attr_index(), Mair::INDEX_WRITE_THROUGH);
        assert!(wt.contains(DescriptorAttributes::INNER_SHAREABLE));

        let wc = to_descriptor_attributes(MemoryAttributes::WC, EL1).unwrap();
        assert_eq!(wc.attr_index(), Mair::INDEX_NON_CACHEABLE);
        assert!(!wc.intersects(DescriptorAttributes::INNER_SHAREABLE));
    }

    #[test]
    fn device_memory_is_never_executable() {
        let el1 = to_descriptor_attributes(MemoryAttributes::UC, EL1).unwrap();
        assert_eq!(el1.attr_index(), Mair::INDEX_DEVICE);
        assert!(el1.contains(DescriptorAttributes::PXN | DescriptorAttributes::UXN));

        let el2 = to_descriptor_attributes(MemoryAttributes::UC, EL2).unwrap();
        assert!(el2.contains(DescriptorAttributes::UXN));
        assert!(!el2.contains(DescriptorAttributes::PXN));
    }

    #[test]
    fn ambiguous_cache_type_is_rejected() {
        let both = MemoryAttributes::WB | MemoryAttributes::WT;
        assert_eq!(to_descriptor_attributes(both, EL1), Err(XlatError::InvalidAttributes(0xC)));
        assert!(to_descriptor_attributes(MemoryAttributes::UCE, EL1).is_err());
        assert!(to_descriptor_attributes(MemoryAttributes::RO, EL1).is_err());
    }

    #[test]
    fn read_protect_clears_the_access_flag() {
        let bits = to_descriptor_attributes(MemoryAttributes::WB | MemoryAttributes::RP, EL1).unwrap();
        assert!(!bits.contains(DescriptorAttributes::ACCESS_FLAG));
    }

    #[test]
    fn descriptor_attributes_convert_back() {
        for attrs in [
            MemoryAttributes::WB,
            MemoryAttributes::WT | MemoryAttributes::RO,
            MemoryAttributes::WC | MemoryAttributes::XP,
            MemoryAttributes::WB | MemoryAttributes::RP | MemoryAttributes::RO,
        ] {
            for regime in [EL1, EL2] {
                let bits = to_descriptor_attributes(attrs, regime).unwrap();
                assert_eq!(from_descriptor_attributes(bits, regime), attrs);
            }
        }
        let device = to_descriptor_attributes(MemoryAttributes::UC, EL1).unwrap();
        assert_eq!(from_descriptor_attributes(device, EL1), MemoryAttributes::UC | MemoryAttributes::XP);
    }

    #[test]
    fn empty_mask_without_cache_type_updates_permissions() {
        let update = update_for(MemoryAttributes::RO, MemoryAttributes::empty()).unwrap();
        let managed = DescriptorAttributes::ACCESS_FLAG | DescriptorAttributes::AP | EL1.execute_never();
        assert_eq!(update.set, (DescriptorAttributes::AP_READ_ONLY | DescriptorAttributes::ACCESS_FLAG).bits());
        assert_eq!(update.retain, ATTRIBUTES_MASK & !managed.bits());
    }

    #[test]
    fn mask_limits_the_permissions_touched() {
        let update = update_for(MemoryAttributes::XP, MemoryAttributes::XP).unwrap();
        assert_eq!(update.set, EL1.execute_never().bits());
        assert_eq!(update.retain, ATTRIBUTES_MASK & !EL1.execute_never().bits());

        // clearing XP keeps the read-only bit
        let update = update_for(MemoryAttributes::empty(), MemoryAttributes::XP).unwrap();
        assert_eq!(update.set, 0);
        assert_ne!(update.retain & DescriptorAttributes::AP_READ_ONLY.bits(), 0);
    }

    #[test]
    fn cache_type_in_mask_replaces_everything() {
        let update = update_for(MemoryAttributes::WT | MemoryAttributes::XP, MemoryAttributes::empty()).unwrap();
        assert!(update.allows_collapse());
        let expected = to_descriptor_attributes(MemoryAttributes::WT | MemoryAttributes::XP, EL1).unwrap();
        assert_eq!(update.set, expected.bits());
    }

    #[test]
    fn unsupported_attribute_bits_are_rejected() {
        assert_eq!(
            update_for(MemoryAttributes::WP, MemoryAttributes::empty()),
            Err(XlatError::InvalidAttributes(MemoryAttributes::WP.bits()))
        );
        assert_eq!(
            update_for(MemoryAttributes::from_bits_retain(1 << 40), MemoryAttributes::empty()),
            Err(XlatError::InvalidAttributes(1 << 40))
        );

        // nothing named: every access protection is lifted
        let update = update_for(MemoryAttributes::empty(), MemoryAttributes::empty()).unwrap();
        assert_eq!(update.set, DescriptorAttributes::ACCESS_FLAG.bits());
        assert!(!update.allows_collapse());
    }

    #[test]
    fn regimes_select_register_banks() {
        assert_eq!(ExceptionLevel::from(EL1), ExceptionLevel::El1);
        assert_eq!(ExceptionLevel::from(EL2), ExceptionLevel::El2);
    }

    #[test]
    fn region_attributes() {
        let wb = RegionAttribute::WriteBack.descriptor_attributes(EL1);
        assert_eq!(wb.bits(), 0x30C);

        let ns = RegionAttribute::NonSecureWriteBack.descriptor_attributes(EL1);
        assert_eq!(ns, wb | DescriptorAttributes::NON_SECURE);

        let local = RegionAttribute::WriteBackNonShareable.descriptor_attributes(EL1);
        assert_eq!(local.attr_index(), Mair::INDEX_WRITE_BACK);
        assert!(!local.intersects(DescriptorAttributes::INNER_SHAREABLE));

        let ro = RegionAttribute::WriteBackRo.descriptor_attributes(EL1);
        assert!(ro.contains(DescriptorAttributes::AP_READ_ONLY));

        let device = RegionAttribute::NonSecureDevice.descriptor_attributes(EL2);
        assert_eq!(device.attr_index(), Mair::INDEX_DEVICE);
        assert!(device.contains(DescriptorAttributes::UXN | DescriptorAttributes::NON_SECURE));

        assert_eq!(RegionAttribute::WriteBackXp.descriptor_attributes(EL1), wb | EL1.execute_never());
        assert_eq!(
            RegionAttribute::Uncached.descriptor_attributes(EL1).attr_index(),
            Mair::INDEX_NON_CACHEABLE
        );
    }
}
