use crate::{Geometry, TranslationRegime};

/// Parameters for building a translation from scratch.
///
/// ```rust
/// # use xlat_table::{MmuConfig, TranslationRegime};
/// let config = MmuConfig::default()
///     .with_regime(TranslationRegime::El2)
///     .with_physical_address_bits(40);
/// assert_eq!(config.max_address(), (1 << 40) - 1);
/// ```
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MmuConfig {
    geometry: Geometry,
    regime: TranslationRegime,
    physical_address_bits: u8,
}

impl MmuConfig {
    #[must_use]
    pub const fn new(geometry: Geometry, regime: TranslationRegime, physical_address_bits: u8) -> Self {
        Self {
            geometry,
            regime,
            physical_address_bits,
        }
    }

    #[must_use]
    pub const fn with_geometry(mut self, geometry: Geometry) -> Self {
        self.geometry = geometry;
        self
    }

    #[must_use]
    pub const fn with_regime(mut self, regime: TranslationRegime) -> Self {
        self.regime = regime;
        self
    }

    /// Width of the physical address space to identity map.
    #[must_use]
    pub const fn with_physical_address_bits(mut self, bits: u8) -> Self {
        self.physical_address_bits = bits;
        self
    }

    #[inline]
    #[must_use]
    pub const fn geometry(&self) -> Geometry {
        self.geometry
    }

    #[inline]
    #[must_use]
    pub const fn regime(&self) -> TranslationRegime {
        self.regime
    }

    #[inline]
    #[must_use]
    pub const fn physical_address_bits(&self) -> u8 {
        self.physical_address_bits
    }

    /// Highest address the translation must cover.
    #[must_use]
    pub const fn max_address(&self) -> u64 {
        if self.physical_address_bits >= 64 {
            u64::MAX
        } else {
            (1 << self.physical_address_bits) - 1
        }
    }

    /// T0SZ of the smallest input address space covering [`max_address`](Self::max_address).
    #[must_use]
    pub const fn t0sz(&self) -> u8 {
        self.geometry.t0sz_for_max_address(self.max_address())
    }
}

impl Default for MmuConfig {
    fn default() -> Self {
        Self::new(Geometry::AARCH64_4K, TranslationRegime::El1, 48)
    }
}
