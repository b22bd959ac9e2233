#[cfg(all(feature = "asm", target_arch = "aarch64"))]
use crate::{ExceptionLevel, LoadRegisterUnsafe, StoreRegisterUnsafe};
use bitfield_struct::bitfield;

/// Cacheability of translation table walks (`IRGNn` / `ORGNn`).
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[repr(u8)]
pub enum Cacheability {
    NonCacheable = 0b00,
    WriteBackWriteAllocate = 0b01,
    WriteThrough = 0b10,
    WriteBackNoWriteAllocate = 0b11,
}

impl Cacheability {
    #[inline]
    pub const fn into_bits(self) -> u8 {
        self as u8
    }

    #[inline]
    pub const fn from_bits(v: u8) -> Self {
        match v & 0b11 {
            0b00 => Self::NonCacheable,
            0b01 => Self::WriteBackWriteAllocate,
            0b10 => Self::WriteThrough,
            _ => Self::WriteBackNoWriteAllocate,
        }
    }
}

/// Shareability of translation table walks (`SHn`).
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[repr(u8)]
pub enum Shareability {
    NonShareable = 0b00,
    /// `0b01` is reserved and behaves as non-shareable here.
    Reserved = 0b01,
    OuterShareable = 0b10,
    InnerShareable = 0b11,
}

impl Shareability {
    #[inline]
    pub const fn into_bits(self) -> u8 {
        self as u8
    }

    #[inline]
    pub const fn from_bits(v: u8) -> Self {
        match v & 0b11 {
            0b00 => Self::NonShareable,
            0b01 => Self::Reserved,
            0b10 => Self::OuterShareable,
            _ => Self::InnerShareable,
        }
    }
}

/// Translation granule for `TTBR0` (`TG0`).
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[repr(u8)]
pub enum Granule {
    Size4K = 0b00,
    Size64K = 0b01,
    Size16K = 0b10,
    Reserved = 0b11,
}

impl Granule {
    #[inline]
    pub const fn into_bits(self) -> u8 {
        self as u8
    }

    #[inline]
    pub const fn from_bits(v: u8) -> Self {
        match v & 0b11 {
            0b00 => Self::Size4K,
            0b01 => Self::Size64K,
            0b10 => Self::Size16K,
            _ => Self::Reserved,
        }
    }

    /// Granule for translation tables of `1 << page_shift` bytes.
    ///
    /// ```rust
    /// # use xlat_registers::Granule;
    /// assert_eq!(Granule::for_page_shift(14), Some(Granule::Size16K));
    /// assert_eq!(Granule::for_page_shift(13), None);
    /// ```
    #[must_use]
    pub const fn for_page_shift(page_shift: u32) -> Option<Self> {
        match page_shift {
            12 => Some(Self::Size4K),
            14 => Some(Self::Size16K),
            16 => Some(Self::Size64K),
            _ => None,
        }
    }
}

/// Output (intermediate physical) address size, `IPS` at EL1 and `PS` at EL2.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug)]
#[repr(u8)]
pub enum PhysicalAddressSize {
    Bits32 = 0b000,
    Bits36 = 0b001,
    Bits40 = 0b010,
    Bits42 = 0b011,
    Bits44 = 0b100,
    Bits48 = 0b101,
    Bits52 = 0b110,
}

impl PhysicalAddressSize {
    #[inline]
    pub const fn into_bits(self) -> u8 {
        self as u8
    }

    #[inline]
    pub const fn from_bits(v: u8) -> Self {
        match v & 0b111 {
            0b000 => Self::Bits32,
            0b001 => Self::Bits36,
            0b010 => Self::Bits40,
            0b011 => Self::Bits42,
            0b100 => Self::Bits44,
            0b101 => Self::Bits48,
            _ => Self::Bits52,
        }
    }

    /// Width in bits.
    #[inline]
    #[must_use]
    pub const fn bits(self) -> u8 {
        match self {
            Self::Bits32 => 32,
            Self::Bits36 => 36,
            Self::Bits40 => 40,
            Self::Bits42 => 42,
            Self::Bits44 => 44,
            Self::Bits48 => 48,
            Self::Bits52 => 52,
        }
    }

    /// Smallest encoding able to express `max_address`.
    ///
    /// ```rust
    /// # use xlat_registers::PhysicalAddressSize;
    /// assert_eq!(PhysicalAddressSize::covering(0xFFFF_FFFF), PhysicalAddressSize::Bits32);
    /// assert_eq!(PhysicalAddressSize::covering(0x1_0000_0000), PhysicalAddressSize::Bits36);
    /// assert_eq!(PhysicalAddressSize::covering(u64::MAX), PhysicalAddressSize::Bits52);
    /// ```
    #[must_use]
    pub const fn covering(max_address: u64) -> Self {
        const ALL: [PhysicalAddressSize; 6] = [
            PhysicalAddressSize::Bits32,
            PhysicalAddressSize::Bits36,
            PhysicalAddressSize::Bits40,
            PhysicalAddressSize::Bits42,
            PhysicalAddressSize::Bits44,
            PhysicalAddressSize::Bits48,
        ];

        let mut i = 0;
        while i < ALL.len() {
            if max_address >> ALL[i].bits() == 0 {
                return ALL[i];
            }
            i += 1;
        }
        Self::Bits52
    }
}

/// `TCR_EL1` — Translation Control Register.
///
/// Only the `TTBR0` half is configured by the firmware; the `TTBR1` walk is
/// disabled with `EPD1`. The same value is converted to the `TCR_EL2` layout
/// with [`Tcr::to_el2_bits`].
#[bitfield(u64)]
#[derive(PartialEq, Eq)]
pub struct Tcr {
    /// Bits 0–5 — T0SZ: input address size is `64 - T0SZ` bits.
    #[bits(6)]
    pub t0sz: u8,

    /// Bit 6 — Reserved.
    #[bits(access = RO)]
    pub reserved0: bool,

    /// Bit 7 — EPD0: disable `TTBR0` walks.
    pub epd0: bool,

    /// Bits 8–9 — IRGN0: inner cacheability of `TTBR0` walks.
    #[bits(2, default = Cacheability::NonCacheable)]
    pub irgn0: Cacheability,

    /// Bits 10–11 — ORGN0: outer cacheability of `TTBR0` walks.
    #[bits(2, default = Cacheability::NonCacheable)]
    pub orgn0: Cacheability,

    /// Bits 12–13 — SH0: shareability of `TTBR0` walks.
    #[bits(2, default = Shareability::NonShareable)]
    pub sh0: Shareability,

    /// Bits 14–15 — TG0: `TTBR0` granule.
    #[bits(2, default = Granule::Size4K)]
    pub tg0: Granule,

    /// Bits 16–21 — T1SZ.
    #[bits(6)]
    pub t1sz: u8,

    /// Bit 22 — A1: ASID taken from `TTBR1`.
    pub a1: bool,

    /// Bit 23 — EPD1: disable `TTBR1` walks.
    pub epd1: bool,

    /// Bits 24–31 — `TTBR1` walk attributes and granule, unused.
    #[bits(8)]
    pub ttbr1_attributes: u8,

    /// Bits 32–34 — IPS: intermediate physical address size.
    #[bits(3, default = PhysicalAddressSize::Bits32)]
    pub ips: PhysicalAddressSize,

    /// Bit 35 — Reserved.
    #[bits(access = RO)]
    pub reserved1: bool,

    /// Bit 36 — AS: 16-bit ASIDs.
    pub asid16: bool,

    /// Bit 37 — TBI0: top byte ignored for `TTBR0`.
    pub tbi0: bool,

    /// Bit 38 — TBI1: top byte ignored for `TTBR1`.
    pub tbi1: bool,

    /// Bits 39–63 — Reserved.
    #[bits(25, access = RO)]
    pub reserved2: u32,
}

impl Tcr {
    /// `TCR_EL2` bit 23, RES1.
    const EL2_RES1_23: u64 = 1 << 23;
    /// `TCR_EL2` bit 31, RES1.
    const EL2_RES1_31: u64 = 1 << 31;
    /// T0SZ, IRGN0, ORGN0, SH0 and TG0.
    const EL2_SHARED_FIELDS: u64 = 0xFF3F;

    /// Configuration used for firmware identity maps: walks inner shareable
    /// and write-back write-allocate, `TTBR1` disabled.
    #[must_use]
    pub const fn for_identity_map(t0sz: u8, granule: Granule, ips: PhysicalAddressSize) -> Self {
        Self::new()
            .with_t0sz(t0sz)
            .with_tg0(granule)
            .with_irgn0(Cacheability::WriteBackWriteAllocate)
            .with_orgn0(Cacheability::WriteBackWriteAllocate)
            .with_sh0(Shareability::InnerShareable)
            .with_ips(ips)
            .with_epd1(true)
    }

    /// Re-encode for `TCR_EL2`, which has a single translation range.
    ///
    /// T0SZ, IRGN0, ORGN0, SH0 and TG0 share the EL1 positions; `PS` moves to
    /// bits 16–18 and bits 23 and 31 are RES1.
    #[must_use]
    pub const fn to_el2_bits(self) -> u64 {
        let low = self.into_bits() & Self::EL2_SHARED_FIELDS;
        let ps = (self.ips().into_bits() as u64) << 16;
        let tbi = if self.tbi0() { 1 << 20 } else { 0 };
        low | ps | tbi | Self::EL2_RES1_23 | Self::EL2_RES1_31
    }

    /// Inverse of [`to_el2_bits`](Self::to_el2_bits).
    #[must_use]
    pub const fn from_el2_bits(bits: u64) -> Self {
        #[allow(clippy::cast_possible_truncation)]
        let ps = ((bits >> 16) & 0b111) as u8;
        Self::from_bits(bits & Self::EL2_SHARED_FIELDS)
            .with_ips(PhysicalAddressSize::from_bits(ps))
            .with_tbi0(bits & (1 << 20) != 0)
    }
}

#[cfg(all(feature = "asm", target_arch = "aarch64"))]
impl LoadRegisterUnsafe for Tcr {
    unsafe fn load_unsafe(level: ExceptionLevel) -> Self {
        let tcr: u64;
        unsafe {
            match level {
                ExceptionLevel::El1 => {
                    core::arch::asm!("mrs {}, tcr_el1", out(reg) tcr, options(nomem, nostack, preserves_flags));
                    Self::from_bits(tcr)
                }
                ExceptionLevel::El2 => {
                    core::arch::asm!("mrs {}, tcr_el2", out(reg) tcr, options(nomem, nostack, preserves_flags));
                    Self::from_el2_bits(tcr)
                }
            }
        }
    }
}

#[cfg(all(feature = "asm", target_arch = "aarch64"))]
impl StoreRegisterUnsafe for Tcr {
    unsafe fn store_unsafe(self, level: ExceptionLevel) {
        unsafe {
            match level {
                ExceptionLevel::El1 => {
                    let tcr = self.into_bits();
                    core::arch::asm!("msr tcr_el1, {}", "isb", in(reg) tcr, options(nostack, preserves_flags));
                }
                ExceptionLevel::El2 => {
                    let tcr = self.to_el2_bits();
                    core::arch::asm!("msr tcr_el2, {}", "isb", in(reg) tcr, options(nostack, preserves_flags));
                }
            }
        }
    }
}
