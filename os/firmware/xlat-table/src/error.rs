use crate::Geometry;
use xlat_addresses::VirtualAddress;

/// Errors returned by translation table operations.
///
/// Argument errors are reported before any table is touched. An
/// [`OutOfMemory`](XlatError::OutOfMemory) failure may leave the part of the
/// range preceding the failure updated; no table page is leaked either way.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum XlatError {
    /// The range is not page aligned, wraps, or exceeds the input address space.
    #[error("invalid region {base} (+{length:#x})")]
    InvalidArgument { base: VirtualAddress, length: u64 },

    /// A translation table page could not be allocated.
    #[error("out of memory allocating a translation table")]
    OutOfMemory,

    /// The T0SZ value cannot be expressed by the tree geometry.
    #[error("T0SZ {0} is outside the supported range")]
    InvalidT0sz(u8),

    /// The platform hands out pages that cannot hold a table of the geometry.
    #[error("tables of {table_size:#x} bytes do not fit platform pages of {page_size:#x} bytes")]
    PageSizeMismatch { table_size: u64, page_size: u64 },

    /// The geometry has no translation granule the MMU can be programmed with.
    #[error("no translation granule for {0:?}")]
    UnsupportedGeometry(Geometry),

    /// An attribute mask contains bits that are not descriptor attributes, or
    /// a memory attribute set does not name a single cache type.
    #[error("invalid attribute mask {0:#x}")]
    InvalidAttributes(u64),

    /// No valid descriptor translates the address.
    #[error("address {0} is not mapped")]
    NotMapped(VirtualAddress),

    /// The leaves of a range carry differing attributes, first seen at the address.
    #[error("attributes change within the range at {0}")]
    InconsistentAttributes(VirtualAddress),
}
