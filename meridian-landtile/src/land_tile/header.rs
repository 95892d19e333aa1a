use zerocopy::{LE, U16, U32};
use zerocopy_derive::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// Magic bytes opening every land-tile blob.
pub(crate) const TILE_MAGIC: [u8; 4] = *b"MLT1";

/// Fixed-size header at the start of a tile blob.
///
/// All multi-byte fields are little-endian. The variable-length sections
/// follow the header in a fixed order: node records, edge records, shape
/// points, the concatenated encoded-polyline text, and the optional
/// checksum string.
#[derive(FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned, Copy, Clone, Debug)]
#[repr(C)]
pub struct TileHeader {
    pub(crate) magic: [u8; 4],
    pub(crate) z: U16<LE>,
    pub(crate) x: U32<LE>,
    pub(crate) y: U32<LE>,
    pub(crate) version: U32<LE>,
    pub(crate) profile_mask: U32<LE>,
    pub(crate) node_count: U32<LE>,
    pub(crate) edge_count: U32<LE>,
    pub(crate) shape_count: U32<LE>,
    pub(crate) polyline_bytes: U32<LE>,
    pub(crate) checksum_bytes: U16<LE>,
}

impl TileHeader {
    /// The tile zoom level.
    #[inline]
    pub const fn z(&self) -> u16 {
        self.z.get()
    }

    /// The tile x coordinate.
    #[inline]
    pub const fn x(&self) -> u32 {
        self.x.get()
    }

    /// The tile y coordinate.
    #[inline]
    pub const fn y(&self) -> u32 {
        self.y.get()
    }

    /// The data version stamped by the converter.
    #[inline]
    pub const fn version(&self) -> u32 {
        self.version.get()
    }

    /// Profiles the converter included in this tile (bit 0 motor vehicle,
    /// bit 1 pedestrian).
    #[inline]
    pub const fn profile_mask(&self) -> u32 {
        self.profile_mask.get()
    }

    /// The number of node records.
    #[inline]
    pub const fn node_count(&self) -> u32 {
        self.node_count.get()
    }

    /// The number of edge records.
    #[inline]
    pub const fn edge_count(&self) -> u32 {
        self.edge_count.get()
    }

    /// The number of shape points in the tile shape array.
    #[inline]
    pub const fn shape_count(&self) -> u32 {
        self.shape_count.get()
    }
}
