use geo::{Coord, coord};
use zerocopy::{I32, LE, U16, U32};
use zerocopy_derive::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// Degrees are stored quantized as `round(degrees * 1e6)`.
pub(crate) const QUANTIZATION_SCALE: f64 = 1e6;

/// Quantizes a coordinate component in degrees.
///
/// Quantized values are the sole cross-tile identity key: the converter
/// guarantees that the same real-world node quantizes to the same pair in
/// every tile it appears in.
#[inline]
#[allow(clippy::cast_possible_truncation)]
pub fn quantize_degrees(degrees: f64) -> i32 {
    (degrees * QUANTIZATION_SCALE).round() as i32
}

/// A graph node local to one tile.
///
/// The graph uses a forward star structure: each node points at a
/// contiguous run of outgoing edges in the tile edge array.
#[derive(FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned, Copy, Clone, Debug)]
#[repr(C)]
pub struct NodeRecord {
    id: U32<LE>,
    lat_q: I32<LE>,
    lon_q: I32<LE>,
    first_edge: U32<LE>,
    edge_count: U16<LE>,
}

impl NodeRecord {
    pub(crate) fn new(id: u32, lat_q: i32, lon_q: i32, first_edge: u32, edge_count: u16) -> Self {
        Self {
            id: U32::new(id),
            lat_q: I32::new(lat_q),
            lon_q: I32::new(lon_q),
            first_edge: U32::new(first_edge),
            edge_count: U16::new(edge_count),
        }
    }

    /// The tile-local node id.
    #[inline]
    pub const fn id(&self) -> u32 {
        self.id.get()
    }

    /// Raw quantized latitude; bitwise equality of the quantized pair is
    /// the cross-tile stitching key.
    #[inline]
    pub const fn lat_q(&self) -> i32 {
        self.lat_q.get()
    }

    /// Raw quantized longitude.
    #[inline]
    pub const fn lon_q(&self) -> i32 {
        self.lon_q.get()
    }

    /// Latitude in degrees.
    #[inline]
    pub fn lat(&self) -> f64 {
        f64::from(self.lat_q.get()) / QUANTIZATION_SCALE
    }

    /// Longitude in degrees.
    #[inline]
    pub fn lon(&self) -> f64 {
        f64::from(self.lon_q.get()) / QUANTIZATION_SCALE
    }

    /// The node position as a coordinate.
    #[inline]
    pub fn coord(&self) -> Coord {
        coord! { x: self.lon(), y: self.lat() }
    }

    /// Index of the first outgoing edge in the tile edge array.
    #[inline]
    pub const fn first_edge(&self) -> u32 {
        self.first_edge.get()
    }

    /// The number of outgoing edges, stored contiguously from
    /// [`NodeRecord::first_edge`].
    #[inline]
    pub const fn edge_count(&self) -> u16 {
        self.edge_count.get()
    }
}
