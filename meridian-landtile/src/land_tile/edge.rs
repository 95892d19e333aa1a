use crate::Profile;
use crate::land_tile::node::QUANTIZATION_SCALE;
use geo::{Coord, coord};
use zerocopy::{F32, I32, LE, U16, U32};
use zerocopy_derive::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// A directed edge local to one tile.
///
/// The geometry descriptor is three-way: a slice of the tile shape array
/// (`shape_count > 0`), an encoded polyline in the tile text section
/// (`polyline_len > 0`), or nothing (a straight from→to segment). Stored
/// geometry starts at the quantized position of `from_node` and ends at
/// that of `to_node`.
#[derive(FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned, Copy, Clone, Debug)]
#[repr(C)]
pub struct EdgeRecord {
    from_node: U32<LE>,
    to_node: U32<LE>,
    length_m: F32<LE>,
    speed_mps: F32<LE>,
    foot_speed_mps: F32<LE>,
    // Not `bool`: only u8 can be built from arbitrary bytes.
    oneway: u8,
    road_class: u8,
    access_mask: U16<LE>,
    shape_start: U32<LE>,
    shape_count: U16<LE>,
    polyline_start: U32<LE>,
    polyline_len: U16<LE>,
}

impl EdgeRecord {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        from_node: u32,
        to_node: u32,
        length_m: f32,
        speed_mps: f32,
        foot_speed_mps: f32,
        oneway: bool,
        road_class: u8,
        access_mask: u16,
        shape_start: u32,
        shape_count: u16,
        polyline_start: u32,
        polyline_len: u16,
    ) -> Self {
        Self {
            from_node: U32::new(from_node),
            to_node: U32::new(to_node),
            length_m: F32::new(length_m),
            speed_mps: F32::new(speed_mps),
            foot_speed_mps: F32::new(foot_speed_mps),
            oneway: u8::from(oneway),
            road_class,
            access_mask: U16::new(access_mask),
            shape_start: U32::new(shape_start),
            shape_count: U16::new(shape_count),
            polyline_start: U32::new(polyline_start),
            polyline_len: U16::new(polyline_len),
        }
    }

    /// The tile-local index of the edge's start node.
    #[inline]
    pub const fn from_node(&self) -> u32 {
        self.from_node.get()
    }

    /// The tile-local index of the edge's end node.
    #[inline]
    pub const fn to_node(&self) -> u32 {
        self.to_node.get()
    }

    /// The edge length in metres.
    #[inline]
    pub fn length_m(&self) -> f32 {
        self.length_m.get()
    }

    /// Motor-vehicle speed in m/s; zero forbids the profile.
    #[inline]
    pub fn speed_mps(&self) -> f32 {
        self.speed_mps.get()
    }

    /// Pedestrian speed in m/s; zero forbids the profile.
    #[inline]
    pub fn foot_speed_mps(&self) -> f32 {
        self.foot_speed_mps.get()
    }

    /// Whether traversal is permitted only from `from_node` to `to_node`.
    #[inline]
    pub const fn oneway(&self) -> bool {
        self.oneway != 0
    }

    /// Broad road hierarchy class assigned by the converter.
    #[inline]
    pub const fn road_class(&self) -> u8 {
        self.road_class
    }

    /// Access permission bits (bit 0 motor vehicle, bit 1 pedestrian).
    #[inline]
    pub const fn access_mask(&self) -> u16 {
        self.access_mask.get()
    }

    /// Speed applying to the given profile, in m/s.
    #[inline]
    pub fn speed_for(&self, profile: Profile) -> f64 {
        match profile {
            Profile::Car => f64::from(self.speed_mps.get()),
            Profile::Foot => f64::from(self.foot_speed_mps.get()),
        }
    }

    /// Whether the profile may traverse this edge at all
    /// (in its forward direction; oneway is a separate, direction-level
    /// concern).
    #[inline]
    pub fn allows(&self, profile: Profile) -> bool {
        self.access_mask.get() & profile.access_bit() != 0 && self.speed_for(profile) > 0.0
    }

    /// Traversal time over the whole edge, in seconds.
    ///
    /// Meaningful only when [`EdgeRecord::allows`] holds; a zero profile
    /// speed yields an infinite time.
    #[inline]
    pub fn traversal_secs(&self, profile: Profile) -> f64 {
        f64::from(self.length_m.get()) / self.speed_for(profile)
    }

    #[inline]
    pub(crate) const fn shape_start(&self) -> u32 {
        self.shape_start.get()
    }

    #[inline]
    pub(crate) const fn shape_count(&self) -> u16 {
        self.shape_count.get()
    }

    #[inline]
    pub(crate) const fn polyline_start(&self) -> u32 {
        self.polyline_start.get()
    }

    #[inline]
    pub(crate) const fn polyline_len(&self) -> u16 {
        self.polyline_len.get()
    }
}

/// A quantized geometry point in the tile shape array.
#[derive(FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned, Copy, Clone, Debug)]
#[repr(C)]
pub struct ShapePoint {
    lat_q: I32<LE>,
    lon_q: I32<LE>,
}

impl ShapePoint {
    pub(crate) fn new(lat_q: i32, lon_q: i32) -> Self {
        Self {
            lat_q: I32::new(lat_q),
            lon_q: I32::new(lon_q),
        }
    }

    /// Raw quantized latitude.
    #[inline]
    pub const fn lat_q(&self) -> i32 {
        self.lat_q.get()
    }

    /// Raw quantized longitude.
    #[inline]
    pub const fn lon_q(&self) -> i32 {
        self.lon_q.get()
    }

    /// The point as a coordinate in degrees.
    #[inline]
    pub fn coord(&self) -> Coord {
        coord! {
            x: f64::from(self.lon_q.get()) / QUANTIZATION_SCALE,
            y: f64::from(self.lat_q.get()) / QUANTIZATION_SCALE,
        }
    }
}
