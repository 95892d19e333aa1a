//! # Web-Mercator tile keys
//!
//! The container is tiled on the standard web-Mercator grid: at zoom `z`
//! the world is a `2^z` by `2^z` square of tiles, x growing east from the
//! antimeridian and y growing south from the north pole.

use geo::Coord;

/// Key of a single tile at a fixed zoom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileKey {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

impl TileKey {
    /// The tile containing the given coordinate at zoom `z`.
    ///
    /// Coordinates outside the Mercator latitude range clamp to the edge
    /// rows, and longitudes at the antimeridian clamp to the edge columns,
    /// so the result always satisfies `x, y < 2^z`.
    ///
    /// # Panics
    ///
    /// Panics if `z > 20`; tile coordinates carry 20 bits in the edge-id
    /// layout.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn containing(coord: Coord, z: u8) -> Self {
        assert!(z <= 20, "zoom exceeds the 20-bit tile coordinate range");
        let n = i64::from(Self::per_axis(z));
        let lat_rad = coord.y.to_radians();

        let x = (((coord.x + 180.0) / 360.0) * n as f64).floor() as i64;
        let y = (((1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / std::f64::consts::PI) / 2.0)
            * n as f64)
            .floor() as i64;

        Self {
            z,
            x: x.clamp(0, n - 1) as u32,
            y: y.clamp(0, n - 1) as u32,
        }
    }

    /// The number of tiles along each axis at zoom `z`.
    #[inline]
    pub const fn per_axis(z: u8) -> u32 {
        1 << z
    }
}
