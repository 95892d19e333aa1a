use crate::tile_key::TileKey;
use std::fmt::{Display, Formatter};
use thiserror::Error;

/// The max valid tile x coordinate.
///
/// There are 20 bits for each tile coordinate.
const MAX_TILE_X: u32 = (1 << 20) - 1;

/// The max valid tile y coordinate.
const MAX_TILE_Y: u32 = (1 << 20) - 1;

/// The max valid edge index within a tile.
///
/// There are 16 bits for the index, so a tile holds at most 2^16 edges.
const MAX_EDGE_INDEX: u32 = (1 << 16) - 1;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidEdgeIdError {
    #[error("Tile x is larger than the maximum allowed value.")]
    TileX,
    #[error("Tile y is larger than the maximum allowed value.")]
    TileY,
    #[error("Edge index is larger than the maximum allowed value.")]
    EdgeIndex,
}

/// A globally unique identifier of a directed edge in the tiled graph.
/// It packs the tile key and the edge index within that tile into a
/// 64-bit integer.
///
/// # Bit field layout
///
/// The layout is part of the public contract so that hosts can interpret
/// the ids they receive:
///
/// ```text
///        MSb                                     LSb
///        ▼                                       ▼
/// bit   64        56        36        16         0
/// pos    ┌─────────┬─────────┬─────────┬─────────┐
///        │ z       │ x       │ y       │ index   │
///        └─────────┴─────────┴─────────┴─────────┘
/// size      8         20        20        16
/// ```
///
/// Every field uses its full range, so all 64-bit values decode and
/// encoding/decoding are exact inverses.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct EdgeId(u64);

impl EdgeId {
    /// Tries to construct an edge ID from the given components.
    ///
    /// # Errors
    ///
    /// This will fail if any argument contains a value greater than the
    /// allowed number of field bits.
    /// - `x`, `y` - 20 bits
    /// - `index` - 16 bits
    #[inline]
    pub const fn try_from_components(
        z: u8,
        x: u32,
        y: u32,
        index: u32,
    ) -> Result<Self, InvalidEdgeIdError> {
        if x > MAX_TILE_X {
            Err(InvalidEdgeIdError::TileX)
        } else if y > MAX_TILE_Y {
            Err(InvalidEdgeIdError::TileY)
        } else if index > MAX_EDGE_INDEX {
            Err(InvalidEdgeIdError::EdgeIndex)
        } else {
            Ok(Self(
                (z as u64) << 56 | (x as u64) << 36 | (y as u64) << 16 | index as u64,
            ))
        }
    }

    /// Constructs an edge ID for an edge index within the given tile.
    ///
    /// # Errors
    ///
    /// See [`EdgeId::try_from_components`].
    #[inline]
    pub const fn for_edge(key: TileKey, index: u32) -> Result<Self, InvalidEdgeIdError> {
        Self::try_from_components(key.z, key.x, key.y, index)
    }

    /// Creates an edge ID from a raw packed value.
    ///
    /// All 64-bit values are decodable; no validation is required.
    #[inline]
    pub const fn from_id(id: u64) -> Self {
        Self(id)
    }

    /// Extracts the raw (packed) edge ID value.
    #[inline]
    pub const fn value(&self) -> u64 {
        self.0
    }

    /// Gets the tile zoom level.
    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn z(&self) -> u8 {
        (self.0 >> 56) as u8
    }

    /// Gets the tile x coordinate.
    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn x(&self) -> u32 {
        ((self.0 >> 36) & MAX_TILE_X as u64) as u32
    }

    /// Gets the tile y coordinate.
    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn y(&self) -> u32 {
        ((self.0 >> 16) & MAX_TILE_Y as u64) as u32
    }

    /// Gets the edge index within the tile.
    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn edge_index(&self) -> u32 {
        (self.0 & MAX_EDGE_INDEX as u64) as u32
    }

    /// Gets the key of the tile holding the edge.
    #[inline]
    pub const fn tile_key(&self) -> TileKey {
        TileKey {
            z: self.z(),
            x: self.x(),
            y: self.y(),
        }
    }
}

impl Display for EdgeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!(
            "EdgeId {}/{}/{}/{}",
            self.z(),
            self.x(),
            self.y(),
            self.edge_index()
        ))
    }
}
