//! # Land tiles
//!
//! A land tile is one cell of the routing graph, decoded in place over the
//! blob read from the container. The decoder borrows every record array
//! straight out of the blob; the only derived state is the incoming-edge
//! index, built lazily on first use.

use std::cell::OnceCell;

use geo::Coord;
use self_cell::self_cell;
use thiserror::Error;
use zerocopy::{FromBytes, transmute};

mod builder;
mod edge;
mod header;
mod node;

pub use builder::{EdgeGeometry, EdgeSpec, LandTileBuilder, TileBuildError};
pub use edge::{EdgeRecord, ShapePoint};
pub use header::TileHeader;
pub use node::{NodeRecord, quantize_degrees};

use crate::shape_codec::{self, ShapeCodecError};
use header::TILE_MAGIC;

/// The largest number of edges a tile may hold; the edge index field of the
/// global edge-id layout is 16 bits wide. Larger tiles are rejected rather
/// than truncated.
pub const MAX_EDGES_PER_TILE: u32 = 1 << 16;

#[derive(Debug, Error)]
pub enum LandTileError {
    #[error("Unable to extract a slice of the correct length; the tile data is malformed.")]
    SliceLength(#[from] std::array::TryFromSliceError),
    #[error("The blob does not start with the land-tile magic.")]
    BadMagic,
    #[error("Data cast failed (this almost always means invalid data): {0}")]
    CastError(String),
    #[error("The tile holds more edges than the edge-id layout can address.")]
    TooManyEdges,
    #[error("Node {0} references edges outside the tile edge array.")]
    NodeEdgeRange(u32),
    #[error("Edge {0} references nodes outside the tile node array.")]
    EdgeNodeRange(u32),
    #[error("Edge {0} references shape points outside the tile shape array.")]
    EdgeShapeRange(u32),
    #[error("Edge {0} references polyline text outside the tile text section.")]
    EdgePolylineRange(u32),
    #[error("The tile text sections are not valid UTF-8.")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("Malformed encoded polyline: {0}")]
    ShapeCodec(#[from] ShapeCodecError),
}

/// Geometry variants an edge can carry.
#[derive(Debug, Clone, Copy)]
pub enum EdgeShape<'a> {
    /// Explicit quantized points from the tile shape array.
    Points(&'a [ShapePoint]),
    /// A polyline5-encoded string.
    Encoded(&'a str),
    /// No stored geometry; a straight from→to segment.
    Straight,
}

self_cell! {
    /// An owned land tile, decoded in place over its blob.
    ///
    /// Handles are shared between the tile cache and any live user; the
    /// blob is freed when the last handle drops.
    pub struct LandTile {
        owner: Vec<u8>,

        #[covariant]
        dependent: LandTileView,
    }
}

impl LandTile {
    /// Borrows the decoded view.
    #[inline]
    pub fn view(&self) -> &LandTileView<'_> {
        self.borrow_dependent()
    }

    /// Gets the tile header.
    #[inline]
    pub fn header(&self) -> &TileHeader {
        self.view().header()
    }

    /// Whether the tile contributes nothing to the graph.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.view().is_empty()
    }
}

impl TryFrom<Vec<u8>> for LandTile {
    type Error = LandTileError;

    fn try_from(value: Vec<u8>) -> Result<Self, Self::Error> {
        LandTile::try_new(value, |data| LandTileView::try_from(data.as_slice()))
    }
}

/// A borrowed view over a single tile blob.
///
/// All accessors are total on a validated blob; malformed blobs fail at
/// construction (or, for encoded polylines, at first geometry access),
/// never by producing corrupted geometry.
///
/// The incoming-edge index is the view's only mutable state. It is built
/// once on first use and read-only thereafter, which makes a view unsafe
/// to share across threads around that first access.
pub struct LandTileView<'a> {
    header: TileHeader,
    nodes: &'a [NodeRecord],
    edges: &'a [EdgeRecord],
    shapes: &'a [ShapePoint],
    polyline_text: &'a str,
    checksum: Option<&'a str>,
    in_edges: OnceCell<Vec<Vec<u32>>>,
}

impl<'a> TryFrom<&'a [u8]> for LandTileView<'a> {
    type Error = LandTileError;

    fn try_from(bytes: &'a [u8]) -> Result<Self, Self::Error> {
        const HEADER_SIZE: usize = size_of::<TileHeader>();

        if bytes.len() < HEADER_SIZE {
            return Err(LandTileError::CastError(
                "blob is shorter than the tile header".to_string(),
            ));
        }
        let header_slice: [u8; HEADER_SIZE] = bytes[0..HEADER_SIZE].try_into()?;
        let header: TileHeader = transmute!(header_slice);
        if header.magic != TILE_MAGIC {
            return Err(LandTileError::BadMagic);
        }
        if header.edge_count() > MAX_EDGES_PER_TILE {
            return Err(LandTileError::TooManyEdges);
        }

        // Consume the variably sized arrays sequentially; each cast returns
        // a reference to the tail, so no manual offset bookkeeping.
        let (nodes, buffer) = <[NodeRecord]>::ref_from_prefix_with_elems(
            &bytes[HEADER_SIZE..],
            header.node_count() as usize,
        )
        .map_err(|e| LandTileError::CastError(e.to_string()))?;
        let (edges, buffer) =
            <[EdgeRecord]>::ref_from_prefix_with_elems(buffer, header.edge_count() as usize)
                .map_err(|e| LandTileError::CastError(e.to_string()))?;
        let (shapes, buffer) =
            <[ShapePoint]>::ref_from_prefix_with_elems(buffer, header.shape_count() as usize)
                .map_err(|e| LandTileError::CastError(e.to_string()))?;

        let polyline_bytes = header.polyline_bytes.get() as usize;
        let checksum_bytes = usize::from(header.checksum_bytes.get());
        if buffer.len() < polyline_bytes + checksum_bytes {
            return Err(LandTileError::CastError(
                "tile text sections overrun the blob".to_string(),
            ));
        }
        let polyline_text = std::str::from_utf8(&buffer[..polyline_bytes])?;
        let checksum = if checksum_bytes == 0 {
            None
        } else {
            Some(std::str::from_utf8(
                &buffer[polyline_bytes..polyline_bytes + checksum_bytes],
            )?)
        };

        let view = Self {
            header,
            nodes,
            edges,
            shapes,
            polyline_text,
            checksum,
            in_edges: OnceCell::new(),
        };
        view.validate()?;
        Ok(view)
    }
}

impl<'a> LandTileView<'a> {
    /// Cross-checks every record reference against the section sizes, so
    /// the plain accessors can index without failure paths.
    fn validate(&self) -> Result<(), LandTileError> {
        let edge_count = self.edges.len() as u64;
        for (i, node) in self.nodes.iter().enumerate() {
            if u64::from(node.first_edge()) + u64::from(node.edge_count()) > edge_count {
                return Err(LandTileError::NodeEdgeRange(i as u32));
            }
        }

        let node_count = self.nodes.len() as u64;
        let shape_count = self.shapes.len() as u64;
        for (i, edge) in self.edges.iter().enumerate() {
            let ei = i as u32;
            if u64::from(edge.from_node()) >= node_count || u64::from(edge.to_node()) >= node_count
            {
                return Err(LandTileError::EdgeNodeRange(ei));
            }
            if edge.shape_count() > 0
                && u64::from(edge.shape_start()) + u64::from(edge.shape_count()) > shape_count
            {
                return Err(LandTileError::EdgeShapeRange(ei));
            }
            if edge.polyline_len() > 0 {
                let start = edge.polyline_start() as usize;
                let end = start + usize::from(edge.polyline_len());
                // polyline5 is pure ASCII, so any in-range slice of valid
                // text is also a char boundary; check anyway so a hostile
                // blob cannot make the slice below panic.
                if end > self.polyline_text.len()
                    || !self.polyline_text.is_char_boundary(start)
                    || !self.polyline_text.is_char_boundary(end)
                {
                    return Err(LandTileError::EdgePolylineRange(ei));
                }
            }
        }
        Ok(())
    }

    /// Gets the tile header.
    #[inline]
    pub fn header(&self) -> &TileHeader {
        &self.header
    }

    /// The number of nodes in this tile.
    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    pub fn node_count(&self) -> u32 {
        self.nodes.len() as u32
    }

    /// The number of edges in this tile.
    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    pub fn edge_count(&self) -> u32 {
        self.edges.len() as u32
    }

    /// Whether the tile contributes nothing to the graph.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() || self.edges.is_empty()
    }

    /// Gets a node record by tile-local index.
    #[inline]
    pub fn node(&self, index: u32) -> &NodeRecord {
        &self.nodes[index as usize]
    }

    /// Latitude of a node, in degrees.
    #[inline]
    pub fn node_lat(&self, index: u32) -> f64 {
        self.node(index).lat()
    }

    /// Longitude of a node, in degrees.
    #[inline]
    pub fn node_lon(&self, index: u32) -> f64 {
        self.node(index).lon()
    }

    /// Raw quantized latitude of a node (the stitching key).
    #[inline]
    pub fn node_lat_q(&self, index: u32) -> i32 {
        self.node(index).lat_q()
    }

    /// Raw quantized longitude of a node (the stitching key).
    #[inline]
    pub fn node_lon_q(&self, index: u32) -> i32 {
        self.node(index).lon_q()
    }

    /// A node's position as a coordinate.
    #[inline]
    pub fn node_coord(&self, index: u32) -> Coord {
        self.node(index).coord()
    }

    /// Index of a node's first outgoing edge.
    #[inline]
    pub fn first_edge(&self, index: u32) -> u32 {
        self.node(index).first_edge()
    }

    /// The number of outgoing edges of a node.
    #[inline]
    pub fn edge_count_from(&self, index: u32) -> u16 {
        self.node(index).edge_count()
    }

    /// Gets an edge record by tile-local index.
    #[inline]
    pub fn edge_at(&self, edge_index: u32) -> &EdgeRecord {
        &self.edges[edge_index as usize]
    }

    /// A raw slice of the tile's edges (for iteration).
    #[inline]
    pub fn edges(&self) -> &[EdgeRecord] {
        self.edges
    }

    /// The converter checksum string, when present.
    #[inline]
    pub fn checksum(&self) -> Option<&str> {
        self.checksum
    }

    /// Indices of the edges ending at the given node.
    ///
    /// The index over all nodes is built by a single scan over the edge
    /// array on first call and memoized for the lifetime of the view.
    pub fn in_edges_of(&self, index: u32) -> &[u32] {
        let in_edges = self.in_edges.get_or_init(|| {
            let mut buckets = vec![Vec::new(); self.nodes.len()];
            for (ei, edge) in self.edges.iter().enumerate() {
                // to_node is in range; validated at construction.
                #[allow(clippy::cast_possible_truncation)]
                buckets[edge.to_node() as usize].push(ei as u32);
            }
            buckets
        });
        &in_edges[index as usize]
    }

    /// The geometry descriptor of an edge.
    pub fn edge_shape(&self, edge_index: u32) -> EdgeShape<'_> {
        let edge = self.edge_at(edge_index);
        if edge.shape_count() > 0 {
            let start = edge.shape_start() as usize;
            EdgeShape::Points(&self.shapes[start..start + usize::from(edge.shape_count())])
        } else if edge.polyline_len() > 0 {
            let start = edge.polyline_start() as usize;
            EdgeShape::Encoded(&self.polyline_text[start..start + usize::from(edge.polyline_len())])
        } else {
            EdgeShape::Straight
        }
    }

    /// Appends the ordered geometry of an edge to `out`.
    ///
    /// When `skip_first` is set and `out` is non-empty, the first produced
    /// point is omitted so that consecutive edges do not duplicate their
    /// shared endpoint.
    ///
    /// # Errors
    ///
    /// Fails only when the edge carries an encoded polyline that does not
    /// decode; see [`ShapeCodecError`].
    pub fn append_edge_shape(
        &self,
        edge_index: u32,
        out: &mut Vec<Coord>,
        skip_first: bool,
    ) -> Result<(), LandTileError> {
        let skip = usize::from(skip_first && !out.is_empty());
        match self.edge_shape(edge_index) {
            EdgeShape::Points(points) => {
                out.extend(points.iter().skip(skip).map(ShapePoint::coord));
            }
            EdgeShape::Encoded(text) => {
                let decoded = shape_codec::decode_polyline5(text)?;
                out.extend(decoded.into_iter().skip(skip));
            }
            EdgeShape::Straight => {
                let edge = self.edge_at(edge_index);
                if skip == 0 {
                    out.push(self.node_coord(edge.from_node()));
                }
                out.push(self.node_coord(edge.to_node()));
            }
        }
        Ok(())
    }
}
