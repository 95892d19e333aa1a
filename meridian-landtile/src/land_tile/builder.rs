use super::MAX_EDGES_PER_TILE;
use super::edge::{EdgeRecord, ShapePoint};
use super::header::{TILE_MAGIC, TileHeader};
use super::node::NodeRecord;
use crate::tile_key::TileKey;
use thiserror::Error;
use zerocopy::{IntoBytes, U16, U32};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TileBuildError {
    #[error("The tile holds more edges than the edge-id layout can address.")]
    TooManyEdges,
    #[error("Edge {0} references a node that was never pushed.")]
    UnknownNode(u32),
    #[error("Node {0} has more outgoing edges than its record can hold.")]
    DegreeOverflow(u32),
    #[error("The shape slice of edge {0} overflows its record fields.")]
    ShapeOverflow(u32),
    #[error("The encoded polyline of edge {0} overflows its record fields.")]
    PolylineOverflow(u32),
    #[error("The checksum string overflows its header field.")]
    ChecksumOverflow,
}

/// Geometry attached to an edge under construction.
#[derive(Debug, Clone)]
pub enum EdgeGeometry {
    /// Explicit quantized `(lat_q, lon_q)` points, from-node first.
    Shape(Vec<(i32, i32)>),
    /// A polyline5-encoded string.
    Encoded(String),
    /// A straight from→to segment.
    None,
}

/// An edge handed to [`LandTileBuilder::push_edge`].
#[derive(Debug, Clone)]
pub struct EdgeSpec {
    pub from_node: u32,
    pub to_node: u32,
    pub length_m: f32,
    pub speed_mps: f32,
    pub foot_speed_mps: f32,
    pub oneway: bool,
    pub road_class: u8,
    pub access_mask: u16,
    pub geometry: EdgeGeometry,
}

/// Serialises a land-tile blob.
///
/// Used by the offline converter and by test fixtures; the query engine
/// only ever reads. Edges may be pushed in any order; the builder groups
/// them per start node to satisfy the forward-star layout, keeping the
/// push order within each node.
pub struct LandTileBuilder {
    key: TileKey,
    version: u32,
    profile_mask: u32,
    checksum: Option<String>,
    nodes: Vec<(i32, i32)>,
    edges: Vec<EdgeSpec>,
}

impl LandTileBuilder {
    pub fn new(key: TileKey) -> Self {
        Self {
            key,
            version: 1,
            profile_mask: 0b11,
            checksum: None,
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    #[must_use]
    pub fn with_profile_mask(mut self, profile_mask: u32) -> Self {
        self.profile_mask = profile_mask;
        self
    }

    #[must_use]
    pub fn with_checksum(mut self, checksum: impl Into<String>) -> Self {
        self.checksum = Some(checksum.into());
        self
    }

    /// Adds a node with the given quantized position; returns its
    /// tile-local index.
    #[allow(clippy::cast_possible_truncation)]
    pub fn push_node(&mut self, lat_q: i32, lon_q: i32) -> u32 {
        self.nodes.push((lat_q, lon_q));
        (self.nodes.len() - 1) as u32
    }

    /// Adds an edge; returns its position in push order.
    ///
    /// Note that the edge index in the built tile is assigned by the
    /// forward-star grouping, not by push order.
    #[allow(clippy::cast_possible_truncation)]
    pub fn push_edge(&mut self, spec: EdgeSpec) -> u32 {
        self.edges.push(spec);
        (self.edges.len() - 1) as u32
    }

    /// Assembles the blob.
    ///
    /// # Errors
    ///
    /// Fails when a record field cannot hold its value; see
    /// [`TileBuildError`].
    #[allow(clippy::cast_possible_truncation)]
    pub fn build(mut self) -> Result<Vec<u8>, TileBuildError> {
        if self.edges.len() as u64 > u64::from(MAX_EDGES_PER_TILE) {
            return Err(TileBuildError::TooManyEdges);
        }
        let node_count = self.nodes.len() as u32;
        for (i, spec) in self.edges.iter().enumerate() {
            if spec.from_node >= node_count || spec.to_node >= node_count {
                return Err(TileBuildError::UnknownNode(i as u32));
            }
        }
        // Group edges by start node; stable, so push order survives within
        // a node.
        self.edges.sort_by_key(|spec| spec.from_node);

        let mut shapes: Vec<ShapePoint> = Vec::new();
        let mut polyline_text = String::new();
        let mut edge_records = Vec::with_capacity(self.edges.len());
        for (ei, spec) in self.edges.iter().enumerate() {
            let ei = ei as u32;
            let (shape_start, shape_count, polyline_start, polyline_len) = match &spec.geometry {
                EdgeGeometry::Shape(points) => {
                    let start = u32::try_from(shapes.len())
                        .map_err(|_| TileBuildError::ShapeOverflow(ei))?;
                    let count = u16::try_from(points.len())
                        .map_err(|_| TileBuildError::ShapeOverflow(ei))?;
                    shapes.extend(points.iter().map(|&(lat_q, lon_q)| ShapePoint::new(lat_q, lon_q)));
                    (start, count, 0, 0)
                }
                EdgeGeometry::Encoded(encoded) => {
                    let start = u32::try_from(polyline_text.len())
                        .map_err(|_| TileBuildError::PolylineOverflow(ei))?;
                    let len = u16::try_from(encoded.len())
                        .map_err(|_| TileBuildError::PolylineOverflow(ei))?;
                    polyline_text.push_str(encoded);
                    (0, 0, start, len)
                }
                EdgeGeometry::None => (0, 0, 0, 0),
            };
            edge_records.push(EdgeRecord::new(
                spec.from_node,
                spec.to_node,
                spec.length_m,
                spec.speed_mps,
                spec.foot_speed_mps,
                spec.oneway,
                spec.road_class,
                spec.access_mask,
                shape_start,
                shape_count,
                polyline_start,
                polyline_len,
            ));
        }

        let mut node_records = Vec::with_capacity(self.nodes.len());
        let mut next_edge = 0u32;
        for (i, &(lat_q, lon_q)) in self.nodes.iter().enumerate() {
            let i = i as u32;
            let degree = self.edges.iter().filter(|spec| spec.from_node == i).count();
            let degree = u16::try_from(degree).map_err(|_| TileBuildError::DegreeOverflow(i))?;
            node_records.push(NodeRecord::new(i, lat_q, lon_q, next_edge, degree));
            next_edge += u32::from(degree);
        }

        let checksum = self.checksum.unwrap_or_default();
        let checksum_bytes =
            u16::try_from(checksum.len()).map_err(|_| TileBuildError::ChecksumOverflow)?;
        let header = TileHeader {
            magic: TILE_MAGIC,
            z: U16::new(u16::from(self.key.z)),
            x: U32::new(self.key.x),
            y: U32::new(self.key.y),
            version: U32::new(self.version),
            profile_mask: U32::new(self.profile_mask),
            node_count: U32::new(node_count),
            edge_count: U32::new(edge_records.len() as u32),
            shape_count: U32::new(shapes.len() as u32),
            polyline_bytes: U32::new(polyline_text.len() as u32),
            checksum_bytes: U16::new(checksum_bytes),
        };

        let mut out = Vec::with_capacity(
            size_of::<TileHeader>()
                + node_records.len() * size_of::<NodeRecord>()
                + edge_records.len() * size_of::<EdgeRecord>()
                + shapes.len() * size_of::<ShapePoint>()
                + polyline_text.len()
                + checksum.len(),
        );
        out.extend_from_slice(header.as_bytes());
        out.extend_from_slice(node_records.as_slice().as_bytes());
        out.extend_from_slice(edge_records.as_slice().as_bytes());
        out.extend_from_slice(shapes.as_slice().as_bytes());
        out.extend_from_slice(polyline_text.as_bytes());
        out.extend_from_slice(checksum.as_bytes());
        Ok(out)
    }
}
