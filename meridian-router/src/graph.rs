//! # Graph assembly
//!
//! Builds the per-query search graph from a rectangle of loaded tiles.
//! Tile-local nodes are merged into one vertex whenever their quantized
//! coordinate pairs are bitwise equal; the container guarantees that the
//! same real-world node quantizes identically across tile borders, so this
//! is the sole stitching rule.

use crate::snap::EdgeSnap;
use geo::Coord;
use meridian_landtile::land_tile::LandTileView;
use meridian_landtile::{LandTile, Profile, TileKey};
use std::collections::HashMap;
use std::sync::Arc;

/// A directed link in the assembled graph.
#[derive(Debug, Clone)]
pub(crate) struct Link {
    pub to: u32,
    /// Traversal time in seconds.
    pub weight: f64,
    /// Tile and index of the underlying real edge.
    pub tile: TileKey,
    pub edge_index: u32,
    pub kind: LinkKind,
}

#[derive(Debug, Clone)]
pub(crate) enum LinkKind {
    /// A whole tile edge; `reversed` when travelled against the stored
    /// geometry direction.
    Real { reversed: bool },
    /// A query-time half-edge covering part of its real edge; endpoints
    /// stored in travel order.
    Virtual { from: Coord, to: Coord },
}

/// The stitched multi-tile graph one query searches over.
pub(crate) struct SearchGraph {
    coords: Vec<Coord>,
    out: Vec<Vec<Link>>,
    /// Per vertex: `(from_vertex, index into out[from_vertex])` of every
    /// incoming link. This is the reverse frontier's adjacency.
    rin: Vec<Vec<(u32, u32)>>,
    by_quantized: HashMap<(i32, i32), u32>,
}

impl SearchGraph {
    /// Assembles the base graph for a profile.
    pub fn build(tiles: &[(TileKey, Arc<LandTile>)], profile: Profile) -> Self {
        let mut graph = Self {
            coords: Vec::new(),
            out: Vec::new(),
            rin: Vec::new(),
            by_quantized: HashMap::new(),
        };

        for (_, tile) in tiles {
            let view = tile.view();
            for i in 0..view.node_count() {
                graph.merge_vertex(view.node_lat_q(i), view.node_lon_q(i), view.node_coord(i));
            }
        }

        for (key, tile) in tiles {
            let view = tile.view();
            for edge_index in 0..view.edge_count() {
                let edge = view.edge_at(edge_index);
                if !edge.allows(profile) {
                    continue;
                }
                let weight = edge.traversal_secs(profile);
                let from = graph.node_vertex(view, edge.from_node());
                let to = graph.node_vertex(view, edge.to_node());
                graph.push_link(
                    from,
                    Link {
                        to,
                        weight,
                        tile: *key,
                        edge_index,
                        kind: LinkKind::Real { reversed: false },
                    },
                );
                // The same gate applies to the opposite direction; today
                // that is exactly the oneway flag.
                if !edge.oneway() {
                    graph.push_link(
                        to,
                        Link {
                            to: from,
                            weight,
                            tile: *key,
                            edge_index,
                            kind: LinkKind::Real { reversed: true },
                        },
                    );
                }
            }
        }

        graph
    }

    /// Adds the virtual start and end vertices for a pair of snaps and
    /// wires their half-edges; returns `(v_start, v_end)`.
    ///
    /// Each half-edge covers the snap fraction of its real edge: entering
    /// or leaving against the stored direction is only wired when the edge
    /// is not oneway. When both snaps land on the same tile edge, a direct
    /// start→end half-edge covers the stretch between the projections, so
    /// the two virtual pieces together always correspond to the snapped
    /// fractions.
    pub fn attach_endpoints(
        &mut self,
        views: &HashMap<TileKey, Arc<LandTile>>,
        start: &EdgeSnap,
        end: &EdgeSnap,
        profile: Profile,
    ) -> (u32, u32) {
        let v_start = self.push_vertex(start.projected);
        let v_end = self.push_vertex(end.projected);

        {
            let view = views[&start.tile].view();
            let edge = view.edge_at(start.edge_index);
            let total = edge.traversal_secs(profile);
            let to_vertex = self.node_vertex_existing(view.node_lat_q(start.to_node), view.node_lon_q(start.to_node));
            self.push_link(
                v_start,
                Link {
                    to: to_vertex,
                    weight: (1.0 - start.t) * total,
                    tile: start.tile,
                    edge_index: start.edge_index,
                    kind: LinkKind::Virtual {
                        from: start.projected,
                        to: view.node_coord(start.to_node),
                    },
                },
            );
            if !edge.oneway() {
                let from_vertex = self
                    .node_vertex_existing(view.node_lat_q(start.from_node), view.node_lon_q(start.from_node));
                self.push_link(
                    v_start,
                    Link {
                        to: from_vertex,
                        weight: start.t * total,
                        tile: start.tile,
                        edge_index: start.edge_index,
                        kind: LinkKind::Virtual {
                            from: start.projected,
                            to: view.node_coord(start.from_node),
                        },
                    },
                );
            }
        }

        {
            let view = views[&end.tile].view();
            let edge = view.edge_at(end.edge_index);
            let total = edge.traversal_secs(profile);
            let from_vertex = self
                .node_vertex_existing(view.node_lat_q(end.from_node), view.node_lon_q(end.from_node));
            self.push_link(
                from_vertex,
                Link {
                    to: v_end,
                    weight: end.t * total,
                    tile: end.tile,
                    edge_index: end.edge_index,
                    kind: LinkKind::Virtual {
                        from: view.node_coord(end.from_node),
                        to: end.projected,
                    },
                },
            );
            if !edge.oneway() {
                let to_vertex =
                    self.node_vertex_existing(view.node_lat_q(end.to_node), view.node_lon_q(end.to_node));
                self.push_link(
                    to_vertex,
                    Link {
                        to: v_end,
                        weight: (1.0 - end.t) * total,
                        tile: end.tile,
                        edge_index: end.edge_index,
                        kind: LinkKind::Virtual {
                            from: view.node_coord(end.to_node),
                            to: end.projected,
                        },
                    },
                );
            }
        }

        if start.tile == end.tile && start.edge_index == end.edge_index {
            let view = views[&start.tile].view();
            let edge = view.edge_at(start.edge_index);
            let total = edge.traversal_secs(profile);
            let forward = (start.segment_index, start.t) <= (end.segment_index, end.t);
            if forward || !edge.oneway() {
                self.push_link(
                    v_start,
                    Link {
                        to: v_end,
                        weight: (end.t - start.t).abs() * total,
                        tile: start.tile,
                        edge_index: start.edge_index,
                        kind: LinkKind::Virtual {
                            from: start.projected,
                            to: end.projected,
                        },
                    },
                );
            }
        }

        (v_start, v_end)
    }

    /// The number of vertices, including any virtual ones.
    #[inline]
    pub fn len(&self) -> usize {
        self.coords.len()
    }

    #[inline]
    pub fn coord(&self, vertex: u32) -> Coord {
        self.coords[vertex as usize]
    }

    #[inline]
    pub fn out_links(&self, vertex: u32) -> &[Link] {
        &self.out[vertex as usize]
    }

    #[inline]
    pub fn in_links(&self, vertex: u32) -> &[(u32, u32)] {
        &self.rin[vertex as usize]
    }

    #[inline]
    pub fn link(&self, owner: u32, index: u32) -> &Link {
        &self.out[owner as usize][index as usize]
    }

    fn merge_vertex(&mut self, lat_q: i32, lon_q: i32, coord: Coord) -> u32 {
        if let Some(&vertex) = self.by_quantized.get(&(lat_q, lon_q)) {
            return vertex;
        }
        let vertex = self.push_vertex(coord);
        self.by_quantized.insert((lat_q, lon_q), vertex);
        vertex
    }

    #[allow(clippy::cast_possible_truncation)]
    fn push_vertex(&mut self, coord: Coord) -> u32 {
        let vertex = self.coords.len() as u32;
        self.coords.push(coord);
        self.out.push(Vec::new());
        self.rin.push(Vec::new());
        vertex
    }

    fn node_vertex(&self, view: &LandTileView<'_>, node: u32) -> u32 {
        self.node_vertex_existing(view.node_lat_q(node), view.node_lon_q(node))
    }

    fn node_vertex_existing(&self, lat_q: i32, lon_q: i32) -> u32 {
        // Every tile node was merged during build.
        self.by_quantized[&(lat_q, lon_q)]
    }

    #[allow(clippy::cast_possible_truncation)]
    fn push_link(&mut self, from: u32, link: Link) {
        let index = self.out[from as usize].len() as u32;
        let to = link.to;
        self.out[from as usize].push(link);
        self.rin[to as usize].push((from, index));
    }
}
