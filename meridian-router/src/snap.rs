//! # Edge snapping
//!
//! Projects a query coordinate onto the nearest edge a profile may
//! traverse, yielding the virtual endpoint the search starts or ends at.

use geo::{Coord, Distance, Haversine, Point, coord};
use meridian_landtile::{LandTile, LandTileError, Profile, TileKey};
use std::sync::Arc;

/// Projection of a query point onto the nearest traversable edge.
#[derive(Debug, Clone, Copy)]
pub(crate) struct EdgeSnap {
    pub tile: TileKey,
    pub edge_index: u32,
    pub from_node: u32,
    pub to_node: u32,
    /// Segment of the edge geometry the projection landed on.
    pub segment_index: usize,
    /// Projection parameter on that segment, clamped to `[0, 1]`; also
    /// used as the fraction of the edge covered by the virtual half-edges.
    pub t: f64,
    pub projected: Coord,
    /// Haversine distance from the query to the projection, in metres.
    pub distance_m: f64,
}

/// The best snap within one tile, or `None` when the tile has no edge the
/// profile may traverse.
///
/// Candidates are scored by the haversine distance from the query to the
/// projected point; ties keep the lower edge index, then the lower segment
/// index.
pub(crate) fn snap_to_edge(
    key: TileKey,
    tile: &LandTile,
    query: Coord,
    profile: Profile,
) -> Result<Option<EdgeSnap>, LandTileError> {
    let view = tile.view();
    let query_point = Point::from(query);
    let mut best: Option<EdgeSnap> = None;
    let mut shape = Vec::with_capacity(64);

    for edge_index in 0..view.edge_count() {
        let edge = view.edge_at(edge_index);
        if !edge.allows(profile) {
            continue;
        }
        shape.clear();
        view.append_edge_shape(edge_index, &mut shape, false)?;
        if shape.len() < 2 {
            continue;
        }
        for segment_index in 0..shape.len() - 1 {
            let (projected, t) =
                project_onto_segment(shape[segment_index], shape[segment_index + 1], query);
            let distance_m = Haversine.distance(query_point, Point::from(projected));
            if best.is_none_or(|b| distance_m < b.distance_m) {
                best = Some(EdgeSnap {
                    tile: key,
                    edge_index,
                    from_node: edge.from_node(),
                    to_node: edge.to_node(),
                    segment_index,
                    t,
                    projected,
                    distance_m,
                });
            }
        }
    }
    Ok(best)
}

/// The best snap across all loaded tiles.
pub(crate) fn best_snap(
    tiles: &[(TileKey, Arc<LandTile>)],
    query: Coord,
    profile: Profile,
) -> Result<Option<EdgeSnap>, LandTileError> {
    let mut best: Option<EdgeSnap> = None;
    for (key, tile) in tiles {
        if let Some(snap) = snap_to_edge(*key, tile, query, profile)?
            && best.is_none_or(|b| snap.distance_m < b.distance_m)
        {
            best = Some(snap);
        }
    }
    Ok(best)
}

/// Euclidean projection of `p` onto the segment `a`..`b` in (lon, lat)
/// space, clamped to the segment. Adequate for the short segments road
/// geometry is made of.
fn project_onto_segment(a: Coord, b: Coord, p: Coord) -> (Coord, f64) {
    let (vx, vy) = (b.x - a.x, b.y - a.y);
    let (wx, wy) = (p.x - a.x, p.y - a.y);
    let c1 = vx * wx + vy * wy;
    let c2 = vx * vx + vy * vy;
    // Degenerate segments project onto their start.
    let t = if c2 <= 1e-12 {
        0.0
    } else {
        (c1 / c2).clamp(0.0, 1.0)
    };
    (coord! { x: a.x + t * vx, y: a.y + t * vy }, t)
}
