//! # Path reconstruction
//!
//! Turns the predecessor chains of a finished search into the route
//! geometry, duration, and the ordered list of global edge ids.

use crate::RouteError;
use crate::graph::{Link, LinkKind, SearchGraph};
use crate::search::SearchOutcome;
use geo::{Coord, Distance, Haversine, Point};
use meridian_landtile::{EdgeId, LandTile, TileKey};
use std::collections::HashMap;
use std::sync::Arc;

/// One reconstructed sub-route.
#[derive(Debug, Clone, Default)]
pub(crate) struct Leg {
    pub polyline: Vec<Coord>,
    pub distance_m: f64,
    pub duration_s: f64,
    pub edge_ids: Vec<EdgeId>,
}

/// Walks the two predecessor chains and assembles the leg.
///
/// Every link, on either frontier, is stored oriented in the travel
/// direction of the final path, so the forward chain is reversed and the
/// reverse chain appended as-is.
pub(crate) fn reconstruct(
    graph: &SearchGraph,
    outcome: &SearchOutcome,
    views: &HashMap<TileKey, Arc<LandTile>>,
) -> Result<Leg, RouteError> {
    let mut links: Vec<&Link> = Vec::new();
    let mut vertex = outcome.meet;
    while let Some(pred) = outcome.forward[vertex as usize].pred {
        links.push(graph.link(pred.link_owner, pred.link_index));
        vertex = pred.vertex;
    }
    links.reverse();
    let mut vertex = outcome.meet;
    while let Some(pred) = outcome.backward[vertex as usize].pred {
        links.push(graph.link(pred.link_owner, pred.link_index));
        vertex = pred.vertex;
    }

    let mut leg = Leg::default();
    let mut shape: Vec<Coord> = Vec::new();
    for link in links {
        match &link.kind {
            LinkKind::Virtual { from, to } => {
                push_point(&mut leg.polyline, *from);
                push_point(&mut leg.polyline, *to);
            }
            LinkKind::Real { reversed } => {
                shape.clear();
                let tile = views
                    .get(&link.tile)
                    .expect("path link refers to a loaded tile");
                tile.view().append_edge_shape(link.edge_index, &mut shape, false)?;
                if *reversed {
                    shape.reverse();
                }
                for point in shape.drain(..) {
                    push_point(&mut leg.polyline, point);
                }
            }
        }
        leg.duration_s += link.weight;
        let id = EdgeId::for_edge(link.tile, link.edge_index)?;
        if leg.edge_ids.last() != Some(&id) {
            leg.edge_ids.push(id);
        }
    }

    // Distance is recomputed from the emitted geometry rather than summed
    // from stored edge lengths, keeping it self-consistent with the
    // polyline.
    leg.distance_m = leg
        .polyline
        .windows(2)
        .map(|pair| Haversine.distance(Point::from(pair[0]), Point::from(pair[1])))
        .sum();
    Ok(leg)
}

/// Appends a point unless it exactly repeats the current tail; the emitted
/// polyline never holds two consecutive equal points.
fn push_point(polyline: &mut Vec<Coord>, point: Coord) {
    if polyline.last() != Some(&point) {
        polyline.push(point);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::coord;

    #[test]
    fn test_push_point_collapses_exact_duplicates() {
        let mut polyline = Vec::new();
        push_point(&mut polyline, coord! { x: 0.0, y: 0.0 });
        push_point(&mut polyline, coord! { x: 0.0, y: 0.0 });
        push_point(&mut polyline, coord! { x: 0.001, y: 0.0 });
        push_point(&mut polyline, coord! { x: 0.0, y: 0.0 });
        assert_eq!(polyline.len(), 3);
    }
}
