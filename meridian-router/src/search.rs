//! # Bidirectional A*
//!
//! Two best-first frontiers run towards each other: forward from the
//! virtual start over outgoing links, reverse from the virtual end over
//! the incoming adjacency. The heuristic is the haversine distance to the
//! opposite terminal divided by the profile reference speed, which keeps
//! it a lower bound on remaining travel time as long as no edge exceeds
//! that speed.

use crate::graph::SearchGraph;
use geo::{Distance, Haversine, Point};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Entry in a frontier queue.
#[derive(Debug, Clone, Copy)]
struct QueueItem {
    vertex: u32,
    g: f64,
    f: f64,
}

impl PartialEq for QueueItem {
    fn eq(&self, other: &Self) -> bool {
        self.f.eq(&other.f)
    }
}

impl Eq for QueueItem {}

impl Ord for QueueItem {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: lower f is "greater", because BinaryHeap is a max-heap.
        // Priorities are finite sums of finite weights and heuristics.
        other.f.partial_cmp(&self.f).unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for QueueItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Predecessor record, shared by both frontiers.
///
/// The link is addressed as (owning vertex, index in its outgoing list)
/// and is always oriented in the travel direction of the final path, on
/// the reverse frontier too.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Pred {
    /// The neighbouring vertex on the same frontier.
    pub vertex: u32,
    pub link_owner: u32,
    pub link_index: u32,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Label {
    pub g: f64,
    pub pred: Option<Pred>,
}

impl Default for Label {
    fn default() -> Self {
        Self {
            g: f64::INFINITY,
            pred: None,
        }
    }
}

pub(crate) struct SearchOutcome {
    /// The vertex where the best-known forward and reverse costs met.
    pub meet: u32,
    pub forward: Vec<Label>,
    pub backward: Vec<Label>,
}

/// Runs bidirectional A* from `source` towards `target`.
///
/// Returns `None` when both frontiers exhaust without a finite meeting
/// cost, i.e. no path exists.
pub(crate) fn bidirectional(
    graph: &SearchGraph,
    source: u32,
    target: u32,
    reference_speed_mps: f64,
) -> Option<SearchOutcome> {
    let mut forward = vec![Label::default(); graph.len()];
    let mut backward = vec![Label::default(); graph.len()];

    let source_point = Point::from(graph.coord(source));
    let target_point = Point::from(graph.coord(target));
    let h_forward =
        |v: u32| Haversine.distance(Point::from(graph.coord(v)), target_point) / reference_speed_mps;
    let h_backward =
        |v: u32| Haversine.distance(Point::from(graph.coord(v)), source_point) / reference_speed_mps;

    let mut queue_forward = BinaryHeap::new();
    let mut queue_backward = BinaryHeap::new();
    forward[source as usize].g = 0.0;
    queue_forward.push(QueueItem {
        vertex: source,
        g: 0.0,
        f: h_forward(source),
    });
    backward[target as usize].g = 0.0;
    queue_backward.push(QueueItem {
        vertex: target,
        g: 0.0,
        f: h_backward(target),
    });

    let mut best_mu = f64::INFINITY;
    let mut meet: Option<u32> = None;
    // On equal top priorities the sides take turns, instead of one frontier
    // starving the other.
    let mut tie_went_forward = false;

    loop {
        let top_forward = queue_forward.peek().map(|item| item.f);
        let top_backward = queue_backward.peek().map(|item| item.f);
        let pop_forward = match (top_forward, top_backward) {
            (None, None) => break,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (Some(f), Some(b)) => {
                if f != b {
                    f < b
                } else {
                    tie_went_forward = !tie_went_forward;
                    tie_went_forward
                }
            }
        };
        // Once the cheaper of the two next candidates cannot beat the best
        // known meeting cost, neither side can improve on it.
        let next_priority = if pop_forward { top_forward } else { top_backward };
        if next_priority.is_some_and(|f| f > best_mu) {
            break;
        }

        if pop_forward {
            let item = queue_forward.pop().expect("peeked non-empty queue");
            if item.g > forward[item.vertex as usize].g {
                continue; // stale queue entry
            }
            for (index, link) in graph.out_links(item.vertex).iter().enumerate() {
                let candidate = item.g + link.weight;
                let label = &mut forward[link.to as usize];
                if candidate < label.g {
                    label.g = candidate;
                    #[allow(clippy::cast_possible_truncation)]
                    {
                        label.pred = Some(Pred {
                            vertex: item.vertex,
                            link_owner: item.vertex,
                            link_index: index as u32,
                        });
                    }
                    queue_forward.push(QueueItem {
                        vertex: link.to,
                        g: candidate,
                        f: candidate + h_forward(link.to),
                    });
                    let opposite = backward[link.to as usize].g;
                    if opposite.is_finite() && candidate + opposite < best_mu {
                        best_mu = candidate + opposite;
                        meet = Some(link.to);
                    }
                }
            }
        } else {
            let item = queue_backward.pop().expect("peeked non-empty queue");
            if item.g > backward[item.vertex as usize].g {
                continue;
            }
            for &(owner, index) in graph.in_links(item.vertex) {
                // The link runs owner → item.vertex, i.e. in travel
                // direction towards the target.
                let link = graph.link(owner, index);
                let candidate = item.g + link.weight;
                let label = &mut backward[owner as usize];
                if candidate < label.g {
                    label.g = candidate;
                    label.pred = Some(Pred {
                        vertex: item.vertex,
                        link_owner: owner,
                        link_index: index,
                    });
                    queue_backward.push(QueueItem {
                        vertex: owner,
                        g: candidate,
                        f: candidate + h_backward(owner),
                    });
                    let opposite = forward[owner as usize].g;
                    if opposite.is_finite() && candidate + opposite < best_mu {
                        best_mu = candidate + opposite;
                        meet = Some(owner);
                    }
                }
            }
        }
    }

    meet.map(|meet| SearchOutcome {
        meet,
        forward,
        backward,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::SearchGraph;
    use crate::snap::snap_to_edge;
    use geo::coord;
    use meridian_landtile::{
        LandTile, Profile, TileKey,
        land_tile::{EdgeGeometry, EdgeSpec, LandTileBuilder},
    };
    use std::collections::HashMap;
    use std::sync::Arc;

    const KEY: TileKey = TileKey { z: 14, x: 8192, y: 8192 };

    fn spec(from: u32, to: u32, length_m: f32, speed: f32, oneway: bool) -> EdgeSpec {
        EdgeSpec {
            from_node: from,
            to_node: to,
            length_m,
            speed_mps: speed,
            foot_speed_mps: 1.4,
            oneway,
            road_class: 0,
            access_mask: 0b11,
            geometry: EdgeGeometry::None,
        }
    }

    /// A diamond: A→B→D is slower than A→C→D despite fewer metres.
    fn diamond() -> (Vec<(TileKey, Arc<LandTile>)>, HashMap<TileKey, Arc<LandTile>>) {
        let mut builder = LandTileBuilder::new(KEY);
        let a = builder.push_node(0, 0);
        let b = builder.push_node(1_000, -500);
        let c = builder.push_node(1_000, 500);
        let d = builder.push_node(2_000, 0);
        builder.push_edge(spec(a, b, 120.0, 5.0, false));
        builder.push_edge(spec(b, d, 120.0, 5.0, false));
        builder.push_edge(spec(a, c, 130.0, 13.0, false));
        builder.push_edge(spec(c, d, 130.0, 13.0, false));
        let tile = Arc::new(LandTile::try_from(builder.build().unwrap()).unwrap());
        let tiles = vec![(KEY, Arc::clone(&tile))];
        let views = tiles.iter().map(|(k, t)| (*k, Arc::clone(t))).collect();
        (tiles, views)
    }

    #[test]
    fn test_finds_the_faster_path() {
        let (tiles, views) = diamond();
        let tile = &tiles[0].1;
        let mut graph = SearchGraph::build(&tiles, Profile::Car);
        let start = snap_to_edge(KEY, tile, coord! { x: 0.0, y: 0.0 }, Profile::Car)
            .unwrap()
            .unwrap();
        let end = snap_to_edge(KEY, tile, coord! { x: 0.0, y: 0.002 }, Profile::Car)
            .unwrap()
            .unwrap();
        let (v_start, v_end) = graph.attach_endpoints(&views, &start, &end, Profile::Car);

        let outcome =
            bidirectional(&graph, v_start, v_end, Profile::Car.reference_speed_mps()).expect("path");
        // Via C: 130/13 * 2 = 20s; via B it would be 48s.
        let total = outcome.forward[outcome.meet as usize].g
            + outcome.backward[outcome.meet as usize].g;
        assert!((total - 20.0).abs() < 1e-6);
    }

    #[test]
    fn test_equal_priorities_alternate_sides() {
        // A symmetric chain: the two frontiers see identical top
        // priorities from the first pop onwards (the heuristic between
        // the terminals is the same haversine both ways), so the tie
        // branch is taken repeatedly and the frontiers advance in turns.
        let mut builder = LandTileBuilder::new(KEY);
        let nodes: Vec<u32> = (0..5).map(|i| builder.push_node(i * 1_000, 0)).collect();
        for pair in nodes.windows(2) {
            builder.push_edge(spec(pair[0], pair[1], 100.0, 10.0, false));
        }
        let tile = Arc::new(LandTile::try_from(builder.build().unwrap()).unwrap());
        let tiles = vec![(KEY, Arc::clone(&tile))];
        let views: HashMap<_, _> = tiles.iter().map(|(k, t)| (*k, Arc::clone(t))).collect();

        let mut graph = SearchGraph::build(&tiles, Profile::Car);
        let start = snap_to_edge(KEY, &tile, coord! { x: 0.0, y: 0.0 }, Profile::Car)
            .unwrap()
            .unwrap();
        let end = snap_to_edge(KEY, &tile, coord! { x: 0.0, y: 0.004 }, Profile::Car)
            .unwrap()
            .unwrap();
        let (v_start, v_end) = graph.attach_endpoints(&views, &start, &end, Profile::Car);

        let outcome =
            bidirectional(&graph, v_start, v_end, Profile::Car.reference_speed_mps()).expect("path");
        let total = outcome.forward[outcome.meet as usize].g
            + outcome.backward[outcome.meet as usize].g;
        // Four 10-second hops, zero-length virtual pieces at both ends.
        assert!((total - 40.0).abs() < 1e-9);
        // Both frontiers made progress: the meeting vertex is an interior
        // one, not either terminal.
        assert_ne!(outcome.meet, v_start);
        assert_ne!(outcome.meet, v_end);
    }

    #[test]
    fn test_disconnected_returns_none() {
        let mut builder = LandTileBuilder::new(KEY);
        let a = builder.push_node(0, 0);
        let b = builder.push_node(1_000, 0);
        let c = builder.push_node(5_000, 5_000);
        let d = builder.push_node(6_000, 5_000);
        builder.push_edge(spec(a, b, 100.0, 10.0, false));
        builder.push_edge(spec(c, d, 100.0, 10.0, false));
        let tile = Arc::new(LandTile::try_from(builder.build().unwrap()).unwrap());
        let tiles = vec![(KEY, Arc::clone(&tile))];
        let views: HashMap<_, _> = tiles.iter().map(|(k, t)| (*k, Arc::clone(t))).collect();

        let mut graph = SearchGraph::build(&tiles, Profile::Car);
        let start = snap_to_edge(KEY, &tile, coord! { x: 0.0, y: 0.0 }, Profile::Car)
            .unwrap()
            .unwrap();
        // Snap the end onto the far component.
        let end = snap_to_edge(KEY, &tile, coord! { x: 0.005, y: 0.0055 }, Profile::Car)
            .unwrap()
            .unwrap();
        assert_ne!(start.edge_index, end.edge_index);
        let (v_start, v_end) = graph.attach_endpoints(&views, &start, &end, Profile::Car);
        assert!(bidirectional(&graph, v_start, v_end, Profile::Car.reference_speed_mps()).is_none());
    }
}
