//! # Meridian router
//!
//! The query-time engine over a land-tile container: it sizes a corridor
//! of tiles from the requested endpoints, stitches the loaded fragments
//! into one graph, snaps the endpoints onto traversable edges, and runs a
//! bidirectional A* between two virtual vertices placed at the exact
//! snapped positions.
//!
//! A [`Router`] serves one request at a time and shares nothing; run
//! several independent instances for parallel queries.

mod graph;
mod path;
mod search;
mod snap;

use geo::{Coord, Distance, Haversine, Point};
use meridian_landtile::{
    EdgeId, InvalidEdgeIdError, LandTile, LandTileError, TileKey, TileStore, TileStoreError,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

pub use meridian_landtile::Profile;

use path::Leg;

/// Outcome kind of a routing query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteStatus {
    Ok,
    /// The endpoints snapped (or failed to snap) inside covered tiles, but
    /// no traversable path connects them.
    NoRoute,
    /// No tile in the corridor rectangle could be loaded; the request lies
    /// outside the covered region.
    NoTile,
    /// The container cannot be read or a tile blob is malformed.
    DataError,
    /// An invariant of the request itself was violated.
    InternalError,
}

/// Result of a routing query.
#[derive(Debug, Clone)]
pub struct RouteResult {
    pub status: RouteStatus,
    /// Route geometry from the first waypoint to the last; consecutive
    /// points are never exactly equal.
    pub polyline: Vec<Coord>,
    /// Haversine length of `polyline`, in metres.
    pub distance_m: f64,
    /// Accumulated traversal time, including virtual partial edges, in
    /// seconds.
    pub duration_s: f64,
    /// Global ids of the traversed edges in travel order, consecutive
    /// duplicates collapsed.
    pub edge_ids: Vec<EdgeId>,
    /// Human-readable description of the failure on non-OK statuses.
    pub error_message: String,
}

impl RouteResult {
    fn failure(status: RouteStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            polyline: Vec::new(),
            distance_m: 0.0,
            duration_s: 0.0,
            edge_ids: Vec::new(),
            error_message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
enum RouteError {
    #[error("need at least 2 waypoints")]
    TooFewWaypoints,
    #[error("no tile in the search corridor")]
    NoTile,
    #[error("empty tile")]
    EmptyTiles,
    #[error("failed to snap")]
    SnapFailed,
    #[error("no path between the snapped points")]
    NoPath,
    #[error("sub-routes do not join at the shared waypoint")]
    DiscontinuousLegs,
    #[error(transparent)]
    Store(#[from] TileStoreError),
    #[error("tile data error: {0}")]
    Tile(#[from] LandTileError),
    #[error("edge id out of range: {0}")]
    EdgeId(#[from] InvalidEdgeIdError),
}

impl RouteError {
    fn status(&self) -> RouteStatus {
        match self {
            RouteError::TooFewWaypoints => RouteStatus::InternalError,
            RouteError::NoTile => RouteStatus::NoTile,
            RouteError::EmptyTiles
            | RouteError::SnapFailed
            | RouteError::NoPath => RouteStatus::NoRoute,
            RouteError::DiscontinuousLegs
            | RouteError::Store(_)
            | RouteError::Tile(_) => RouteStatus::DataError,
            RouteError::EdgeId(_) => RouteStatus::InternalError,
        }
    }
}

/// Tunables for a [`Router`].
#[derive(Debug, Clone, Copy)]
pub struct RouterOptions {
    /// Tile zoom level; must match the level the converter wrote.
    pub tile_zoom: u8,
    /// LRU capacity of the tile cache; zero disables caching.
    pub tile_cache_capacity: usize,
    /// Overrides the heuristic reference speed, in m/s.
    ///
    /// The default is the profile maximum (13.9 car, 1.4 foot). Containers
    /// modelling faster edges must raise this to keep the search
    /// provably optimal; raising it always costs extra exploration.
    pub reference_speed_mps: Option<f64>,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            tile_zoom: 14,
            tile_cache_capacity: 128,
            reference_speed_mps: None,
        }
    }
}

/// Tiles at zoom 14 are roughly this wide, which sizes the corridor
/// inflation per straight-line kilometre.
const KM_PER_TILE: f64 = 4.0;

/// Bounds on the corridor inflation, in tiles.
const MIN_FRAME: i64 = 1;
const MAX_FRAME: i64 = 8;

/// Legs must join at shared waypoints to within this many degrees.
const LEG_JOIN_TOLERANCE_DEG: f64 = 1e-6;

/// The offline routing engine over one container.
pub struct Router {
    store: TileStore,
    options: RouterOptions,
}

impl Router {
    /// Opens the container and prepares a router.
    ///
    /// # Errors
    ///
    /// Fails when the container cannot be opened.
    pub fn open<P: AsRef<Path>>(container: P, options: RouterOptions) -> Result<Self, TileStoreError> {
        let mut store = TileStore::open(container, options.tile_cache_capacity)?;
        store.set_zoom(options.tile_zoom);
        Ok(Self { store, options })
    }

    /// Computes a shortest-time route through the given waypoints.
    ///
    /// Consecutive waypoint pairs are routed independently and the
    /// sub-routes concatenated. All failures are reported through
    /// [`RouteResult::status`]; this call does not panic on bad input.
    pub fn route(&mut self, profile: Profile, waypoints: &[Coord]) -> RouteResult {
        match self.route_inner(profile, waypoints) {
            Ok(result) => result,
            Err(error) => RouteResult::failure(error.status(), error.to_string()),
        }
    }

    fn route_inner(
        &mut self,
        profile: Profile,
        waypoints: &[Coord],
    ) -> Result<RouteResult, RouteError> {
        if waypoints.len() < 2 {
            return Err(RouteError::TooFewWaypoints);
        }

        let mut total: Option<Leg> = None;
        for pair in waypoints.windows(2) {
            let leg = self.route_leg(profile, pair[0], pair[1])?;
            total = Some(match total {
                None => leg,
                Some(total) => concatenate(total, leg)?,
            });
        }
        let total = total.expect("at least one waypoint pair");

        Ok(RouteResult {
            status: RouteStatus::Ok,
            polyline: total.polyline,
            distance_m: total.distance_m,
            duration_s: total.duration_s,
            edge_ids: total.edge_ids,
            error_message: String::new(),
        })
    }

    fn route_leg(&mut self, profile: Profile, from: Coord, to: Coord) -> Result<Leg, RouteError> {
        let zoom = self.store.zoom();
        let key_from = TileKey::containing(from, zoom);
        let key_to = TileKey::containing(to, zoom);

        let straight_km = Haversine.distance(Point::from(from), Point::from(to)) / 1000.0;
        // Widen the corridor with distance, bounded to cap the work.
        #[allow(clippy::cast_possible_truncation)]
        let frame = ((straight_km / KM_PER_TILE).ceil() as i64 + 1).clamp(MIN_FRAME, MAX_FRAME) as u32;

        let per_axis = TileKey::per_axis(zoom);
        let x_min = key_from.x.min(key_to.x).saturating_sub(frame);
        let x_max = (key_from.x.max(key_to.x) + frame).min(per_axis - 1);
        let y_min = key_from.y.min(key_to.y).saturating_sub(frame);
        let y_max = (key_from.y.max(key_to.y) + frame).min(per_axis - 1);

        let mut tiles: Vec<(TileKey, Arc<LandTile>)> = Vec::new();
        let mut loaded_any = false;
        for x in x_min..=x_max {
            for y in y_min..=y_max {
                let key = TileKey { z: zoom, x, y };
                let Some(tile) = self.store.load(key)? else {
                    continue;
                };
                loaded_any = true;
                if tile.is_empty() {
                    continue;
                }
                tiles.push((key, tile));
            }
        }
        if tiles.is_empty() {
            return Err(if loaded_any {
                RouteError::EmptyTiles
            } else {
                RouteError::NoTile
            });
        }
        debug!(tiles = tiles.len(), frame, "corridor loaded");

        let start = snap::best_snap(&tiles, from, profile)?.ok_or(RouteError::SnapFailed)?;
        let end = snap::best_snap(&tiles, to, profile)?.ok_or(RouteError::SnapFailed)?;
        debug!(
            start_dist_m = start.distance_m,
            end_dist_m = end.distance_m,
            "endpoints snapped"
        );

        let views: HashMap<TileKey, Arc<LandTile>> =
            tiles.iter().map(|(key, tile)| (*key, Arc::clone(tile))).collect();
        let mut graph = graph::SearchGraph::build(&tiles, profile);
        let (v_start, v_end) = graph.attach_endpoints(&views, &start, &end, profile);

        let reference_speed = self
            .options
            .reference_speed_mps
            .unwrap_or_else(|| profile.reference_speed_mps());
        let outcome = search::bidirectional(&graph, v_start, v_end, reference_speed)
            .ok_or(RouteError::NoPath)?;

        path::reconstruct(&graph, &outcome, &views)
    }
}

/// Joins two adjacent legs, verifying they meet at the shared waypoint.
fn concatenate(mut total: Leg, leg: Leg) -> Result<Leg, RouteError> {
    if let (Some(last), Some(first)) = (total.polyline.last(), leg.polyline.first()) {
        if (last.x - first.x).abs() > LEG_JOIN_TOLERANCE_DEG
            || (last.y - first.y).abs() > LEG_JOIN_TOLERANCE_DEG
        {
            return Err(RouteError::DiscontinuousLegs);
        }
        let drop_first = total.polyline.last() == leg.polyline.first();
        total
            .polyline
            .extend(leg.polyline.into_iter().skip(usize::from(drop_first)));
    } else {
        total.polyline.extend(leg.polyline);
    }
    total.distance_m += leg.distance_m;
    total.duration_s += leg.duration_s;
    for id in leg.edge_ids {
        if total.edge_ids.last() != Some(&id) {
            total.edge_ids.push(id);
        }
    }
    Ok(total)
}
