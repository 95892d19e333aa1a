//! End-to-end routing scenarios against freshly built containers.

use geo::{Coord, Distance, Haversine, Point, coord};
use meridian_landtile::land_tile::{EdgeGeometry, EdgeSpec, LandTileBuilder};
use meridian_landtile::{EdgeId, TileKey};
use meridian_router::{Profile, RouteResult, RouteStatus, Router, RouterOptions};
use rusqlite::Connection;
use std::path::PathBuf;
use tempfile::TempDir;

/// The z14 tile containing (0, 0).
const ORIGIN: TileKey = TileKey { z: 14, x: 8192, y: 8192 };

fn create_container(dir: &TempDir, tiles: &[(TileKey, Vec<u8>)]) -> PathBuf {
    let path = dir.path().join("routing.db");
    let conn = Connection::open(&path).expect("create container");
    conn.execute_batch(
        "CREATE TABLE land_tiles (
             z INTEGER NOT NULL,
             x INTEGER NOT NULL,
             y INTEGER NOT NULL,
             lat_min REAL, lon_min REAL, lat_max REAL, lon_max REAL,
             version INTEGER,
             checksum TEXT,
             profile_mask INTEGER,
             data BLOB NOT NULL
         );
         CREATE UNIQUE INDEX idx_land_tiles_zxy ON land_tiles(z, x, y);
         CREATE TABLE metadata (key TEXT PRIMARY KEY, value TEXT);",
    )
    .expect("create schema");
    for (key, blob) in tiles {
        conn.execute(
            "INSERT INTO land_tiles (z, x, y, version, profile_mask, data)
             VALUES (?1, ?2, ?3, 1, 3, ?4)",
            rusqlite::params![key.z, key.x, key.y, blob],
        )
        .expect("insert tile");
    }
    path
}

fn open_router(path: &PathBuf) -> Router {
    Router::open(path, RouterOptions::default()).expect("open router")
}

fn assert_no_consecutive_duplicates(result: &RouteResult) {
    for pair in result.polyline.windows(2) {
        assert_ne!(pair[0], pair[1], "polyline repeats a point");
    }
}

/// The reported distance is exactly the haversine sum over the geometry.
fn assert_distance_matches_polyline(result: &RouteResult) {
    let recomputed: f64 = result
        .polyline
        .windows(2)
        .map(|pair| Haversine.distance(Point::from(pair[0]), Point::from(pair[1])))
        .sum();
    assert!((result.distance_m - recomputed).abs() < 1e-6);
}

/// A single tile with one edge from (0, 0) to (0.001, 0).
fn oneway_tile(oneway: bool, access_mask: u16, foot_speed: f32) -> Vec<u8> {
    let mut builder = LandTileBuilder::new(ORIGIN);
    let a = builder.push_node(0, 0);
    let b = builder.push_node(1_000, 0);
    builder.push_edge(EdgeSpec {
        from_node: a,
        to_node: b,
        length_m: 111.32,
        speed_mps: 10.0,
        foot_speed_mps: foot_speed,
        oneway,
        road_class: 3,
        access_mask,
        geometry: EdgeGeometry::None,
    });
    builder.build().expect("build tile")
}

const A: Coord = Coord { x: 0.0, y: 0.0 };
const B: Coord = Coord { x: 0.0, y: 0.001 };

#[test]
fn empty_tile_yields_no_route() {
    let dir = tempfile::tempdir().unwrap();
    let blob = LandTileBuilder::new(ORIGIN).build().unwrap();
    let path = create_container(&dir, &[(ORIGIN, blob)]);

    let result = open_router(&path).route(Profile::Car, &[A, A]);
    assert_eq!(result.status, RouteStatus::NoRoute);
    assert_eq!(result.error_message, "empty tile");
}

#[test]
fn single_oneway_edge_forward() {
    let dir = tempfile::tempdir().unwrap();
    let path = create_container(&dir, &[(ORIGIN, oneway_tile(true, 0b11, 1.4))]);

    let result = open_router(&path).route(Profile::Car, &[A, B]);
    assert_eq!(result.status, RouteStatus::Ok, "{}", result.error_message);
    assert!((result.distance_m - 111.32).abs() < 0.5);
    assert!((result.duration_s - 11.132).abs() < 0.01);
    assert_eq!(
        result.edge_ids,
        vec![EdgeId::try_from_components(14, ORIGIN.x, ORIGIN.y, 0).unwrap()]
    );
    assert_eq!(result.polyline.first(), Some(&A));
    assert_eq!(result.polyline.last(), Some(&B));
    assert_no_consecutive_duplicates(&result);
    assert_distance_matches_polyline(&result);
}

#[test]
fn single_oneway_edge_wrong_direction() {
    let dir = tempfile::tempdir().unwrap();
    let path = create_container(&dir, &[(ORIGIN, oneway_tile(true, 0b11, 1.4))]);

    let result = open_router(&path).route(Profile::Car, &[B, A]);
    assert_eq!(result.status, RouteStatus::NoRoute);
}

#[test]
fn profile_gating() {
    let dir = tempfile::tempdir().unwrap();
    // Motor-only access; pedestrian speed zeroed.
    let path = create_container(&dir, &[(ORIGIN, oneway_tile(false, 0b01, 0.0))]);
    let mut router = open_router(&path);

    let foot = router.route(Profile::Foot, &[A, B]);
    assert_eq!(foot.status, RouteStatus::NoRoute);
    assert_eq!(foot.error_message, "failed to snap");

    let car = router.route(Profile::Car, &[A, B]);
    assert_eq!(car.status, RouteStatus::Ok, "{}", car.error_message);
}

/// A single bidirectional 100 m edge for the mid-edge snap scenarios.
fn mid_edge_container(dir: &TempDir, oneway: bool) -> PathBuf {
    let mut builder = LandTileBuilder::new(ORIGIN);
    let a = builder.push_node(0, 0);
    let b = builder.push_node(900, 0);
    builder.push_edge(EdgeSpec {
        from_node: a,
        to_node: b,
        length_m: 100.0,
        speed_mps: 10.0,
        foot_speed_mps: 1.4,
        oneway,
        road_class: 3,
        access_mask: 0b11,
        geometry: EdgeGeometry::None,
    });
    create_container(dir, &[(ORIGIN, builder.build().unwrap())])
}

const QUARTER: Coord = Coord { x: 0.0, y: 0.000225 };
const THREE_QUARTERS: Coord = Coord { x: 0.0, y: 0.000675 };

#[test]
fn mid_edge_snap_covers_the_fraction_between_projections() {
    let dir = tempfile::tempdir().unwrap();
    let path = mid_edge_container(&dir, false);

    let result = open_router(&path).route(Profile::Car, &[QUARTER, THREE_QUARTERS]);
    assert_eq!(result.status, RouteStatus::Ok, "{}", result.error_message);
    assert!((result.duration_s - 5.0).abs() < 1e-6);
    assert!((result.distance_m - 50.0).abs() < 0.5);
    assert_eq!(
        result.edge_ids,
        vec![EdgeId::try_from_components(14, ORIGIN.x, ORIGIN.y, 0).unwrap()]
    );
    // Start projection straight to end projection; neither A nor B appears.
    assert_eq!(result.polyline.len(), 2);
    assert!((result.polyline[0].y - 0.000225).abs() < 1e-9);
    assert!((result.polyline[1].y - 0.000675).abs() < 1e-9);
}

#[test]
fn mid_edge_snap_works_against_the_grain_when_bidirectional() {
    let dir = tempfile::tempdir().unwrap();
    let path = mid_edge_container(&dir, false);

    let result = open_router(&path).route(Profile::Car, &[THREE_QUARTERS, QUARTER]);
    assert_eq!(result.status, RouteStatus::Ok, "{}", result.error_message);
    assert!((result.duration_s - 5.0).abs() < 1e-6);
}

#[test]
fn mid_edge_snap_against_a_oneway_finds_no_route() {
    let dir = tempfile::tempdir().unwrap();
    let path = mid_edge_container(&dir, true);

    let result = open_router(&path).route(Profile::Car, &[THREE_QUARTERS, QUARTER]);
    assert_eq!(result.status, RouteStatus::NoRoute);
}

#[test]
fn cross_tile_stitching() {
    let dir = tempfile::tempdir().unwrap();
    let right_key = TileKey { z: 14, x: 8193, y: 8192 };
    // The shared meridian of the two tiles is at ~0.02197°; node N sits on
    // it with identical quantized coordinates in both tiles.
    let border = (0, 21_973);

    let mut left = LandTileBuilder::new(ORIGIN);
    let m = left.push_node(0, 21_000);
    let n = left.push_node(border.0, border.1);
    left.push_edge(EdgeSpec {
        from_node: m,
        to_node: n,
        length_m: 108.2,
        speed_mps: 10.0,
        foot_speed_mps: 1.4,
        oneway: true,
        road_class: 3,
        access_mask: 0b11,
        geometry: EdgeGeometry::None,
    });

    let mut right = LandTileBuilder::new(right_key);
    let n2 = right.push_node(border.0, border.1);
    let p = right.push_node(0, 23_000);
    right.push_edge(EdgeSpec {
        from_node: n2,
        to_node: p,
        length_m: 114.2,
        speed_mps: 10.0,
        foot_speed_mps: 1.4,
        oneway: true,
        road_class: 3,
        access_mask: 0b11,
        geometry: EdgeGeometry::None,
    });

    let path = create_container(
        &dir,
        &[(ORIGIN, left.build().unwrap()), (right_key, right.build().unwrap())],
    );

    let start = coord! { x: 0.021, y: 0.0 };
    let end = coord! { x: 0.023, y: 0.0 };
    let result = open_router(&path).route(Profile::Car, &[start, end]);
    assert_eq!(result.status, RouteStatus::Ok, "{}", result.error_message);
    assert_eq!(
        result.edge_ids,
        vec![
            EdgeId::try_from_components(14, ORIGIN.x, ORIGIN.y, 0).unwrap(),
            EdgeId::try_from_components(14, right_key.x, right_key.y, 0).unwrap(),
        ]
    );
    // Both edges are travelled end to end, so the duration is the sum of
    // the two per-edge times.
    assert!((result.duration_s - (10.82 + 11.42)).abs() < 0.01);
    // The polyline passes through the border node.
    assert!(
        result
            .polyline
            .iter()
            .any(|p| (p.x - 0.021973).abs() < 1e-9 && p.y.abs() < 1e-9)
    );
    assert_no_consecutive_duplicates(&result);
    assert_distance_matches_polyline(&result);
}

#[test]
fn multi_waypoint_legs_concatenate() {
    let dir = tempfile::tempdir().unwrap();
    let path = mid_edge_container(&dir, false);

    let stops = [
        coord! { x: 0.0, y: 0.00009 },
        coord! { x: 0.0, y: 0.00045 },
        coord! { x: 0.0, y: 0.00081 },
    ];
    let result = open_router(&path).route(Profile::Car, &stops);
    assert_eq!(result.status, RouteStatus::Ok, "{}", result.error_message);
    // Two legs of 0.4 of the edge each.
    assert!((result.duration_s - 8.0).abs() < 1e-6);
    // The shared edge id collapses across the seam.
    assert_eq!(result.edge_ids.len(), 1);
    assert_eq!(result.polyline.len(), 3);
    assert_no_consecutive_duplicates(&result);
}

#[test]
fn too_few_waypoints_is_an_internal_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = create_container(&dir, &[(ORIGIN, oneway_tile(false, 0b11, 1.4))]);

    let result = open_router(&path).route(Profile::Car, &[A]);
    assert_eq!(result.status, RouteStatus::InternalError);
    assert_eq!(result.error_message, "need at least 2 waypoints");
}

#[test]
fn uncovered_region_yields_no_tile() {
    let dir = tempfile::tempdir().unwrap();
    let path = create_container(&dir, &[(ORIGIN, oneway_tile(false, 0b11, 1.4))]);

    let far_a = coord! { x: 50.0, y: 50.0 };
    let far_b = coord! { x: 50.001, y: 50.0 };
    let result = open_router(&path).route(Profile::Car, &[far_a, far_b]);
    assert_eq!(result.status, RouteStatus::NoTile);
}

#[test]
fn corrupt_tile_yields_data_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = create_container(&dir, &[(ORIGIN, b"garbage".to_vec())]);

    let result = open_router(&path).route(Profile::Car, &[A, B]);
    assert_eq!(result.status, RouteStatus::DataError);
}

#[test]
fn duration_is_optimal_on_a_graph_with_alternatives() {
    let dir = tempfile::tempdir().unwrap();
    // A square grid where the direct edge is slow and the detour is fast.
    let mut builder = LandTileBuilder::new(ORIGIN);
    let a = builder.push_node(0, 0);
    let b = builder.push_node(0, 900);
    let c = builder.push_node(900, 0);
    let d = builder.push_node(900, 900);
    let edge = |from, to, length_m: f32, speed: f32| EdgeSpec {
        from_node: from,
        to_node: to,
        length_m,
        speed_mps: speed,
        foot_speed_mps: 1.4,
        oneway: false,
        road_class: 0,
        access_mask: 0b11,
        geometry: EdgeGeometry::None,
    };
    // Direct A-B crawls; A-C-D-B flows.
    builder.push_edge(edge(a, b, 100.0, 1.0));
    builder.push_edge(edge(a, c, 100.0, 10.0));
    builder.push_edge(edge(c, d, 140.0, 10.0));
    builder.push_edge(edge(d, b, 100.0, 10.0));
    let path = create_container(&dir, &[(ORIGIN, builder.build().unwrap())]);

    let result = open_router(&path).route(
        Profile::Car,
        &[coord! { x: 0.0, y: 0.0 }, coord! { x: 0.0009, y: 0.0 }],
    );
    assert_eq!(result.status, RouteStatus::Ok, "{}", result.error_message);
    // 10 + 14 + 10 beats the direct 100 seconds.
    assert!((result.duration_s - 34.0).abs() < 1e-6);
    // The detour edges appear in travel order; the zero-length virtual
    // pieces at the terminals emit the id of the edge they snap to.
    let detour: Vec<EdgeId> = [1, 2, 3]
        .into_iter()
        .map(|ei| EdgeId::try_from_components(14, ORIGIN.x, ORIGIN.y, ei).unwrap())
        .collect();
    assert_eq!(result.edge_ids[1..4], detour[..]);
    assert_no_consecutive_duplicates(&result);
}
