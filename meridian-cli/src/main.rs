use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::error::ErrorKind;
use clap::{Parser, ValueEnum};
use geo::coord;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use meridian_landtile::{Profile, TileKey, TileStore};
use meridian_router::{RouteStatus, Router, RouterOptions};

#[derive(Parser, Debug)]
#[command(name = "route_demo", version, about = "Query a Meridian routing container")]
struct Cli {
    /// Path to the routing container
    container: PathBuf,
    lat1: f64,
    lon1: f64,
    lat2: f64,
    lon2: f64,

    /// Travel profile
    #[arg(value_enum, default_value_t = ProfileArg::Car)]
    profile: ProfileArg,

    /// Dump per-edge diagnostics of the start tile to stderr
    #[arg(long)]
    dump: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ProfileArg {
    Car,
    Foot,
}

impl From<ProfileArg> for Profile {
    fn from(value: ProfileArg) -> Self {
        match value {
            ProfileArg::Car => Profile::Car,
            ProfileArg::Foot => Profile::Foot,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        // Standard logger on stderr, configured via the RUST_LOG env variable
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(EnvFilter::from_default_env()),
        )
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => {
            let _ = error.print();
            return match error.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(1),
            };
        }
    };

    match run(cli) {
        Ok(code) => code,
        Err(error) => {
            eprintln!("{error:#}");
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let options = RouterOptions::default();
    let a = coord! { x: cli.lon1, y: cli.lat1 };
    let b = coord! { x: cli.lon2, y: cli.lat2 };

    let key_a = TileKey::containing(a, options.tile_zoom);
    let key_b = TileKey::containing(b, options.tile_zoom);
    info!(z = key_a.z, x = key_a.x, y = key_a.y, "start point tile");
    info!(z = key_b.z, x = key_b.x, y = key_b.y, "end point tile");

    if cli.dump {
        dump_tile(&cli.container, key_a)?;
    }

    let mut router = Router::open(&cli.container, options)
        .with_context(|| format!("failed to open {}", cli.container.display()))?;
    let result = router.route(cli.profile.into(), &[a, b]);
    if result.status != RouteStatus::Ok {
        eprintln!(
            "Route failed: {:?} ({})",
            result.status, result.error_message
        );
        return Ok(ExitCode::from(2));
    }

    println!(
        "distance_m={:.2} duration_s={:.2} points={} edges={}",
        result.distance_m,
        result.duration_s,
        result.polyline.len(),
        result.edge_ids.len()
    );
    for point in &result.polyline {
        println!("{:.6} {:.6}", point.y, point.x);
    }
    Ok(ExitCode::SUCCESS)
}

fn dump_tile(container: &Path, key: TileKey) -> anyhow::Result<()> {
    let mut store = TileStore::open(container, 1)
        .with_context(|| format!("failed to open {}", container.display()))?;
    match store.load(key)? {
        Some(tile) => {
            let view = tile.view();
            eprintln!(
                "Tile nodes={} edges={}",
                view.node_count(),
                view.edge_count()
            );
            for ei in 0..view.edge_count() {
                let edge = view.edge_at(ei);
                eprintln!(
                    "edge {ei} from={} to={} len={:.1}m speed={:.1}m/s foot={:.1}m/s \
                     access_mask={} oneway={} class={}",
                    edge.from_node(),
                    edge.to_node(),
                    edge.length_m(),
                    edge.speed_mps(),
                    edge.foot_speed_mps(),
                    edge.access_mask(),
                    u8::from(edge.oneway()),
                    edge.road_class()
                );
            }
        }
        None => eprintln!("No tile blob for the start point"),
    }
    Ok(())
}
