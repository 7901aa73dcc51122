//! xr-puzzle command line
//!
//! Usage:
//!   xr-puzzle list                                # registered models + metadata problems
//!   xr-puzzle load seatedCupid                    # decode on the worker, report pieces
//!   xr-puzzle load museum --direct                # direct loader
//!   xr-puzzle load seatedCupid --point 0,1.2,-0.4 # closest piece to a point

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

use xr_puzzle::math::Vec3;
use xr_puzzle::{puzzle, AssetError, AssetPipeline, ErrorKind, PipelineConfig, VERSION};

#[derive(Parser)]
#[command(name = "xr-puzzle", version = VERSION)]
#[command(about = "Load puzzle models and query piece proximity")]
struct Cli {
    /// Configuration file (RON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Base directory for relative asset URLs
    #[arg(long, global = true)]
    asset_root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered models and report incomplete metadata
    List,
    /// Load a model, build its pieces and print their bounds
    Load {
        /// Logical asset name (e.g. seatedCupid)
        name: String,
        /// Skip the decode worker
        #[arg(long)]
        direct: bool,
        /// World-space point "x,y,z" to find the closest piece to
        #[arg(long, value_parser = parse_point, allow_hyphen_values = true)]
        point: Option<Vec3>,
    },
}

fn parse_point(s: &str) -> Result<Vec3, String> {
    let parts: Vec<f32> = s
        .split(',')
        .map(|p| p.trim().parse::<f32>().map_err(|e| format!("'{}': {}", p, e)))
        .collect::<Result<_, _>>()?;
    match parts[..] {
        [x, y, z] => Ok(Vec3::new(x, y, z)),
        _ => Err(format!("expected x,y,z but got {} values", parts.len())),
    }
}

fn init_logging(config: &PipelineConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn main() -> ExitCode {
    #[cfg(not(target_arch = "wasm32"))]
    crashlog::setup!(crashlog::cargo_metadata!().capitalized(), false);

    let cli = Cli::parse();

    let mut config = match PipelineConfig::discover(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("xr-puzzle: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Some(root) = cli.asset_root {
        config.asset_root = root;
    }
    init_logging(&config);

    let result = match cli.command {
        Commands::List => list(&config),
        Commands::Load { name, direct, point } => load(&config, &name, direct, point),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn list(config: &PipelineConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut registry = config.registry()?;
    registry.load_infos(&config.storage());

    println!("{:<20} {:>6}  {:<28} URL", "NAME", "PIECES", "TITLE");
    for entry in registry.iter() {
        let info = registry.info(&entry.name);
        let pieces = info
            .and_then(|i| i.pieces_number)
            .map(|n| n.to_string())
            .unwrap_or_else(|| "-".into());
        let title = info.and_then(|i| i.art_name.as_deref()).unwrap_or("-");
        println!("{:<20} {:>6}  {:<28} {}", entry.name, pieces, title, entry.url);
    }

    let problems = registry.check_metadata();
    if !problems.is_empty() {
        println!();
        for problem in &problems {
            println!("{}: missing {}", problem.name, problem.missing.join(", "));
        }
    }
    Ok(())
}

fn load(
    config: &PipelineConfig,
    name: &str,
    direct: bool,
    point: Option<Vec3>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut pipeline = AssetPipeline::from_config(config)?;

    let request = if direct {
        pipeline.request_model_direct(name)?
    } else {
        match pipeline.request_model(name) {
            Ok(request) => request,
            Err(e) if e.kind() == ErrorKind::WorkerUnavailable => {
                warn!("no decode worker, loading {} directly", name);
                pipeline.request_model_direct(name)?
            }
            Err(e) => return Err(e.into()),
        }
    };

    let asset = pipeline.wait(request)?;
    let vertices: usize = asset.meshes().iter().map(|m| m.geometry.vertex_count()).sum();
    println!(
        "{}: {} meshes, {} materials, {} vertices",
        name,
        asset.mesh_count(),
        asset.material_count(),
        vertices
    );

    let mut pieces = puzzle::pieces_from_asset(asset);
    for (i, piece) in pieces.iter_mut().enumerate() {
        let bbox = piece.compute_bbox();
        println!(
            "  piece {:>3} {:<24} {:>7} vertices  min {:?}  max {:?}",
            i,
            piece.name.as_deref().unwrap_or("-"),
            piece.geometry().vertex_count(),
            bbox.min.to_array(),
            bbox.max.to_array()
        );
    }

    if let Some(point) = point {
        match puzzle::closest_piece(&mut pieces, point, config.grab_distance) {
            Some((i, distance)) => println!("closest piece: {} at {:.4} m", i, distance),
            None => {
                let nearest = pieces
                    .iter_mut()
                    .map(|p| p.distance_to_point(point))
                    .fold(f32::INFINITY, f32::min);
                println!(
                    "no piece within {} m (nearest vertex at {:.4} m)",
                    config.grab_distance, nearest
                );
            }
        }
    }

    if pieces.is_empty() {
        return Err(AssetError::DecodeFailure(format!("{} has no meshes", name)).into());
    }
    Ok(())
}
