//! Asset maintenance tasks for xr-puzzle
//!
//! Usage:
//!   cargo xtask gen-registry              # Scan assets/puzzles/ and write assets/registry.ron
//!   cargo xtask gen-registry --root path  # Same, for another asset root
//!   cargo xtask check-metadata            # Report incomplete info.json records

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use xr_puzzle::asset::{AssetEntry, AssetRegistry, MANIFEST_FILE, MUSEUM};
use xr_puzzle::storage::Storage;

/// Directory under the asset root holding one folder per puzzle
const PUZZLES_DIR: &str = "puzzles";

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Asset maintenance for xr-puzzle")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write registry.ron from the puzzle folders under the asset root
    GenRegistry {
        /// Asset root (default: <project>/assets)
        #[arg(long)]
        root: Option<PathBuf>,
    },
    /// Load the registry and report incomplete metadata
    CheckMetadata {
        /// Asset root (default: <project>/assets)
        #[arg(long)]
        root: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::GenRegistry { root } => gen_registry(&asset_root(root)?),
        Commands::CheckMetadata { root } => check_metadata(&asset_root(root)?),
    }
}

/// Get the project root directory
fn project_root() -> Result<PathBuf> {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .map(Path::to_path_buf)
        .context("xtask has no parent directory")
}

fn asset_root(root: Option<PathBuf>) -> Result<PathBuf> {
    match root {
        Some(root) => Ok(root),
        None => Ok(project_root()?.join("assets")),
    }
}

/// "seated-cupid" -> "seatedCupid"
fn camel_case(dir: &str) -> String {
    let mut out = String::with_capacity(dir.len());
    let mut upper = false;
    for c in dir.chars() {
        if c == '-' || c == '_' || c == ' ' {
            upper = !out.is_empty();
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Build a registry from the folder layout under `root`
fn scan(root: &Path) -> Result<AssetRegistry> {
    let mut registry = AssetRegistry::new();

    if root.join("museum.glb").is_file() {
        registry.add(AssetEntry::new(MUSEUM, "museum.glb"))?;
    }

    let puzzles = root.join(PUZZLES_DIR);
    let mut dirs: Vec<_> = std::fs::read_dir(&puzzles)
        .with_context(|| format!("Failed to read {}", puzzles.display()))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();

    // Sort by directory name for consistent ordering
    dirs.sort();

    for dir in dirs {
        let Some(dir_name) = dir.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let model = format!("{}.glb", dir_name);
        if !dir.join(&model).is_file() {
            println!("Skipping {}: no {}", dir_name, model);
            continue;
        }

        let mut entry = AssetEntry::new(camel_case(dir_name), format!("{}/{}/{}", PUZZLES_DIR, dir_name, model));
        if dir.join("info.json").is_file() {
            entry.info = Some(format!("{}/{}/info.json", PUZZLES_DIR, dir_name));
        }
        if dir.join("thumbnail.jpg").is_file() {
            entry.thumbnail = Some(format!("{}/{}/thumbnail.jpg", PUZZLES_DIR, dir_name));
        }
        registry.add(entry)?;
    }

    Ok(registry)
}

fn gen_registry(root: &Path) -> Result<()> {
    let registry = scan(root)?;
    let manifest = registry.to_manifest_string().context("Failed to serialize registry")?;

    let path = root.join(MANIFEST_FILE);
    std::fs::write(&path, manifest).with_context(|| format!("Failed to write {}", path.display()))?;

    println!("Registered {} models in {}", registry.len(), path.display());
    Ok(())
}

fn check_metadata(root: &Path) -> Result<()> {
    let manifest = root.join(MANIFEST_FILE);
    let mut registry = if manifest.is_file() {
        AssetRegistry::load(&manifest)?
    } else {
        println!("No {} under {}, checking the built-in registry", MANIFEST_FILE, root.display());
        AssetRegistry::builtin()
    };

    let loaded = registry.load_infos(&Storage::with_root(root));
    let problems = registry.check_metadata();

    println!("Loaded {} metadata records", loaded);
    for problem in &problems {
        println!("  {}: missing {}", problem.name, problem.missing.join(", "));
    }

    if problems.is_empty() {
        println!("All metadata complete");
        Ok(())
    } else {
        anyhow::bail!("{} incomplete metadata records", problems.len())
    }
}
