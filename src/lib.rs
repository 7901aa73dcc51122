//! XR-PUZZLE: asset pipeline and piece proximity for a VR museum puzzle
//!
//! Two loosely coupled parts:
//! - [`pipeline`]: logical asset name → decoded scene graph, through a
//!   background decode worker (one request in flight, FIFO behind it) or a
//!   direct loader
//! - [`puzzle`]: one piece per decoded mesh, plus "which piece is the
//!   controller touching" distance queries
//!
//! ```no_run
//! use xr_puzzle::{AssetPipeline, PipelineConfig, puzzle};
//! use xr_puzzle::math::Vec3;
//!
//! let config = PipelineConfig::discover(None)?;
//! let mut pipeline = AssetPipeline::from_config(&config)?;
//!
//! let request = pipeline.request_model("seatedCupid")?;
//! let asset = pipeline.wait(request)?;
//!
//! let mut pieces = puzzle::pieces_from_asset(asset);
//! let hit = puzzle::closest_piece(&mut pieces, Vec3::new(0.0, 1.2, -0.4), config.grab_distance);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

/// Version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod asset;
pub mod config;
pub mod error;
pub mod geometry;
pub mod math;
pub mod pipeline;
pub mod protocol;
pub mod puzzle;
pub mod scene;
pub mod storage;
pub mod transform;

pub use asset::{AssetRegistry, ModelInfo};
pub use config::PipelineConfig;
pub use error::{AssetError, ConfigError, ErrorKind};
pub use pipeline::{AssetPipeline, CancelToken, ModelRequest};
pub use puzzle::PuzzlePiece;
pub use scene::Group as DecodedAsset;
