//! Pipeline configuration
//!
//! Read from a RON file. Lookup order: an explicit path, then
//! `<config dir>/xr-puzzle/config.ron`, then built-in defaults.
//!
//! ```ron
//! (
//!     asset_root: "assets",
//!     registry: Some("assets/registry.ron"),
//!     use_worker: true,
//!     http_timeout_secs: 30,
//!     grab_distance: 0.05,
//!     log_filter: "info,xr_puzzle=debug",
//! )
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::asset::AssetRegistry;
use crate::error::ConfigError;
use crate::storage::Storage;

/// Directory name under the platform config dir
pub const APP_DIR: &str = "xr-puzzle";
pub const CONFIG_FILE: &str = "config.ron";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Base directory for relative asset URLs
    pub asset_root: PathBuf,
    /// Registry manifest; the built-in registry when absent
    pub registry: Option<PathBuf>,
    /// Decode on the background worker
    pub use_worker: bool,
    pub http_timeout_secs: u64,
    /// Pieces farther than this (metres) are not grabbable
    pub grab_distance: f32,
    /// `tracing` filter used when RUST_LOG is unset
    pub log_filter: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            asset_root: PathBuf::from("assets"),
            registry: None,
            use_worker: true,
            http_timeout_secs: 30,
            grab_distance: 0.05,
            log_filter: "info".to_string(),
        }
    }
}

impl PipelineConfig {
    pub fn from_ron_str(s: &str, path: &Path) -> Result<Self, ConfigError> {
        ron::from_str(s).map_err(|e| ConfigError::Ron {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_ron_str(&contents, path)
    }

    /// Platform default location, if the platform has a config dir
    #[cfg(not(target_arch = "wasm32"))]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    #[cfg(target_arch = "wasm32")]
    pub fn default_path() -> Option<PathBuf> {
        None
    }

    /// Explicit path if given (must exist), else the default location if
    /// present, else defaults
    pub fn discover(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.is_file() => {
                debug!(path = %path.display(), "using config file");
                Self::load(&path)
            }
            _ => Ok(Self::default()),
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Storage rooted at `asset_root`
    pub fn storage(&self) -> Storage {
        let storage = Storage::with_root(&self.asset_root);
        #[cfg(not(target_arch = "wasm32"))]
        let storage = storage.with_http_timeout(self.http_timeout());
        storage
    }

    /// The configured manifest, or the built-in registry
    pub fn registry(&self) -> Result<AssetRegistry, ConfigError> {
        match &self.registry {
            Some(path) => AssetRegistry::load(path),
            None => Ok(AssetRegistry::builtin()),
        }
    }
}
