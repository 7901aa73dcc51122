//! Asset Registry - logical names to source URLs
//!
//! Every model the pipeline can load is registered here under a camelCase
//! logical name (`seatedCupid`, `museum`, ...). URLs are relative to the
//! asset root unless they carry an `http(s)://` scheme.
//!
//! Metadata records (`info.json`) ride along for the browsing UI. They are
//! fetched on demand with [`AssetRegistry::load_infos`] and only checked for
//! completeness; a bad record never stops a load.

use std::collections::HashMap;
use std::path::Path;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::info::{ModelInfo, REQUIRED_FIELDS};
use crate::error::ConfigError;
use crate::storage::Storage;

/// Manifest file written by `cargo xtask gen-registry`
pub const MANIFEST_FILE: &str = "registry.ron";

/// Logical name of the backdrop scene
pub const MUSEUM: &str = "museum";

/// Built-in puzzles: logical name and directory under `puzzles/`
const BUILTIN_PUZZLES: &[(&str, &str)] = &[
    ("doubleHeadSculpt", "double-head-sculpt"),
    ("paintedTrash", "painted-trash"),
    ("mexicoGraffiti", "mexico-graffiti"),
    ("louviersCastle", "louviers-castle"),
    ("seatedCupid", "seated-cupid"),
    ("hydriaVase", "hydria-vase"),
    ("nTomoMask", "n-tomo-mask"),
    ("pentecostRederos", "pentecost-rederos"),
    ("nazcaVessel", "nazca-vessel"),
    ("paleoEngraving", "paleolithic-engraving"),
    ("torzoTanku", "torzo-tanku"),
];

/// One registered model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetEntry {
    pub name: String,
    pub url: String,
    /// Where the metadata record lives
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

impl AssetEntry {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            info: None,
            thumbnail: None,
        }
    }

    /// Entry following the `puzzles/<dir>/<dir>.glb` layout
    pub fn puzzle(name: &str, dir: &str) -> Self {
        Self {
            name: name.to_string(),
            url: format!("puzzles/{0}/{0}.glb", dir),
            info: Some(format!("puzzles/{}/info.json", dir)),
            thumbnail: Some(format!("puzzles/{}/thumbnail.jpg", dir)),
        }
    }
}

/// On-disk manifest format
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryManifest {
    pub entries: Vec<AssetEntry>,
}

/// A metadata record that failed the completeness check
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataProblem {
    pub name: String,
    pub missing: Vec<&'static str>,
}

/// Ordered registry of loadable models
#[derive(Debug, Default, Clone)]
pub struct AssetRegistry {
    entries: HashMap<String, AssetEntry>,
    /// Registration order (for iteration)
    names: Vec<String>,
    infos: HashMap<String, ModelInfo>,
}

impl AssetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The museum backdrop and the shipped puzzles
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.insert(AssetEntry::new(MUSEUM, "museum.glb"));
        for (name, dir) in BUILTIN_PUZZLES {
            registry.insert(AssetEntry::puzzle(name, dir));
        }
        registry
    }

    /// Load a RON manifest from disk
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_manifest_str(&contents).map_err(|e| match e {
            ConfigError::Ron { message, .. } => ConfigError::Ron {
                path: path.display().to_string(),
                message,
            },
            other => other,
        })
    }

    pub fn from_manifest_str(s: &str) -> Result<Self, ConfigError> {
        let manifest: RegistryManifest = ron::from_str(s).map_err(|e| ConfigError::Ron {
            path: MANIFEST_FILE.to_string(),
            message: e.to_string(),
        })?;
        Self::from_manifest(manifest)
    }

    pub fn from_manifest(manifest: RegistryManifest) -> Result<Self, ConfigError> {
        let mut registry = Self::new();
        for entry in manifest.entries {
            registry.add(entry)?;
        }
        Ok(registry)
    }

    pub fn to_manifest(&self) -> RegistryManifest {
        RegistryManifest {
            entries: self.iter().cloned().collect(),
        }
    }

    /// Serialize as a pretty-printed manifest
    pub fn to_manifest_string(&self) -> Result<String, ron::Error> {
        let config = ron::ser::PrettyConfig::new().depth_limit(3);
        ron::ser::to_string_pretty(&self.to_manifest(), config)
    }

    /// Register a model. Names must be unique.
    pub fn add(&mut self, entry: AssetEntry) -> Result<(), ConfigError> {
        if self.entries.contains_key(&entry.name) {
            return Err(ConfigError::DuplicateAsset(entry.name));
        }
        self.insert(entry);
        Ok(())
    }

    fn insert(&mut self, entry: AssetEntry) {
        self.names.push(entry.name.clone());
        self.entries.insert(entry.name.clone(), entry);
    }

    pub fn get(&self, name: &str) -> Option<&AssetEntry> {
        self.entries.get(name)
    }

    /// Source URL for a logical name
    pub fn url(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(|e| e.url.as_str())
    }

    pub fn thumbnail(&self, name: &str) -> Option<&str> {
        self.entries.get(name).and_then(|e| e.thumbnail.as_deref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Names in registration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(|s| s.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &AssetEntry> {
        self.names.iter().filter_map(|name| self.entries.get(name))
    }

    // =========================================================================
    // Metadata
    // =========================================================================

    /// Attach a metadata record to a registered name
    pub fn set_info(&mut self, name: &str, info: ModelInfo) -> bool {
        if !self.contains(name) {
            return false;
        }
        self.infos.insert(name.to_string(), info);
        true
    }

    pub fn info(&self, name: &str) -> Option<&ModelInfo> {
        self.infos.get(name)
    }

    /// Loaded metadata records in registration order
    pub fn infos(&self) -> impl Iterator<Item = (&str, &ModelInfo)> {
        self.names
            .iter()
            .filter_map(|name| self.infos.get(name).map(|info| (name.as_str(), info)))
    }

    /// Fetch every entry's `info.json`. Unreadable records are logged and
    /// skipped. Returns the number loaded.
    pub fn load_infos(&mut self, storage: &Storage) -> usize {
        let mut loaded = Vec::new();
        for entry in self.iter() {
            let Some(url) = &entry.info else { continue };
            let record = storage
                .fetch(url)
                .map_err(|e| e.to_string())
                .and_then(|bytes| serde_json::from_slice::<ModelInfo>(&bytes).map_err(|e| e.to_string()));
            match record {
                Ok(info) => loaded.push((entry.name.clone(), info)),
                Err(e) => warn!(asset = %entry.name, url = %url, "failed to load metadata: {}", e),
            }
        }

        let count = loaded.len();
        self.infos.extend(loaded);
        debug!(count, "loaded metadata records");
        count
    }

    /// Completeness pass over metadata. Every entry that declares a record
    /// is checked; a record that never loaded counts as missing everything.
    /// Logs one warning per problem and never fails.
    pub fn check_metadata(&self) -> Vec<MetadataProblem> {
        let mut problems = Vec::new();
        for entry in self.iter() {
            let missing = match self.infos.get(&entry.name) {
                Some(info) => info.missing_fields(),
                None if entry.info.is_some() => REQUIRED_FIELDS.to_vec(),
                None => continue,
            };
            if !missing.is_empty() {
                warn!(asset = %entry.name, ?missing, "metadata record is missing attributes");
                problems.push(MetadataProblem {
                    name: entry.name.clone(),
                    missing,
                });
            }
        }
        problems
    }
}
