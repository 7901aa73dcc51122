//! Asset registry and metadata
//!
//! ```text
//! assets/
//! ├── museum.glb              # backdrop scene (direct path)
//! ├── registry.ron            # optional manifest (cargo xtask gen-registry)
//! └── puzzles/
//!     └── seated-cupid/
//!         ├── seated-cupid.glb
//!         ├── info.json       # ModelInfo
//!         └── thumbnail.jpg
//! ```

mod info;
mod registry;

pub use info::{ModelInfo, REQUIRED_FIELDS};
pub use registry::{AssetEntry, AssetRegistry, MetadataProblem, RegistryManifest, MANIFEST_FILE, MUSEUM};
