//! Direct loading path
//!
//! Loads a scene without the decode worker. Used for assets that must be
//! available before a worker exists (the museum backdrop) and as the
//! fallback when the worker path reports `WorkerUnavailable`.

use std::sync::Arc;

use super::decode::import_scene;
use crate::error::AssetError;
use crate::scene::{Group, Material, Mesh, Side};
use crate::storage::Storage;

/// Loads a complete scene graph from a URL on the calling thread
pub trait SceneLoader: Send + Sync + 'static {
    fn load(&self, url: &str) -> Result<Group, AssetError>;
}

impl<F> SceneLoader for F
where
    F: Fn(&str) -> Result<Group, AssetError> + Send + Sync + 'static,
{
    fn load(&self, url: &str) -> Result<Group, AssetError> {
        self(url)
    }
}

/// Standard glTF loading: keeps every material, lit
#[derive(Debug, Clone, Default)]
pub struct GltfSceneLoader {
    storage: Storage,
}

impl GltfSceneLoader {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }
}

impl SceneLoader for GltfSceneLoader {
    fn load(&self, url: &str) -> Result<Group, AssetError> {
        let bytes = self.storage.fetch(url)?;
        let scene = import_scene(&bytes).map_err(AssetError::DecodeFailure)?;

        let materials: Vec<Arc<Material>> = scene
            .materials
            .iter()
            .map(|m| {
                let mut material = Material::standard(m.texture.clone(), m.base_color);
                material.name = m.name.clone();
                if m.double_sided {
                    material.side = Side::Double;
                }
                Arc::new(material)
            })
            .collect();
        let fallback = Arc::new(Material::standard(None, [1.0; 4]));

        let meshes = scene.primitives.into_iter().map(|primitive| {
            let material = primitive
                .material
                .and_then(|i| materials.get(i).cloned())
                .unwrap_or_else(|| fallback.clone());
            let mut mesh = Mesh::new(Arc::new(primitive.geometry), material);
            mesh.name = primitive.name;
            mesh
        });

        Ok(Group::from_meshes(meshes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::pipeline::decode::fixtures;
    use crate::scene::Shading;
    use tempfile::TempDir;

    #[test]
    fn test_load_keeps_lit_materials() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("museum.glb"), fixtures::triangle_glb(2, true)).unwrap();

        let loader = GltfSceneLoader::new(Storage::with_root(dir.path()));
        let group = loader.load("museum.glb").unwrap();

        assert_eq!(group.mesh_count(), 2);
        assert_eq!(group.material_count(), 1);
        let mesh = group.meshes()[0];
        assert_eq!(mesh.name.as_deref(), Some("shard"));
        assert_eq!(mesh.material.shading, Shading::Standard);
        assert!(mesh.material.map.is_some());
    }

    #[test]
    fn test_missing_file_is_storage_error() {
        let dir = TempDir::new().unwrap();
        let loader = GltfSceneLoader::new(Storage::with_root(dir.path()));
        assert_eq!(loader.load("nope.glb").unwrap_err().kind(), ErrorKind::Storage);
    }

    #[test]
    fn test_garbage_is_decode_failure() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("bad.glb"), b"glTF....").unwrap();
        let loader = GltfSceneLoader::new(Storage::with_root(dir.path()));
        assert_eq!(loader.load("bad.glb").unwrap_err().kind(), ErrorKind::DecodeFailure);
    }
}
