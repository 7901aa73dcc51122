//! Scene graph handed to callers
//!
//! A decoded asset is a [`Group`] of [`Mesh`]es. Geometry and materials
//! are reference counted so outline duplicates and sibling meshes share
//! them without copying vertex data.

use std::sync::Arc;
use serde::{Deserialize, Serialize};

use crate::geometry::BufferGeometry;
use crate::transform::Transform;

// =============================================================================
// Textures
// =============================================================================

/// How texture coordinates are produced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mapping {
    /// Sample with the mesh's `uv` attribute
    #[default]
    Uv,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Wrapping {
    #[default]
    Repeat,
    ClampToEdge,
    MirroredRepeat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MagFilter {
    Nearest,
    #[default]
    Linear,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MinFilter {
    Nearest,
    Linear,
    NearestMipmapNearest,
    LinearMipmapNearest,
    NearestMipmapLinear,
    #[default]
    LinearMipmapLinear,
}

/// Texel layout of a raster
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    #[default]
    Rgba8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgba8 => 4,
        }
    }
}

/// How stored colour values are interpreted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorSpace {
    #[default]
    Srgb,
    Linear,
}

/// Sampler state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Sampler {
    pub wrap_s: Wrapping,
    pub wrap_t: Wrapping,
    pub mag_filter: MagFilter,
    pub min_filter: MinFilter,
}

/// A decoded raster ready for upload
#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    pub image: image::RgbaImage,
    pub mapping: Mapping,
    pub sampler: Sampler,
    pub format: PixelFormat,
    pub anisotropy: u8,
    pub color_space: ColorSpace,
}

impl Texture {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

// =============================================================================
// Materials
// =============================================================================

/// Which faces are drawn
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Side {
    #[default]
    Front,
    Back,
    Double,
}

/// Lighting model
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Shading {
    /// Texture colour only, no lights
    #[default]
    Unlit,
    /// Metallic-roughness lit shading
    Standard,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: Option<String>,
    pub map: Option<Arc<Texture>>,
    pub base_color: [f32; 4],
    pub side: Side,
    pub shading: Shading,
}

impl Material {
    /// Texture-mapped, double-sided, unlit material used for puzzle meshes
    pub fn unlit(map: Arc<Texture>) -> Self {
        Self {
            name: None,
            map: Some(map),
            base_color: [1.0; 4],
            side: Side::Double,
            shading: Shading::Unlit,
        }
    }

    pub fn standard(map: Option<Arc<Texture>>, base_color: [f32; 4]) -> Self {
        Self {
            name: None,
            map,
            base_color,
            side: Side::Front,
            shading: Shading::Standard,
        }
    }
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: None,
            map: None,
            base_color: [1.0; 4],
            side: Side::Front,
            shading: Shading::Unlit,
        }
    }
}

// =============================================================================
// Graph
// =============================================================================

#[derive(Debug, Clone)]
pub struct Mesh {
    pub name: Option<String>,
    pub geometry: Arc<BufferGeometry>,
    pub material: Arc<Material>,
    pub transform: Transform,
}

impl Mesh {
    pub fn new(geometry: Arc<BufferGeometry>, material: Arc<Material>) -> Self {
        Self {
            name: None,
            geometry,
            material,
            transform: Transform::IDENTITY,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

#[derive(Debug, Clone)]
pub enum Node {
    Mesh(Mesh),
    Group(Group),
}

/// A node with children; the root of every decoded asset
#[derive(Debug, Clone, Default)]
pub struct Group {
    pub name: Option<String>,
    pub transform: Transform,
    pub children: Vec<Node>,
}

impl Group {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_meshes(meshes: impl IntoIterator<Item = Mesh>) -> Self {
        Self {
            children: meshes.into_iter().map(Node::Mesh).collect(),
            ..Self::default()
        }
    }

    pub fn add(&mut self, node: Node) {
        self.children.push(node);
    }

    /// Depth-first iteration over every mesh in the subtree
    pub fn meshes(&self) -> Vec<&Mesh> {
        let mut out = Vec::new();
        collect_meshes(self, &mut out);
        out
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes().len()
    }

    /// Flatten into meshes, in depth-first order. Group transforms are
    /// dropped; walk `children` when nested transforms matter.
    pub fn into_meshes(self) -> Vec<Mesh> {
        let mut out = Vec::new();
        flatten(self, &mut out);
        out
    }

    /// Number of distinct materials (by identity) used in the subtree
    pub fn material_count(&self) -> usize {
        let mut seen: Vec<*const Material> = Vec::new();
        for mesh in self.meshes() {
            let ptr = Arc::as_ptr(&mesh.material);
            if !seen.contains(&ptr) {
                seen.push(ptr);
            }
        }
        seen.len()
    }
}

fn collect_meshes<'a>(group: &'a Group, out: &mut Vec<&'a Mesh>) {
    for child in &group.children {
        match child {
            Node::Mesh(mesh) => out.push(mesh),
            Node::Group(g) => collect_meshes(g, out),
        }
    }
}

fn flatten(group: Group, out: &mut Vec<Mesh>) {
    for child in group.children {
        match child {
            Node::Mesh(mesh) => out.push(mesh),
            Node::Group(g) => flatten(g, out),
        }
    }
}
