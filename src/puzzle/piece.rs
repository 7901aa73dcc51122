//! Puzzle pieces
//!
//! A piece wraps one decoded mesh plus two outline duplicates. The
//! duplicates share the original's geometry buffers; only their material and
//! local offset differ, so highlighting a piece never copies vertex data.
//!
//! ```text
//! PuzzlePiece (world matrix = parent * transform)
//! ├── original    (decoded mesh, its own local transform)
//! ├── outline[0]  (same geometry, outline material, offset)
//! └── outline[1]
//! ```

use std::sync::Arc;

use super::proximity;
use crate::geometry::BufferGeometry;
use crate::math::{mat4_mul, Aabb, Mat4, Vec3};
use crate::scene::{Material, Mesh};
use crate::transform::{Transform, WorldMatrix};

/// Number of outline duplicates per piece
pub const OUTLINE_COUNT: usize = 2;

#[derive(Debug, Clone)]
pub struct PuzzlePiece {
    pub name: Option<String>,
    original: Mesh,
    outlines: [Mesh; OUTLINE_COUNT],
    world: WorldMatrix,
    bbox: Aabb,
    bbox_stale: bool,
}

impl PuzzlePiece {
    pub fn new(mesh: Mesh) -> Self {
        let outline = Mesh {
            name: mesh.name.as_ref().map(|n| format!("{}-outline", n)),
            ..mesh.clone()
        };
        Self {
            name: mesh.name.clone(),
            outlines: [outline.clone(), outline],
            original: mesh,
            world: WorldMatrix::default(),
            bbox: Aabb::EMPTY,
            // Never computed
            bbox_stale: true,
        }
    }

    pub fn original(&self) -> &Mesh {
        &self.original
    }

    pub fn outlines(&self) -> &[Mesh; OUTLINE_COUNT] {
        &self.outlines
    }

    /// The original mesh followed by both outlines
    pub fn meshes(&self) -> impl Iterator<Item = &Mesh> {
        std::iter::once(&self.original).chain(self.outlines.iter())
    }

    /// Geometry shared by the original and its outlines
    pub fn geometry(&self) -> &Arc<BufferGeometry> {
        &self.original.geometry
    }

    pub fn set_outline_material(&mut self, material: Arc<Material>) {
        for outline in &mut self.outlines {
            outline.material = material.clone();
        }
    }

    /// Local offset of outline `index` relative to the piece. Returns false
    /// for an out-of-range index.
    pub fn set_outline_offset(&mut self, index: usize, offset: Transform) -> bool {
        match self.outlines.get_mut(index) {
            Some(outline) => {
                outline.transform = offset;
                self.bbox_stale = true;
                true
            }
            None => false,
        }
    }

    pub fn transform(&self) -> &Transform {
        self.world.local()
    }

    pub fn set_transform(&mut self, transform: Transform) {
        self.world.set_local(transform);
        self.bbox_stale = true;
    }

    /// World matrix of whatever the piece is attached to (a hand, a
    /// puzzle part, the scene root)
    pub fn set_parent_matrix(&mut self, parent: Mat4) {
        self.world.set_parent(parent);
        self.bbox_stale = true;
    }

    /// Piece world matrix, recomputed if stale
    pub fn world_matrix(&mut self) -> Mat4 {
        *self.world.get()
    }

    /// World matrix of one of the piece's meshes
    pub(crate) fn mesh_world_matrix(&mut self, mesh_transform: &Transform) -> Mat4 {
        mat4_mul(self.world.get(), &mesh_transform.to_matrix())
    }

    /// Last computed bounding box. Not refreshed automatically; see
    /// [`compute_bbox`](Self::compute_bbox).
    pub fn bbox(&self) -> &Aabb {
        &self.bbox
    }

    /// True when a transform changed since the box was last computed
    pub fn is_bbox_stale(&self) -> bool {
        self.bbox_stale
    }

    pub(crate) fn store_bbox(&mut self, bbox: Aabb) {
        self.bbox = bbox;
        self.bbox_stale = false;
    }

    pub fn compute_bbox(&mut self) -> Aabb {
        proximity::compute_bbox(self)
    }

    pub fn distance_to_point(&mut self, point: Vec3) -> f32 {
        proximity::distance_to_point(self, point)
    }
}
