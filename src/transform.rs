//! Transforms
//!
//! Two-tier transform system:
//! - Transform: Local position/rotation/scale (relative to parent)
//! - WorldMatrix: Cached world-space matrix, recomputed only when stale
//!
//! World = parent world * local. Nothing recomputes automatically; callers
//! mark the cache stale by going through the setters and call `update()`
//! before reading.

use serde::{Deserialize, Serialize};
use crate::math::{Mat4, Vec3, MAT4_IDENTITY, mat4_mul, mat4_from_position_rotation, mat4_transform_point};

/// Local transform relative to parent (or world if no parent).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// Position relative to parent
    pub position: Vec3,
    /// Rotation in euler angles (degrees)
    pub rotation: Vec3,
    /// Uniform scale factor
    pub scale: f32,
}

impl Transform {
    /// Identity transform (origin, no rotation, scale 1)
    pub const IDENTITY: Transform = Transform {
        position: Vec3::ZERO,
        rotation: Vec3::ZERO,
        scale: 1.0,
    };

    /// Create transform at a position
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::IDENTITY
        }
    }

    /// Create transform with position and rotation
    pub fn from_position_rotation(position: Vec3, rotation: Vec3) -> Self {
        Self {
            position,
            rotation,
            scale: 1.0,
        }
    }

    /// Create a uniform scale about the local origin
    pub fn from_scale(scale: f32) -> Self {
        Self {
            scale,
            ..Self::IDENTITY
        }
    }

    /// Convert to a 4x4 transformation matrix
    pub fn to_matrix(&self) -> Mat4 {
        let base = mat4_from_position_rotation(self.position, self.rotation);
        if (self.scale - 1.0).abs() < 0.0001 {
            base
        } else {
            let mut result = base;
            for row in result.iter_mut().take(3) {
                for v in row.iter_mut().take(3) {
                    *v *= self.scale;
                }
            }
            result
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Lazily recomputed world matrix for one node.
#[derive(Debug, Clone)]
pub struct WorldMatrix {
    local: Transform,
    parent: Mat4,
    world: Mat4,
    stale: bool,
}

impl WorldMatrix {
    pub fn new(local: Transform) -> Self {
        Self {
            local,
            parent: MAT4_IDENTITY,
            world: local.to_matrix(),
            stale: false,
        }
    }

    pub fn local(&self) -> &Transform {
        &self.local
    }

    pub fn set_local(&mut self, local: Transform) {
        self.local = local;
        self.stale = true;
    }

    pub fn parent(&self) -> &Mat4 {
        &self.parent
    }

    pub fn set_parent(&mut self, parent: Mat4) {
        self.parent = parent;
        self.stale = true;
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Recompute the world matrix if anything changed since the last call.
    /// Returns true when a recompute happened.
    pub fn update(&mut self) -> bool {
        if !self.stale {
            return false;
        }
        self.world = mat4_mul(&self.parent, &self.local.to_matrix());
        self.stale = false;
        true
    }

    /// Current world matrix, recomputing first if stale
    pub fn get(&mut self) -> &Mat4 {
        self.update();
        &self.world
    }

    /// Transform a local-space point to world space
    pub fn transform_point(&mut self, point: Vec3) -> Vec3 {
        mat4_transform_point(self.get(), point)
    }
}

impl Default for WorldMatrix {
    fn default() -> Self {
        Self::new(Transform::IDENTITY)
    }
}
