//! Proximity queries
//!
//! Which piece is the controller touching? Distances are measured to the
//! vertices of the original mesh in world space by a linear scan, O(vertex
//! count) per piece. `closest_piece` skips the scan for pieces whose current
//! bounding box is already farther than the best hit.

use crate::math::{mat4_transform_point, Aabb, Vec3};
use crate::scene::Group;

use super::piece::PuzzlePiece;

/// Minimum distance from `point` to any vertex of the piece's original
/// mesh, in world space. `INFINITY` when the mesh has no positions.
pub fn distance_to_point(piece: &mut PuzzlePiece, point: Vec3) -> f32 {
    let transform = piece.original().transform;
    let world = piece.mesh_world_matrix(&transform);

    piece
        .original()
        .geometry
        .positions()
        .map(|p| mat4_transform_point(&world, p).distance(point))
        .fold(f32::INFINITY, f32::min)
}

/// Recompute the piece's world-space bounding box over the original and
/// both outlines, store it on the piece and return it
pub fn compute_bbox(piece: &mut PuzzlePiece) -> Aabb {
    let transforms: Vec<_> = piece.meshes().map(|m| m.transform).collect();

    let mut bbox = Aabb::EMPTY;
    for (i, transform) in transforms.iter().enumerate() {
        let world = piece.mesh_world_matrix(transform);
        let mesh = if i == 0 {
            piece.original()
        } else {
            &piece.outlines()[i - 1]
        };
        for p in mesh.geometry.positions() {
            bbox.expand_by_point(mat4_transform_point(&world, p));
        }
    }

    piece.store_bbox(bbox);
    bbox
}

/// Index and distance of the nearest piece within `max_distance`
pub fn closest_piece(pieces: &mut [PuzzlePiece], point: Vec3, max_distance: f32) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;

    for (i, piece) in pieces.iter_mut().enumerate() {
        let limit = best.map(|(_, d)| d).unwrap_or(max_distance);

        // The box holds every original vertex, so its distance is a lower bound
        if !piece.is_bbox_stale() && piece.bbox().distance_to_point(point) > limit {
            continue;
        }

        let distance = distance_to_point(piece, point);
        if distance <= limit && best.map(|(_, d)| distance < d).unwrap_or(true) {
            best = Some((i, distance));
        }
    }

    best
}

/// One piece per mesh of a decoded asset, in mesh order
pub fn pieces_from_asset(asset: Group) -> Vec<PuzzlePiece> {
    asset.into_meshes().into_iter().map(PuzzlePiece::new).collect()
}
