//! Puzzle pieces and proximity queries
//!
//! A decoded asset becomes one [`PuzzlePiece`] per mesh. The interaction
//! layer asks [`proximity`] which piece a controller is pointing at or
//! holding.

mod piece;
pub mod proximity;

pub use piece::{PuzzlePiece, OUTLINE_COUNT};
pub use proximity::{closest_piece, compute_bbox, distance_to_point, pieces_from_asset};
