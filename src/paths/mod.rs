//! Recorded paths
//!
//! A recorded path is the sampled trajectory of one simulated drop, tagged
//! with the bucket it landed in. The library stores them per row count and
//! bucket; at drop time the board picks a bucket first and replays one of
//! the paths stored for it.

mod library;
pub mod merge;
pub mod probability;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::sim::Board;

pub use library::{PathLibrary, RowStats};
pub use merge::{LibraryData, MergeReport, merge_libraries};
pub use probability::{ProbabilityError, ProbabilityTable};

/// A point in board pixel space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn to_vec2(self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

impl From<Vec2> for Position {
    fn from(v: Vec2) -> Self {
        Self { x: v.x, y: v.y }
    }
}

/// One captured drop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedPath {
    /// One sample per physics step (or every other step), spawn first
    pub positions: Vec<Position>,
    /// Bucket under the ball when it crossed the ground line
    #[serde(rename = "finalBucket")]
    pub final_bucket: usize,
}

impl RecordedPath {
    pub fn new(positions: Vec<Position>, final_bucket: usize) -> Self {
        Self {
            positions,
            final_bucket,
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Final sample
    pub fn last(&self) -> Option<Position> {
        self.positions.last().copied()
    }

    /// Whether the path ends at or past `ground_y`
    pub fn reaches(&self, ground_y: f32) -> bool {
        self.last().is_some_and(|p| p.y >= ground_y)
    }

    /// Whether the path can be replayed on `board`: it ends at or past the
    /// ground line, over the bucket it is tagged with
    pub fn fits(&self, board: &Board) -> bool {
        self.last().is_some_and(|p| {
            p.y >= board.ground_y
                && self.final_bucket < board.bucket_count()
                && board.bucket_at(p.x) == self.final_bucket
        })
    }
}
