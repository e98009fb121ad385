//! Path recorders
//!
//! Both recorders fill the library for one row count by dropping balls aimed
//! at the buckets that still need paths. The fast recorder runs each drop to
//! completion headlessly; the visual recorder advances every in-flight ball
//! one step per display frame so the run can be watched. Either way the
//! accepted paths are committed to the library in a single batch.

mod fast;
mod visual;

use rand::Rng;
use serde::{Deserialize, Serialize};

pub use fast::{record_until_filled, record_with_progress};
pub use visual::{VisualFrame, VisualRecorder};

use crate::paths::PathLibrary;
use crate::sim::{Board, RowCount};

/// Recorder tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecorderConfig {
    /// Drops attempted before giving up on the remaining buckets
    pub max_attempts: u32,
    /// Physics steps a ball may take before it counts as stalled
    pub max_steps: u32,
    /// Keep one sample every N steps (1 = every step)
    pub sample_every: u32,
    /// Lateral reach of the bucket-to-drop-x mapping either side of centre
    pub drop_range: f32,
    /// Initial random spread around the mapped drop x
    pub drop_jitter: f32,
    /// In-flight ball limit for the visual recorder (`None` = derived from
    /// the drop rate)
    pub max_in_flight: Option<usize>,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10_000,
            max_steps: 600,
            sample_every: 1,
            drop_range: 40.0,
            drop_jitter: 15.0,
            max_in_flight: None,
        }
    }
}

/// Result of one recording run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingReport {
    pub rows: RowCount,
    /// Paths the library accepted in the final batch
    pub accepted: usize,
    pub attempts: u32,
    /// Drops that never reached the ground within the step budget
    pub stalled: u32,
    /// Buckets still below the target when the run ended
    pub unfilled: Vec<usize>,
}

impl RecordingReport {
    pub fn is_complete(&self) -> bool {
        self.unfilled.is_empty()
    }
}

/// Per bucket counts for the run, seeded from what the library already holds.
///
/// Also remembers the drop x of every path a bucket holds. The simulation is
/// deterministic, so a second drop from the same x would store the same
/// trajectory twice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketTally {
    counts: Vec<usize>,
    target: usize,
    /// `f32::to_bits` of the drop x of each kept path, per bucket
    starts: Vec<Vec<u32>>,
}

impl BucketTally {
    pub fn new(bucket_count: usize, target: usize) -> Self {
        Self {
            counts: vec![0; bucket_count],
            target,
            starts: vec![Vec::new(); bucket_count],
        }
    }

    pub fn from_library(library: &PathLibrary, rows: RowCount, target: usize) -> Self {
        let target = target.min(library.cap());
        let starts = (0..rows.bucket_count())
            .map(|bucket| {
                library
                    .paths_for_bucket(rows, bucket)
                    .iter()
                    .filter_map(|path| path.positions.first())
                    .map(|p| p.x.to_bits())
                    .collect()
            })
            .collect();
        Self {
            counts: (0..rows.bucket_count())
                .map(|bucket| library.path_count(rows, bucket).min(target))
                .collect(),
            target,
            starts,
        }
    }

    /// Keep a landing in `bucket` dropped from `drop_x` if the bucket still
    /// needs paths and holds none from that x
    pub fn accept(&mut self, bucket: usize, drop_x: f32) -> bool {
        if !self.needs(bucket) {
            return false;
        }
        let Some(starts) = self.starts.get_mut(bucket) else {
            return false;
        };
        if starts.contains(&drop_x.to_bits()) {
            log::debug!("Bucket {} already holds a drop from x={}", bucket, drop_x);
            return false;
        }
        starts.push(drop_x.to_bits());
        self.add(bucket);
        true
    }

    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    pub fn target(&self) -> usize {
        self.target
    }

    pub fn needs(&self, bucket: usize) -> bool {
        self.counts.get(bucket).is_some_and(|&n| n < self.target)
    }

    pub fn add(&mut self, bucket: usize) {
        if let Some(n) = self.counts.get_mut(bucket) {
            *n += 1;
        }
    }

    /// Next bucket to aim at: the edge buckets first, since they are the
    /// hardest to hit, then the lowest-index bucket still short
    pub fn next_target(&self) -> Option<usize> {
        let n = self.counts.len();
        if n == 0 {
            return None;
        }
        let edges = [0, 1.min(n - 1), n.saturating_sub(2), n - 1];
        edges
            .into_iter()
            .find(|&b| self.needs(b))
            .or_else(|| (0..n).find(|&b| self.needs(b)))
    }

    pub fn is_filled(&self) -> bool {
        self.counts.iter().all(|&n| n >= self.target)
    }

    pub fn unfilled(&self) -> Vec<usize> {
        (0..self.counts.len()).filter(|&b| self.needs(b)).collect()
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    pub fn needed(&self) -> usize {
        self.counts.len() * self.target
    }

    pub fn filled_buckets(&self) -> usize {
        self.counts.iter().filter(|&&n| n >= self.target).count()
    }

    /// `62% (34/54) | 3 buckets left | [6|6|2|...]`
    pub fn progress(&self) -> String {
        let needed = self.needed();
        let percent = if needed == 0 {
            100
        } else {
            (self.total() * 100 / needed).min(100)
        };
        let counts = self
            .counts
            .iter()
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join("|");
        format!(
            "{}% ({}/{}) | {} buckets left | [{}]",
            percent,
            self.total(),
            needed,
            self.counts.len() - self.filled_buckets(),
            counts
        )
    }
}

/// Drop position heuristic.
///
/// Starts from a linear map of the target bucket onto a lateral offset and
/// adds jitter. Every landing remembers the drop x that reached its bucket;
/// later drops aimed at a remembered bucket start from that x, with the
/// jitter halving on each miss. Aims at buckets nothing has reached yet
/// widen their jitter instead so the search keeps moving.
#[derive(Debug, Clone)]
pub struct DropBias {
    center: f32,
    range: f32,
    base_jitter: f32,
    max_jitter: f32,
    last_hit: Vec<Option<f32>>,
    jitter: Vec<f32>,
}

/// Jitter never shrinks below this, so repeated aims still vary a little
const MIN_JITTER: f32 = 0.05;

impl DropBias {
    pub fn new(board: &Board, config: &RecorderConfig) -> Self {
        let bucket_count = board.bucket_count();
        let (left, right) = board.cup_inner;
        Self {
            center: (left + right) / 2.0,
            range: config.drop_range,
            base_jitter: config.drop_jitter,
            max_jitter: right - left,
            last_hit: vec![None; bucket_count],
            jitter: vec![config.drop_jitter; bucket_count],
        }
    }

    /// Drop x aimed at `target`. The jitter window is cut to the cup's drop
    /// bounds, so draws near a wall do not pile up on the wall itself.
    pub fn drop_x<R: Rng + ?Sized>(&self, board: &Board, target: usize, rng: &mut R) -> f32 {
        let count = self.last_hit.len();
        let ratio = if count > 1 {
            target as f32 / (count - 1) as f32
        } else {
            0.5
        };
        let base = self
            .last_hit
            .get(target)
            .copied()
            .flatten()
            .unwrap_or(self.center + (ratio - 0.5) * 2.0 * self.range);
        let (lo, hi) = board.drop_bounds();
        let base = base.clamp(lo, hi);
        let half = self.jitter.get(target).copied().unwrap_or(self.base_jitter) / 2.0;
        let (from, to) = ((base - half).max(lo), (base + half).min(hi));
        if to > from {
            rng.random_range(from..to)
        } else {
            base
        }
    }

    /// Feed back where a drop aimed at `target` from `x` actually landed
    pub fn observe(&mut self, target: usize, x: f32, landed: usize) {
        if let Some(slot) = self.last_hit.get_mut(landed) {
            *slot = Some(x);
        }
        if landed == target {
            return;
        }
        let remembered = self.last_hit.get(target).is_some_and(Option::is_some);
        if let Some(jitter) = self.jitter.get_mut(target) {
            *jitter = if remembered {
                (*jitter * 0.5).max(MIN_JITTER)
            } else {
                (*jitter * 1.5).min(self.max_jitter)
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryBlobStore;
    use crate::sim::build_board;
    use crate::paths::{Position, RecordedPath};
    use rand::SeedableRng;
    use rand_pcg::Pcg32;
    use std::rc::Rc;

    #[test]
    fn test_tally_targets_edges_first() {
        let mut tally = BucketTally::new(9, 1);
        assert_eq!(tally.next_target(), Some(0));
        tally.add(0);
        assert_eq!(tally.next_target(), Some(1));
        tally.add(1);
        assert_eq!(tally.next_target(), Some(7));
        tally.add(7);
        assert_eq!(tally.next_target(), Some(8));
        tally.add(8);
        assert_eq!(tally.next_target(), Some(2));
        for b in 2..7 {
            tally.add(b);
        }
        assert_eq!(tally.next_target(), None);
        assert!(tally.is_filled());
    }

    #[test]
    fn test_tally_seeded_from_library() {
        let store = Rc::new(MemoryBlobStore::new());
        let mut library = PathLibrary::new(store, 6);
        let board = build_board(RowCount::Eight);
        let path = |b| RecordedPath::new(vec![Position::new(board.bucket_center(b).x, 600.0)], b);
        library.add_paths_batch(RowCount::Eight, vec![path(0), path(0), path(4)]);
        let tally = BucketTally::from_library(&library, RowCount::Eight, 6);
        assert_eq!(tally.counts(), &[2, 0, 0, 0, 1, 0, 0, 0, 0]);
        assert_eq!(tally.total(), 3);
        assert_eq!(tally.needed(), 54);
    }

    #[test]
    fn test_accept_skips_repeated_drop_x() {
        let mut tally = BucketTally::new(3, 2);
        assert!(tally.accept(1, 305.5));
        assert!(!tally.accept(1, 305.5));
        assert!(tally.accept(2, 305.5));
        assert!(tally.accept(1, 305.25));
        // Full bucket
        assert!(!tally.accept(1, 301.0));
        assert_eq!(tally.counts(), &[0, 2, 1]);
    }

    #[test]
    fn test_seeded_tally_knows_stored_drop_x() {
        let store = Rc::new(MemoryBlobStore::new());
        let mut library = PathLibrary::new(store, 6);
        let board = build_board(RowCount::Eight);
        let x = board.bucket_center(4).x;
        library.add_path(
            RowCount::Eight,
            RecordedPath::new(vec![Position::new(300.0, 0.0), Position::new(x, 600.0)], 4),
        );
        let mut tally = BucketTally::from_library(&library, RowCount::Eight, 6);
        assert!(!tally.accept(4, 300.0));
        assert!(tally.accept(4, 301.0));
    }

    #[test]
    fn test_drop_x_near_wall_does_not_stick_to_it() {
        let board = build_board(RowCount::Sixteen);
        let (lo, hi) = board.drop_bounds();
        let mut bias = DropBias::new(&board, &RecorderConfig::default());
        // A hit remembered right on the left bound
        bias.observe(0, lo, 0);
        let mut rng = Pcg32::seed_from_u64(8);
        let xs: Vec<f32> = (0..200).map(|_| bias.drop_x(&board, 0, &mut rng)).collect();
        assert!(xs.iter().all(|&x| (lo..=hi).contains(&x)));
        let on_wall = xs.iter().filter(|&&x| x == lo).count();
        assert!(on_wall <= 1, "{on_wall} drops pinned to the wall");
    }

    #[test]
    fn test_progress_string() {
        let mut tally = BucketTally::new(3, 2);
        tally.add(0);
        tally.add(0);
        tally.add(2);
        assert_eq!(tally.progress(), "50% (3/6) | 2 buckets left | [2|0|1]");
        assert_eq!(tally.unfilled(), vec![1, 2]);
    }

    #[test]
    fn test_drop_x_leans_toward_target() {
        let board = build_board(RowCount::Eight);
        let config = RecorderConfig {
            drop_jitter: 0.0,
            ..RecorderConfig::default()
        };
        let bias = DropBias::new(&board, &config);
        let mut rng = Pcg32::seed_from_u64(5);
        let left = bias.drop_x(&board, 0, &mut rng);
        let mid = bias.drop_x(&board, 4, &mut rng);
        let right = bias.drop_x(&board, 8, &mut rng);
        assert!(left < mid && mid < right);
        assert!((mid - board.clamp_drop_x(310.0)).abs() < 1e-3);
    }

    #[test]
    fn test_drop_bias_remembers_hits() {
        let board = build_board(RowCount::Eight);
        let mut bias = DropBias::new(&board, &RecorderConfig::default());
        bias.observe(4, 300.0, 0);
        let mut rng = Pcg32::seed_from_u64(6);
        for _ in 0..50 {
            let x = bias.drop_x(&board, 0, &mut rng);
            assert!((x - 300.0).abs() <= 7.5 + 1e-3);
        }
        // Misses on a remembered bucket narrow the search
        bias.observe(0, 300.0, 3);
        bias.observe(0, 300.0, 3);
        for _ in 0..50 {
            let x = bias.drop_x(&board, 0, &mut rng);
            assert!((x - 300.0).abs() <= 15.0 / 8.0 + 1e-3);
        }
    }
}
