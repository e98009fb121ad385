//! Board geometry
//!
//! Everything here is a pure function of the row count and the fixed canvas
//! size. A recorded path is only a list of coordinates, so it stays valid for
//! replay exactly as long as two boards built from the same row count are
//! identical - `build_board` must never depend on anything else.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::*;

/// Supported board sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum RowCount {
    Eight,
    Twelve,
    Sixteen,
}

impl RowCount {
    pub const ALL: [RowCount; 3] = [RowCount::Eight, RowCount::Twelve, RowCount::Sixteen];

    /// Number of peg rows
    pub const fn rows(self) -> u32 {
        match self {
            RowCount::Eight => 8,
            RowCount::Twelve => 12,
            RowCount::Sixteen => 16,
        }
    }

    /// Number of landing buckets (rows + 1)
    pub const fn bucket_count(self) -> usize {
        self.rows() as usize + 1
    }

    /// Peg/ball size multiplier so small boards fill the canvas
    pub const fn scale(self) -> f32 {
        match self {
            RowCount::Eight => 2.0,
            RowCount::Twelve => 1.5,
            RowCount::Sixteen => 1.0,
        }
    }

    pub fn from_rows(rows: u32) -> Option<Self> {
        match rows {
            8 => Some(RowCount::Eight),
            12 => Some(RowCount::Twelve),
            16 => Some(RowCount::Sixteen),
            _ => None,
        }
    }
}

impl TryFrom<u32> for RowCount {
    type Error = String;

    fn try_from(rows: u32) -> Result<Self, Self::Error> {
        RowCount::from_rows(rows).ok_or_else(|| format!("unsupported row count {rows}"))
    }
}

impl From<RowCount> for u32 {
    fn from(rows: RowCount) -> u32 {
        rows.rows()
    }
}

impl std::fmt::Display for RowCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.rows())
    }
}

/// A static peg
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peg {
    pub pos: Vec2,
    pub radius: f32,
    /// Row index (0 = top)
    pub row: usize,
}

/// A static containment wall: an oriented rectangle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Wall {
    pub center: Vec2,
    /// Full width along the local x axis
    pub width: f32,
    /// Full height along the local y axis
    pub height: f32,
    /// Rotation (radians)
    pub angle: f32,
}

impl Wall {
    pub fn new(center: Vec2, width: f32, height: f32, angle: f32) -> Self {
        Self {
            center,
            width,
            height,
            angle,
        }
    }

    /// Corners in winding order
    pub fn corners(&self) -> [Vec2; 4] {
        let axis_x = Vec2::from_angle(self.angle);
        let axis_y = Vec2::new(-axis_x.y, axis_x.x);
        let hx = axis_x * (self.width / 2.0);
        let hy = axis_y * (self.height / 2.0);
        [
            self.center - hx - hy,
            self.center + hx - hy,
            self.center + hx + hy,
            self.center - hx + hy,
        ]
    }
}

/// Fully derived board layout for one row count
#[derive(Debug, Clone, PartialEq)]
pub struct Board {
    pub rows: RowCount,
    /// Horizontal distance between neighbouring peg centres
    pub gap: f32,
    /// Vertical distance between peg rows
    pub vertical_gap: f32,
    pub peg_radius: f32,
    pub ball_radius: f32,
    /// All pegs, row-major
    pub pegs: Vec<Peg>,
    /// Index of the first peg of each row in `pegs`, plus a final end index
    row_starts: Vec<usize>,
    pub walls: Vec<Wall>,
    /// Horizontal sensor line: a ball whose centre reaches it has landed
    pub ground_y: f32,
    /// Top of the bucket strip
    pub bucket_y: f32,
    /// Left edge of bucket 0
    pub bucket_start_x: f32,
    /// Drawn width of one bucket
    pub bucket_width: f32,
    /// Spawn line for new balls
    pub drop_y: f32,
    /// Inner faces of the cup walls above the first row (left, right)
    pub cup_inner: (f32, f32),
}

/// Build the board for a row count
pub fn build_board(rows: RowCount) -> Board {
    let row_n = rows.rows() as usize;
    let scale = rows.scale();
    let peg_radius = PEG_RADIUS * scale;
    let ball_radius = BALL_RADIUS * scale;

    // The bottom row has rows + 2 pegs and therefore rows + 1 slots
    let max_pegs_in_row = row_n + 2;
    let gap = (CANVAS_WIDTH - BOARD_MARGIN * 2.0) / (max_pegs_in_row - 1) as f32;
    let vertical_gap = (CANVAS_HEIGHT - 80.0) / (row_n + 1) as f32;

    let mut pegs = Vec::new();
    let mut row_starts = Vec::with_capacity(row_n + 1);
    for r in 0..row_n {
        row_starts.push(pegs.len());
        let pegs_in_row = r + 3;
        let row_width = (pegs_in_row - 1) as f32 * gap;
        let start_x = (CANVAS_WIDTH - row_width) / 2.0;
        let y = BOARD_TOP + vertical_gap * (r + 1) as f32;
        for c in 0..pegs_in_row {
            pegs.push(Peg {
                pos: Vec2::new(start_x + c as f32 * gap, y),
                radius: peg_radius,
                row: r,
            });
        }
    }
    row_starts.push(pegs.len());

    let bottom_row_width = (max_pegs_in_row - 1) as f32 * gap;
    let peg_start_x = (CANVAS_WIDTH - bottom_row_width) / 2.0;
    let bucket_width = gap - BUCKET_SPACING;
    let bucket_start_x = peg_start_x + gap / 2.0 - bucket_width / 2.0;
    let bucket_y = CANVAS_HEIGHT - BUCKET_BOTTOM_OFFSET;

    let walls = containment_walls(gap, vertical_gap, peg_radius, row_n, peg_start_x, bottom_row_width);
    let top_offset = peg_radius + WALL_THICKNESS / 2.0;
    let cup_inner = (
        (CANVAS_WIDTH / 2.0 - gap) - top_offset + WALL_THICKNESS / 2.0,
        (CANVAS_WIDTH / 2.0 + gap) + top_offset - WALL_THICKNESS / 2.0,
    );

    Board {
        rows,
        gap,
        vertical_gap,
        peg_radius,
        ball_radius,
        pegs,
        row_starts,
        walls,
        ground_y: bucket_y - GROUND_OFFSET,
        bucket_y,
        bucket_start_x,
        bucket_width,
        drop_y: 0.0,
        cup_inner,
    }
}

/// Angled walls along the pyramid edges plus a cup above the first row,
/// so a ball that bounces high near the top still ends up inside the pegs.
fn containment_walls(
    gap: f32,
    vertical_gap: f32,
    peg_radius: f32,
    row_n: usize,
    peg_start_x: f32,
    bottom_row_width: f32,
) -> Vec<Wall> {
    let top_row_width = 2.0 * gap;
    let top_start_x = (CANVAS_WIDTH - top_row_width) / 2.0;
    let top_end_x = top_start_x + top_row_width;
    let top_y = BOARD_TOP + vertical_gap;

    let bottom_start_x = peg_start_x;
    let bottom_end_x = peg_start_x + bottom_row_width;
    let bottom_y = BOARD_TOP + vertical_gap * row_n as f32;

    let edge_wall = |from_x: f32, to_x: f32, outward: f32| {
        let delta = Vec2::new(to_x - from_x, bottom_y - top_y);
        let length = delta.length() + WALL_EXTENSION;
        let angle = delta.y.atan2(delta.x);
        let center = Vec2::new(
            (from_x + to_x) / 2.0 + outward * (peg_radius + WALL_THICKNESS / 2.0),
            (top_y + bottom_y) / 2.0,
        );
        Wall::new(center, WALL_THICKNESS, length, angle - std::f32::consts::FRAC_PI_2)
    };

    let top_offset = peg_radius + WALL_THICKNESS / 2.0;
    let cup_width = (top_end_x + top_offset) - (top_start_x - top_offset) + WALL_THICKNESS;

    vec![
        edge_wall(top_start_x, bottom_start_x, -1.0),
        edge_wall(top_end_x, bottom_end_x, 1.0),
        Wall::new(
            Vec2::new(top_start_x - top_offset, top_y - TOP_WALL_HEIGHT / 2.0),
            WALL_THICKNESS,
            TOP_WALL_HEIGHT,
            0.0,
        ),
        Wall::new(
            Vec2::new(top_end_x + top_offset, top_y - TOP_WALL_HEIGHT / 2.0),
            WALL_THICKNESS,
            TOP_WALL_HEIGHT,
            0.0,
        ),
        Wall::new(
            Vec2::new(CANVAS_WIDTH / 2.0, top_y - TOP_WALL_HEIGHT + WALL_THICKNESS / 2.0),
            cup_width,
            WALL_THICKNESS,
            0.0,
        ),
    ]
}

impl Board {
    pub fn bucket_count(&self) -> usize {
        self.rows.bucket_count()
    }

    /// Bucket under a horizontal position, clamped to the outer buckets
    pub fn bucket_at(&self, x: f32) -> usize {
        let rel = (x - self.bucket_start_x) / self.gap;
        let last = self.bucket_count() - 1;
        if rel.is_nan() || rel < 0.0 {
            0
        } else {
            (rel.floor() as usize).min(last)
        }
    }

    /// Left edge of a bucket's drawn rectangle
    pub fn bucket_left(&self, bucket: usize) -> f32 {
        self.bucket_start_x + bucket as f32 * self.gap
    }

    /// Centre of a bucket's drawn rectangle
    pub fn bucket_center(&self, bucket: usize) -> Vec2 {
        Vec2::new(
            self.bucket_left(bucket) + self.bucket_width / 2.0,
            self.bucket_y + BUCKET_HEIGHT / 2.0,
        )
    }

    /// Range of drop positions where a fresh ball fits between the cup walls
    pub fn drop_bounds(&self) -> (f32, f32) {
        let (left, right) = self.cup_inner;
        (left + self.ball_radius + 1.0, right - self.ball_radius - 1.0)
    }

    /// Clamp a drop position into `drop_bounds`
    pub fn clamp_drop_x(&self, x: f32) -> f32 {
        let (lo, hi) = self.drop_bounds();
        x.clamp(lo, hi)
    }

    /// Whether a position has crossed the ground line
    #[inline]
    pub fn has_landed(&self, pos: Vec2) -> bool {
        pos.y >= self.ground_y
    }

    /// Pegs of one row
    pub fn row_pegs(&self, row: usize) -> &[Peg] {
        &self.pegs[self.row_starts[row]..self.row_starts[row + 1]]
    }

    /// Indices of pegs close enough vertically to touch a ball at `y`
    pub fn pegs_near(&self, y: f32, ball_radius: f32) -> impl Iterator<Item = usize> + '_ {
        let reach = ball_radius + self.peg_radius;
        (0..self.rows.rows() as usize)
            .filter(move |&r| {
                let row_y = BOARD_TOP + self.vertical_gap * (r + 1) as f32;
                (row_y - y).abs() <= reach
            })
            .flat_map(move |r| self.row_starts[r]..self.row_starts[r + 1])
    }

    /// Indices of pegs in contact with (or within `slack` of) a ball at `pos`
    pub fn pegs_touching(&self, pos: Vec2, ball_radius: f32, slack: f32) -> impl Iterator<Item = usize> + '_ {
        let reach = ball_radius + self.peg_radius + slack;
        self.pegs_near(pos.y, ball_radius + slack)
            .filter(move |&i| self.pegs[i].pos.distance_squared(pos) <= reach * reach)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peg_layout_is_triangular() {
        for rows in RowCount::ALL {
            let board = build_board(rows);
            let n = rows.rows() as usize;
            assert_eq!(board.pegs.len(), (0..n).map(|r| r + 3).sum::<usize>());
            for r in 0..n {
                assert_eq!(board.row_pegs(r).len(), r + 3);
            }
        }
    }

    #[test]
    fn test_build_board_is_repeatable() {
        for rows in RowCount::ALL {
            assert_eq!(build_board(rows), build_board(rows));
        }
    }

    #[test]
    fn test_bottom_row_spans_margins() {
        let board = build_board(RowCount::Eight);
        let bottom = board.row_pegs(7);
        assert!((bottom[0].pos.x - BOARD_MARGIN).abs() < 1e-3);
        assert!((bottom[bottom.len() - 1].pos.x - (CANVAS_WIDTH - BOARD_MARGIN)).abs() < 1e-3);
    }

    #[test]
    fn test_bucket_at_clamps_and_centers() {
        let board = build_board(RowCount::Twelve);
        assert_eq!(board.bucket_at(-100.0), 0);
        assert_eq!(board.bucket_at(10_000.0), 12);
        for b in 0..board.bucket_count() {
            let x = board.bucket_left(b) + board.gap / 2.0;
            assert_eq!(board.bucket_at(x), b);
        }
        // Centre bucket sits under the canvas centre line
        assert_eq!(board.bucket_at(CANVAS_WIDTH / 2.0), 6);
    }

    #[test]
    fn test_drop_clamp_keeps_ball_inside_cup() {
        for rows in RowCount::ALL {
            let board = build_board(rows);
            let left = board.clamp_drop_x(0.0);
            let right = board.clamp_drop_x(CANVAS_WIDTH);
            assert!(left < CANVAS_WIDTH / 2.0 && right > CANVAS_WIDTH / 2.0);
            assert!(left - board.ball_radius > board.cup_inner.0);
            assert!(right + board.ball_radius < board.cup_inner.1);
            assert_eq!(board.clamp_drop_x(CANVAS_WIDTH / 2.0), CANVAS_WIDTH / 2.0);
        }
    }

    #[test]
    fn test_row_count_serde_as_number() {
        let json = serde_json::to_string(&RowCount::Twelve).unwrap();
        assert_eq!(json, "12");
        let rows: RowCount = serde_json::from_str("16").unwrap();
        assert_eq!(rows, RowCount::Sixteen);
        assert!(serde_json::from_str::<RowCount>("10").is_err());
    }

    #[test]
    fn test_pegs_near_only_returns_touching_rows() {
        let board = build_board(RowCount::Sixteen);
        let row0_y = board.row_pegs(0)[0].pos.y;
        let near: Vec<usize> = board.pegs_near(row0_y, board.ball_radius).collect();
        assert_eq!(near.len(), 3);
        let far: Vec<usize> = board.pegs_near(-500.0, board.ball_radius).collect();
        assert!(far.is_empty());
    }
}
