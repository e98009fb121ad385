//! Scene building
//!
//! Turns board state into a flat triangle list in canvas pixels. Pure, so it
//! runs (and is tested) without a GPU.

use std::f32::consts::PI;

use glam::Vec2;

use super::shapes::{circle, quad, radial_circle, rect};
use super::vertex::{Vertex, colors};
use crate::payout::{Risk, multipliers};
use crate::recorder::VisualRecorder;
use crate::sim::{Board, PlinkoBoard};

const PEG_SEGMENTS: u32 = 12;
const BALL_SEGMENTS: u32 = 20;
/// Extra halo radius on a freshly hit peg
const PEG_HALO_GROW: f32 = 5.0;
/// Height of the recorder progress bar under each bucket
const PROGRESS_BAR_HEIGHT: f32 = 4.0;

fn scale_rgb(color: [f32; 4], k: f32) -> [f32; 4] {
    [
        (color[0] * k).min(1.0),
        (color[1] * k).min(1.0),
        (color[2] * k).min(1.0),
        color[3],
    ]
}

fn lerp_color(a: [f32; 4], b: [f32; 4], t: f32) -> [f32; 4] {
    [
        a[0] + (b[0] - a[0]) * t,
        a[1] + (b[1] - a[1]) * t,
        a[2] + (b[2] - a[2]) * t,
        a[3] + (b[3] - a[3]) * t,
    ]
}

/// Bucket colour: red below 1x, yellow to green from 1x up to the table max
pub fn bucket_color(multiplier: f64, max_multiplier: f64) -> [f32; 4] {
    if multiplier < 1.0 {
        return colors::BUCKET_LOSS;
    }
    let t = if max_multiplier > 1.0 {
        ((multiplier - 1.0) / (max_multiplier - 1.0)).clamp(0.0, 1.0) as f32
    } else {
        0.0
    };
    lerp_color(colors::BUCKET_LOW, colors::BUCKET_HIGH, t)
}

fn push_pegs(out: &mut Vec<Vertex>, board: &Board, glow: impl Fn(usize) -> f32) {
    for (i, peg) in board.pegs.iter().enumerate() {
        let g = glow(i);
        if g > 0.0 {
            // Halo swells then shrinks while it fades
            let t = 1.0 - g;
            let swell = (1.0 - (t - 0.5).powi(2) * 4.0) * PEG_HALO_GROW;
            let mut halo = colors::PEG_HALO;
            halo[3] *= g;
            out.extend(circle(peg.pos, peg.radius + swell.max(0.0), halo, PEG_SEGMENTS));
        }
        out.extend(circle(peg.pos, peg.radius, colors::PEG, PEG_SEGMENTS));
    }
}

fn push_walls(out: &mut Vec<Vertex>, board: &Board) {
    for wall in &board.walls {
        out.extend(quad(wall.corners(), colors::WALL));
    }
}

fn push_buckets(out: &mut Vec<Vertex>, board: &Board, risk: Risk, flash: impl Fn(usize) -> f32) {
    let table = multipliers(board.rows, risk);
    let max = table.iter().cloned().fold(0.0, f64::max);
    for (i, &m) in table.iter().enumerate().take(board.bucket_count()) {
        let f = flash(i);
        // Dip in size and brighten while flashing
        let pulse = if f > 0.0 { ((1.0 - f) * PI).sin() } else { 0.0 };
        let scale = 1.0 - pulse * 0.1;
        let brightness = 1.0 + pulse * 0.5;

        let size = Vec2::new(board.bucket_width, crate::consts::BUCKET_HEIGHT) * scale;
        let base = Vec2::new(board.bucket_left(i), board.bucket_y);
        let full = Vec2::new(board.bucket_width, crate::consts::BUCKET_HEIGHT);
        let top_left = base + (full - size) / 2.0;
        out.extend(rect(top_left, size, scale_rgb(bucket_color(m, max), brightness)));
    }
}

fn push_ball(out: &mut Vec<Vertex>, pos: Vec2, radius: f32, color: [f32; 4]) {
    // Highlight offset up-left like a lit sphere
    out.extend(circle(pos, radius, color, BALL_SEGMENTS));
    out.extend(radial_circle(
        pos - Vec2::splat(radius / 3.0),
        radius * 0.6,
        colors::BALL_HIGHLIGHT,
        [colors::BALL_HIGHLIGHT[0], colors::BALL_HIGHLIGHT[1], colors::BALL_HIGHLIGHT[2], 0.0],
        BALL_SEGMENTS,
    ));
}

/// Vertices for a playing board: pegs with glow, walls, buckets, balls
pub fn board_vertices(plinko: &PlinkoBoard) -> Vec<Vertex> {
    let board = plinko.board();
    let mut out = Vec::with_capacity(board.pegs.len() * PEG_SEGMENTS as usize * 6);

    push_walls(&mut out, board);
    push_pegs(&mut out, board, |i| plinko.peg_glow(i));
    push_buckets(&mut out, board, plinko.risk, |i| plinko.bucket_flash(i));
    for task in plinko.tasks() {
        push_ball(&mut out, task.position(), board.ball_radius, colors::BALL);
    }
    out
}

/// Vertices for the visual recorder: board, per-bucket fill bars and balls
pub fn recorder_vertices(recorder: &VisualRecorder) -> Vec<Vertex> {
    let board = recorder.board();
    let mut out = Vec::new();

    push_walls(&mut out, board);
    push_pegs(&mut out, board, |_| 0.0);
    push_buckets(&mut out, board, Risk::default(), |_| 0.0);

    let tally = recorder.tally();
    let target = tally.target().max(1);
    for (i, &count) in tally.counts().iter().enumerate() {
        let left = Vec2::new(
            board.bucket_left(i),
            board.bucket_y + crate::consts::BUCKET_HEIGHT + 2.0,
        );
        let fill = (count.min(target) as f32) / target as f32;
        out.extend(rect(
            left,
            Vec2::new(board.bucket_width, PROGRESS_BAR_HEIGHT),
            colors::PROGRESS_EMPTY,
        ));
        if fill > 0.0 {
            out.extend(rect(
                left,
                Vec2::new(board.bucket_width * fill, PROGRESS_BAR_HEIGHT),
                colors::PROGRESS_FULL,
            ));
        }
    }

    for ball in recorder.balls() {
        push_ball(&mut out, ball.pos, ball.radius, colors::RECORDER_BALL);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::{PathLibrary, ProbabilityTable};
    use crate::persistence::MemoryBlobStore;
    use crate::recorder::RecorderConfig;
    use crate::sim::RowCount;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_bucket_colors() {
        assert_eq!(bucket_color(0.5, 110.0), colors::BUCKET_LOSS);
        assert_eq!(bucket_color(1.0, 110.0), colors::BUCKET_LOW);
        assert_eq!(bucket_color(110.0, 110.0), colors::BUCKET_HIGH);
        // Flat table never divides by zero
        assert_eq!(bucket_color(1.0, 1.0), colors::BUCKET_LOW);
    }

    #[test]
    fn test_board_vertices_cover_every_element() {
        let store = Rc::new(MemoryBlobStore::new());
        let library = Rc::new(RefCell::new(PathLibrary::new(store.clone(), 6)));
        let probs = Rc::new(RefCell::new(ProbabilityTable::new(store)));
        let plinko = PlinkoBoard::new(RowCount::Eight, library, probs, 1);
        let board = plinko.board();

        let expected = board.walls.len() * 6
            + board.pegs.len() * PEG_SEGMENTS as usize * 3
            + board.bucket_count() * 6;
        let vertices = board_vertices(&plinko);
        assert_eq!(vertices.len(), expected);
        assert!(vertices.iter().all(|v| v.position[0].is_finite() && v.position[1].is_finite()));
    }

    #[test]
    fn test_recorder_vertices_include_progress_bars() {
        let store = Rc::new(MemoryBlobStore::new());
        let library = PathLibrary::new(store, 6);
        let recorder = VisualRecorder::new(&library, RowCount::Twelve, 6, 50, RecorderConfig::default());
        let board = recorder.board();
        let expected = board.walls.len() * 6
            + board.pegs.len() * PEG_SEGMENTS as usize * 3
            + board.bucket_count() * 6
            + board.bucket_count() * 6;
        assert_eq!(recorder_vertices(&recorder).len(), expected);
    }
}
