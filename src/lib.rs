//! Plinko Replay - recorded-path Plinko board
//!
//! Outcomes are decided before the ball moves: a bucket is drawn from a
//! weighted table (or forced by the operator) and a trajectory that was
//! recorded landing in that bucket is replayed frame by frame.
//!
//! Core modules:
//! - `sim`: Board geometry, collision, physics world and the per-frame tick
//! - `paths`: Recorded path library and bucket probability table
//! - `recorder`: Fast (headless) and visual (frame-paced) path recorders
//! - `payout`: Risk multiplier tables and settlement arithmetic
//! - `persistence`: Blob store contract and its backends
//! - `renderer`: Vertex scene building and the WebGPU pipeline
//! - `settings`: Operator configuration
//! - `audio`: Web Audio cues for drops, peg contacts and landings
//! - `cli`: Native operator commands

pub mod audio;
#[cfg(not(target_arch = "wasm32"))]
pub mod cli;
pub mod paths;
pub mod payout;
pub mod persistence;
pub mod recorder;
pub mod renderer;
pub mod settings;
pub mod sim;

pub use paths::{PathLibrary, Position, ProbabilityTable, RecordedPath};
pub use payout::{Balance, Risk, Wallet};
pub use persistence::{BlobStore, MemoryBlobStore, StoreError};
pub use settings::Settings;
pub use sim::{Board, BoardMode, PlinkoBoard, RowCount};

/// Board and physics constants
pub mod consts {
    /// Fixed canvas size every board is laid out in (pixels)
    pub const CANVAS_WIDTH: f32 = 620.0;
    pub const CANVAS_HEIGHT: f32 = 580.0;
    /// Horizontal margin kept free on each side of the bottom peg row
    pub const BOARD_MARGIN: f32 = 20.0;
    /// Distance from the canvas top to the row-0 baseline
    pub const BOARD_TOP: f32 = 40.0;
    /// Bucket strip sits this far above the canvas bottom
    pub const BUCKET_BOTTOM_OFFSET: f32 = 45.0;
    /// Ground line sits this far above the bucket strip
    pub const GROUND_OFFSET: f32 = 10.0;
    /// Gap between neighbouring buckets (bucket width = peg gap - this)
    pub const BUCKET_SPACING: f32 = 6.0;
    pub const BUCKET_HEIGHT: f32 = 35.0;

    /// Base radii, multiplied by the row-count scale
    pub const PEG_RADIUS: f32 = 4.0;
    pub const BALL_RADIUS: f32 = 7.0;

    /// Containment walls
    pub const WALL_THICKNESS: f32 = 10.0;
    /// Extra length added to the angled walls past the outer pegs
    pub const WALL_EXTENSION: f32 = 40.0;
    /// Height of the vertical walls above the first peg row
    pub const TOP_WALL_HEIGHT: f32 = 150.0;

    /// Fixed simulation timestep: one physics step per display frame
    pub const SIM_DT: f32 = 1.0 / 60.0;
    /// Collision substeps per physics step (keeps small balls from tunnelling)
    pub const SUBSTEPS: u32 = 4;
    /// Downward acceleration (pixels/s²)
    pub const GRAVITY: f32 = 700.0;
    /// Velocity fraction lost to drag every step
    pub const AIR_FRICTION: f32 = 0.01;
    /// Tangential velocity fraction lost on contact
    pub const CONTACT_FRICTION: f32 = 0.05;
    pub const BALL_RESTITUTION: f32 = 0.6;
    /// Maximum ball speed (pixels/s)
    pub const BALL_MAX_SPEED: f32 = 1200.0;

    /// Live drops start this far from the centre line at most
    pub const LIVE_DROP_JITTER: f32 = 10.0;
    /// Frames a live ball may stay in flight before it is force-settled (30s)
    pub const LIVE_STALL_FRAMES: u32 = 30 * 60;

    /// Paths stored per bucket before a row count counts as recorded
    pub const DEFAULT_PATHS_PER_BUCKET: usize = 6;

    /// Frames a peg glows after contact
    pub const PEG_GLOW_FRAMES: u32 = 48;
    /// Frames a bucket flashes after a landing
    pub const BUCKET_FLASH_FRAMES: u32 = 30;
}
