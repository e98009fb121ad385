//! Deterministic simulation module
//!
//! Board geometry, physics and the per-frame board loop. This module must be
//! pure and deterministic so a recorded path replays exactly as it fell:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Geometry derived from the row count alone
//! - No rendering or platform dependencies

pub mod board;
pub mod collision;
pub mod state;
pub mod task;
pub mod tick;
pub mod world;

pub use board::{Board, Peg, RowCount, Wall, build_board};
pub use collision::{CollisionResult, ball_circle_collision, ball_wall_collision};
pub use state::{AutoDrop, BoardMode, DropError, DropKind, DropTicket, PlinkoBoard};
pub use task::{BallTask, LiveBall, ReplayBall, Stake, TaskPoll};
pub use tick::{FrameReport, TickInput, tick};
pub use world::{PathSampler, SimBall, StepReport, simulate_drop, step_ball};
