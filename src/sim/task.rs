//! Balls in flight
//!
//! Every dropped ball is a task polled once per frame. A live task steps
//! the physics and samples its own trajectory; a replay task walks a
//! recorded path one sample per frame. The board loop treats both the same.

use std::rc::Rc;

use glam::Vec2;

use super::board::Board;
use super::world::{PathSampler, SimBall, step_ball};
use crate::consts::LIVE_STALL_FRAMES;
use crate::paths::RecordedPath;
use crate::payout::Risk;

/// Slack used when lighting pegs under a replayed ball
const REPLAY_CONTACT_SLACK: f32 = 1.0;

/// Bet and multiplier table captured at drop time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stake {
    pub bet: u64,
    pub risk: Risk,
}

/// Physics-driven ball that records its own path
#[derive(Debug, Clone)]
pub struct LiveBall {
    pub ball: SimBall,
    sampler: PathSampler,
    pub stake: Stake,
}

impl LiveBall {
    pub fn new(ball: SimBall, stake: Stake) -> Self {
        let sampler = PathSampler::start(&ball, 1);
        Self { ball, sampler, stake }
    }
}

/// Ball replaying a recorded path
#[derive(Debug, Clone)]
pub struct ReplayBall {
    pub id: u32,
    path: Rc<RecordedPath>,
    cursor: usize,
    pub stake: Stake,
}

impl ReplayBall {
    pub fn new(id: u32, path: Rc<RecordedPath>, stake: Stake) -> Self {
        Self {
            id,
            path,
            cursor: 0,
            stake,
        }
    }

    pub fn bucket(&self) -> usize {
        self.path.final_bucket
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }
}

/// Result of polling a task for one frame
#[derive(Debug, Clone, PartialEq)]
pub enum TaskPoll {
    /// Still falling
    Pending,
    /// Landed; a live ball hands over its sampled trajectory
    Landed {
        bucket: usize,
        path: Option<RecordedPath>,
    },
    /// Live ball that never reached the ground; settled where it is
    Stalled { bucket: usize },
}

/// A ball in flight
#[derive(Debug, Clone)]
pub enum BallTask {
    Live(LiveBall),
    Replay(ReplayBall),
}

impl BallTask {
    pub fn id(&self) -> u32 {
        match self {
            BallTask::Live(live) => live.ball.id,
            BallTask::Replay(replay) => replay.id,
        }
    }

    pub fn stake(&self) -> Stake {
        match self {
            BallTask::Live(live) => live.stake,
            BallTask::Replay(replay) => replay.stake,
        }
    }

    pub fn is_replay(&self) -> bool {
        matches!(self, BallTask::Replay(_))
    }

    /// Current draw position
    pub fn position(&self) -> Vec2 {
        match self {
            BallTask::Live(live) => live.ball.pos,
            BallTask::Replay(replay) => replay
                .path
                .positions
                .get(replay.cursor)
                .map_or(Vec2::ZERO, |p| p.to_vec2()),
        }
    }

    /// Advance one frame. Peg contacts are appended to `peg_hits`.
    pub fn poll(&mut self, board: &Board, peg_hits: &mut Vec<usize>) -> TaskPoll {
        match self {
            BallTask::Live(live) => {
                let report = step_ball(board, &mut live.ball);
                live.sampler.sample(&live.ball, report.landed.is_some());
                peg_hits.extend(report.peg_hits);

                if let Some(bucket) = report.landed {
                    let positions = std::mem::replace(&mut live.sampler, PathSampler::start(&live.ball, 1));
                    TaskPoll::Landed {
                        bucket,
                        path: Some(RecordedPath::new(positions.finish(), bucket)),
                    }
                } else if live.ball.steps >= LIVE_STALL_FRAMES {
                    TaskPoll::Stalled {
                        bucket: board.bucket_at(live.ball.pos.x),
                    }
                } else {
                    TaskPoll::Pending
                }
            }
            BallTask::Replay(replay) => {
                let last = replay.path.positions.len().saturating_sub(1);
                if replay.cursor >= last {
                    return TaskPoll::Landed {
                        bucket: replay.bucket(),
                        path: None,
                    };
                }
                replay.cursor += 1;
                let pos = replay.path.positions[replay.cursor].to_vec2();
                peg_hits.extend(board.pegs_touching(pos, board.ball_radius, REPLAY_CONTACT_SLACK));
                if replay.cursor >= last {
                    TaskPoll::Landed {
                        bucket: replay.bucket(),
                        path: None,
                    }
                } else {
                    TaskPoll::Pending
                }
            }
        }
    }
}
