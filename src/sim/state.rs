//! Board state
//!
//! One `PlinkoBoard` per displayed board. It owns the geometry and the balls
//! in flight, and shares the path library and the probability table with
//! every other board and recorder in the process.

use std::cell::RefCell;
use std::rc::Rc;

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::board::{Board, RowCount, build_board};
use super::task::{BallTask, LiveBall, ReplayBall, Stake};
use super::world::SimBall;
use crate::consts::*;
use crate::paths::{PathLibrary, ProbabilityTable};
use crate::payout::{Risk, Wallet};
use crate::settings::{Settings, SettingsError};

/// Whether drops are recorded live or replayed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoardMode {
    /// Every drop is a live physics ball whose path is offered to the library
    Recording,
    /// Every drop replays a stored path for a pre-selected bucket
    Playback,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DropError {
    #[error("bet must be greater than zero")]
    ZeroBet,

    #[error("insufficient balance: bet {bet}, balance {balance}")]
    InsufficientBalance { bet: u64, balance: u64 },
}

/// How a dropped ball will move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DropKind {
    /// Live physics while recording
    Live,
    /// Replay of a stored path for the target bucket
    Replay { target: usize },
    /// Playback wanted `target` but it had no path; live and recorded
    Fallback { target: usize },
}

/// Receipt for a successful drop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropTicket {
    pub ball_id: u32,
    pub bet: u64,
    pub kind: DropKind,
}

/// Auto drop timer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoDrop {
    pub enabled: bool,
    pub interval_ms: f64,
    /// Balls still to release
    pub remaining: u32,
    pub(crate) since_ms: f64,
}

impl AutoDrop {
    pub fn new(enabled: bool, interval_ms: u32, remaining: u32) -> Self {
        Self {
            enabled,
            interval_ms: interval_ms as f64,
            remaining,
            since_ms: 0.0,
        }
    }

    /// Advance the timer; true when a ball is due
    pub(crate) fn due(&mut self, dt_ms: f64) -> bool {
        if !self.enabled || self.remaining == 0 {
            self.since_ms = 0.0;
            return false;
        }
        self.since_ms += dt_ms;
        if self.since_ms >= self.interval_ms {
            self.since_ms -= self.interval_ms;
            true
        } else {
            false
        }
    }
}

/// A Plinko board instance
pub struct PlinkoBoard {
    pub(crate) board: Board,
    pub(crate) mode: BoardMode,
    pub(crate) library: Rc<RefCell<PathLibrary>>,
    pub(crate) probabilities: Rc<RefCell<ProbabilityTable>>,
    /// Balls in flight, in drop order
    pub(crate) tasks: Vec<BallTask>,
    pub(crate) rng: Pcg32,
    next_id: u32,
    /// Frames ticked so far
    pub(crate) frame: u64,
    pub bet: u64,
    pub risk: Risk,
    manual_bucket: Option<usize>,
    pub auto_drop: AutoDrop,
    /// Frames of glow left per peg
    pub(crate) peg_glow: Vec<u32>,
    /// Frames of flash left per bucket
    pub(crate) bucket_flash: Vec<u32>,
}

impl PlinkoBoard {
    /// Create a board, loading the library on first use. Starts in playback
    /// if the library already holds enough paths for `rows`.
    pub fn new(
        rows: RowCount,
        library: Rc<RefCell<PathLibrary>>,
        probabilities: Rc<RefCell<ProbabilityTable>>,
        seed: u64,
    ) -> Self {
        library.borrow_mut().ensure_loaded();
        let board = build_board(rows);
        let mut plinko = Self {
            peg_glow: vec![0; board.pegs.len()],
            bucket_flash: vec![0; board.bucket_count()],
            board,
            mode: BoardMode::Recording,
            library,
            probabilities,
            tasks: Vec::new(),
            rng: Pcg32::seed_from_u64(seed),
            next_id: 1,
            frame: 0,
            bet: 10,
            risk: Risk::default(),
            manual_bucket: None,
            auto_drop: AutoDrop::new(false, 400, 0),
        };
        plinko.mode = plinko.ready_mode();
        log::info!("Board for {} rows starts in {:?} mode", rows, plinko.mode);
        plinko
    }

    /// Create a board configured from settings
    pub fn from_settings(
        settings: &Settings,
        library: Rc<RefCell<PathLibrary>>,
        probabilities: Rc<RefCell<ProbabilityTable>>,
        seed: u64,
    ) -> Self {
        library.borrow_mut().set_cap(settings.paths_per_bucket);
        let mut plinko = Self::new(settings.rows, library, probabilities, seed);
        plinko.apply_settings(settings);
        plinko
    }

    /// Apply the per-drop settings (not the row count)
    pub fn apply_settings(&mut self, settings: &Settings) {
        self.bet = settings.bet;
        self.risk = settings.risk;
        self.manual_bucket = settings
            .manual_bucket
            .filter(|&b| b < self.board.bucket_count());
        self.auto_drop.enabled = settings.auto_drop;
        self.auto_drop.interval_ms = settings.auto_drop_interval_ms as f64;
        self.auto_drop.remaining = settings.auto_drop_balls;
    }

    fn ready_mode(&self) -> BoardMode {
        let rows = self.board.rows;
        if self
            .library
            .borrow()
            .has_enough_paths(rows, rows.bucket_count())
        {
            BoardMode::Playback
        } else {
            BoardMode::Recording
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn rows(&self) -> RowCount {
        self.board.rows
    }

    pub fn mode(&self) -> BoardMode {
        self.mode
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn library(&self) -> &Rc<RefCell<PathLibrary>> {
        &self.library
    }

    pub fn probabilities(&self) -> &Rc<RefCell<ProbabilityTable>> {
        &self.probabilities
    }

    pub fn tasks(&self) -> &[BallTask] {
        &self.tasks
    }

    /// No ball is falling, so nothing is waiting to settle
    pub fn is_idle(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn balls_in_flight(&self) -> usize {
        self.tasks.len()
    }

    pub fn manual_bucket(&self) -> Option<usize> {
        self.manual_bucket
    }

    /// Force every following playback drop into `bucket` (`None` = weighted draw)
    pub fn set_manual_bucket(&mut self, bucket: Option<usize>) -> Result<(), SettingsError> {
        if let Some(bucket) = bucket
            && bucket >= self.board.bucket_count()
        {
            return Err(SettingsError::BucketOutOfRange {
                bucket,
                rows: self.board.rows,
            });
        }
        self.manual_bucket = bucket;
        Ok(())
    }

    /// Rebuild for another row count. Refused while balls are in flight,
    /// since their bets are already debited.
    pub fn set_rows(&mut self, rows: RowCount) -> Result<(), SettingsError> {
        if !self.is_idle() {
            return Err(SettingsError::BallsInFlight(self.tasks.len()));
        }
        self.board = build_board(rows);
        self.peg_glow = vec![0; self.board.pegs.len()];
        self.bucket_flash = vec![0; self.board.bucket_count()];
        if self.manual_bucket.is_some_and(|b| b >= self.board.bucket_count()) {
            self.manual_bucket = None;
        }
        self.mode = self.ready_mode();
        log::info!("Board switched to {} rows, {:?} mode", rows, self.mode);
        Ok(())
    }

    /// Re-check the library after something other than this board wrote to
    /// it (a recorder run, another board). Returns the new mode.
    pub fn refresh_mode(&mut self) -> BoardMode {
        let mode = self.ready_mode();
        if mode != self.mode {
            log::info!("Board for {} rows now in {:?} mode", self.board.rows, mode);
            self.mode = mode;
        }
        mode
    }

    /// Clear the stored paths for this row count and go back to recording
    pub fn reset_paths(&mut self) {
        self.library.borrow_mut().clear(Some(self.board.rows));
        self.mode = BoardMode::Recording;
        log::info!("Paths reset for {} rows, recording", self.board.rows);
    }

    /// Drop one ball. The bet is debited now and the payout credited by
    /// `tick` when the ball lands.
    pub fn drop_ball(&mut self, wallet: &mut dyn Wallet) -> Result<DropTicket, DropError> {
        let bet = self.bet;
        if bet == 0 {
            return Err(DropError::ZeroBet);
        }
        if !wallet.debit(bet) {
            return Err(DropError::InsufficientBalance {
                bet,
                balance: wallet.balance(),
            });
        }

        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        let stake = Stake {
            bet,
            risk: self.risk,
        };

        let kind = match self.mode {
            BoardMode::Recording => {
                self.spawn_live(id, stake);
                DropKind::Live
            }
            BoardMode::Playback => {
                let target = self.resolve_target();
                let path = self
                    .library
                    .borrow()
                    .random_path(self.board.rows, target, &mut self.rng);
                match path {
                    Some(path) => {
                        log::debug!("Ball {} replays a path to bucket {}", id, target);
                        self.tasks.push(BallTask::Replay(ReplayBall::new(id, path, stake)));
                        DropKind::Replay { target }
                    }
                    None => {
                        log::info!("No path for bucket {}, dropping live and recording", target);
                        self.spawn_live(id, stake);
                        DropKind::Fallback { target }
                    }
                }
            }
        };

        Ok(DropTicket {
            ball_id: id,
            bet,
            kind,
        })
    }

    /// Manual override if set, otherwise a weighted draw
    fn resolve_target(&mut self) -> usize {
        if let Some(bucket) = self.manual_bucket {
            return bucket;
        }
        let rows = self.board.rows;
        self.probabilities
            .borrow()
            .draw_bucket(rows, rows.bucket_count(), &mut self.rng)
    }

    fn spawn_live(&mut self, id: u32, stake: Stake) {
        let jitter = (self.rng.random::<f32>() - 0.5) * LIVE_DROP_JITTER;
        let x = self.board.clamp_drop_x(CANVAS_WIDTH / 2.0 + jitter);
        let ball = SimBall::spawn(id, &self.board, x);
        self.tasks.push(BallTask::Live(LiveBall::new(ball, stake)));
    }

    /// Glow level of a peg (0.0 - 1.0)
    pub fn peg_glow(&self, peg: usize) -> f32 {
        self.peg_glow.get(peg).map_or(0.0, |&f| f as f32 / PEG_GLOW_FRAMES as f32)
    }

    /// Flash level of a bucket (0.0 - 1.0)
    pub fn bucket_flash(&self, bucket: usize) -> f32 {
        self.bucket_flash
            .get(bucket)
            .map_or(0.0, |&f| f as f32 / BUCKET_FLASH_FRAMES as f32)
    }
}

impl std::fmt::Debug for PlinkoBoard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlinkoBoard")
            .field("rows", &self.board.rows)
            .field("mode", &self.mode)
            .field("in_flight", &self.tasks.len())
            .field("frame", &self.frame)
            .finish()
    }
}
