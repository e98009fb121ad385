use rand::Rng;

use super::{BucketTally, DropBias, RecorderConfig, RecordingReport};
use crate::paths::{PathLibrary, RecordedPath};
use crate::sim::{Board, PathSampler, RowCount, SimBall, build_board, step_ball};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Running,
    Cancelled,
}

#[derive(Debug, Clone)]
struct InFlight {
    ball: SimBall,
    sampler: PathSampler,
    target: usize,
    drop_x: f32,
}

/// What happened during one visual recorder frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisualFrame {
    /// A new ball was dropped this frame
    pub dropped: bool,
    /// Landings this frame: (bucket, whether the path was kept)
    pub landed: Vec<(usize, bool)>,
    /// Balls dropped because they exceeded the step budget
    pub stalled: usize,
    /// Pegs touched this frame
    pub peg_hits: Vec<usize>,
}

/// Frame-paced recorder.
///
/// Drops at most one ball per frame, `balls_per_second` times a second, and
/// steps every in-flight ball exactly once per frame, so each sample lines
/// up with one displayed frame.
#[derive(Debug, Clone)]
pub struct VisualRecorder {
    board: Board,
    config: RecorderConfig,
    tally: BucketTally,
    bias: DropBias,
    balls_per_second: u32,
    in_flight: Vec<InFlight>,
    collected: Vec<RecordedPath>,
    since_drop_ms: f64,
    next_id: u32,
    attempts: u32,
    stalled: u32,
    state: RunState,
}

impl VisualRecorder {
    pub fn new(
        library: &PathLibrary,
        rows: RowCount,
        paths_per_bucket: usize,
        balls_per_second: u32,
        config: RecorderConfig,
    ) -> Self {
        let board = build_board(rows);
        let bias = DropBias::new(&board, &config);
        let tally = BucketTally::from_library(library, rows, paths_per_bucket);
        log::info!("Visual recording {} rows at {} balls/s", rows, balls_per_second);
        Self {
            board,
            config,
            tally,
            bias,
            balls_per_second: balls_per_second.max(1),
            in_flight: Vec::new(),
            collected: Vec::new(),
            // Drop on the first frame
            since_drop_ms: f64::INFINITY,
            next_id: 0,
            attempts: 0,
            stalled: 0,
            state: RunState::Running,
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn rows(&self) -> RowCount {
        self.board.rows
    }

    pub fn tally(&self) -> &BucketTally {
        &self.tally
    }

    pub fn set_balls_per_second(&mut self, balls_per_second: u32) {
        self.balls_per_second = balls_per_second.max(1);
    }

    pub fn balls_per_second(&self) -> u32 {
        self.balls_per_second
    }

    /// Milliseconds between drops
    pub fn drop_interval_ms(&self) -> f64 {
        1000.0 / self.balls_per_second as f64
    }

    /// In-flight ball limit
    pub fn max_in_flight(&self) -> usize {
        self.config
            .max_in_flight
            .unwrap_or_else(|| (self.balls_per_second as usize * 2).max(50))
    }

    /// Positions of the balls currently falling
    pub fn balls(&self) -> impl Iterator<Item = &SimBall> {
        self.in_flight.iter().map(|f| &f.ball)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Every bucket reached its target, or the budget is spent and nothing
    /// is left falling, or the run was cancelled
    pub fn is_finished(&self) -> bool {
        match self.state {
            RunState::Cancelled => true,
            RunState::Running => {
                self.tally.is_filled()
                    || (self.attempts >= self.config.max_attempts && self.in_flight.is_empty())
            }
        }
    }

    pub fn progress(&self) -> String {
        self.tally.progress()
    }

    /// Advance one display frame; `dt_ms` is the time since the last frame
    pub fn frame<R: Rng + ?Sized>(&mut self, dt_ms: f64, rng: &mut R) -> VisualFrame {
        let mut frame = VisualFrame::default();
        if self.is_finished() {
            return frame;
        }

        let board = &self.board;
        let max_steps = self.config.max_steps;
        let mut finished = Vec::new();
        for (i, flight) in self.in_flight.iter_mut().enumerate() {
            let report = step_ball(board, &mut flight.ball);
            flight.sampler.sample(&flight.ball, report.landed.is_some());
            for peg in report.peg_hits {
                if !frame.peg_hits.contains(&peg) {
                    frame.peg_hits.push(peg);
                }
            }
            if report.landed.is_some() || flight.ball.steps >= max_steps {
                finished.push((i, report.landed));
            }
        }

        // Highest index first so earlier indices stay valid
        for (i, landed) in finished.into_iter().rev() {
            let flight = self.in_flight.swap_remove(i);
            match landed {
                Some(bucket) => {
                    self.bias.observe(flight.target, flight.drop_x, bucket);
                    let kept = self.tally.accept(bucket, flight.drop_x);
                    if kept {
                        self.collected.push(RecordedPath::new(flight.sampler.finish(), bucket));
                        log::debug!(
                            "Bucket {} now has {}/{}",
                            bucket,
                            self.tally.counts()[bucket],
                            self.tally.target()
                        );
                    }
                    frame.landed.push((bucket, kept));
                }
                None => {
                    self.stalled += 1;
                    frame.stalled += 1;
                }
            }
        }

        self.since_drop_ms += dt_ms;
        let can_drop = !self.tally.is_filled()
            && self.attempts < self.config.max_attempts
            && self.in_flight.len() < self.max_in_flight();
        if can_drop && self.since_drop_ms >= self.drop_interval_ms() {
            if let Some(target) = self.tally.next_target() {
                self.spawn(target, rng);
                self.since_drop_ms = 0.0;
                frame.dropped = true;
            }
        }

        frame
    }

    fn spawn<R: Rng + ?Sized>(&mut self, target: usize, rng: &mut R) {
        let x = self.bias.drop_x(&self.board, target, rng);
        let ball = SimBall::spawn(self.next_id, &self.board, x);
        self.next_id = self.next_id.wrapping_add(1);
        self.attempts += 1;
        let sampler = PathSampler::start(&ball, self.config.sample_every);
        self.in_flight.push(InFlight {
            ball,
            sampler,
            target,
            drop_x: x,
        });
    }

    /// Stop the run. Balls still falling are discarded; paths that already
    /// landed are kept for `commit`.
    pub fn cancel(&mut self) {
        let discarded = self.in_flight.len();
        self.in_flight.clear();
        self.state = RunState::Cancelled;
        log::info!("Visual recording cancelled, {} balls in flight discarded", discarded);
    }

    /// Write the landed paths to the library in one batch
    pub fn commit(self, library: &mut PathLibrary) -> RecordingReport {
        let rows = self.board.rows;
        let unfilled = self.tally.unfilled();
        let accepted = library.add_paths_batch(rows, self.collected);
        log::info!("Visual recorder saved {} paths for {} rows", accepted, rows);
        RecordingReport {
            rows,
            accepted,
            attempts: self.attempts,
            stalled: self.stalled,
            unfilled,
        }
    }
}
