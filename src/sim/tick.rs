//! Per-frame board tick
//!
//! One call per display frame. Drops requested this frame are spawned first,
//! then every ball in flight is polled exactly once (a replay advances one
//! recorded sample, a live ball one physics step), then landings are settled
//! and live paths offered to the library. The switch from recording to
//! playback is only checked after an insertion, so a frame never sees a
//! half-switched board.

use super::state::{BoardMode, DropError, DropTicket, PlinkoBoard};
use super::task::TaskPoll;
use crate::consts::*;
use crate::payout::{Settlement, Wallet, multiplier};

/// Input for a single frame
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    /// Time since the previous frame (drives auto drop only)
    pub dt_ms: f64,
    /// Drop one ball (click/tap/space)
    pub drop: bool,
}

/// Everything that happened during one frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameReport {
    pub dropped: Vec<DropTicket>,
    pub drop_errors: Vec<DropError>,
    pub settlements: Vec<Settlement>,
    /// Live paths offered to the library: (bucket, accepted)
    pub recorded: Vec<(usize, bool)>,
    /// Live balls settled without reaching the ground
    pub stalled: Vec<u32>,
    /// Pegs touched this frame
    pub peg_hits: Vec<usize>,
    /// Set when the board switched mode this frame
    pub mode_changed: Option<BoardMode>,
}

/// Advance the board by one frame
pub fn tick(plinko: &mut PlinkoBoard, input: &TickInput, wallet: &mut dyn Wallet) -> FrameReport {
    let mut report = FrameReport::default();

    if input.drop {
        match plinko.drop_ball(wallet) {
            Ok(ticket) => report.dropped.push(ticket),
            Err(e) => report.drop_errors.push(e),
        }
    }
    if plinko.auto_drop.due(input.dt_ms) {
        match plinko.drop_ball(wallet) {
            Ok(ticket) => {
                plinko.auto_drop.remaining -= 1;
                report.dropped.push(ticket);
            }
            Err(e) => {
                log::info!("Auto drop stopped: {}", e);
                plinko.auto_drop.enabled = false;
                report.drop_errors.push(e);
            }
        }
    }

    // Poll every task once, in drop order
    let mut peg_hits = Vec::new();
    let mut finished = Vec::new();
    for (i, task) in plinko.tasks.iter_mut().enumerate() {
        match task.poll(&plinko.board, &mut peg_hits) {
            TaskPoll::Pending => {}
            outcome => finished.push((i, outcome)),
        }
    }

    let rows = plinko.board.rows;
    // Remove back to front so the collected indices stay valid, then settle
    // front to back so settlements follow drop order
    let mut settled = Vec::with_capacity(finished.len());
    for (i, outcome) in finished.into_iter().rev() {
        settled.push((plinko.tasks.remove(i), outcome));
    }
    settled.reverse();

    for (task, outcome) in settled {
        let stake = task.stake();
        let (bucket, path) = match outcome {
            TaskPoll::Landed { bucket, path } => (bucket, path),
            TaskPoll::Stalled { bucket } => {
                log::warn!("Ball {} stalled, settling at bucket {}", task.id(), bucket);
                report.stalled.push(task.id());
                (bucket, None)
            }
            TaskPoll::Pending => continue,
        };

        let settlement = Settlement::new(task.id(), bucket, stake.bet, multiplier(rows, stake.risk, bucket));
        wallet.credit(settlement.payout);
        report.settlements.push(settlement);
        if let Some(flash) = plinko.bucket_flash.get_mut(bucket) {
            *flash = BUCKET_FLASH_FRAMES;
        }

        if let Some(path) = path {
            let accepted = plinko.library.borrow_mut().add_path(rows, path);
            report.recorded.push((bucket, accepted));
            if accepted && plinko.mode == BoardMode::Recording {
                let ready = plinko
                    .library
                    .borrow()
                    .has_enough_paths(rows, rows.bucket_count());
                if ready {
                    plinko.mode = BoardMode::Playback;
                    report.mode_changed = Some(BoardMode::Playback);
                    log::info!("All buckets recorded for {} rows, switching to playback", rows);
                }
            }
        }
    }

    // Peg glow and bucket flash
    for glow in plinko.peg_glow.iter_mut() {
        *glow = glow.saturating_sub(1);
    }
    for flash in plinko.bucket_flash.iter_mut() {
        *flash = flash.saturating_sub(1);
    }
    for &peg in &peg_hits {
        if let Some(glow) = plinko.peg_glow.get_mut(peg) {
            *glow = PEG_GLOW_FRAMES;
        }
    }
    peg_hits.sort_unstable();
    peg_hits.dedup();
    report.peg_hits = peg_hits;

    plinko.frame += 1;
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::{PathLibrary, Position, ProbabilityTable, RecordedPath};
    use crate::payout::{Balance, Risk};
    use crate::persistence::MemoryBlobStore;
    use crate::sim::board::{RowCount, build_board};
    use crate::sim::state::DropKind;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn setup(rows: RowCount, cap: usize) -> PlinkoBoard {
        let store = Rc::new(MemoryBlobStore::new());
        let library = Rc::new(RefCell::new(PathLibrary::new(store.clone(), cap)));
        let probabilities = Rc::new(RefCell::new(ProbabilityTable::new(store)));
        PlinkoBoard::new(rows, library, probabilities, 5)
    }

    /// Straight drop ending in the middle of `bucket`
    fn synthetic_path(rows: RowCount, bucket: usize, samples: usize) -> RecordedPath {
        let board = build_board(rows);
        let x = board.bucket_left(bucket) + board.gap / 2.0;
        let positions = (0..samples)
            .map(|i| Position::new(x, board.ground_y * i as f32 / (samples - 1) as f32))
            .collect();
        RecordedPath::new(positions, bucket)
    }

    fn fill(plinko: &PlinkoBoard, samples: usize) {
        let rows = plinko.rows();
        let cap = plinko.library().borrow().cap();
        let paths: Vec<_> = (0..rows.bucket_count())
            .flat_map(|b| (0..cap).map(move |_| b))
            .map(|b| synthetic_path(rows, b, samples))
            .collect();
        plinko.library().borrow_mut().add_paths_batch(rows, paths);
    }

    #[test]
    fn test_replay_lands_after_one_frame_per_sample() {
        let mut plinko = setup(RowCount::Eight, 1);
        fill(&plinko, 10);
        plinko.set_rows(RowCount::Eight).unwrap();
        assert_eq!(plinko.mode(), BoardMode::Playback);
        plinko.set_manual_bucket(Some(2)).unwrap();
        plinko.risk = Risk::Low;
        plinko.bet = 10;
        let mut wallet = Balance::new(100);

        let report = tick(&mut plinko, &TickInput { dt_ms: 16.0, drop: true }, &mut wallet);
        assert_eq!(report.dropped[0].kind, DropKind::Replay { target: 2 });
        assert_eq!(wallet.balance(), 90);
        assert!(!plinko.is_idle());

        // Nine advances from sample 0 to sample 9; the drop frame was the first
        let mut frames = 1;
        let settlement = loop {
            let report = tick(&mut plinko, &TickInput::default(), &mut wallet);
            frames += 1;
            if let Some(s) = report.settlements.first() {
                break *s;
            }
        };
        assert_eq!(frames, 9);
        assert_eq!(settlement.bucket, 2);
        assert_eq!(settlement.payout, 11);
        assert_eq!(wallet.balance(), 101);
        assert!(plinko.bucket_flash(2) > 0.0);
        assert_eq!(plinko.balls_in_flight(), 0);
        assert!(plinko.is_idle());
    }

    #[test]
    fn test_bet_captured_at_drop_time() {
        let mut plinko = setup(RowCount::Eight, 1);
        fill(&plinko, 5);
        plinko.set_rows(RowCount::Eight).unwrap();
        plinko.set_manual_bucket(Some(0)).unwrap();
        plinko.risk = Risk::High;
        plinko.bet = 10;
        let mut wallet = Balance::new(1000);
        tick(&mut plinko, &TickInput { dt_ms: 16.0, drop: true }, &mut wallet);
        plinko.bet = 500;
        plinko.risk = Risk::Low;
        let mut credited = 0;
        for _ in 0..10 {
            let report = tick(&mut plinko, &TickInput::default(), &mut wallet);
            credited += report.settlements.iter().map(|s| s.payout).sum::<u64>();
        }
        assert_eq!(credited, 290);
        assert_eq!(wallet.balance(), 1000 - 10 + 290);
    }

    #[test]
    fn test_recording_switches_to_playback_when_full() {
        // Same seed, same drop x: learn where the first live ball lands
        let mut probe = setup(RowCount::Eight, 1);
        let mut wallet = Balance::new(1000);
        tick(&mut probe, &TickInput { dt_ms: 16.0, drop: true }, &mut wallet);
        let landed = loop {
            let report = tick(&mut probe, &TickInput::default(), &mut wallet);
            if let Some(&(bucket, _)) = report.recorded.first() {
                break bucket;
            }
        };

        // Every other bucket is already full, so that landing completes the set
        let mut plinko = setup(RowCount::Eight, 1);
        let others: Vec<_> = (0..9)
            .filter(|&b| b != landed)
            .map(|b| synthetic_path(RowCount::Eight, b, 3))
            .collect();
        plinko.library().borrow_mut().add_paths_batch(RowCount::Eight, others);
        assert_eq!(plinko.mode(), BoardMode::Recording);

        tick(&mut plinko, &TickInput { dt_ms: 16.0, drop: true }, &mut wallet);
        let report = loop {
            let report = tick(&mut plinko, &TickInput::default(), &mut wallet);
            if !report.recorded.is_empty() {
                break report;
            }
        };
        assert_eq!(report.recorded, vec![(landed, true)]);
        assert_eq!(report.mode_changed, Some(BoardMode::Playback));
        assert_eq!(plinko.mode(), BoardMode::Playback);
    }

    #[test]
    fn test_auto_drop_releases_budget() {
        let mut plinko = setup(RowCount::Sixteen, 6);
        plinko.auto_drop = crate::sim::state::AutoDrop::new(true, 400, 3);
        let mut wallet = Balance::new(1000);
        let mut dropped = 0;
        for _ in 0..200 {
            dropped += tick(&mut plinko, &TickInput { dt_ms: 100.0, drop: false }, &mut wallet)
                .dropped
                .len();
        }
        assert_eq!(dropped, 3);
        assert_eq!(plinko.auto_drop.remaining, 0);
    }

    #[test]
    fn test_auto_drop_stops_on_empty_wallet() {
        let mut plinko = setup(RowCount::Sixteen, 6);
        plinko.auto_drop = crate::sim::state::AutoDrop::new(true, 400, 10);
        plinko.bet = 10;
        let mut wallet = Balance::new(15);
        let mut errors = 0;
        for _ in 0..20 {
            errors += tick(&mut plinko, &TickInput { dt_ms: 100.0, drop: false }, &mut wallet)
                .drop_errors
                .len();
        }
        assert_eq!(errors, 1);
        assert!(!plinko.auto_drop.enabled);
    }

    #[test]
    fn test_peg_glow_decays() {
        let mut plinko = setup(RowCount::Twelve, 6);
        let mut wallet = Balance::new(100);
        tick(&mut plinko, &TickInput { dt_ms: 16.0, drop: true }, &mut wallet);
        let mut lit = None;
        for _ in 0..600 {
            let report = tick(&mut plinko, &TickInput::default(), &mut wallet);
            if let Some(&peg) = report.peg_hits.first() {
                lit = Some(peg);
                break;
            }
        }
        let peg = lit.expect("a centre drop touches a peg");
        assert_eq!(plinko.peg_glow(peg), 1.0);
        plinko.tasks.clear();
        tick(&mut plinko, &TickInput::default(), &mut wallet);
        assert!(plinko.peg_glow(peg) < 1.0);
    }
}
