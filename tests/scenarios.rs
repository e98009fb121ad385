//! End-to-end board scenarios

use std::cell::RefCell;
use std::rc::Rc;

use rand::SeedableRng;
use rand_pcg::Pcg32;

use plinko_replay::paths::{PathLibrary, Position, ProbabilityTable, RecordedPath};
use plinko_replay::payout::{Balance, Risk, Wallet, multiplier, payout};
use plinko_replay::persistence::{BlobStore, MemoryBlobStore, PATHS_KEY};
use plinko_replay::recorder::{RecorderConfig, record_until_filled};
use plinko_replay::sim::{BoardMode, DropKind, PlinkoBoard, RowCount, TickInput, build_board, tick};

struct Fixture {
    store: Rc<MemoryBlobStore>,
    library: Rc<RefCell<PathLibrary>>,
    probabilities: Rc<RefCell<ProbabilityTable>>,
}

impl Fixture {
    fn new(cap: usize) -> Self {
        let store = Rc::new(MemoryBlobStore::new());
        let shared: Rc<dyn BlobStore> = store.clone();
        Self {
            library: Rc::new(RefCell::new(PathLibrary::new(shared.clone(), cap))),
            probabilities: Rc::new(RefCell::new(ProbabilityTable::new(shared))),
            store,
        }
    }

    fn board(&self, rows: RowCount, seed: u64) -> PlinkoBoard {
        PlinkoBoard::new(rows, self.library.clone(), self.probabilities.clone(), seed)
    }
}

/// Straight fall through the middle of `bucket`
fn synthetic_path(rows: RowCount, bucket: usize) -> RecordedPath {
    let board = build_board(rows);
    let x = board.bucket_left(bucket) + board.bucket_width / 2.0;
    let positions = (0..=20)
        .map(|i| Position::new(x, board.ground_y * i as f32 / 20.0))
        .collect();
    RecordedPath::new(positions, bucket)
}

fn fill_synthetic(library: &RefCell<PathLibrary>, rows: RowCount, skip: Option<usize>) {
    let cap = library.borrow().cap();
    let paths: Vec<_> = (0..rows.bucket_count())
        .filter(|&b| Some(b) != skip)
        .flat_map(|b| std::iter::repeat_n(b, cap))
        .map(|b| synthetic_path(rows, b))
        .collect();
    library.borrow_mut().add_paths_batch(rows, paths);
}

/// Tick until the first live path is offered to the library
fn run_until_recorded(plinko: &mut PlinkoBoard, wallet: &mut Balance) -> (usize, bool) {
    for _ in 0..5000 {
        let report = tick(plinko, &TickInput::default(), wallet);
        if let Some(&recorded) = report.recorded.first() {
            return recorded;
        }
    }
    panic!("live ball never landed");
}

#[test]
fn scenario_record_eight_rows_until_full() {
    let fx = Fixture::new(6);
    let mut rng = Pcg32::seed_from_u64(2024);
    let report = record_until_filled(
        &mut fx.library.borrow_mut(),
        RowCount::Eight,
        6,
        &RecorderConfig::default(),
        &mut rng,
    );

    assert!(report.is_complete(), "unfilled buckets: {:?}", report.unfilled);
    assert_eq!(report.accepted, 54);

    let library = fx.library.borrow();
    assert!(library.has_enough_paths(RowCount::Eight, 9));
    let board = build_board(RowCount::Eight);
    for bucket in 0..9 {
        assert_eq!(library.path_count(RowCount::Eight, bucket), 6);
        for _ in 0..5 {
            let path = library
                .random_path(RowCount::Eight, bucket, &mut rng)
                .expect("full bucket always yields a path");
            assert_eq!(path.final_bucket, bucket);
            assert!(path.reaches(board.ground_y));
        }
    }
    // Committed as a single batch
    assert_eq!(fx.store.write_count(), 1);
    assert!(fx.store.raw(PATHS_KEY).is_some());
}

#[test]
fn scenario_weighted_draw_forces_single_bucket() {
    let fx = Fixture::new(2);
    fill_synthetic(&fx.library, RowCount::Eight, None);
    fx.probabilities
        .borrow_mut()
        .set(RowCount::Eight, vec![0.0, 0.0, 0.0, 0.0, 100.0, 0.0, 0.0, 0.0, 0.0])
        .unwrap();

    let mut plinko = fx.board(RowCount::Eight, 99);
    assert_eq!(plinko.mode(), BoardMode::Playback);
    plinko.bet = 1;
    let mut wallet = Balance::new(10_000);

    let mut landed = [0usize; 9];
    for _ in 0..1000 {
        let report = tick(&mut plinko, &TickInput { dt_ms: 16.0, drop: true }, &mut wallet);
        assert_eq!(report.dropped[0].kind, DropKind::Replay { target: 4 });
        for s in report.settlements {
            landed[s.bucket] += 1;
        }
    }
    while plinko.balls_in_flight() > 0 {
        for s in tick(&mut plinko, &TickInput::default(), &mut wallet).settlements {
            landed[s.bucket] += 1;
        }
    }
    assert_eq!(landed[4], 1000);
    assert_eq!(landed.iter().sum::<usize>(), 1000);
}

#[test]
fn scenario_reset_returns_to_recording() {
    let fx = Fixture::new(3);
    fill_synthetic(&fx.library, RowCount::Twelve, None);
    let mut plinko = fx.board(RowCount::Twelve, 5);
    assert_eq!(plinko.mode(), BoardMode::Playback);

    plinko.reset_paths();
    assert_eq!(plinko.mode(), BoardMode::Recording);
    assert!(!fx.library.borrow().has_enough_paths(RowCount::Twelve, 13));

    let mut wallet = Balance::new(100);
    let report = tick(&mut plinko, &TickInput { dt_ms: 16.0, drop: true }, &mut wallet);
    assert_eq!(report.dropped[0].kind, DropKind::Live);

    let (bucket, accepted) = run_until_recorded(&mut plinko, &mut wallet);
    assert!(accepted);
    assert_eq!(fx.library.borrow().path_count(RowCount::Twelve, bucket), 1);
    let stored = fx.library.borrow().path_by_index(RowCount::Twelve, bucket, 0).unwrap();
    assert_eq!(stored.final_bucket, bucket);
}

#[test]
fn scenario_missing_bucket_falls_back_to_live() {
    let fx = Fixture::new(1);
    fill_synthetic(&fx.library, RowCount::Sixteen, None);
    let mut plinko = fx.board(RowCount::Sixteen, 77);
    assert_eq!(plinko.mode(), BoardMode::Playback);

    // Library emptied behind the board's back, bucket 3 left with nothing
    fx.library.borrow_mut().clear(Some(RowCount::Sixteen));
    fill_synthetic(&fx.library, RowCount::Sixteen, Some(3));
    fx.library.borrow_mut().set_cap(2);
    let mut rng = Pcg32::seed_from_u64(1);
    assert!(fx.library.borrow().random_path(RowCount::Sixteen, 3, &mut rng).is_none());

    plinko.set_manual_bucket(Some(3)).unwrap();
    let mut wallet = Balance::new(100);
    let report = tick(&mut plinko, &TickInput { dt_ms: 16.0, drop: true }, &mut wallet);
    assert_eq!(report.dropped[0].kind, DropKind::Fallback { target: 3 });

    let before: Vec<usize> = (0..17)
        .map(|b| fx.library.borrow().path_count(RowCount::Sixteen, b))
        .collect();
    let (bucket, accepted) = run_until_recorded(&mut plinko, &mut wallet);
    assert!(bucket < 17);
    assert!(accepted);
    assert_eq!(
        fx.library.borrow().path_count(RowCount::Sixteen, bucket),
        before[bucket] + 1
    );
    let newest = fx
        .library
        .borrow()
        .path_by_index(RowCount::Sixteen, bucket, before[bucket])
        .unwrap();
    assert_eq!(newest.final_bucket, bucket);
    assert!(newest.reaches(plinko.board().ground_y));
}

#[test]
fn manual_override_pays_that_bucket() {
    let fx = Fixture::new(1);
    fill_synthetic(&fx.library, RowCount::Eight, None);
    let mut plinko = fx.board(RowCount::Eight, 3);
    plinko.risk = Risk::High;
    plinko.bet = 10;
    plinko.set_manual_bucket(Some(0)).unwrap();
    let mut wallet = Balance::new(10);

    tick(&mut plinko, &TickInput { dt_ms: 16.0, drop: true }, &mut wallet);
    assert_eq!(wallet.balance(), 0);
    let settlement = loop {
        let report = tick(&mut plinko, &TickInput::default(), &mut wallet);
        if let Some(&s) = report.settlements.first() {
            break s;
        }
    };
    assert_eq!(settlement.bucket, 0);
    assert_eq!(settlement.multiplier, 29.0);
    assert_eq!(wallet.balance(), 290);
}

#[test]
fn settlement_floors_and_breaks_even() {
    // 5 × 1.1 = 5.5 pays 5
    assert_eq!(multiplier(RowCount::Sixteen, Risk::Low, 6), 1.1);
    assert_eq!(payout(5, 1.1), 5);
    // 1.0x returns the stake exactly
    assert_eq!(multiplier(RowCount::Eight, Risk::Low, 3), 1.0);
    assert_eq!(payout(37, 1.0), 37);
    // Products that are whole in decimal are not floored away
    assert_eq!(payout(5, 1.4), 7);
}
