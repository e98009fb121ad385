use rand::Rng;

use super::{BucketTally, DropBias, RecorderConfig, RecordingReport};
use crate::paths::{PathLibrary, RecordedPath};
use crate::sim::{RowCount, build_board, simulate_drop};

/// Record headlessly until every bucket of `rows` holds `paths_per_bucket`
/// paths or the attempt budget runs out. Accepted paths are committed to the
/// library in one batch.
pub fn record_until_filled<R: Rng + ?Sized>(
    library: &mut PathLibrary,
    rows: RowCount,
    paths_per_bucket: usize,
    config: &RecorderConfig,
    rng: &mut R,
) -> RecordingReport {
    record_with_progress(library, rows, paths_per_bucket, config, rng, |_| {})
}

/// As `record_until_filled`, calling `on_progress` every 100 attempts
pub fn record_with_progress<R: Rng + ?Sized>(
    library: &mut PathLibrary,
    rows: RowCount,
    paths_per_bucket: usize,
    config: &RecorderConfig,
    rng: &mut R,
    mut on_progress: impl FnMut(&BucketTally),
) -> RecordingReport {
    let board = build_board(rows);
    let mut tally = BucketTally::from_library(library, rows, paths_per_bucket);
    let mut bias = DropBias::new(&board, config);
    let mut collected = Vec::new();
    let mut attempts = 0;
    let mut stalled = 0;

    log::info!(
        "Recording {} rows: {}/{} paths already stored",
        rows,
        tally.total(),
        tally.needed()
    );

    while attempts < config.max_attempts {
        let Some(target) = tally.next_target() else {
            break;
        };
        let x = bias.drop_x(&board, target, rng);
        attempts += 1;

        match simulate_drop(&board, x, config.max_steps, config.sample_every) {
            Some((positions, bucket)) => {
                bias.observe(target, x, bucket);
                if tally.accept(bucket, x) {
                    log::debug!("Bucket {} now has {}/{}", bucket, tally.counts()[bucket], tally.target());
                    collected.push(RecordedPath::new(positions, bucket));
                }
            }
            None => stalled += 1,
        }

        if attempts % 100 == 0 {
            on_progress(&tally);
        }
    }
    on_progress(&tally);

    let unfilled = tally.unfilled();
    if unfilled.is_empty() {
        log::info!("Recording finished after {} attempts", attempts);
    } else {
        log::warn!(
            "Recording stopped after {} attempts with buckets {:?} unfilled",
            attempts,
            unfilled
        );
    }

    let accepted = library.add_paths_batch(rows, collected);
    RecordingReport {
        rows,
        accepted,
        attempts,
        stalled,
        unfilled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{MemoryBlobStore, PATHS_KEY};
    use rand::SeedableRng;
    use rand_pcg::Pcg32;
    use std::rc::Rc;

    #[test]
    fn test_already_full_library_records_nothing() {
        let store = Rc::new(MemoryBlobStore::new());
        let mut library = PathLibrary::new(store.clone(), 0);
        let mut rng = Pcg32::seed_from_u64(1);
        let report = record_until_filled(&mut library, RowCount::Eight, 6, &RecorderConfig::default(), &mut rng);
        assert_eq!(report.attempts, 0);
        assert_eq!(report.accepted, 0);
        assert!(report.is_complete());
        assert_eq!(store.write_count(), 0);
    }

    #[test]
    fn test_attempt_budget_reports_unfilled() {
        let store = Rc::new(MemoryBlobStore::new());
        let mut library = PathLibrary::new(store, 6);
        let mut rng = Pcg32::seed_from_u64(2);
        let config = RecorderConfig {
            max_attempts: 3,
            ..RecorderConfig::default()
        };
        let report = record_until_filled(&mut library, RowCount::Twelve, 6, &config, &mut rng);
        assert_eq!(report.attempts, 3);
        assert!(!report.is_complete());
        assert!(report.accepted <= 3);
        let stored: usize = (0..13).map(|b| library.path_count(RowCount::Twelve, b)).sum();
        assert_eq!(stored, report.accepted);
    }

    #[test]
    fn test_filled_buckets_hold_distinct_paths() {
        for rows in RowCount::ALL {
            let store = Rc::new(MemoryBlobStore::new());
            let mut library = PathLibrary::new(store, 6);
            let mut rng = Pcg32::seed_from_u64(1);
            let report = record_until_filled(&mut library, rows, 6, &RecorderConfig::default(), &mut rng);
            assert!(report.accepted > 0, "{rows} rows recorded nothing");
            if rows == RowCount::Eight {
                assert!(report.is_complete(), "{:?}", report.unfilled);
            }

            for bucket in 0..rows.bucket_count() {
                let paths = library.paths_for_bucket(rows, bucket);
                for (i, a) in paths.iter().enumerate() {
                    for b in &paths[i + 1..] {
                        assert_ne!(a, b, "{rows} rows, bucket {bucket} holds a repeated path");
                        assert_ne!(a.positions[0].x, b.positions[0].x);
                    }
                }
            }
        }
    }

    #[test]
    fn test_recorded_paths_are_valid_and_batched() {
        let store = Rc::new(MemoryBlobStore::new());
        let mut library = PathLibrary::new(store.clone(), 1);
        let mut rng = Pcg32::seed_from_u64(3);
        let config = RecorderConfig {
            max_attempts: 200,
            ..RecorderConfig::default()
        };
        let report = record_until_filled(&mut library, RowCount::Eight, 1, &config, &mut rng);
        assert!(report.accepted > 0);
        assert_eq!(store.write_count(), 1);
        assert!(store.raw(PATHS_KEY).is_some());

        let board = build_board(RowCount::Eight);
        for bucket in 0..9 {
            for path in library.paths_for_bucket(RowCount::Eight, bucket) {
                assert_eq!(path.final_bucket, bucket);
                assert!(path.reaches(board.ground_y));
                let last = path.last().unwrap();
                assert_eq!(board.bucket_at(last.x), bucket);
            }
        }
    }
}
