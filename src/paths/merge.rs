//! Library data and merge-on-load
//!
//! Several writers (two recording sessions, a CLI run and a browser tab) may
//! persist the whole library without any lock. A reader reconciles its
//! in-memory copy with the stored one per bucket: the longer list wins, ties
//! keep the local list, and nothing is ever allowed past the cap.

use std::collections::BTreeMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use super::RecordedPath;
use crate::sim::{RowCount, build_board};

/// Row count -> bucket -> stored paths
pub type LibraryData = BTreeMap<RowCount, BTreeMap<usize, Vec<Rc<RecordedPath>>>>;

/// Persisted shape: `{ "<rows>": { "<bucket>": [path, ...] } }`
pub(crate) type StoredLibrary = BTreeMap<u32, BTreeMap<usize, Vec<RecordedPath>>>;

/// Borrowed view used when writing the document back
#[derive(Serialize)]
#[serde(transparent)]
pub(crate) struct StoredLibraryRef<'a>(pub &'a LibraryData);

/// Outcome of one merge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeReport {
    /// Buckets where the remote list replaced the local one
    pub taken_remote: usize,
    /// Buckets where the local list was longer than the remote one
    pub kept_local: usize,
    /// Paths dropped because a list was over the cap
    pub truncated: usize,
}

/// An empty library with every supported row count present
pub fn empty_library() -> LibraryData {
    RowCount::ALL.iter().map(|&rows| (rows, BTreeMap::new())).collect()
}

/// Merge `remote` into `local`, per bucket, keeping the longer list
pub fn merge_libraries(local: &mut LibraryData, remote: &LibraryData, cap: usize) -> MergeReport {
    let mut report = MergeReport::default();

    for (&rows, remote_buckets) in remote {
        let local_buckets = local.entry(rows).or_default();
        for (&bucket, remote_paths) in remote_buckets {
            let local_paths = local_buckets.entry(bucket).or_default();
            if remote_paths.len() > local_paths.len() {
                *local_paths = remote_paths.clone();
                report.taken_remote += 1;
            } else if remote_paths.len() < local_paths.len() {
                report.kept_local += 1;
            }
        }
    }

    for buckets in local.values_mut() {
        for paths in buckets.values_mut() {
            if paths.len() > cap {
                report.truncated += paths.len() - cap;
                paths.truncate(cap);
            }
        }
    }

    report
}

/// Turn a stored document into library data, dropping anything that cannot
/// be replayed on the geometry it claims to belong to. Returns the data and
/// the number of rejected paths.
pub(crate) fn sanitize(stored: StoredLibrary) -> (LibraryData, usize) {
    let mut data = empty_library();
    let mut rejected = 0;

    for (rows, buckets) in stored {
        let Some(row_count) = RowCount::from_rows(rows) else {
            let count: usize = buckets.values().map(Vec::len).sum();
            log::warn!("Ignoring {} stored paths for unsupported row count {}", count, rows);
            rejected += count;
            continue;
        };
        let board = build_board(row_count);
        let target = data.entry(row_count).or_default();

        for (bucket, paths) in buckets {
            for path in paths {
                let valid = path.final_bucket == bucket && path.fits(&board);
                if valid {
                    target.entry(bucket).or_default().push(Rc::new(path));
                } else {
                    rejected += 1;
                }
            }
        }
    }

    if rejected > 0 {
        log::warn!("Dropped {} malformed stored paths", rejected);
    }
    (data, rejected)
}
