use std::collections::BTreeMap;
use std::rc::Rc;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::RecordedPath;
use super::merge::{
    LibraryData, MergeReport, StoredLibrary, StoredLibraryRef, empty_library, merge_libraries, sanitize,
};
use crate::persistence::{BlobStore, PATHS_KEY, load_json};
use crate::sim::{Board, RowCount, build_board};

/// Per row count summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowStats {
    pub rows: RowCount,
    /// Buckets holding at least one path
    pub buckets: usize,
    pub total_paths: usize,
}

/// Recorded path library
///
/// Stores at most `cap` paths per (row count, bucket). Paths are shared
/// (`Rc`) with in-flight replays and never mutated once stored. Every
/// mutation updates the in-memory state first and then persists the whole
/// document; a failed write is logged and the in-memory state stays
/// authoritative until the next successful load reconciles it.
pub struct PathLibrary {
    store: Rc<dyn BlobStore>,
    data: LibraryData,
    cap: usize,
    loaded: bool,
    dirty: bool,
}

impl PathLibrary {
    pub fn new(store: Rc<dyn BlobStore>, cap: usize) -> Self {
        Self {
            store,
            data: empty_library(),
            cap,
            loaded: false,
            dirty: false,
        }
    }

    /// Load from the store the first time only
    pub fn ensure_loaded(&mut self) {
        if !self.loaded {
            self.load();
        }
    }

    /// Read the stored library and merge it into the in-memory one
    pub fn load(&mut self) -> MergeReport {
        self.loaded = true;
        let Some(stored) = load_json::<StoredLibrary>(self.store.as_ref(), PATHS_KEY) else {
            log::info!("No stored path library, starting empty");
            return MergeReport::default();
        };
        let (remote, _) = sanitize(stored);
        let report = merge_libraries(&mut self.data, &remote, self.cap);
        log::info!(
            "Loaded path library: {} buckets from store, {} kept local, {} paths over cap",
            report.taken_remote,
            report.kept_local,
            report.truncated
        );
        report
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Paths-per-bucket cap
    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Change the cap. Lists already longer than a lowered cap are kept as
    /// they are; they just stop accepting paths.
    pub fn set_cap(&mut self, cap: usize) {
        self.cap = cap;
    }

    pub fn data(&self) -> &LibraryData {
        &self.data
    }

    /// Every bucket `0..bucket_count` holds at least `cap` paths
    pub fn has_enough_paths(&self, rows: RowCount, bucket_count: usize) -> bool {
        (0..bucket_count).all(|bucket| self.path_count(rows, bucket) >= self.cap)
    }

    pub fn path_count(&self, rows: RowCount, bucket: usize) -> usize {
        self.paths_for_bucket(rows, bucket).len()
    }

    pub fn bucket_needs_paths(&self, rows: RowCount, bucket: usize) -> bool {
        self.path_count(rows, bucket) < self.cap
    }

    /// Insert one path and persist. Returns false (and changes nothing) if
    /// the bucket is full or the path is unusable.
    pub fn add_path(&mut self, rows: RowCount, path: RecordedPath) -> bool {
        let accepted = self.insert(&build_board(rows), path);
        if accepted {
            self.persist();
        }
        accepted
    }

    /// Insert one path without persisting; call `flush` afterwards
    pub fn add_path_deferred(&mut self, rows: RowCount, path: RecordedPath) -> bool {
        let accepted = self.insert(&build_board(rows), path);
        if accepted {
            self.dirty = true;
        }
        accepted
    }

    /// Persist pending deferred inserts
    pub fn flush(&mut self) {
        if self.dirty {
            self.persist();
        }
    }

    /// Insert paths in order under the same cap rule, persisting once
    pub fn add_paths_batch(&mut self, rows: RowCount, paths: impl IntoIterator<Item = RecordedPath>) -> usize {
        let board = build_board(rows);
        let mut added = 0;
        for path in paths {
            if self.insert(&board, path) {
                added += 1;
            }
        }
        if added > 0 {
            self.persist();
        }
        added
    }

    /// Uniform pick among the paths stored for a bucket
    pub fn random_path<R: Rng + ?Sized>(
        &self,
        rows: RowCount,
        bucket: usize,
        rng: &mut R,
    ) -> Option<Rc<RecordedPath>> {
        let paths = self.paths_for_bucket(rows, bucket);
        if paths.is_empty() {
            return None;
        }
        Some(Rc::clone(&paths[rng.random_range(0..paths.len())]))
    }

    pub fn path_by_index(&self, rows: RowCount, bucket: usize, index: usize) -> Option<Rc<RecordedPath>> {
        self.paths_for_bucket(rows, bucket).get(index).cloned()
    }

    pub fn paths_for_bucket(&self, rows: RowCount, bucket: usize) -> &[Rc<RecordedPath>] {
        self.data
            .get(&rows)
            .and_then(|buckets| buckets.get(&bucket))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// `B0:3/6 | B1:6/6 | ...`
    pub fn status_line(&self, rows: RowCount) -> String {
        (0..rows.bucket_count())
            .map(|bucket| format!("B{}:{}/{}", bucket, self.path_count(rows, bucket), self.cap))
            .collect::<Vec<_>>()
            .join(" | ")
    }

    pub fn stats(&self) -> Vec<RowStats> {
        RowCount::ALL
            .iter()
            .map(|&rows| {
                let buckets = self.data.get(&rows);
                RowStats {
                    rows,
                    buckets: buckets.map_or(0, |b| b.values().filter(|p| !p.is_empty()).count()),
                    total_paths: buckets.map_or(0, |b| b.values().map(Vec::len).sum()),
                }
            })
            .collect()
    }

    /// Least-filled bucket still under the cap (lowest index on ties)
    pub fn bucket_needing_paths(&self, rows: RowCount) -> Option<usize> {
        (0..rows.bucket_count())
            .filter(|&bucket| self.bucket_needs_paths(rows, bucket))
            .min_by_key(|&bucket| self.path_count(rows, bucket))
    }

    /// Empty one row count, or the whole library, and persist
    pub fn clear(&mut self, rows: Option<RowCount>) {
        match rows {
            Some(rows) => {
                self.data.insert(rows, BTreeMap::new());
                log::info!("Cleared path library for {} rows", rows);
            }
            None => {
                self.data = empty_library();
                log::info!("Cleared path library");
            }
        }
        self.persist();
    }

    fn insert(&mut self, board: &Board, path: RecordedPath) -> bool {
        let rows = board.rows;
        if !path.fits(board) {
            log::warn!(
                "Rejected unusable path for {} rows (bucket {}, {} samples)",
                rows,
                path.final_bucket,
                path.len()
            );
            return false;
        }
        let cap = self.cap;
        let paths = self
            .data
            .entry(rows)
            .or_default()
            .entry(path.final_bucket)
            .or_default();
        if paths.len() >= cap {
            return false;
        }
        log::debug!("Stored path for {} rows, bucket {} ({} samples)", rows, path.final_bucket, path.len());
        paths.push(Rc::new(path));
        true
    }

    fn persist(&mut self) {
        let json = match serde_json::to_string(&StoredLibraryRef(&self.data)) {
            Ok(json) => json,
            Err(e) => {
                log::warn!("Failed to serialize path library: {}", e);
                return;
            }
        };
        match self.store.put(PATHS_KEY, &json) {
            Ok(()) => self.dirty = false,
            Err(e) => log::warn!("Failed to persist path library, keeping in-memory state: {}", e),
        }
    }
}

impl std::fmt::Debug for PathLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathLibrary")
            .field("cap", &self.cap)
            .field("loaded", &self.loaded)
            .field("stats", &self.stats())
            .finish()
    }
}
