//! Board settings
//!
//! Persisted separately from the path library: LocalStorage in the browser,
//! a JSON file on native.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::DEFAULT_PATHS_PER_BUCKET;
use crate::payout::Risk;
use crate::sim::RowCount;

/// Visual recorder drop rate bounds (balls per second)
pub const MIN_BALLS_PER_SECOND: u32 = 10;
pub const MAX_BALLS_PER_SECOND: u32 = 200;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    #[error("unsupported row count {0} (expected 8, 12 or 16)")]
    UnsupportedRows(u32),

    #[error("bucket {bucket} is out of range for {rows} rows")]
    BucketOutOfRange { bucket: usize, rows: RowCount },

    #[error("cannot change rows while {0} balls are in flight")]
    BallsInFlight(usize),
}

/// Operator and player settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub rows: RowCount,
    pub risk: Risk,
    /// Bet per drop
    pub bet: u64,
    /// Forced landing bucket (disables the weighted draw)
    pub manual_bucket: Option<usize>,
    /// Paths stored per bucket before playback takes over
    pub paths_per_bucket: usize,

    // === Auto drop ===
    pub auto_drop: bool,
    pub auto_drop_interval_ms: u32,
    /// Balls auto drop may still release
    pub auto_drop_balls: u32,

    // === Visual recorder ===
    pub balls_per_second: u32,

    // === Audio ===
    pub muted: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            rows: RowCount::Sixteen,
            risk: Risk::Medium,
            bet: 10,
            manual_bucket: None,
            paths_per_bucket: DEFAULT_PATHS_PER_BUCKET,

            auto_drop: false,
            auto_drop_interval_ms: 400,
            auto_drop_balls: 20,

            balls_per_second: 50,

            muted: false,
        }
    }
}

impl Settings {
    /// Change the row count, dropping a manual bucket that no longer exists
    pub fn set_rows(&mut self, rows: u32) -> Result<(), SettingsError> {
        let rows = RowCount::from_rows(rows).ok_or(SettingsError::UnsupportedRows(rows))?;
        self.rows = rows;
        if self.manual_bucket.is_some_and(|b| b >= rows.bucket_count()) {
            self.manual_bucket = None;
        }
        Ok(())
    }

    pub fn set_manual_bucket(&mut self, bucket: Option<usize>) -> Result<(), SettingsError> {
        if let Some(bucket) = bucket
            && bucket >= self.rows.bucket_count()
        {
            return Err(SettingsError::BucketOutOfRange {
                bucket,
                rows: self.rows,
            });
        }
        self.manual_bucket = bucket;
        Ok(())
    }

    pub fn set_balls_per_second(&mut self, balls_per_second: u32) {
        self.balls_per_second = balls_per_second.clamp(MIN_BALLS_PER_SECOND, MAX_BALLS_PER_SECOND);
    }

    /// Pull out-of-range values loaded from storage back into range
    fn sanitized(mut self) -> Self {
        self.set_balls_per_second(self.balls_per_second);
        if self.manual_bucket.is_some_and(|b| b >= self.rows.bucket_count()) {
            self.manual_bucket = None;
        }
        if self.paths_per_bucket == 0 {
            self.paths_per_bucket = DEFAULT_PATHS_PER_BUCKET;
        }
        self.auto_drop_interval_ms = self.auto_drop_interval_ms.max(16);
        self
    }

    /// LocalStorage key
    #[cfg(target_arch = "wasm32")]
    const STORAGE_KEY: &'static str = "plinko_settings";

    /// Load settings from LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn load() -> Self {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage
            && let Ok(Some(json)) = storage.get_item(Self::STORAGE_KEY)
        {
            match serde_json::from_str::<Settings>(&json) {
                Ok(settings) => {
                    log::info!("Loaded settings from LocalStorage");
                    return settings.sanitized();
                }
                Err(e) => log::warn!("Malformed stored settings, using defaults: {}", e),
            }
        }

        log::info!("Using default settings");
        Self::default()
    }

    /// Save settings to LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn save(&self) {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage
            && let Ok(json) = serde_json::to_string(self)
        {
            if storage.set_item(Self::STORAGE_KEY, &json).is_err() {
                log::warn!("Failed to save settings");
            }
        }
    }

    /// Load settings from a JSON file; missing or malformed files give defaults
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load_from(path: &std::path::Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str::<Settings>(&json) {
                Ok(settings) => settings.sanitized(),
                Err(e) => {
                    log::warn!("Malformed settings file {}, using defaults: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn save_to(&self, path: &std::path::Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
    }
}
