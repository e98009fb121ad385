//! Bucket probability table
//!
//! One weight per bucket per row count. Weights are relative: a bucket is
//! drawn with probability weight / total. The defaults approximate the
//! binomial spread of a real Galton board.

use std::collections::BTreeMap;
use std::rc::Rc;

use rand::Rng;
use thiserror::Error;

use crate::persistence::{BlobStore, PROBABILITIES_KEY, load_json};
use crate::sim::RowCount;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProbabilityError {
    #[error("expected {expected} weights for {rows} rows, got {actual}")]
    LengthMismatch {
        rows: RowCount,
        expected: usize,
        actual: usize,
    },

    #[error("weight at bucket {index} is not a finite number")]
    NonFinite { index: usize },
}

/// Built-in weights for a row count
pub fn default_weights(rows: RowCount) -> Vec<f64> {
    let weights: &[f64] = match rows {
        RowCount::Eight => &[1.0, 4.0, 12.0, 24.0, 26.0, 24.0, 12.0, 4.0, 1.0],
        RowCount::Twelve => &[
            1.0, 3.0, 8.0, 16.0, 22.0, 26.0, 28.0, 26.0, 22.0, 16.0, 8.0, 3.0, 1.0,
        ],
        RowCount::Sixteen => &[
            1.0, 2.0, 5.0, 10.0, 16.0, 22.0, 28.0, 32.0, 34.0, 32.0, 28.0, 22.0, 16.0, 10.0, 5.0,
            2.0, 1.0,
        ],
    };
    weights.to_vec()
}

/// Draw an index proportional to `weights`.
///
/// Falls back to a uniform pick over `bucket_count` when the weights do not
/// have exactly `bucket_count` entries or their total is not a positive
/// finite number. Zero-weight buckets are never drawn otherwise.
pub fn draw_weighted<R: Rng + ?Sized>(weights: &[f64], bucket_count: usize, rng: &mut R) -> usize {
    if bucket_count == 0 {
        return 0;
    }
    let total: f64 = weights.iter().sum();
    if weights.len() != bucket_count || !total.is_finite() || total <= 0.0 {
        return rng.random_range(0..bucket_count);
    }

    let r = rng.random::<f64>() * total;
    let mut cumulative = 0.0;
    for (i, &w) in weights.iter().enumerate() {
        cumulative += w;
        if r < cumulative {
            return i;
        }
    }
    // Rounding left r at the very top; take the last bucket with weight
    weights.iter().rposition(|&w| w > 0.0).unwrap_or(bucket_count - 1)
}

/// Per row count weight vectors, persisted through the blob store
pub struct ProbabilityTable {
    store: Rc<dyn BlobStore>,
    weights: BTreeMap<RowCount, Vec<f64>>,
}

impl ProbabilityTable {
    /// Table holding the built-in defaults (nothing is read from the store)
    pub fn new(store: Rc<dyn BlobStore>) -> Self {
        Self {
            store,
            weights: Self::defaults(),
        }
    }

    fn defaults() -> BTreeMap<RowCount, Vec<f64>> {
        RowCount::ALL
            .iter()
            .map(|&rows| (rows, default_weights(rows)))
            .collect()
    }

    /// Replace the in-memory table with the stored one. Row counts that are
    /// missing or malformed in the store keep their defaults.
    pub fn load(&mut self) {
        let Some(stored) = load_json::<BTreeMap<u32, Vec<f64>>>(self.store.as_ref(), PROBABILITIES_KEY)
        else {
            self.weights = Self::defaults();
            return;
        };

        self.weights = Self::defaults();
        for (rows, weights) in stored {
            let Some(row_count) = RowCount::from_rows(rows) else {
                log::warn!("Ignoring stored weights for unsupported row count {}", rows);
                continue;
            };
            match validate(row_count, &weights) {
                Ok(()) => {
                    self.weights.insert(row_count, clamp_negative(weights));
                }
                Err(e) => log::warn!("Ignoring stored weights for {} rows: {}", row_count, e),
            }
        }
        log::info!("Loaded bucket probabilities");
    }

    pub fn get(&self, rows: RowCount) -> &[f64] {
        self.weights.get(&rows).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Replace the weights for one row count and persist. Negative weights
    /// are clamped to zero.
    pub fn set(&mut self, rows: RowCount, weights: Vec<f64>) -> Result<(), ProbabilityError> {
        validate(rows, &weights)?;
        self.weights.insert(rows, clamp_negative(weights));
        self.persist();
        Ok(())
    }

    /// Restore the built-in defaults for every row count and persist
    pub fn reset(&mut self) {
        self.weights = Self::defaults();
        self.persist();
        log::info!("Bucket probabilities reset to defaults");
    }

    /// Weighted bucket draw for a row count
    pub fn draw_bucket<R: Rng + ?Sized>(&self, rows: RowCount, bucket_count: usize, rng: &mut R) -> usize {
        draw_weighted(self.get(rows), bucket_count, rng)
    }

    /// Each bucket's share of the total weight
    pub fn shares(&self, rows: RowCount) -> Vec<f64> {
        let weights = self.get(rows);
        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            return vec![0.0; weights.len()];
        }
        weights.iter().map(|w| w / total).collect()
    }

    fn persist(&self) {
        let json = match serde_json::to_string(&self.weights) {
            Ok(json) => json,
            Err(e) => {
                log::warn!("Failed to serialize bucket probabilities: {}", e);
                return;
            }
        };
        if let Err(e) = self.store.put(PROBABILITIES_KEY, &json) {
            log::warn!("Failed to persist bucket probabilities: {}", e);
        }
    }
}

impl std::fmt::Debug for ProbabilityTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProbabilityTable")
            .field("weights", &self.weights)
            .finish()
    }
}

fn validate(rows: RowCount, weights: &[f64]) -> Result<(), ProbabilityError> {
    if weights.len() != rows.bucket_count() {
        return Err(ProbabilityError::LengthMismatch {
            rows,
            expected: rows.bucket_count(),
            actual: weights.len(),
        });
    }
    if let Some(index) = weights.iter().position(|w| !w.is_finite()) {
        return Err(ProbabilityError::NonFinite { index });
    }
    Ok(())
}

fn clamp_negative(weights: Vec<f64>) -> Vec<f64> {
    weights.into_iter().map(|w| w.max(0.0)).collect()
}
