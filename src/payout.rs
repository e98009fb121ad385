//! Payout tables and settlement
//!
//! The bet is debited when the ball is dropped and `floor(bet × multiplier)`
//! is credited when it lands. Risk only selects the multiplier table; it has
//! no effect on physics or recording.

use serde::{Deserialize, Serialize};

use crate::sim::RowCount;

/// Multiplier table selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Risk {
    Low,
    #[default]
    Medium,
    High,
}

impl Risk {
    pub const ALL: [Risk; 3] = [Risk::Low, Risk::Medium, Risk::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            Risk::Low => "low",
            Risk::Medium => "medium",
            Risk::High => "high",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(Risk::Low),
            "medium" | "med" => Some(Risk::Medium),
            "high" => Some(Risk::High),
            _ => None,
        }
    }
}

impl std::fmt::Display for Risk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Multipliers for every bucket of a board, edge to edge
pub fn multipliers(rows: RowCount, risk: Risk) -> &'static [f64] {
    match (risk, rows) {
        (Risk::Low, RowCount::Eight) => &[5.6, 2.1, 1.1, 1.0, 0.5, 1.0, 1.1, 2.1, 5.6],
        (Risk::Low, RowCount::Twelve) => &[10.0, 3.0, 1.6, 1.4, 1.1, 1.0, 0.5, 1.0, 1.1, 1.4, 1.6, 3.0, 10.0],
        (Risk::Low, RowCount::Sixteen) => &[
            16.0, 9.0, 2.0, 1.4, 1.4, 1.2, 1.1, 1.0, 0.5, 1.0, 1.1, 1.2, 1.4, 1.4, 2.0, 9.0, 16.0,
        ],
        (Risk::Medium, RowCount::Eight) => &[13.0, 3.0, 1.3, 0.7, 0.4, 0.7, 1.3, 3.0, 13.0],
        (Risk::Medium, RowCount::Twelve) => &[33.0, 11.0, 4.0, 2.0, 1.1, 0.6, 0.3, 0.6, 1.1, 2.0, 4.0, 11.0, 33.0],
        (Risk::Medium, RowCount::Sixteen) => &[
            110.0, 41.0, 10.0, 5.0, 3.0, 1.5, 1.0, 0.5, 0.3, 0.5, 1.0, 1.5, 3.0, 5.0, 10.0, 41.0, 110.0,
        ],
        (Risk::High, RowCount::Eight) => &[29.0, 4.0, 1.5, 0.3, 0.2, 0.3, 1.5, 4.0, 29.0],
        (Risk::High, RowCount::Twelve) => &[170.0, 24.0, 8.1, 2.0, 0.7, 0.2, 0.2, 0.2, 0.7, 2.0, 8.1, 24.0, 170.0],
        (Risk::High, RowCount::Sixteen) => &[
            1000.0, 130.0, 26.0, 9.0, 4.0, 2.0, 0.2, 0.2, 0.2, 0.2, 0.2, 2.0, 4.0, 9.0, 26.0, 130.0, 1000.0,
        ],
    }
}

/// Multiplier of one bucket (0.0 for an index past the edge)
pub fn multiplier(rows: RowCount, risk: Risk, bucket: usize) -> f64 {
    multipliers(rows, risk).get(bucket).copied().unwrap_or(0.0)
}

/// `floor(bet × multiplier)`
pub fn payout(bet: u64, multiplier: f64) -> u64 {
    if !multiplier.is_finite() || multiplier <= 0.0 {
        return 0;
    }
    // Table multipliers are decimal literals; absorb the binary rounding of
    // products such as 5 × 1.4 before flooring
    (bet as f64 * multiplier + 1e-9).floor() as u64
}

/// Player balance seam
pub trait Wallet {
    fn balance(&self) -> u64;

    /// Take `amount` from the balance. Returns false (and changes nothing)
    /// if the balance is too low.
    fn debit(&mut self, amount: u64) -> bool;

    fn credit(&mut self, amount: u64);
}

/// Plain in-memory balance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    amount: u64,
}

impl Balance {
    pub fn new(amount: u64) -> Self {
        Self { amount }
    }
}

impl Wallet for Balance {
    fn balance(&self) -> u64 {
        self.amount
    }

    fn debit(&mut self, amount: u64) -> bool {
        match self.amount.checked_sub(amount) {
            Some(left) => {
                self.amount = left;
                true
            }
            None => false,
        }
    }

    fn credit(&mut self, amount: u64) {
        self.amount = self.amount.saturating_add(amount);
    }
}

/// One resolved drop
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Settlement {
    pub ball_id: u32,
    pub bucket: usize,
    /// Bet captured when the ball was dropped
    pub bet: u64,
    pub multiplier: f64,
    /// Amount credited at landing
    pub payout: u64,
}

impl Settlement {
    pub fn new(ball_id: u32, bucket: usize, bet: u64, multiplier: f64) -> Self {
        Self {
            ball_id,
            bucket,
            bet,
            multiplier,
            payout: payout(bet, multiplier),
        }
    }

    /// Net balance change over the whole drop (credit minus debit)
    pub fn net(&self) -> i64 {
        self.payout as i64 - self.bet as i64
    }
}
