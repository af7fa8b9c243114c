//! Payout tier ladder
//!
//! A monotonic step function from a partner's cumulative USD balance to a
//! payout rate. The table is plain data passed into the aggregator, so tests
//! and alternate deployments can substitute their own ladder.

/// Step function over ascending balance thresholds.
#[derive(Debug, Clone)]
pub struct TierTable {
    thresholds: Vec<f64>,
    rates: Vec<f64>,
}

impl TierTable {
    /// Build a table from `(threshold, rate)` pairs.
    ///
    /// Entries are sorted by threshold. A threshold-0 entry mapping to rate 0
    /// is inserted if absent, so every non-negative amount resolves to a rate.
    pub fn new(entries: impl IntoIterator<Item = (f64, f64)>) -> Self {
        let mut entries: Vec<(f64, f64)> = entries.into_iter().collect();
        entries.sort_by(|a, b| a.0.total_cmp(&b.0));
        if entries.first().map(|(t, _)| *t != 0.0).unwrap_or(true) {
            entries.insert(0, (0.0, 0.0));
        }
        let (thresholds, rates) = entries.into_iter().unzip();
        Self { thresholds, rates }
    }

    /// Rate for the greatest threshold less than or equal to `amount`.
    ///
    /// Amounts below the smallest positive threshold resolve to the rate at
    /// threshold 0. Negative amounts are out of contract.
    pub fn tier_for(&self, amount: f64) -> f64 {
        let index = self.thresholds.partition_point(|t| *t <= amount);
        self.rates[index.saturating_sub(1)]
    }
}

impl Default for TierTable {
    /// The reference affiliate ladder.
    fn default() -> Self {
        Self::new([
            (0.0, 0.0),
            (1_000_000.0, 0.10),
            (5_000_000.0, 0.15),
            (10_000_000.0, 0.20),
            (50_000_000.0, 0.25),
            (100_000_000.0, 0.30),
            (200_000_000.0, 0.35),
            (400_000_000.0, 0.40),
            (700_000_000.0, 0.45),
            (1_000_000_000.0, 0.50),
        ])
    }
}
