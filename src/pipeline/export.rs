//! Monthly payout schedule export
//!
//! Resamples the per-event partner ledger into calendar month-end billing
//! buckets, one row per (month, vault token) with a nonzero aggregated
//! amount.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};

use crate::core::types::{LedgerRow, PayoutRow};

/// Last day of the calendar month containing `date`.
pub fn month_end(date: NaiveDate) -> NaiveDate {
    let (year, month) = (date.year(), date.month());
    let first_of_next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    first_of_next.and_then(|d| d.pred_opt()).unwrap_or(date)
}

/// Flatten a partner ledger into the billing schedule.
///
/// Rows are grouped by (month-end, vault token) and summed. Non-finite
/// payouts (data-gap rows) stay in the ledger for auditing but are excluded
/// here, as are buckets that sum to exactly zero. Output ordering is
/// (timestamp, token), which also makes the key uniqueness obvious.
pub fn export_payouts(partner: &str, treasury: &str, rows: &[LedgerRow]) -> Vec<PayoutRow> {
    let mut buckets: BTreeMap<(NaiveDate, String), f64> = BTreeMap::new();
    for row in rows {
        if !row.payout.is_finite() {
            continue;
        }
        let bucket = month_end(row.record.timestamp.date_naive());
        *buckets.entry((bucket, row.vault.clone())).or_insert(0.0) += row.payout;
    }

    buckets
        .into_iter()
        .filter(|(_, amount)| *amount != 0.0)
        .map(|((timestamp, token), amount)| PayoutRow {
            timestamp,
            partner: partner.to_string(),
            token,
            treasury: treasury.to_string(),
            amount,
        })
        .collect()
}
