//! Partner-level aggregation
//!
//! Merges all wrapper snapshots of one partner, derives the cumulative
//! USD balance series across vaults, assigns a tier per block, and applies
//! the tier multiplier to each row's payout base.

use std::collections::{BTreeMap, BTreeSet};

use crate::core::types::{BalancePoint, LedgerRow, Wrapper, WrapperRecord};

use super::tiers::TierTable;

/// The per-event ledger for one partner, plus the cumulative balance and
/// tier series it was tiered against.
#[derive(Debug, Clone, Default)]
pub struct PartnerLedger {
    pub rows: Vec<LedgerRow>,
    pub balance_series: Vec<BalancePoint>,
}

/// Combine all wrappers of one partner into a single tiered payout series.
///
/// Duplicate blocks across wrappers stay as separate rows; the tier is a
/// per-block property computed from the partner's combined balance across
/// all vaults, so every row at one block carries the same tier. Wrappers
/// with empty snapshots contribute nothing.
pub fn aggregate(snapshots: Vec<(Wrapper, Vec<WrapperRecord>)>, tiers: &TierTable) -> PartnerLedger {
    let mut tagged: Vec<(String, String, WrapperRecord)> = Vec::new();
    for (wrapper, records) in snapshots {
        for record in records {
            tagged.push((wrapper.vault.clone(), wrapper.wrapper.clone(), record));
        }
    }
    if tagged.is_empty() {
        return PartnerLedger::default();
    }
    // Stable sort keeps per-wrapper row order at shared blocks.
    tagged.sort_by_key(|(_, _, record)| record.block);

    // Pivot balance_usd by (block, vault). Two wrappers of the same vault
    // observed at one block sum their balances.
    let mut observed: BTreeMap<&str, BTreeMap<u64, f64>> = BTreeMap::new();
    for (vault, _, record) in &tagged {
        *observed
            .entry(vault.as_str())
            .or_default()
            .entry(record.block)
            .or_insert(0.0) += record.balance_usd;
    }

    // Forward-fill each vault over the union of observed blocks, left to
    // right using only prior observations, then sum across vaults.
    let blocks: BTreeSet<u64> = tagged.iter().map(|(_, _, record)| record.block).collect();
    let mut cumulative: BTreeMap<u64, f64> = blocks.iter().map(|b| (*b, 0.0)).collect();
    for per_vault in observed.values() {
        let mut carried: Option<f64> = None;
        for block in &blocks {
            if let Some(balance) = per_vault.get(block) {
                carried = Some(*balance);
            }
            if let Some(balance) = carried {
                *cumulative.entry(*block).or_insert(0.0) += balance;
            }
        }
    }

    let tier_by_block: BTreeMap<u64, f64> = cumulative
        .iter()
        .map(|(block, balance)| (*block, tiers.tier_for(*balance)))
        .collect();

    let rows = tagged
        .into_iter()
        .map(|(vault, wrapper, record)| {
            let tier = tier_by_block.get(&record.block).copied().unwrap_or(0.0);
            let payout = record.payout_base * tier;
            LedgerRow {
                vault,
                wrapper,
                record,
                tier,
                payout,
            }
        })
        .collect();

    let balance_series = cumulative
        .iter()
        .map(|(block, balance)| BalancePoint {
            block: *block,
            balance_usd: *balance,
            tier: tier_by_block.get(block).copied().unwrap_or(0.0),
        })
        .collect();

    PartnerLedger {
        rows,
        balance_series,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn wrapper(name: &str, vault: &str) -> Wrapper {
        Wrapper {
            name: name.into(),
            vault: vault.into(),
            wrapper: format!("0xwrap-{name}"),
        }
    }

    fn ts(unix: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(unix, 0).unwrap()
    }

    /// Record with price 1 and a huge supply, so balance_usd == balance and
    /// the payout base is negligible unless the test cares about it.
    fn record(block: u64, balance: f64) -> WrapperRecord {
        WrapperRecord::new(block, ts(1_609_459_200), 1.0, balance, 1e12, 1.0)
    }

    #[test]
    fn forward_fill_uses_only_prior_observations() {
        // Vault X observed at blocks 1 and 5; vault Y holds nothing at
        // block 3 and 50 at block 5. X's balance must carry into block 3,
        // and block 1 must not see Y's later balances.
        let tiers = TierTable::new([(0.0, 0.0), (150.0, 0.10), (250.0, 0.20)]);
        let ledger = aggregate(
            vec![
                (
                    wrapper("x", "0xvault-x"),
                    vec![record(1, 100.0), record(5, 200.0)],
                ),
                (
                    wrapper("y", "0xvault-y"),
                    vec![record(3, 0.0), record(5, 50.0)],
                ),
            ],
            &tiers,
        );

        let by_block: BTreeMap<u64, f64> = ledger
            .balance_series
            .iter()
            .map(|p| (p.block, p.balance_usd))
            .collect();
        assert_eq!(by_block[&1], 100.0);
        assert_eq!(by_block[&3], 100.0);
        assert_eq!(by_block[&5], 250.0);
    }

    #[test]
    fn tier_is_shared_by_all_rows_at_one_block() {
        // Each wrapper alone sits below the 150 threshold; combined they
        // cross it, so both rows at block 7 must carry the higher tier.
        let tiers = TierTable::new([(0.0, 0.0), (150.0, 0.10)]);
        let ledger = aggregate(
            vec![
                (wrapper("a", "0xvault-a"), vec![record(7, 90.0)]),
                (wrapper("b", "0xvault-b"), vec![record(7, 90.0)]),
            ],
            &tiers,
        );

        assert_eq!(ledger.rows.len(), 2);
        for row in &ledger.rows {
            assert_eq!(row.tier, 0.10);
        }
    }

    #[test]
    fn duplicate_blocks_across_wrappers_stay_separate_rows() {
        let tiers = TierTable::default();
        let ledger = aggregate(
            vec![
                (wrapper("a", "0xvault"), vec![record(7, 10.0)]),
                (wrapper("b", "0xvault"), vec![record(7, 20.0)]),
            ],
            &tiers,
        );

        assert_eq!(ledger.rows.len(), 2);
        // Same vault at one block: pivot sums the balances.
        assert_eq!(ledger.balance_series[0].balance_usd, 30.0);
    }

    #[test]
    fn payout_is_base_times_tier() {
        let tiers = TierTable::new([(0.0, 0.0), (100.0, 0.10)]);
        let rec = WrapperRecord::new(9, ts(1_609_459_200), 10.0, 50.0, 100.0, 4.0);
        // balance_usd = 200 -> tier 0.10; payout_base = 0.5 * 10 * 0.65.
        let ledger = aggregate(vec![(wrapper("a", "0xvault"), vec![rec])], &tiers);
        let row = &ledger.rows[0];
        assert!((row.record.payout_base - 3.25).abs() < 1e-12);
        assert!((row.payout - 0.325).abs() < 1e-12);
    }

    #[test]
    fn empty_wrapper_does_not_disturb_siblings() {
        let tiers = TierTable::default();
        let ledger = aggregate(
            vec![
                (wrapper("empty", "0xvault-e"), vec![]),
                (wrapper("live", "0xvault-l"), vec![record(3, 10.0)]),
            ],
            &tiers,
        );
        assert_eq!(ledger.rows.len(), 1);
        assert_eq!(ledger.rows[0].record.block, 3);
    }

    #[test]
    fn no_snapshots_yields_empty_ledger() {
        let ledger = aggregate(Vec::new(), &TierTable::default());
        assert!(ledger.rows.is_empty());
        assert!(ledger.balance_series.is_empty());
    }
}
