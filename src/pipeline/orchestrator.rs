//! Run orchestration across partners
//!
//! Drives every configured partner through snapshot, aggregation, and
//! export, with per-partner failure isolation: a broken partner is reported
//! and skipped, siblings keep processing. Fee-event lookups are cached per
//! (vault, wrapper) for the lifetime of one run.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::core::error::{PayoutResult, SourceError};
use crate::core::traits::ChainDataSource;
use crate::core::types::{BalancePoint, FeeEvent, LedgerRow, Partner, PayoutRow};

use super::aggregate::aggregate;
use super::export::export_payouts;
use super::snapshot::SnapshotBuilder;
use super::tiers::TierTable;

/// Everything one partner's pipeline produced.
#[derive(Debug, Clone)]
pub struct PartnerReport {
    pub partner: String,
    pub ledger: Vec<LedgerRow>,
    pub balance_series: Vec<BalancePoint>,
    pub payouts: Vec<PayoutRow>,
    /// `sum(payout * vault_price)` over finite rows.
    pub usd_total: f64,
}

/// Success or failure of one partner, collected by the run.
#[derive(Debug)]
pub struct PartnerOutcome {
    pub name: String,
    pub result: PayoutResult<PartnerReport>,
}

/// One run's consolidated output.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub partners: Vec<PartnerOutcome>,
    /// All payout rows across successful partners, timestamp-sorted.
    pub consolidated: Vec<PayoutRow>,
    /// Grand total USD owed across successful partners.
    pub total_usd: f64,
}

impl RunSummary {
    pub fn failed(&self) -> impl Iterator<Item = &PartnerOutcome> {
        self.partners.iter().filter(|o| o.result.is_err())
    }
}

/// Drives the payout pipeline for a set of partners.
pub struct Orchestrator<S: ChainDataSource> {
    source: S,
    tiers: TierTable,
    concurrency: usize,
    fee_cache: Mutex<HashMap<(String, String), Arc<Vec<FeeEvent>>>>,
}

impl<S: ChainDataSource> Orchestrator<S> {
    pub fn new(source: S, tiers: TierTable, concurrency: usize) -> Self {
        Self {
            source,
            tiers,
            concurrency,
            fee_cache: Mutex::new(HashMap::new()),
        }
    }

    /// Process every partner, isolating failures per partner.
    pub async fn run(&self, partners: &[Partner]) -> RunSummary {
        let mut summary = RunSummary::default();
        for partner in partners {
            match self.process_partner(partner).await {
                Ok(report) => {
                    info!(
                        partner = %partner.name,
                        usd = report.usd_total,
                        "usd to pay"
                    );
                    summary.total_usd += report.usd_total;
                    summary.consolidated.extend(report.payouts.iter().cloned());
                    summary.partners.push(PartnerOutcome {
                        name: partner.name.clone(),
                        result: Ok(report),
                    });
                }
                Err(err) => {
                    error!(partner = %partner.name, error = %err, "partner failed, continuing");
                    summary.partners.push(PartnerOutcome {
                        name: partner.name.clone(),
                        result: Err(err),
                    });
                }
            }
            info!(total_usd = summary.total_usd, "total so far");
        }
        summary
            .consolidated
            .sort_by(|a, b| (a.timestamp, &a.partner, &a.token).cmp(&(b.timestamp, &b.partner, &b.token)));
        summary
    }

    /// Snapshot every wrapper of one partner, aggregate, and export.
    pub async fn process_partner(&self, partner: &Partner) -> PayoutResult<PartnerReport> {
        let builder = SnapshotBuilder::new(&self.source, self.concurrency);

        let mut snapshots = Vec::with_capacity(partner.wrappers.len());
        for wrapper in &partner.wrappers {
            let events = self.cached_fee_events(&wrapper.vault, &wrapper.wrapper).await?;
            if events.is_empty() {
                debug!(
                    partner = %partner.name,
                    wrapper = %wrapper.name,
                    "no fee events, wrapper contributes nothing"
                );
            }
            let records = builder.build(wrapper, &events).await?;
            snapshots.push((wrapper.clone(), records));
        }

        let ledger = aggregate(snapshots, &self.tiers);

        let gaps = ledger.rows.iter().filter(|r| !r.payout.is_finite()).count();
        if gaps > 0 {
            warn!(
                partner = %partner.name,
                rows = gaps,
                "data-gap rows retained in ledger, excluded from payouts"
            );
        }

        let payouts = export_payouts(&partner.name, &partner.treasury, &ledger.rows);
        let usd_total = ledger
            .rows
            .iter()
            .map(|row| row.payout * row.record.vault_price)
            .filter(|usd| usd.is_finite())
            .sum();

        Ok(PartnerReport {
            partner: partner.name.clone(),
            ledger: ledger.rows,
            balance_series: ledger.balance_series,
            payouts,
            usd_total,
        })
    }

    /// Fee events keyed by (vault, wrapper), cached for the run's lifetime.
    /// The cache dies with the orchestrator, so a fresh run re-reads the
    /// chain.
    async fn cached_fee_events(
        &self,
        vault: &str,
        wrapper: &str,
    ) -> Result<Arc<Vec<FeeEvent>>, SourceError> {
        let key = (vault.to_string(), wrapper.to_string());
        {
            let cache = self.fee_cache.lock().await;
            if let Some(events) = cache.get(&key) {
                return Ok(Arc::clone(events));
            }
        }
        let events = Arc::new(self.source.fee_events(vault, wrapper).await?);
        self.fee_cache.lock().await.insert(key, Arc::clone(&events));
        Ok(events)
    }
}
