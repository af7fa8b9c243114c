//! Per-wrapper snapshot materialization
//!
//! Joins a wrapper's fee events with balance, supply, price, and timestamp
//! samples at the same block heights. Balance and supply reads go out as one
//! batched query per wrapper; timestamps and prices fan out over a bounded
//! worker pool and are recombined by block key, so completion order never
//! leaks into the output.

use std::collections::BTreeMap;

use chrono::DateTime;
use futures::stream::{self, StreamExt, TryStreamExt};

use crate::core::error::SourceError;
use crate::core::traits::ChainDataSource;
use crate::core::types::{FeeEvent, Wrapper, WrapperRecord};

/// Builds the per-event time series for one wrapper.
pub struct SnapshotBuilder<'a, S: ChainDataSource> {
    source: &'a S,
    concurrency: usize,
}

impl<'a, S: ChainDataSource> SnapshotBuilder<'a, S> {
    pub fn new(source: &'a S, concurrency: usize) -> Self {
        Self {
            source,
            concurrency: concurrency.max(1),
        }
    }

    /// Materialize one record per fee event, ordered by block.
    ///
    /// A wrapper with zero fee events yields an empty series. Query failures
    /// bubble up; resilience policy belongs to the caller.
    pub async fn build(
        &self,
        wrapper: &Wrapper,
        events: &[FeeEvent],
    ) -> Result<Vec<WrapperRecord>, SourceError> {
        if events.is_empty() {
            return Ok(Vec::new());
        }

        let blocks: Vec<u64> = events.iter().map(|e| e.block).collect();

        let balances = self
            .source
            .balances_at(&wrapper.vault, &wrapper.wrapper, &blocks)
            .await?;
        check_shape(blocks.len(), balances.len())?;

        let supplies = self
            .source
            .total_supplies_at(&wrapper.vault, &blocks)
            .await?;
        check_shape(blocks.len(), supplies.len())?;

        let timestamps = self.fetch_timestamps(&blocks).await?;
        let prices = self.fetch_prices(&wrapper.vault, &blocks).await?;

        let mut records = Vec::with_capacity(events.len());
        for (i, event) in events.iter().enumerate() {
            let unix_time = timestamps.get(&event.block).copied().ok_or_else(|| {
                SourceError::MalformedResponse(format!("no timestamp for block {}", event.block))
            })?;
            let timestamp = DateTime::from_timestamp(unix_time, 0).ok_or_else(|| {
                SourceError::MalformedResponse(format!(
                    "block {} timestamp {} out of range",
                    event.block, unix_time
                ))
            })?;
            let price = prices.get(&event.block).copied().ok_or_else(|| {
                SourceError::MalformedResponse(format!("no price for block {}", event.block))
            })?;

            records.push(WrapperRecord::new(
                event.block,
                timestamp,
                event.protocol_fee,
                balances[i],
                supplies[i],
                price,
            ));
        }
        records.sort_by_key(|r| r.block);
        Ok(records)
    }

    async fn fetch_timestamps(&self, blocks: &[u64]) -> Result<BTreeMap<u64, i64>, SourceError> {
        let source = self.source;
        let pairs: Vec<(u64, i64)> = stream::iter(blocks.iter().copied())
            .map(|block| async move {
                let unix_time = source.block_timestamp(block).await?;
                Ok::<_, SourceError>((block, unix_time))
            })
            .buffer_unordered(self.concurrency)
            .try_collect()
            .await?;
        Ok(pairs.into_iter().collect())
    }

    async fn fetch_prices(
        &self,
        vault: &str,
        blocks: &[u64],
    ) -> Result<BTreeMap<u64, f64>, SourceError> {
        let source = self.source;
        let pairs: Vec<(u64, f64)> = stream::iter(blocks.iter().copied())
            .map(|block| async move {
                let price = source.price_usd(vault, block).await?;
                Ok::<_, SourceError>((block, price))
            })
            .buffer_unordered(self.concurrency)
            .try_collect()
            .await?;
        Ok(pairs.into_iter().collect())
    }
}

fn check_shape(expected: usize, got: usize) -> Result<(), SourceError> {
    if expected != got {
        return Err(SourceError::BatchShape { expected, got });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// Constant-valued source: every block sees the same balance, supply,
    /// and price.
    struct FlatSource {
        balance: f64,
        supply: f64,
        price: f64,
        timestamps: HashMap<u64, i64>,
    }

    #[async_trait]
    impl ChainDataSource for FlatSource {
        async fn fee_events(&self, _: &str, _: &str) -> Result<Vec<FeeEvent>, SourceError> {
            Ok(Vec::new())
        }

        async fn balances_at(
            &self,
            _: &str,
            _: &str,
            blocks: &[u64],
        ) -> Result<Vec<f64>, SourceError> {
            Ok(vec![self.balance; blocks.len()])
        }

        async fn total_supplies_at(
            &self,
            _: &str,
            blocks: &[u64],
        ) -> Result<Vec<f64>, SourceError> {
            Ok(vec![self.supply; blocks.len()])
        }

        async fn price_usd(&self, _: &str, _: u64) -> Result<f64, SourceError> {
            Ok(self.price)
        }

        async fn block_timestamp(&self, block: u64) -> Result<i64, SourceError> {
            self.timestamps
                .get(&block)
                .copied()
                .ok_or_else(|| SourceError::MalformedResponse(format!("unknown block {block}")))
        }
    }

    fn wrapper() -> Wrapper {
        Wrapper {
            name: "usdc".into(),
            vault: "0xvault".into(),
            wrapper: "0xwrapper".into(),
        }
    }

    #[tokio::test]
    async fn sole_holder_share_is_one_and_base_is_65_percent() {
        let source = FlatSource {
            balance: 100.0,
            supply: 100.0,
            price: 1.0,
            timestamps: HashMap::from([(10, 1_609_459_200)]),
        };
        let builder = SnapshotBuilder::new(&source, 50);
        let events = [FeeEvent {
            block: 10,
            protocol_fee: 4.0,
        }];

        let records = builder.build(&wrapper(), &events).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].share, 1.0);
        assert!((records[0].payout_base - 4.0 * 0.65).abs() < 1e-12);
        assert_eq!(records[0].balance_usd, 100.0);
    }

    #[tokio::test]
    async fn zero_supply_propagates_nan_instead_of_failing() {
        let source = FlatSource {
            balance: 5.0,
            supply: 0.0,
            price: 1.0,
            timestamps: HashMap::from([(10, 1_609_459_200)]),
        };
        let builder = SnapshotBuilder::new(&source, 50);
        let events = [FeeEvent {
            block: 10,
            protocol_fee: 4.0,
        }];

        let records = builder.build(&wrapper(), &events).await.unwrap();
        assert!(records[0].share.is_infinite() || records[0].share.is_nan());
        // 5.0 / 0.0 is +inf; 0.0 / 0.0 is NaN. Either way the payout base
        // stays non-finite and is never coerced to zero.
        assert!(!records[0].payout_base.is_finite());
    }

    #[tokio::test]
    async fn empty_event_series_yields_empty_snapshot() {
        let source = FlatSource {
            balance: 1.0,
            supply: 1.0,
            price: 1.0,
            timestamps: HashMap::new(),
        };
        let builder = SnapshotBuilder::new(&source, 50);
        let records = builder.build(&wrapper(), &[]).await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn records_come_back_block_ordered() {
        let source = FlatSource {
            balance: 1.0,
            supply: 2.0,
            price: 3.0,
            timestamps: HashMap::from([
                (10, 1_609_459_200),
                (20, 1_609_545_600),
                (30, 1_609_632_000),
            ]),
        };
        let builder = SnapshotBuilder::new(&source, 2);
        let events = [
            FeeEvent {
                block: 10,
                protocol_fee: 1.0,
            },
            FeeEvent {
                block: 20,
                protocol_fee: 2.0,
            },
            FeeEvent {
                block: 30,
                protocol_fee: 3.0,
            },
        ];

        let records = builder.build(&wrapper(), &events).await.unwrap();
        let blocks: Vec<u64> = records.iter().map(|r| r.block).collect();
        assert_eq!(blocks, vec![10, 20, 30]);
    }
}
