//! Port abstraction for the on-chain data collaborators

use async_trait::async_trait;

use super::error::SourceError;
use super::types::FeeEvent;

/// Chain data port - everything the pipeline reads from the outside world.
///
/// Batched lookups return results positionally aligned with the input block
/// list; per-block lookups are recombined by block key, so no completion
/// ordering is assumed by callers.
#[async_trait]
pub trait ChainDataSource: Send + Sync {
    /// All protocol-fee payouts for a vault/wrapper pair, ordered and
    /// deduplicated by block.
    async fn fee_events(&self, vault: &str, wrapper: &str) -> Result<Vec<FeeEvent>, SourceError>;

    /// Wrapper share balances on the vault token at each block, aligned
    /// with the input order. Issued as one multi-query batch.
    async fn balances_at(
        &self,
        vault: &str,
        holder: &str,
        blocks: &[u64],
    ) -> Result<Vec<f64>, SourceError>;

    /// Vault share total supplies at each block, aligned with the input
    /// order. Issued as one multi-query batch.
    async fn total_supplies_at(&self, vault: &str, blocks: &[u64])
        -> Result<Vec<f64>, SourceError>;

    /// Point-in-time USD price of one vault share.
    async fn price_usd(&self, vault: &str, block: u64) -> Result<f64, SourceError>;

    /// Resolve a block height to unix wall-clock time.
    async fn block_timestamp(&self, block: u64) -> Result<i64, SourceError>;
}
