//! Affiliate revenue-share payout pipeline
//!
//! Computes tiered payouts owed to integration partners of a
//! yield-aggregation protocol from on-chain protocol-fee events and partner
//! wrapper balances. The pipeline turns irregular per-harvest fee events and
//! balance snapshots into a proportional, tier-adjusted, monthly payout
//! schedule; chain access sits behind [`core::traits::ChainDataSource`].

pub mod chain;
pub mod config;
pub mod core;
pub mod pipeline;
pub mod report;

// Re-export commonly used types
pub use crate::core::error::{PayoutError, PayoutResult, SourceError};
pub use crate::core::traits::ChainDataSource;
pub use crate::core::types::{
    BalancePoint, FeeEvent, LedgerRow, Partner, PayoutRow, Wrapper, WrapperRecord, PROTOCOL_CUT,
};
pub use chain::EvmRpcClient;
pub use config::RunConfig;
pub use pipeline::{Orchestrator, PartnerOutcome, PartnerReport, RunSummary, TierTable};
pub use report::ReportWriter;
