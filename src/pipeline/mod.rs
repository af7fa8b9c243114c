//! The tiered payout aggregation pipeline
//!
//! Data flows snapshot -> aggregate -> export, driven per partner by the
//! orchestrator.

pub mod aggregate;
pub mod export;
pub mod orchestrator;
pub mod snapshot;
pub mod tiers;

pub use aggregate::PartnerLedger;
pub use export::export_payouts;
pub use orchestrator::{Orchestrator, PartnerOutcome, PartnerReport, RunSummary};
pub use snapshot::SnapshotBuilder;
pub use tiers::TierTable;
