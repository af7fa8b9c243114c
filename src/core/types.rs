//! Core domain types

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Fraction of each protocol fee allocated to affiliates before tiering.
pub const PROTOCOL_CUT: f64 = 0.65;

/// One protocol-fee distribution to a wrapper at a given block.
///
/// Fees surface as vault share transfers to the protocol rewards address at
/// harvest time. Sequences of fee events are ordered and deduplicated by
/// block per wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeeEvent {
    pub block: u64,
    pub protocol_fee: f64,
}

/// A partner-operated contract holding vault shares on behalf of its users;
/// the unit tracked for balance and fee attribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wrapper {
    pub name: String,
    pub vault: String,
    pub wrapper: String,
}

/// An integration partner with one or more wrappers and a treasury address
/// receiving payouts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partner {
    pub name: String,
    pub treasury: String,
    pub wrappers: Vec<Wrapper>,
}

/// One row per fee event for a single wrapper, joining the fee amount with
/// balance, supply, and price samples at the same block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WrapperRecord {
    pub block: u64,
    pub timestamp: DateTime<Utc>,
    pub protocol_fee: f64,
    pub balance: f64,
    pub total_supply: f64,
    pub vault_price: f64,
    pub balance_usd: f64,
    /// Wrapper's fraction of the vault supply. NaN when `total_supply == 0`;
    /// the value propagates downstream so the anomaly stays auditable.
    pub share: f64,
    pub payout_base: f64,
}

impl WrapperRecord {
    pub fn new(
        block: u64,
        timestamp: DateTime<Utc>,
        protocol_fee: f64,
        balance: f64,
        total_supply: f64,
        vault_price: f64,
    ) -> Self {
        let balance_usd = balance * vault_price;
        let share = balance / total_supply;
        let payout_base = share * protocol_fee * PROTOCOL_CUT;
        Self {
            block,
            timestamp,
            protocol_fee,
            balance,
            total_supply,
            vault_price,
            balance_usd,
            share,
            payout_base,
        }
    }
}

/// One partner-ledger row: a wrapper record tagged with its contracts, plus
/// the tier and final payout assigned by the aggregator. Never mutated after
/// tier assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerRow {
    pub vault: String,
    pub wrapper: String,
    #[serde(flatten)]
    pub record: WrapperRecord,
    pub tier: f64,
    pub payout: f64,
}

/// A point in the partner's cumulative balance and tier series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BalancePoint {
    pub block: u64,
    pub balance_usd: f64,
    pub tier: f64,
}

/// The externally visible unit of payment: one row per partner, vault token,
/// and calendar month with a nonzero aggregated amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayoutRow {
    /// Month-end date of the billing bucket.
    pub timestamp: NaiveDate,
    pub partner: String,
    pub token: String,
    pub treasury: String,
    pub amount: f64,
}
