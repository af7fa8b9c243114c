//! CSV persistence for ledgers and payout schedules
//!
//! Layout under the output root, one directory per partner:
//!
//! ```text
//! <root>/<partner>/partner.csv   - per-event ledger with tier and payout
//! <root>/<partner>/balance.csv   - cumulative balance and tier series
//! <root>/<partner>/payouts.csv   - monthly billing schedule
//! <root>/payouts.csv             - consolidated cross-partner schedule
//! ```

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::core::error::PayoutResult;
use crate::core::types::PayoutRow;
use crate::pipeline::orchestrator::PartnerReport;

pub struct ReportWriter {
    root: PathBuf,
}

impl ReportWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Write one partner's ledger, balance series, and payout schedule.
    pub fn write_partner(&self, report: &PartnerReport) -> PayoutResult<()> {
        let dir = self.root.join(&report.partner);
        fs::create_dir_all(&dir)?;

        let mut ledger = fs::File::create(dir.join("partner.csv"))?;
        writeln!(
            ledger,
            "block,timestamp,wrapper,vault,protocol_fee,balance,total_supply,vault_price,balance_usd,share,payout_base,tier,payout"
        )?;
        for row in &report.ledger {
            writeln!(
                ledger,
                "{},{},{},{},{},{},{},{},{},{},{},{},{}",
                row.record.block,
                row.record.timestamp.to_rfc3339(),
                row.wrapper,
                row.vault,
                row.record.protocol_fee,
                row.record.balance,
                row.record.total_supply,
                row.record.vault_price,
                row.record.balance_usd,
                row.record.share,
                row.record.payout_base,
                row.tier,
                row.payout,
            )?;
        }

        let mut balance = fs::File::create(dir.join("balance.csv"))?;
        writeln!(balance, "block,balance_usd,tier")?;
        for point in &report.balance_series {
            writeln!(balance, "{},{},{}", point.block, point.balance_usd, point.tier)?;
        }

        write_payout_rows(&dir.join("payouts.csv"), &report.payouts)?;
        Ok(())
    }

    /// Write the consolidated cross-partner schedule and return its path.
    pub fn write_consolidated(&self, rows: &[PayoutRow]) -> PayoutResult<PathBuf> {
        fs::create_dir_all(&self.root)?;
        let path = self.root.join("payouts.csv");
        write_payout_rows(&path, rows)?;
        info!(path = %path.display(), "saved consolidated payouts");
        Ok(path)
    }
}

fn write_payout_rows(path: &Path, rows: &[PayoutRow]) -> PayoutResult<()> {
    let mut file = fs::File::create(path)?;
    writeln!(file, "timestamp,partner,token,treasury,amount")?;
    for row in rows {
        writeln!(
            file,
            "{},{},{},{},{}",
            row.timestamp, row.partner, row.token, row.treasury, row.amount
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn payout(month: u32, token: &str, amount: f64) -> PayoutRow {
        PayoutRow {
            timestamp: NaiveDate::from_ymd_opt(2021, month, 28).unwrap(),
            partner: "frax".into(),
            token: token.into(),
            treasury: "0xtreasury".into(),
            amount,
        }
    }

    #[test]
    fn writes_partner_report_files() {
        let dir = TempDir::new().unwrap();
        let writer = ReportWriter::new(dir.path());
        let report = PartnerReport {
            partner: "frax".into(),
            ledger: Vec::new(),
            balance_series: Vec::new(),
            payouts: vec![payout(1, "0xvault", 12.5)],
            usd_total: 12.5,
        };

        writer.write_partner(&report).unwrap();
        for name in ["partner.csv", "balance.csv", "payouts.csv"] {
            assert!(dir.path().join("frax").join(name).exists(), "{name} missing");
        }
        let payouts = fs::read_to_string(dir.path().join("frax/payouts.csv")).unwrap();
        assert!(payouts.starts_with("timestamp,partner,token,treasury,amount\n"));
        assert!(payouts.contains("2021-01-28,frax,0xvault,0xtreasury,12.5"));
    }

    #[test]
    fn consolidated_schedule_lands_at_the_root() {
        let dir = TempDir::new().unwrap();
        let writer = ReportWriter::new(dir.path());
        let rows = vec![payout(1, "0xvault-a", 1.0), payout(2, "0xvault-b", 2.0)];

        let path = writer.write_consolidated(&rows).unwrap();
        assert_eq!(path, dir.path().join("payouts.csv"));
        let content = fs::read_to_string(path).unwrap();
        assert_eq!(content.lines().count(), 3);
    }
}
