use crate::domain::ledger::LedgerAccount;
use crate::domain::transaction::MirrorRecord;
use crate::error::Result;
use std::io::Write;

/// Writes end-of-run reports as CSV.
///
/// Amounts are normalized (`200.0` is written as `200`) and statuses use their
/// numeric wire code.
pub struct ReportWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    /// Writes the mirrored transaction table.
    pub fn write_mirror<I>(&mut self, records: I) -> Result<()>
    where
        I: IntoIterator<Item = MirrorRecord>,
    {
        self.writer
            .write_record(["transaction_id", "buyer", "seller", "amount", "status"])?;
        for record in records {
            self.writer.write_record([
                record.transaction_id.to_string(),
                record.buyer.to_string(),
                record.seller.to_string(),
                record.amount.value().normalize().to_string(),
                record.status.code().to_string(),
            ])?;
        }
        self.writer.flush()?;
        Ok(())
    }

    /// Writes the withdrawable ledger balances.
    pub fn write_balances<I>(&mut self, accounts: I) -> Result<()>
    where
        I: IntoIterator<Item = LedgerAccount>,
    {
        self.writer.write_record(["account", "balance"])?;
        for entry in accounts {
            self.writer.write_record([
                entry.account.to_string(),
                entry.balance.value().normalize().to_string(),
            ])?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
