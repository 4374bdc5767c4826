use crate::domain::record::LedgerRecord;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct RecordRow<'a> {
    reference: &'a str,
    kind: String,
    amount: String,
    balance_before: String,
    balance_after: String,
    counterparty: Option<u64>,
    description: &'a str,
    created_at: String,
}

/// Writes a page of history, in the order given.
pub struct RecordWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> RecordWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_records(&mut self, records: &[LedgerRecord]) -> Result<()> {
        for record in records {
            self.writer.serialize(RecordRow {
                reference: record.reference.as_str(),
                kind: record.kind.to_string(),
                amount: record.amount.to_string(),
                balance_before: record.balance_before.to_string(),
                balance_after: record.balance_after.to_string(),
                counterparty: record.counterparty.map(|c| c.0),
                description: &record.description,
                created_at: record.created_at.to_rfc3339(),
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
