use crate::error::{LedgerError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use std::io::Read;

#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum CommandType {
    Open,
    Verify,
    Deactivate,
    Deposit,
    Withdraw,
    Transfer,
}

/// One row of a batch file.
///
/// `counterparty` is only read for transfers and `amount` only for
/// movements; `origin` is the client address used for rate limiting and
/// audit.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct LedgerCommand {
    pub r#type: CommandType,
    pub account: u64,
    pub counterparty: Option<u64>,
    #[serde(default, deserialize_with = "exact_decimal")]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub description: String,
    pub origin: Option<String>,
}

/// Parses the field text directly so `12.50` keeps its scale instead of
/// passing through a float.
fn exact_decimal<'de, D>(deserializer: D) -> std::result::Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    raw.map(|s| Decimal::from_str_exact(&s))
        .transpose()
        .map_err(serde::de::Error::custom)
}

/// Reads ledger commands from a CSV source.
///
/// This reader wraps `csv::Reader` and provides an iterator over
/// `Result<LedgerCommand>`. Whitespace is trimmed and trailing optional
/// columns may be omitted.
pub struct CommandReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CommandReader<R> {
    /// Creates a new `CommandReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily reads and deserializes commands, so large batches are streamed.
    pub fn commands(self) -> impl Iterator<Item = Result<LedgerCommand>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(LedgerError::from))
    }
}
