use crate::domain::account::{Account, MINOR_UNIT_SCALE};
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct AccountRow {
    account: u64,
    balance: String,
    active: bool,
    verification: String,
}

impl From<&Account> for AccountRow {
    fn from(account: &Account) -> Self {
        let mut balance = account.balance.value();
        balance.rescale(MINOR_UNIT_SCALE);
        Self {
            account: account.id.0,
            balance: balance.to_string(),
            active: account.is_active(),
            verification: account.verification.to_string(),
        }
    }
}

/// Writes final account state as `account,balance,active,verification`.
pub struct AccountWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> AccountWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_accounts(&mut self, accounts: impl IntoIterator<Item = Account>) -> Result<()> {
        for account in accounts {
            self.writer.serialize(AccountRow::from(&account))?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
