use super::command_reader::{CommandType, LedgerCommand};
use crate::application::accounts::AccountService;
use crate::application::engine::LedgerEngine;
use crate::domain::account::{AccountId, Verification};
use crate::domain::caller::{Caller, Origin};
use crate::error::{LedgerError, Result};
use crate::infrastructure::rate_limit::RateLimiter;
use std::sync::Arc;

/// Account id of the batch operator that issues administrative rows.
pub const OPERATOR: AccountId = AccountId(0);

const AGENT: &str = "minibank-ledger/batch";

/// Replays batch rows against the engine.
///
/// Movement and `open` rows act as the owning customer; `verify` and
/// `deactivate` rows act as the admin [`OPERATOR`].
pub struct BatchProcessor {
    engine: LedgerEngine,
    accounts: AccountService,
    limiter: Option<Arc<RateLimiter>>,
}

impl BatchProcessor {
    pub fn new(engine: LedgerEngine, accounts: AccountService) -> Self {
        Self {
            engine,
            accounts,
            limiter: None,
        }
    }

    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub async fn apply(&self, command: LedgerCommand) -> Result<()> {
        let account = AccountId(command.account);
        let origin = Origin {
            address: command.origin.clone(),
            agent: Some(AGENT.to_string()),
        };

        match command.r#type {
            CommandType::Open => {
                let caller = Caller::customer(account).with_origin(origin);
                self.accounts.open(&caller, account).await?;
            }
            CommandType::Verify => {
                let caller = Caller::admin(OPERATOR).with_origin(origin);
                self.accounts
                    .set_verification(&caller, account, Verification::Verified)
                    .await?;
            }
            CommandType::Deactivate => {
                let caller = Caller::admin(OPERATOR).with_origin(origin);
                self.accounts.deactivate(&caller, account).await?;
            }
            CommandType::Deposit | CommandType::Withdraw | CommandType::Transfer => {
                self.throttle(&command)?;
                let caller = Caller::customer(account).with_origin(origin);
                let amount = command.amount.ok_or(LedgerError::MissingField("amount"))?;
                let description = command.description.as_str();
                match command.r#type {
                    CommandType::Deposit => {
                        self.engine
                            .deposit(&caller, account, amount, description)
                            .await?;
                    }
                    CommandType::Withdraw => {
                        self.engine
                            .withdraw(&caller, account, amount, description)
                            .await?;
                    }
                    _ => {
                        let counterparty = command
                            .counterparty
                            .map(AccountId)
                            .ok_or(LedgerError::MissingField("counterparty"))?;
                        self.engine
                            .transfer(&caller, account, counterparty, amount, description)
                            .await?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Rows without an origin are keyed by their account.
    fn throttle(&self, command: &LedgerCommand) -> Result<()> {
        let Some(limiter) = &self.limiter else {
            return Ok(());
        };
        let key = command
            .origin
            .clone()
            .unwrap_or_else(|| format!("account:{}", command.account));
        if limiter.check(&key) {
            Ok(())
        } else {
            Err(LedgerError::RateLimited(key))
        }
    }
}
