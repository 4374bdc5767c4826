use crate::domain::account::AccountId;
use crate::domain::caller::Caller;
use crate::domain::ports::LedgerStoreBox;
use crate::domain::record::LedgerRecord;
use crate::error::{LedgerError, Result};

pub const DEFAULT_PER_PAGE: usize = 20;
pub const MAX_PER_PAGE: usize = 100;

/// A 1-based page of history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    number: usize,
    per_page: usize,
}

impl Page {
    /// Page 0 is read as page 1; a page size outside `1..=MAX_PER_PAGE`
    /// falls back to [`DEFAULT_PER_PAGE`].
    pub fn new(number: usize, per_page: usize) -> Self {
        let per_page = if (1..=MAX_PER_PAGE).contains(&per_page) {
            per_page
        } else {
            DEFAULT_PER_PAGE
        };
        Self {
            number: number.max(1),
            per_page,
        }
    }

    pub fn per_page(&self) -> usize {
        self.per_page
    }

    pub fn offset(&self) -> usize {
        (self.number - 1).saturating_mul(self.per_page)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(1, DEFAULT_PER_PAGE)
    }
}

/// Read side of the ledger: paginated history, newest first.
pub struct HistoryQuery {
    store: LedgerStoreBox,
}

impl HistoryQuery {
    pub fn new(store: LedgerStoreBox) -> Self {
        Self { store }
    }

    pub async fn history(
        &self,
        caller: &Caller,
        account: AccountId,
        page: Page,
    ) -> Result<Vec<LedgerRecord>> {
        if !caller.can_access(account) {
            return Err(LedgerError::Forbidden(format!(
                "caller {} may not read the history of account {}",
                caller.account, account
            )));
        }
        if self.store.get(account).await?.is_none() {
            return Err(LedgerError::AccountNotFound(account));
        }
        self.store
            .history(account, page.offset(), page.per_page())
            .await
    }
}
