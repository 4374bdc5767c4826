//! Application layer: the transaction engine and the services around it.
//!
//! `LedgerEngine` is the entry point for balance changes. It owns no state
//! between calls; concurrency is handled by the store's row locks.

pub mod accounts;
pub mod engine;
pub mod history;
pub mod limits;
pub mod risk;
