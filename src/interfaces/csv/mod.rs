//! CSV batch interface: command rows in, account state and history out.

pub mod account_writer;
pub mod batch;
pub mod command_reader;
pub mod record_writer;
