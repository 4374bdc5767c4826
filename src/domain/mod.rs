//! Domain types and the ports the engine depends on.

pub mod account;
pub mod audit;
pub mod caller;
pub mod movement;
pub mod ports;
pub mod record;
