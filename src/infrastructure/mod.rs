//! Adapters for the domain ports: stores, audit sinks, clocks and the edge
//! rate limiter.

pub mod audit;
pub mod clock;
pub mod in_memory;
pub mod locks;
pub mod rate_limit;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
