//! tradestore: versioned trade booking with scheduled expiration.
//!
//! Hexagonal architecture: admission and sweep logic in [`domain`], port traits in
//! [`ports`], stores, queue, scheduler and HTTP surface in [`adapters`].

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod cli;
