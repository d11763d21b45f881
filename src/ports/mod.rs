//! Port traits: the seams between domain logic and I/O.

pub mod clock_port;
pub mod config_port;
pub mod publisher_port;
pub mod trade_store_port;
