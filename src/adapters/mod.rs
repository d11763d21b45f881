//! Concrete adapter implementations for ports.

pub mod file_config_adapter;
pub mod memory_store;
#[cfg(feature = "postgres")]
pub mod postgres_adapter;
pub mod queue;
pub mod scheduler;
#[cfg(feature = "sqlite")]
pub mod sqlite_adapter;
#[cfg(feature = "web")]
pub mod web;
