//! Trade model, validation, version-ordered admission and expiration.

pub mod admission;
pub mod error;
pub mod settings;
pub mod sweeper;
pub mod trade;
pub mod validation;
