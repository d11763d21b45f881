//! Configuration access port trait.

use crate::domain::error::TradeStoreError;

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool;

    /// `default` when the key is absent; `ConfigInvalid` unless the value
    /// is an integer in `1..=u32::MAX`.
    fn get_positive_u32(&self, section: &str, key: &str, default: u32)
    -> Result<u32, TradeStoreError>;

    /// As [`ConfigPort::get_positive_u32`], bounded by `usize::MAX`.
    fn get_positive_usize(
        &self,
        section: &str,
        key: &str,
        default: usize,
    ) -> Result<usize, TradeStoreError>;
}
