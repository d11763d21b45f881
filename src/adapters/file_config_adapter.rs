//! INI service configuration read through `configparser`.

use crate::domain::error::TradeStoreError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, TradeStoreError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config
            .load(path)
            .map_err(|reason| TradeStoreError::ConfigParse {
                file: path.display().to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, TradeStoreError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| TradeStoreError::ConfigParse {
                file: "<inline>".to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    fn positive<T: TryFrom<u64>>(
        &self,
        section: &str,
        key: &str,
        default: T,
    ) -> Result<T, TradeStoreError> {
        let Some(raw) = self.config.get(section, key) else {
            return Ok(default);
        };
        let invalid = |reason: String| TradeStoreError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason,
        };

        let value: u64 = raw
            .trim()
            .parse()
            .map_err(|_| invalid(format!("'{raw}' is not a positive integer")))?;
        if value == 0 {
            return Err(invalid(format!("{key} must be positive")));
        }
        T::try_from(value).map_err(|_| invalid(format!("{value} is out of range")))
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.config
            .get(section, key)
            .as_deref()
            .and_then(parse_bool)
            .unwrap_or(default)
    }

    fn get_positive_u32(
        &self,
        section: &str,
        key: &str,
        default: u32,
    ) -> Result<u32, TradeStoreError> {
        self.positive(section, key, default)
    }

    fn get_positive_usize(
        &self,
        section: &str,
        key: &str,
        default: usize,
    ) -> Result<usize, TradeStoreError> {
        self.positive(section, key, default)
    }
}
