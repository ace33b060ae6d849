//! Crypto I/O configuration.
//!
//! Loaded from the `[crypt]` table of an `llport.toml` file:
//!
//! ```toml
//! [crypt]
//! block_bits = 12
//! bounce_capacity = 32
//! decrypt_workers = 4
//! decrypt_queue_depth = 256
//! ```
//!
//! Every field is optional. `LLPORT_DECRYPT_WORKERS` and
//! `LLPORT_DECRYPT_QUEUE_DEPTH` override the file when set to a valid number.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::bounce::DEFAULT_BOUNCE_CAPACITY;
use crate::crypto::{CryptoError, PAGE_SHIFT, validate_block_bits};

pub const ENV_DECRYPT_WORKERS: &str = "LLPORT_DECRYPT_WORKERS";
pub const ENV_DECRYPT_QUEUE_DEPTH: &str = "LLPORT_DECRYPT_QUEUE_DEPTH";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),

    #[error(transparent)]
    BlockSize(#[from] CryptoError),
}

fn default_workers() -> usize {
    std::thread::available_parallelism().map_or(2, |n| n.get().min(8))
}

/// Settings for the cipher, bounce pool and decrypt workers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptConfig {
    /// `log2` of the filesystem block size.
    pub block_bits: u32,
    pub bounce_capacity: usize,
    pub decrypt_workers: usize,
    pub decrypt_queue_depth: usize,
}

impl Default for CryptConfig {
    fn default() -> Self {
        Self {
            block_bits: PAGE_SHIFT,
            bounce_capacity: DEFAULT_BOUNCE_CAPACITY,
            decrypt_workers: default_workers(),
            decrypt_queue_depth: 256,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    crypt: CryptConfig,
}

impl CryptConfig {
    /// Parse the `[crypt]` table of a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(text)?;
        file.crypt.validate()?;
        Ok(file.crypt)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        debug!(path = %path.display(), ?config, "loaded crypt config");
        Ok(config)
    }

    /// Apply overrides from the process environment.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`. Unparseable or zero values are ignored.
    #[must_use]
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let parse = |key: &str| {
            lookup(key)
                .and_then(|s| s.trim().parse::<usize>().ok())
                .filter(|&n| n > 0)
        };
        if let Some(workers) = parse(ENV_DECRYPT_WORKERS) {
            self.decrypt_workers = workers;
        }
        if let Some(depth) = parse(ENV_DECRYPT_QUEUE_DEPTH) {
            self.decrypt_queue_depth = depth;
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_block_bits(self.block_bits)?;
        if self.decrypt_workers == 0 {
            return Err(ConfigError::Invalid("decrypt_workers must be at least 1".into()));
        }
        if self.decrypt_queue_depth == 0 {
            return Err(ConfigError::Invalid("decrypt_queue_depth must be at least 1".into()));
        }
        Ok(())
    }

    pub fn block_size(&self) -> usize {
        1 << self.block_bits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_table_missing() {
        let config = CryptConfig::from_toml_str("").unwrap();
        assert_eq!(config, CryptConfig::default());
        assert_eq!(config.block_size(), 4096);
    }

    #[test]
    fn test_partial_table() {
        let config = CryptConfig::from_toml_str("[crypt]\nblock_bits = 10\ndecrypt_workers = 3\n").unwrap();
        assert_eq!(config.block_bits, 10);
        assert_eq!(config.decrypt_workers, 3);
        assert_eq!(config.bounce_capacity, DEFAULT_BOUNCE_CAPACITY);
    }

    #[test]
    fn test_invalid_block_bits_rejected() {
        assert!(matches!(
            CryptConfig::from_toml_str("[crypt]\nblock_bits = 13\n"),
            Err(ConfigError::BlockSize(_))
        ));
        assert!(matches!(
            CryptConfig::from_toml_str("[crypt]\nblock_bits = \"big\"\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_zero_queue_depth_rejected() {
        assert!(matches!(
            CryptConfig::from_toml_str("[crypt]\ndecrypt_queue_depth = 0\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            CryptConfig::from_toml_str("[crypt]\ndecrypt_workers = 0\n"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_overrides() {
        let config = CryptConfig::default().with_overrides(|key| match key {
            ENV_DECRYPT_WORKERS => Some("6".into()),
            ENV_DECRYPT_QUEUE_DEPTH => Some("zero".into()),
            _ => None,
        });
        assert_eq!(config.decrypt_workers, 6);
        assert_eq!(config.decrypt_queue_depth, 256);

        let unchanged = CryptConfig::default().with_overrides(|_| Some("0".into()));
        assert_eq!(unchanged, CryptConfig::default());
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("llport.toml");
        std::fs::write(&path, "[crypt]\nbounce_capacity = 4\n").unwrap();
        assert_eq!(CryptConfig::from_path(&path).unwrap().bounce_capacity, 4);
        assert!(matches!(
            CryptConfig::from_path(dir.path().join("missing.toml")),
            Err(ConfigError::Read { .. })
        ));
    }
}
