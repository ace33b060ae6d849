//! `llport.toml` loading.
//!
//! ```toml
//! [crypt]
//! block_bits = 12
//! bounce_capacity = 32
//!
//! [export]
//! fsname = "scratch"
//! need_32bit_api = true
//! inode_cache_limit = 4096
//! ```
//!
//! A missing file means defaults. Environment overrides are applied last.

use std::path::Path;

use anyhow::{Context, Result};
use llport_core::CryptConfig;
use llport_export::ExportConfig;

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub crypt: CryptConfig,
    pub export: ExportConfig,
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default().with_env_overrides());
        };

        let crypt = CryptConfig::from_path(path)
            .with_context(|| format!("Failed to load [crypt] from {}", path.display()))?;
        let export = ExportConfig::from_path(path)
            .with_context(|| format!("Failed to load [export] from {}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded config");

        Ok(Self { crypt, export }.with_env_overrides())
    }

    fn with_env_overrides(self) -> Self {
        Self {
            crypt: self.crypt.with_env_overrides(),
            export: self.export.with_env_overrides(),
        }
    }
}
