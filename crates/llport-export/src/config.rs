//! Export configuration, read from the `[export]` table of `llport.toml`.
//!
//! `LLPORT_NEED_32BIT_API` (`1`/`true`/`yes` or `0`/`false`/`no`) overrides
//! `need_32bit_api`.

use std::path::{Path, PathBuf};

use llport_core::fid::uuid_to_int;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const ENV_NEED_32BIT_API: &str = "LLPORT_NEED_32BIT_API";

pub const DEFAULT_INODE_CACHE_LIMIT: usize = 4096;

#[derive(Error, Debug)]
pub enum ExportConfigError {
    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Filesystem name used in log messages.
    pub fsname: String,
    /// Filesystem UUID; hashed into the export fsid.
    pub fs_uuid: String,
    /// Present 32-bit inode numbers to clients.
    pub need_32bit_api: bool,
    /// Cached inodes above which unreferenced ones are evicted.
    pub inode_cache_limit: usize,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            fsname: "lustre".to_string(),
            fs_uuid: "lustre-MDT0000_UUID".to_string(),
            need_32bit_api: false,
            inode_cache_limit: DEFAULT_INODE_CACHE_LIMIT,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    export: ExportConfig,
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl ExportConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ExportConfigError> {
        let file: ConfigFile = toml::from_str(text)?;
        Ok(file.export)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ExportConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ExportConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    #[must_use]
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(api32) = lookup(ENV_NEED_32BIT_API).as_deref().and_then(parse_bool) {
            self.need_32bit_api = api32;
        }
        self
    }

    /// Filesystem id reported to the protocol server.
    pub fn fsid(&self) -> u32 {
        uuid_to_int(self.fs_uuid.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ExportConfig::from_toml_str("[crypt]\nblock_bits = 12\n").unwrap();
        assert_eq!(config, ExportConfig::default());
        assert_eq!(config.fsid(), 0x4f92c566);
    }

    #[test]
    fn test_export_table() {
        let config = ExportConfig::from_toml_str(
            "[export]\nfsname = \"scratch\"\nneed_32bit_api = true\n",
        )
        .unwrap();
        assert_eq!(config.fsname, "scratch");
        assert!(config.need_32bit_api);
        assert_eq!(config.inode_cache_limit, DEFAULT_INODE_CACHE_LIMIT);
        assert_eq!(config.fs_uuid, ExportConfig::default().fs_uuid);
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("llport.toml");
        std::fs::write(&path, "[export]\ninode_cache_limit = 16\n").unwrap();
        assert_eq!(ExportConfig::from_path(&path).unwrap().inode_cache_limit, 16);
        assert!(matches!(
            ExportConfig::from_path(dir.path().join("missing.toml")),
            Err(ExportConfigError::Read { .. })
        ));
    }

    #[test]
    fn test_override() {
        let on = ExportConfig::default().with_overrides(|_| Some("yes".into()));
        assert!(on.need_32bit_api);
        let ignored = on.clone().with_overrides(|_| Some("maybe".into()));
        assert!(ignored.need_32bit_api);
        let off = on.with_overrides(|_| Some("0".into()));
        assert!(!off.need_32bit_api);
    }
}
