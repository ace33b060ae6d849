pub mod decode;
pub mod encode;
pub mod fid;
pub mod read;
pub mod zero;

use anyhow::{Context, Result};
use clap::Args as ClapArgs;
use llport_core::FileKey;

/// File key options shared by the image commands
#[derive(ClapArgs, Clone)]
pub struct KeyArgs {
    /// 64-byte AES-256-XTS key as 128 hex digits
    #[arg(long, env = "LLPORT_KEY_HEX", hide_env_values = true)]
    pub key_hex: String,
}

impl KeyArgs {
    pub fn file_key(&self) -> Result<FileKey> {
        FileKey::from_hex(&self.key_hex).context("Invalid file key")
    }
}
