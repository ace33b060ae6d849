//! Zero command - overwrite a block range of an image with encrypted zeroes.
//!
//! # Examples
//!
//! ```bash
//! llport zero disk.img --lblk 0 --pblk 128 --len 16 --key-hex "$KEY"
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args as ClapArgs;
use llport_core::{BouncePool, FileBlockDevice, XtsBlockCipher, zeroout_range};
use tracing::{info, instrument};

use super::KeyArgs;
use crate::config::Config;

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// Image file standing in for the block device
    pub image: PathBuf,

    /// First logical block (selects the tweak)
    #[arg(long)]
    pub lblk: u64,

    /// First physical block in the image
    #[arg(long)]
    pub pblk: u64,

    /// Number of blocks
    #[arg(long)]
    pub len: u32,

    #[command(flatten)]
    pub key: KeyArgs,
}

#[instrument(level = "info", name = "cmd::zero", skip_all, fields(image = %args.image.display()))]
pub fn execute(args: &Args, config: &Config) -> Result<()> {
    let key = args.key.file_key()?;
    let cipher = XtsBlockCipher::new(&key, config.crypt.block_bits)?;
    let pool = BouncePool::new(config.crypt.block_size(), config.crypt.bounce_capacity);
    let device = FileBlockDevice::open(&args.image)
        .with_context(|| format!("Failed to open image {}", args.image.display()))?;

    zeroout_range(&cipher, &device, &pool, args.lblk, args.pblk, args.len)
        .with_context(|| format!("Failed to zero {} blocks at pblk {}", args.len, args.pblk))?;

    info!(blocks = args.len, "range zeroed");
    Ok(())
}
