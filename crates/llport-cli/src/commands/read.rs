//! Read command - decrypt a block range of an image to stdout.
//!
//! Blocks are read synchronously, then decrypted by the deferred decrypt
//! workers, the way completed reads are finished.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Args as ClapArgs;
use llport_core::crypto::{PAGE_SHIFT, PAGE_SIZE};
use llport_core::device::pblk_to_sector;
use llport_core::{
    BlockCipher, BlockDevice, DecryptQueue, FileBlockDevice, IoSegment, IoStatus, Page, ReadIo,
    XtsBlockCipher,
};
use tracing::instrument;

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

    /// Print a hex dump instead of raw bytes
    #[arg(long)]
    pub hex: bool,

    #[command(flatten)]
    pub key: KeyArgs,
}

/// Page index and in-page offset of logical block `lblk`.
fn block_location(lblk: u64, block_bits: u32) -> (u64, usize) {
    let per_page_bits = PAGE_SHIFT - block_bits;
    let index = lblk >> per_page_bits;
    let offset = ((lblk & ((1 << per_page_bits) - 1)) as usize) << block_bits;
    (index, offset)
}

#[instrument(level = "info", name = "cmd::read", skip_all, fields(image = %args.image.display()))]
pub fn execute(args: &Args, config: &Config) -> Result<()> {
    let key = args.key.file_key()?;
    let block_bits = config.crypt.block_bits;
    let block_size = config.crypt.block_size();
    let cipher: Arc<dyn BlockCipher> = Arc::new(XtsBlockCipher::new(&key, block_bits)?);
    let device = FileBlockDevice::open(&args.image)
        .with_context(|| format!("Failed to open image {}", args.image.display()))?;

    let mut segments = Vec::with_capacity(args.len as usize);
    for i in 0..u64::from(args.len) {
        let (index, offset) = block_location(args.lblk + i, block_bits);
        let mut data = vec![0u8; PAGE_SIZE];
        let sector = pblk_to_sector(args.pblk + i, block_bits);
        match device.read_sync(sector, &mut data[offset..offset + block_size])? {
            IoStatus::Ok => {}
            IoStatus::Failed(errno) => bail!("Read of pblk {} failed: errno {errno}", args.pblk + i),
        }
        let page = Arc::new(Page::new_locked(index, data));
        segments.push(IoSegment::new(page, offset, block_size));
    }

    let queue = DecryptQueue::from_config(&config.crypt).context("Failed to start decrypt workers")?;
    queue
        .enqueue(ReadIo::new(cipher, segments.clone()))
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    let mut out = io::stdout().lock();
    for (i, segment) in segments.iter().enumerate() {
        segment.page.wait_unlocked();
        if segment.page.is_error() {
            bail!("Block {} failed to decrypt", args.lblk + i as u64);
        }
        let data = segment.page.data();
        let block = &data[segment.offset..segment.offset + segment.len];
        if args.hex {
            writeln!(out, "{}", hex::encode(block))?;
        } else {
            out.write_all(block)?;
        }
    }
    out.flush()?;
    queue.shutdown();
    Ok(())
}
