//! Encode command - build an export handle from FIDs.

use anyhow::{Context, Result};
use clap::Args as ClapArgs;
use llport_core::Fid;
use llport_export::{LUSTRE_FH_LEN, LustreFileHandle};
use tracing::instrument;

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// FID of the object
    pub child: String,

    /// FID of its parent directory
    pub parent: Option<String>,
}

fn parse(value: &str) -> Result<Fid> {
    value
        .parse()
        .with_context(|| format!("Invalid FID '{value}'"))
}

#[instrument(level = "info", name = "cmd::encode", skip_all)]
pub fn execute(args: &Args) -> Result<()> {
    let child = parse(&args.child)?;
    let parent = args.parent.as_deref().map(parse).transpose()?;

    let mut buf = [0u8; LUSTRE_FH_LEN];
    let encoded = LustreFileHandle::new(child, parent).encode_into(&mut buf)?;

    println!("type {:#x}", encoded.fh_type);
    println!("{}", hex::encode(&buf[..encoded.len]));
    Ok(())
}
