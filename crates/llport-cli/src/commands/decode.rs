//! Decode command - print the FIDs inside an export handle.

use anyhow::{Context, Result};
use clap::Args as ClapArgs;
use llport_export::LustreFileHandle;
use tracing::instrument;

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// Handle bytes in hex
    pub handle: String,

    /// Handle type tag (decimal or 0x-prefixed hex)
    #[arg(long = "type", value_name = "TYPE", default_value = "0x97", value_parser = parse_type)]
    pub fh_type: u8,
}

fn parse_type(value: &str) -> Result<u8, String> {
    let parsed = match value.strip_prefix("0x") {
        Some(digits) => u8::from_str_radix(digits, 16),
        None => value.parse(),
    };
    parsed.map_err(|e| format!("invalid handle type '{value}': {e}"))
}

#[instrument(level = "info", name = "cmd::decode", skip_all, fields(fh_type = args.fh_type))]
pub fn execute(args: &Args) -> Result<()> {
    let bytes = hex::decode(args.handle.trim()).context("Handle is not valid hex")?;
    let handle = LustreFileHandle::decode(args.fh_type, &bytes)?;

    println!("child  {}", handle.child);
    if handle.has_parent() {
        println!("parent {}", handle.parent);
    } else {
        println!("parent none");
    }
    if !handle.child.is_sane() {
        tracing::warn!("child FID is not sane, the handle would resolve as stale");
    }
    Ok(())
}
