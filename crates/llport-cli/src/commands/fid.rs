//! Fid command - show how a FID maps to inode numbers.
//!
//! # Examples
//!
//! ```bash
//! llport fid '[0x200000400:0x1:0x0]'
//! llport fid 0x200000400:0x1:0x0 --json
//! ```

use anyhow::{Context, Result};
use clap::Args as ClapArgs;
use llport_core::Fid;
use serde::Serialize;
use tracing::instrument;

use crate::output::create_table;

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// FID as [seq:oid:ver], hex fields
    pub fid: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct FidInfo {
    fid: String,
    kind: &'static str,
    sane: bool,
    ino: u64,
    ino32: u32,
    generation: u32,
}

fn kind(fid: &Fid) -> &'static str {
    if fid.is_zero() {
        "zero"
    } else if fid.is_igif() {
        "igif"
    } else if fid.is_idif() {
        "idif"
    } else if fid.is_seq_reserved() {
        "reserved"
    } else {
        "normal"
    }
}

#[instrument(level = "info", name = "cmd::fid", skip_all, fields(fid = %args.fid))]
pub fn execute(args: &Args) -> Result<()> {
    let fid: Fid = args
        .fid
        .parse()
        .with_context(|| format!("Invalid FID '{}'", args.fid))?;

    let info = FidInfo {
        fid: fid.to_string(),
        kind: kind(&fid),
        sane: fid.is_sane(),
        ino: fid.build_ino(false),
        ino32: fid.flatten32(),
        generation: fid.build_gen(),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        let mut table = create_table();
        table.set_header(vec!["Property", "Value"]);
        table.add_row(vec!["FID", &info.fid]);
        table.add_row(vec!["Kind", info.kind]);
        table.add_row(vec!["Sane", if info.sane { "yes" } else { "no" }]);
        table.add_row(vec!["Inode", &format!("{:#x}", info.ino)]);
        table.add_row(vec!["Inode (32-bit)", &format!("{:#x}", info.ino32)]);
        table.add_row(vec!["Generation", &info.generation.to_string()]);
        println!("{table}");
    }

    Ok(())
}
