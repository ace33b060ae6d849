//! Recovering a child's name by scanning its parent directory.

use llport_core::Fid;
use tracing::{debug, instrument};

use crate::dir::{DirAction, DirectoryReader};
use crate::error::ExportError;
use crate::inode::Inode;

/// Name of the first entry of `dir` whose FID equals `target`.
///
/// Holds the directory lock for the whole scan.
#[instrument(level = "debug", skip(reader, dir), fields(dir = %dir.fid(), target = %target))]
pub fn find_name(
    reader: Option<&dyn DirectoryReader>,
    dir: &Inode,
    target: &Fid,
) -> Result<String, ExportError> {
    if !dir.is_dir() {
        return Err(ExportError::NotDirectory);
    }
    let reader = reader.ok_or(ExportError::NoEntryReader)?;

    let mut found = None;
    let mut pos = 0;
    {
        let _guard = dir.lock_dir();
        reader.read_dir(dir, &mut pos, &mut |entry| {
            if entry.fid() == *target {
                found = Some(entry.name.clone());
                DirAction::Stop
            } else {
                DirAction::Continue
            }
        })?;
    }

    match found {
        Some(name) => {
            debug!(%name, pos, "name found");
            Ok(name)
        }
        None => Err(ExportError::NotFound),
    }
}
