//! The metadata service as seen by the export layer.
//!
//! The transport is external. The export layer only issues two requests:
//! `getattr` by FID and `getattr_name` by (parent FID, name). Replies carry an
//! [`MdtBody`] whose `valid` mask says which fields the server filled in.

use llport_core::Fid;
use thiserror::Error;

/// Reply field bits of [`MdtBody::valid`].
pub const OBD_MD_FLID: u64 = 0x0000_0001;
pub const OBD_MD_FLSIZE: u64 = 0x0000_0010;
pub const OBD_MD_FLMODE: u64 = 0x0000_0080;
pub const OBD_MD_FLTYPE: u64 = 0x0000_0100;
pub const OBD_MD_FLNLINK: u64 = 0x0000_2000;
pub const OBD_MD_FLEASIZE: u64 = 0x2000_0000;

/// Name used to look up a directory's parent.
pub const DOTDOT: &str = "..";

/// A failed metadata request, carrying the server's negative status code.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("metadata request failed: rc = {rc}")]
pub struct MdError {
    pub rc: i32,
}

impl MdError {
    pub fn new(rc: i32) -> Self {
        Self { rc }
    }

    /// Positive errno; a non-negative `rc` is reported as `EIO`.
    pub fn errno(&self) -> i32 {
        if self.rc < 0 { -self.rc } else { libc::EIO }
    }
}

/// Arguments of a metadata request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MdOpData {
    /// Object the request is about (the parent directory for by-name lookups).
    pub fid1: Fid,
    pub name: Option<String>,
    /// Largest extended-attribute block the caller accepts.
    pub ea_size: u32,
    /// Fields requested from the server.
    pub valid: u64,
}

impl MdOpData {
    pub fn by_fid(fid: Fid, ea_size: u32) -> Self {
        Self {
            fid1: fid,
            name: None,
            ea_size,
            valid: OBD_MD_FLEASIZE,
        }
    }

    pub fn by_name(parent: Fid, name: &str, ea_size: u32) -> Self {
        Self {
            fid1: parent,
            name: Some(name.to_string()),
            ea_size,
            valid: OBD_MD_FLEASIZE,
        }
    }
}

/// Attribute reply for one object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MdtBody {
    pub fid1: Fid,
    pub valid: u64,
    pub mode: u32,
    pub size: u64,
    pub nlink: u32,
    pub ea_size: u32,
}

impl MdtBody {
    pub fn has(&self, bits: u64) -> bool {
        self.valid & bits == bits
    }
}

/// Client side of the metadata service.
pub trait MetadataService: Send + Sync {
    /// Default size of the extended-attribute block expected in replies.
    fn default_md_size(&self) -> Result<u32, MdError>;

    fn getattr(&self, op: &MdOpData) -> Result<MdtBody, MdError>;

    fn getattr_name(&self, op: &MdOpData) -> Result<MdtBody, MdError>;
}
