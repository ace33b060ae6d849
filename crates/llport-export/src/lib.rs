//! Translation between FIDs and the identifiers an NFS server hands out.
//!
//! [`ExportSession`] implements [`ExportOperations`] on top of an
//! [`InodeCache`], a [`MetadataService`] and an optional [`DirectoryReader`].
//! Handles are 32 bytes (child FID, parent FID) tagged with
//! [`handle::FILEID_LUSTRE`].

pub mod config;
pub mod dentry;
pub mod dir;
pub mod error;
pub mod handle;
pub mod inode;
pub mod metadata;
pub mod names;
pub mod ops;
pub mod parent;
pub mod resolver;
pub mod session;

pub use config::{ExportConfig, ExportConfigError};
pub use dentry::{Dentry, DentryData};
pub use dir::{DirAction, DirEntry, DirectoryReader};
pub use error::ExportError;
pub use handle::{EncodedHandle, FILEID_INVALID, FILEID_LUSTRE, LUSTRE_FH_LEN, LustreFileHandle};
pub use inode::{CacheStats, Inode, InodeAttrs, InodeCache};
pub use metadata::{MdError, MdOpData, MdtBody, MetadataService};
pub use ops::ExportOperations;
pub use resolver::IdentityResolver;
pub use session::ExportSession;
