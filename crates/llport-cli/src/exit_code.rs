//! Exit codes for the CLI.

/// Successful execution
pub const SUCCESS: u8 = 0;

/// General/unspecified error
pub const GENERAL_ERROR: u8 = 1;

/// Malformed FID, handle or key on the command line
pub const USAGE_ERROR: u8 = 2;

/// The handle is stale or was not produced by this codec
pub const BAD_HANDLE: u8 = 3;

/// Reading or writing the block image failed
pub const IO_ERROR: u8 = 4;
