//! Standard exit codes (BSD sysexits.h compatible)

/// Successful termination
pub const OK: i32 = 0;

/// Output trees differ
pub const MISMATCH: i32 = 1;

/// Command line usage error
pub const USAGE: i32 = 64;

/// Data format error (malformed parameter file)
pub const DATAERR: i32 = 65;

/// Cannot open input
pub const NOINPUT: i32 = 66;

/// Internal software error (backend not implemented)
pub const SOFTWARE: i32 = 70;

/// Can't create output file
pub const CANTCREAT: i32 = 73;

/// Input/output error
pub const IOERR: i32 = 74;

/// Configuration error (missing or invalid parameter)
pub const CONFIG: i32 = 78;
