//! Standard exit codes for CLI operations
//!
//! These exit codes follow Unix conventions where applicable.

/// Success - operation completed without errors
pub const SUCCESS: i32 = 0;

/// General error - unspecified failure, or resources that failed to convert
pub const ERROR: i32 = 1;

/// Pack error - invalid configuration or pack identity
pub const PACK_ERROR: i32 = 4;

/// IO error - file not found, permission denied, output exists, etc.
pub const IO_ERROR: i32 = 5;
