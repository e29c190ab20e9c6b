//! Exit codes for `wum-uc`.

/// Startup reached ready and the subcommand succeeded.
pub const OK: i32 = 0;
/// Fatal startup error or failed subcommand (reported as 255 on Unix).
pub const FATAL: i32 = -1;
