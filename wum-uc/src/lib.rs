//! Startup layer of the `wum-uc` update creator tool.
//!
//! Before any subcommand runs, `wum-uc` resolves its configuration, installs
//! the logger, reclaims scratch workspaces abandoned by earlier runs and
//! provisions a private one for this run.
//!
//! - **[`core`]**: Pure logic (log level selection, layered lookups).
//! - **[`io`]**: Config files, temp paths and workspace directories.
//! - **[`startup`]**: Sequences the above into a [`startup::Session`].

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod startup;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
