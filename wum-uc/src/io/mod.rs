//! I/O helpers for startup: config files, temp paths, workspaces.

pub mod config;
pub mod paths;
pub mod workspace;
