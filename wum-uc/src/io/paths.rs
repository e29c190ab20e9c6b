//! Platform temp root and long-path handling.

use std::path::{Path, PathBuf};

/// Prefix that lifts the Windows `MAX_PATH` limit.
pub const EXTENDED_PREFIX: &str = r"\\?\";

/// Platform temp root, with the extended-length prefix applied where needed.
pub fn temp_root() -> PathBuf {
    extended_length(&std::env::temp_dir())
}

/// Apply the extended-length prefix on Windows; identity elsewhere.
///
/// The reclaimer's scan root and the provisioned workspace both pass through
/// here so they name the same directory the same way.
pub fn extended_length(path: &Path) -> PathBuf {
    if cfg!(windows) {
        PathBuf::from(with_extended_prefix(&path.to_string_lossy()))
    } else {
        path.to_path_buf()
    }
}

/// Prefix an absolute drive path with `\\?\` unless already prefixed.
///
/// UNC (`\\server\share`) and relative paths are returned unchanged.
pub fn with_extended_prefix(path: &str) -> String {
    if path.starts_with(EXTENDED_PREFIX) || path.starts_with(r"\\") {
        return path.to_string();
    }
    let bytes = path.as_bytes();
    let is_drive_absolute = bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'\\' || bytes[2] == b'/');
    if !is_drive_absolute {
        return path.to_string();
    }
    format!("{EXTENDED_PREFIX}{}", path.replace('/', "\\"))
}
