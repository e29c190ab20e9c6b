//! Test-only helpers for temp roots, aged workspaces and config files.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Create `root/name` as a directory and return its path.
pub fn make_dir(root: &Path, name: &str) -> PathBuf {
    let path = root.join(name);
    fs::create_dir_all(&path).expect("create dir");
    path
}

/// Backdate the modification time of `path` by `age`.
///
/// Works for directories on Unix, where a directory can be opened read-only.
pub fn set_age(path: &Path, age: Duration) -> io::Result<()> {
    let mtime = SystemTime::now() - age;
    fs::File::open(path)?.set_modified(mtime)
}

/// Write `contents` to `dir/file_name` and return the path.
pub fn write_config(dir: &Path, file_name: &str, contents: &str) -> PathBuf {
    let path = dir.join(file_name);
    fs::write(&path, contents).expect("write config");
    path
}
