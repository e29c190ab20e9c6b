//! Per-run scratch workspaces under the platform temp root.
//!
//! Every invocation gets a fresh `wum-uc-<random>` directory. Workspaces are
//! left behind on exit; a later invocation reclaims the ones older than
//! [`STALE_AFTER`]. No locks are taken: exclusive directory creation keeps
//! names unique, and the age threshold keeps a reclaimer away from a sibling
//! invocation's live workspace.

use std::fs::{self, Metadata};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use tracing::{debug, trace};

use super::paths::extended_length;

/// Name prefix shared by all `wum-uc` workspaces.
pub const WORKSPACE_PREFIX: &str = "wum-uc-";

/// Minimum age before a workspace counts as abandoned.
pub const STALE_AFTER: Duration = Duration::from_secs(60 * 60);

/// What a reclamation pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReclaimReport {
    /// Stale entries deleted by this pass.
    pub removed: Vec<PathBuf>,
    /// Prefixed entries younger than the threshold.
    pub retained: Vec<PathBuf>,
}

/// Delete entries under `temp_root` named `prefix*` that are at least
/// `stale_after` old.
///
/// Failing to list `temp_root` or to delete a stale entry is an error. An
/// entry that disappears mid-pass (another invocation reclaimed it) is
/// skipped.
pub fn reclaim(temp_root: &Path, prefix: &str, stale_after: Duration) -> Result<ReclaimReport> {
    reclaim_at(temp_root, prefix, stale_after, SystemTime::now())
}

/// [`reclaim`] with an explicit notion of "now".
pub fn reclaim_at(
    temp_root: &Path,
    prefix: &str,
    stale_after: Duration,
    now: SystemTime,
) -> Result<ReclaimReport> {
    reclaim_with(temp_root, prefix, stale_after, now, remove_entry)
}

/// Deletes one stale entry given its (non-followed) metadata.
type Remover = fn(&Path, &Metadata) -> std::io::Result<()>;

fn reclaim_with(
    temp_root: &Path,
    prefix: &str,
    stale_after: Duration,
    now: SystemTime,
    remove: Remover,
) -> Result<ReclaimReport> {
    debug!(root = %temp_root.display(), prefix, "deleting stale temp directories");
    let unreadable = || format!("unable to read temp root '{}'", temp_root.display());
    let entries = fs::read_dir(temp_root).with_context(unreadable)?;

    let mut report = ReclaimReport::default();
    for entry in entries {
        let entry = entry.with_context(unreadable)?;
        let name = entry.file_name();
        if !name.to_string_lossy().starts_with(prefix) {
            continue;
        }
        let path = temp_root.join(&name);

        let metadata = match fs::symlink_metadata(&path) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                trace!(path = %path.display(), "entry vanished before inspection");
                continue;
            }
            Err(err) => {
                return Err(err).with_context(|| format!("unable to read '{}'", path.display()));
            }
        };
        let age = age_of(&metadata, now)
            .with_context(|| format!("unable to read '{}'", path.display()))?;
        if age < stale_after {
            trace!(path = %path.display(), age_secs = age.as_secs(), "keeping fresh workspace");
            report.retained.push(path);
            continue;
        }

        debug!(
            path = %path.display(),
            age_secs = age.as_secs(),
            "deleting temp directory older than threshold"
        );
        match remove(&path, &metadata) {
            Ok(()) => report.removed.push(path),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                trace!(path = %path.display(), "entry already removed");
            }
            Err(err) => {
                return Err(err).with_context(|| {
                    format!(
                        "unable to delete '{}', please delete it manually",
                        path.display()
                    )
                });
            }
        }
    }

    debug!(
        removed = report.removed.len(),
        retained = report.retained.len(),
        "stale temp directories reclaimed"
    );
    Ok(report)
}

/// Create a fresh, private workspace `<temp_root>/<prefix><random>`.
///
/// Creation is exclusive: a name collision retries with a new suffix, so two
/// concurrent invocations never share a directory. The directory outlives the
/// process.
pub fn provision(temp_root: &Path, prefix: &str) -> Result<PathBuf> {
    let dir = tempfile::Builder::new()
        .prefix(prefix)
        .tempdir_in(temp_root)
        .with_context(|| {
            format!(
                "cannot create the temp directory under '{}'",
                temp_root.display()
            )
        })?;
    let path = extended_length(&dir.keep());
    debug!(path = %path.display(), "workspace created");
    Ok(path)
}

fn age_of(metadata: &Metadata, now: SystemTime) -> std::io::Result<Duration> {
    let modified = metadata.modified()?;
    // A timestamp in the future counts as brand new.
    Ok(now.duration_since(modified).unwrap_or(Duration::ZERO))
}

fn remove_entry(path: &Path, metadata: &Metadata) -> std::io::Result<()> {
    if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}
