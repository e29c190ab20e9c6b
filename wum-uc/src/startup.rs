//! Startup sequence run before any subcommand.
//!
//! The stages run in a fixed order and never go back:
//!
//! ```text
//! Start -> LogLevelSet -> DefaultsSet -> StaleReclaimed -> WorkspaceProvisioned
//!       -> ConfigFileLoaded -> DiagnosticsEmitted -> Ready
//! ```
//!
//! Any error aborts the run. There is no rollback: a workspace provisioned
//! before a later failure stays on disk until a future run reclaims it.

use std::path::{MAIN_SEPARATOR, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, trace};

use crate::core::level::LogLevel;
use crate::io::config::{Config, ConfigSource, TEMP_DIR_KEY, default_search_paths};
use crate::io::paths::{extended_length, temp_root};
use crate::io::workspace::{ReclaimReport, STALE_AFTER, WORKSPACE_PREFIX, provision, reclaim};
use crate::logging;

/// Startup stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Start,
    LogLevelSet,
    DefaultsSet,
    StaleReclaimed,
    WorkspaceProvisioned,
    ConfigFileLoaded,
    DiagnosticsEmitted,
    Ready,
}

/// Inputs to [`bootstrap`].
#[derive(Debug, Clone)]
pub struct StartupOptions {
    /// Value of `--config`; empty or `None` means discover.
    pub config_path: Option<PathBuf>,
    pub debug: bool,
    pub trace: bool,
    /// Directory that holds workspaces (platform temp dir in production).
    pub temp_root: PathBuf,
    /// Directories searched for `config.<ext>` when no path is given.
    pub search_paths: Vec<PathBuf>,
    pub stale_after: Duration,
}

impl StartupOptions {
    /// Options for a real invocation: platform temp root, `.` and `~/.wum-uc`.
    pub fn from_flags(config_path: Option<PathBuf>, debug: bool, trace: bool) -> Self {
        Self {
            config_path,
            debug,
            trace,
            temp_root: temp_root(),
            search_paths: default_search_paths(),
            stale_after: STALE_AFTER,
        }
    }
}

/// State handed to subcommands once startup reaches [`Stage::Ready`].
#[derive(Debug, Clone)]
pub struct Session {
    pub level: LogLevel,
    pub config: Config,
    /// This run's private workspace (also stored under `temp_dir`).
    pub workspace: PathBuf,
    pub reclaimed: ReclaimReport,
    pub stage: Stage,
}

/// Run the startup sequence.
pub fn bootstrap(options: &StartupOptions) -> Result<Session> {
    let mut stage = Stage::Start;

    let level = LogLevel::from_flags(options.debug, options.trace);
    logging::init(level);
    advance(&mut stage, Stage::LogLevelSet);

    let mut config = Config::new();
    config.set_defaults();
    advance(&mut stage, Stage::DefaultsSet);

    let root = extended_length(&options.temp_root);
    let reclaimed = reclaim(&root, WORKSPACE_PREFIX, options.stale_after)
        .context("reclaim stale temp directories")?;
    advance(&mut stage, Stage::StaleReclaimed);

    let workspace = provision(&root, WORKSPACE_PREFIX)?;
    // `temp_dir` is a string key, so the path must round-trip exactly.
    let workspace_str = workspace
        .to_str()
        .with_context(|| format!("workspace path is not valid UTF-8: {}", workspace.display()))?;
    config.set(TEMP_DIR_KEY, workspace_str);
    advance(&mut stage, Stage::WorkspaceProvisioned);

    config.resolve(options.config_path.as_deref(), &options.search_paths);
    advance(&mut stage, Stage::ConfigFileLoaded);

    emit_diagnostics(&config);
    advance(&mut stage, Stage::DiagnosticsEmitted);

    advance(&mut stage, Stage::Ready);
    Ok(Session {
        level,
        config,
        workspace,
        reclaimed,
        stage,
    })
}

fn advance(stage: &mut Stage, next: Stage) {
    debug_assert!(next > *stage, "startup stages only move forward");
    trace!(from = ?stage, to = ?next, "startup stage");
    *stage = next;
}

/// Log the resolved configuration at debug level.
pub fn emit_diagnostics(config: &Config) {
    match config.source() {
        ConfigSource::Explicit(path) | ConfigSource::Discovered(path) => {
            debug!(path = %path.display(), "config file used");
        }
        ConfigSource::Unreadable { path, reason } => {
            debug!(path = %path.display(), reason = %reason, "config file ignored");
        }
        ConfigSource::NotFound => debug!("config file not found"),
    }
    let summary = config.summary();
    debug!(separator = %MAIN_SEPARATOR, "path separator");
    debug!(temp_dir = ?summary.temp_dir, "workspace");
    debug!(value = %summary.check_md5_disabled, "check_md5_disabled");
    debug!(value = ?summary.resource_files_mandatory, "resource_files.mandatory");
    debug!(value = ?summary.resource_files_optional, "resource_files.optional");
    debug!(value = ?summary.resource_files_skip, "resource_files.skip");
    debug!(value = ?summary.platform_versions, "platform_versions");
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::io::config::{RESOURCE_FILES_MANDATORY, RESOURCE_FILES_SKIP};
    use crate::test_support::{make_dir, set_age, write_config};

    fn options(temp_root: PathBuf, search: Vec<PathBuf>) -> StartupOptions {
        StartupOptions {
            config_path: None,
            debug: false,
            trace: false,
            temp_root,
            search_paths: search,
            stale_after: STALE_AFTER,
        }
    }

    #[test]
    fn bootstrap_reaches_ready_with_private_workspace() {
        let temp = tempfile::tempdir().expect("tempdir");
        let stale = make_dir(temp.path(), "wum-uc-abandoned");
        set_age(&stale, Duration::from_secs(3 * 60 * 60)).expect("age");

        let session = bootstrap(&options(temp.path().to_path_buf(), Vec::new())).expect("bootstrap");

        assert_eq!(session.stage, Stage::Ready);
        assert_eq!(session.level, LogLevel::Default);
        assert!(!stale.exists());
        assert_eq!(session.reclaimed.removed, vec![stale]);
        assert!(session.workspace.is_dir());
        assert_eq!(session.workspace.parent(), Some(temp.path()));
        assert_eq!(session.config.temp_dir(), Some(session.workspace.clone()));
        assert_eq!(session.config.source(), &ConfigSource::NotFound);
    }

    #[test]
    fn bootstrap_loads_discovered_file_without_touching_workspace_key() {
        let temp = tempfile::tempdir().expect("tempdir");
        let conf = tempfile::tempdir().expect("tempdir");
        write_config(
            conf.path(),
            "config.toml",
            "temp_dir = \"/nope\"\n[resource_files]\nskip = [\"SKIP.md\"]\n",
        );

        let session = bootstrap(&options(
            temp.path().to_path_buf(),
            vec![conf.path().to_path_buf()],
        ))
        .expect("bootstrap");

        assert_eq!(session.config.get_list(RESOURCE_FILES_SKIP), vec!["SKIP.md"]);
        assert_eq!(session.config.get_list(RESOURCE_FILES_MANDATORY).len(), 3);
        assert_eq!(session.config.temp_dir(), Some(session.workspace.clone()));
    }

    #[test]
    fn debug_flag_selects_debug_level() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut opts = options(temp.path().to_path_buf(), Vec::new());
        opts.debug = true;
        opts.trace = true;

        let session = bootstrap(&opts).expect("bootstrap");

        assert_eq!(session.level, LogLevel::Debug);
    }

    #[test]
    fn missing_temp_root_aborts_before_provisioning() {
        let temp = tempfile::tempdir().expect("tempdir");
        let missing = temp.path().join("missing");

        let err = bootstrap(&options(missing.clone(), Vec::new())).unwrap_err();

        assert!(format!("{err:#}").contains("unable to read temp root"));
        assert!(!missing.exists());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn non_utf8_temp_root_is_rejected() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path().join(OsStr::from_bytes(b"root-\xff"));
        fs::create_dir(&root).expect("create non-utf8 root");

        let err = bootstrap(&options(root, Vec::new())).unwrap_err();

        assert!(format!("{err:#}").contains("not valid UTF-8"));
    }

    #[test]
    fn workspace_outlives_session() {
        let temp = tempfile::tempdir().expect("tempdir");
        let workspace = bootstrap(&options(temp.path().to_path_buf(), Vec::new()))
            .expect("bootstrap")
            .workspace;
        assert!(workspace.is_dir());
        let entries = fs::read_dir(temp.path()).expect("read").count();
        assert_eq!(entries, 1);
    }
}
