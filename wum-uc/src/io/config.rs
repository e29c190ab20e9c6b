//! Resolved configuration for a `wum-uc` run.
//!
//! Values come from three layers (see [`crate::core::layers`]): built-in
//! defaults, one config file (explicit or discovered), and derived values set
//! by the program. The file layer is optional and fail-open: a missing or
//! malformed file leaves it empty and startup continues.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tracing::debug;

use crate::core::layers::{Layer, LayerKind, Layers, Value};

/// Base name of a config file (without extension).
pub const CONFIG_NAME: &str = "config";
/// Extensions tried during discovery, in order.
pub const CONFIG_EXTENSIONS: [&str; 2] = ["toml", "json"];
/// Per-user config directory under `$HOME`.
pub const USER_CONFIG_DIR: &str = ".wum-uc";

pub const RESOURCE_FILES_MANDATORY: &str = "resource_files.mandatory";
pub const RESOURCE_FILES_OPTIONAL: &str = "resource_files.optional";
pub const RESOURCE_FILES_SKIP: &str = "resource_files.skip";
pub const PLATFORM_VERSIONS: &str = "platform_versions";
pub const CHECK_MD5_DISABLED: &str = "check_md5_disabled";
/// Derived key holding the current run's workspace path.
pub const TEMP_DIR_KEY: &str = "temp_dir";

const DEFAULT_MANDATORY: [&str; 3] = [
    "update-descriptor.yaml",
    "LICENSE.txt",
    "NOT_A_CONTRIBUTION.txt",
];
const DEFAULT_OPTIONAL: [&str; 2] = ["instructions.txt", "bug_fixes.txt"];
const DEFAULT_SKIP: [&str; 1] = ["README.txt"];
const DEFAULT_PLATFORM_VERSIONS: [(&str, &str); 4] = [
    ("4.2.0", "turing"),
    ("4.3.0", "perlis"),
    ("4.4.0", "wilkes"),
    ("5.0.0", "hamming"),
];

/// Where the file layer came from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConfigSource {
    /// No file resolved yet, or none was found.
    #[default]
    NotFound,
    /// Loaded from the path given with `--config`.
    Explicit(PathBuf),
    /// Found by probing the search path.
    Discovered(PathBuf),
    /// A file was selected but could not be read or parsed.
    Unreadable { path: PathBuf, reason: String },
}

impl ConfigSource {
    /// Path of the file that populated the file layer, if any.
    pub fn loaded_path(&self) -> Option<&Path> {
        match self {
            ConfigSource::Explicit(path) | ConfigSource::Discovered(path) => Some(path),
            ConfigSource::NotFound | ConfigSource::Unreadable { .. } => None,
        }
    }
}

/// Effective values of the known keys, for diagnostics and `wum-uc config`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigSummary {
    pub config_file: Option<PathBuf>,
    pub temp_dir: Option<PathBuf>,
    pub check_md5_disabled: String,
    pub resource_files_mandatory: Vec<String>,
    pub resource_files_optional: Vec<String>,
    pub resource_files_skip: Vec<String>,
    pub platform_versions: BTreeMap<String, String>,
}

/// Layered configuration, built once at startup and read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    layers: Layers,
    source: ConfigSource,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the built-in fallback values. Idempotent.
    pub fn set_defaults(&mut self) {
        let mut defaults = Layer::default();
        defaults.insert(RESOURCE_FILES_MANDATORY, strings(&DEFAULT_MANDATORY));
        defaults.insert(RESOURCE_FILES_OPTIONAL, strings(&DEFAULT_OPTIONAL));
        defaults.insert(RESOURCE_FILES_SKIP, strings(&DEFAULT_SKIP));
        let versions: BTreeMap<String, String> = DEFAULT_PLATFORM_VERSIONS
            .iter()
            .map(|(version, name)| (version.to_string(), name.to_string()))
            .collect();
        defaults.insert(PLATFORM_VERSIONS, versions.into());
        self.layers.replace(LayerKind::Defaults, defaults);
    }

    /// Populate the file layer.
    ///
    /// A non-empty `explicit` path is used verbatim. Otherwise each directory
    /// in `search_paths` is checked for `config.toml` then `config.json`, and the
    /// first hit wins. Missing and malformed files are logged and leave the
    /// file layer empty.
    pub fn resolve(&mut self, explicit: Option<&Path>, search_paths: &[PathBuf]) -> &ConfigSource {
        let explicit = explicit.filter(|path| !path.as_os_str().is_empty());
        let (candidate, is_explicit) = match explicit {
            Some(path) => (Some(path.to_path_buf()), true),
            None => (discover(search_paths), false),
        };

        self.layers.replace(LayerKind::File, Layer::default());
        self.source = match candidate {
            None => {
                debug!("config file not found");
                ConfigSource::NotFound
            }
            Some(path) => match load_layer(&path) {
                Ok(layer) => {
                    debug!(path = %path.display(), "config file found");
                    self.layers.replace(LayerKind::File, layer);
                    if is_explicit {
                        ConfigSource::Explicit(path)
                    } else {
                        ConfigSource::Discovered(path)
                    }
                }
                Err(err) => {
                    let reason = format!("{err:#}");
                    debug!(path = %path.display(), reason = %reason, "config file not loaded");
                    ConfigSource::Unreadable { path, reason }
                }
            },
        };
        &self.source
    }

    /// Install a derived value; it wins over file and defaults.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.layers
            .layer_mut(LayerKind::Derived)
            .insert(key, value.into());
    }

    /// String value of `key`; empty when unset.
    pub fn get(&self, key: &str) -> String {
        self.layers.get(key)
    }

    /// List value of `key`; empty when unset.
    pub fn get_list(&self, key: &str) -> Vec<String> {
        self.layers.get_list(key)
    }

    /// String map value of `key`; empty when unset.
    pub fn get_map(&self, key: &str) -> BTreeMap<String, String> {
        self.layers.get_map(key)
    }

    /// Layer that supplies the effective value of `key`.
    pub fn origin(&self, key: &str) -> Option<LayerKind> {
        self.layers.resolve(key).map(|(kind, _)| kind)
    }

    pub fn source(&self) -> &ConfigSource {
        &self.source
    }

    /// Snapshot of the known keys.
    pub fn summary(&self) -> ConfigSummary {
        ConfigSummary {
            config_file: self.source.loaded_path().map(Path::to_path_buf),
            temp_dir: self.temp_dir(),
            check_md5_disabled: self.get(CHECK_MD5_DISABLED),
            resource_files_mandatory: self.get_list(RESOURCE_FILES_MANDATORY),
            resource_files_optional: self.get_list(RESOURCE_FILES_OPTIONAL),
            resource_files_skip: self.get_list(RESOURCE_FILES_SKIP),
            platform_versions: self.get_map(PLATFORM_VERSIONS),
        }
    }

    /// Current run's workspace path, once provisioned.
    pub fn temp_dir(&self) -> Option<PathBuf> {
        let value = self.get(TEMP_DIR_KEY);
        (!value.is_empty()).then(|| PathBuf::from(value))
    }
}

/// Directories searched when no explicit file is given: `.` then `~/.wum-uc`.
pub fn default_search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(".")];
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(USER_CONFIG_DIR));
    }
    paths
}

/// First `config.<ext>` file found in `search_paths`.
pub fn discover(search_paths: &[PathBuf]) -> Option<PathBuf> {
    search_paths.iter().find_map(|dir| {
        CONFIG_EXTENSIONS
            .iter()
            .map(|ext| dir.join(format!("{CONFIG_NAME}.{ext}")))
            .find(|candidate| candidate.is_file())
    })
}

/// Read and parse one config file into a layer.
///
/// `.json` files are parsed as JSON, everything else as TOML.
pub fn load_layer(path: &Path) -> Result<Layer> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let table = if is_json {
        let doc: serde_json::Value =
            serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
        match json_value(doc) {
            Some(Value::Table(table)) => table,
            _ => bail!("parse {}: top level must be an object", path.display()),
        }
    } else {
        let doc: toml::Table =
            toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
        toml_table(doc)
    };
    Ok(Layer::from_table(table))
}

fn strings(items: &[&str]) -> Value {
    Value::List(items.iter().map(|s| s.to_string()).collect())
}

fn toml_table(table: toml::Table) -> BTreeMap<String, Value> {
    table
        .into_iter()
        .map(|(k, v)| (k, toml_value(v)))
        .collect()
}

fn toml_value(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Array(items) => Value::List(items.into_iter().map(toml_scalar).collect()),
        toml::Value::Table(table) => Value::Table(toml_table(table)),
        other => Value::String(toml_scalar(other)),
    }
}

fn toml_scalar(value: toml::Value) -> String {
    match value {
        toml::Value::String(s) => s,
        other => other.to_string(),
    }
}

fn json_value(value: serde_json::Value) -> Option<Value> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(Value::String(s)),
        serde_json::Value::Array(items) => Some(Value::List(
            items
                .into_iter()
                .filter(|item| !item.is_null())
                .map(json_scalar)
                .collect(),
        )),
        serde_json::Value::Object(map) => Some(Value::Table(
            map.into_iter()
                .filter_map(|(k, v)| json_value(v).map(|v| (k, v)))
                .collect(),
        )),
        other => Some(Value::String(json_scalar(other))),
    }
}

fn json_scalar(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> Config {
        let mut cfg = Config::new();
        cfg.set_defaults();
        cfg
    }

    #[test]
    fn defaults_cover_known_keys() {
        let cfg = defaults();
        assert_eq!(
            cfg.get_list(RESOURCE_FILES_MANDATORY),
            vec!["update-descriptor.yaml", "LICENSE.txt", "NOT_A_CONTRIBUTION.txt"]
        );
        assert_eq!(cfg.get_list(RESOURCE_FILES_SKIP), vec!["README.txt"]);
        assert_eq!(
            cfg.get_map(PLATFORM_VERSIONS).get("4.4.0").map(String::as_str),
            Some("wilkes")
        );
        assert_eq!(cfg.get(CHECK_MD5_DISABLED), "");
        assert_eq!(cfg.origin(RESOURCE_FILES_SKIP), Some(LayerKind::Defaults));
    }

    #[test]
    fn set_defaults_is_idempotent() {
        let once = defaults();
        let mut twice = defaults();
        twice.set_defaults();
        assert_eq!(once, twice);
    }

    #[test]
    fn missing_explicit_file_falls_back_to_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut cfg = defaults();
        let missing = temp.path().join("missing.toml");

        let source = cfg.resolve(Some(missing.as_path()), &[]).clone();

        assert!(matches!(source, ConfigSource::Unreadable { ref path, .. } if path == &missing));
        assert_eq!(cfg.get_list(RESOURCE_FILES_SKIP), vec!["README.txt"]);
    }

    #[test]
    fn malformed_explicit_file_is_not_fatal() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "resource_files = [unterminated").expect("write");
        let mut cfg = defaults();

        let source = cfg.resolve(Some(path.as_path()), &[]).clone();

        assert!(matches!(source, ConfigSource::Unreadable { .. }));
        assert_eq!(cfg.origin(RESOURCE_FILES_MANDATORY), Some(LayerKind::Defaults));
    }

    #[test]
    fn explicit_file_overrides_defaults_per_leaf() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("custom.toml");
        fs::write(
            &path,
            "check_md5_disabled = true\n\n[resource_files]\nmandatory = [\"a.txt\"]\n",
        )
        .expect("write");
        let mut cfg = defaults();

        let source = cfg.resolve(Some(path.as_path()), &[]).clone();

        assert_eq!(source, ConfigSource::Explicit(path));
        assert_eq!(cfg.get_list(RESOURCE_FILES_MANDATORY), vec!["a.txt"]);
        assert_eq!(cfg.get_list(RESOURCE_FILES_OPTIONAL), vec!["instructions.txt", "bug_fixes.txt"]);
        assert_eq!(cfg.get(CHECK_MD5_DISABLED), "true");
    }

    #[test]
    fn explicit_path_skips_discovery() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("config.toml"), "platform_versions = { \"1.0\" = \"x\" }\n")
            .expect("write");
        let explicit = temp.path().join("other.toml");
        fs::write(&explicit, "[resource_files]\nskip = [\"SKIP.txt\"]\n").expect("write");
        let mut cfg = defaults();

        cfg.resolve(Some(explicit.as_path()), &[temp.path().to_path_buf()]);

        assert_eq!(cfg.get_list(RESOURCE_FILES_SKIP), vec!["SKIP.txt"]);
        assert!(cfg.get_map(PLATFORM_VERSIONS).contains_key("4.4.0"));
    }

    #[test]
    fn empty_explicit_path_uses_discovery() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "[resource_files]\nskip = [\"x\"]\n").expect("write");
        let mut cfg = defaults();

        let source = cfg
            .resolve(Some(Path::new("")), &[temp.path().to_path_buf()])
            .clone();

        assert_eq!(source, ConfigSource::Discovered(path));
    }

    #[test]
    fn discovery_takes_first_directory_and_prefers_toml() {
        let first = tempfile::tempdir().expect("tempdir");
        let second = tempfile::tempdir().expect("tempdir");
        fs::write(first.path().join("config.json"), r#"{"a": "json"}"#).expect("write");
        fs::write(first.path().join("config.toml"), "a = \"toml\"\n").expect("write");
        fs::write(second.path().join("config.toml"), "a = \"second\"\n").expect("write");
        let search = vec![
            first.path().join("absent"),
            first.path().to_path_buf(),
            second.path().to_path_buf(),
        ];

        assert_eq!(discover(&search), Some(first.path().join("config.toml")));

        let mut cfg = defaults();
        cfg.resolve(None, &search);
        assert_eq!(cfg.get("a"), "toml");
    }

    #[test]
    fn no_file_anywhere_is_not_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut cfg = defaults();
        let source = cfg.resolve(None, &[temp.path().to_path_buf()]).clone();
        assert_eq!(source, ConfigSource::NotFound);
        assert!(cfg.source().loaded_path().is_none());
    }

    #[test]
    fn json_files_are_coerced() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.json");
        fs::write(
            &path,
            r#"{"PLATFORM_VERSIONS": {"6.0.0": "carbon"}, "check_md5_disabled": false, "gone": null,
                "resource_files": {"skip": ["a", 1]}}"#,
        )
        .expect("write");
        let mut cfg = defaults();

        cfg.resolve(Some(path.as_path()), &[]);

        assert_eq!(cfg.get_map(PLATFORM_VERSIONS).len(), 1);
        assert_eq!(cfg.get(CHECK_MD5_DISABLED), "false");
        assert_eq!(cfg.get_list(RESOURCE_FILES_SKIP), vec!["a", "1"]);
        assert_eq!(cfg.origin("gone"), None);
    }

    #[test]
    fn derived_value_is_never_overridden_by_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "temp_dir = \"/from/file\"\n").expect("write");
        let mut cfg = defaults();
        cfg.set(TEMP_DIR_KEY, "/tmp/wum-uc-abc");

        cfg.resolve(Some(path.as_path()), &[]);

        assert_eq!(cfg.get(TEMP_DIR_KEY), "/tmp/wum-uc-abc");
        assert_eq!(cfg.temp_dir(), Some(PathBuf::from("/tmp/wum-uc-abc")));
    }

    #[test]
    fn separate_configs_share_nothing() {
        let mut a = defaults();
        a.set(TEMP_DIR_KEY, "/a");
        let b = defaults();
        assert_eq!(b.get(TEMP_DIR_KEY), "");
        assert!(b.temp_dir().is_none());
    }
}
