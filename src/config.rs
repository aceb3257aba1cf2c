//! Configuration: TOML file loading, CLI overrides, and defaults.
//!
//! Resolution order (first found wins, values merge/override):
//! 1. CLI flags (`--config`, `--sort`, `--show-hidden`, etc.)
//! 2. `$FM_LIST_CONFIG` environment variable (path to config file)
//! 3. Project-local `.fm-list.toml` in the current working directory
//! 4. Global `~/.config/fm-list/config.toml`
//! 5. Built-in defaults

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::model::policy::DEFAULT_COLLAPSE_DELAY_MS;
use crate::model::{SortAttribute, SortDirection, SortSpec};

// ── Section configs ──────────────────────────────────────────────────────────

/// General settings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory to list (overridden by CLI positional arg).
    pub default_path: Option<String>,
    /// Include hidden files.
    pub show_hidden: Option<bool>,
}

/// Tree ordering and expansion settings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TreeConfig {
    /// Sort attribute: "name", "size", "size_on_disk", "type", "modified",
    /// "accessed", "keywords".
    pub sort_by: Option<String>,
    /// Reverse the attribute order.
    pub descending: Option<bool>,
    /// Directories always listed first.
    pub dirs_first: Option<bool>,
    /// How long a collapsed directory stays loaded, in milliseconds.
    pub collapse_delay_ms: Option<u64>,
}

/// Directory watcher settings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct WatcherConfig {
    /// Keep applying live filesystem changes.
    pub enabled: Option<bool>,
    /// Debounce interval in milliseconds.
    pub debounce_ms: Option<u64>,
    /// Path components never shown or watched.
    pub ignore: Option<Vec<String>>,
}

// ── Top-level config ─────────────────────────────────────────────────────────

/// Top-level configuration.
///
/// All fields are optional so that partial configs from different sources
/// can be merged together (CLI overrides file, file overrides defaults).
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub tree: TreeConfig,
    pub watcher: WatcherConfig,
}

/// Default debounce interval in milliseconds.
pub const DEFAULT_DEBOUNCE_MS: u64 = 300;

/// Default patterns to ignore when listing and watching.
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    ".git",
    "node_modules",
    "__pycache__",
    "venv",
    ".venv",
    ".tox",
    ".mypy_cache",
    ".pytest_cache",
    "target",
];

// ── Config file locator ──────────────────────────────────────────────────────

/// Candidate config file paths in priority order, excluding `--config`.
fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Ok(env_path) = std::env::var("FM_LIST_CONFIG") {
        paths.push(PathBuf::from(env_path));
    }

    if let Ok(cwd) = std::env::current_dir() {
        paths.push(cwd.join(".fm-list.toml"));
    }

    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("fm-list").join("config.toml"));
    }

    paths
}

/// Try to read and parse a TOML config file. Returns `None` if the file
/// doesn't exist or can't be parsed (with a logged warning).
fn load_file(path: &Path) -> Option<AppConfig> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str::<AppConfig>(&content) {
        Ok(cfg) => {
            log::debug!("loaded config from {}", path.display());
            Some(cfg)
        }
        Err(e) => {
            log::warn!("failed to parse config file {}: {}", path.display(), e);
            None
        }
    }
}

// ── Merge logic ──────────────────────────────────────────────────────────────

impl AppConfig {
    /// Merge `other` on top of `self`; `other`'s `Some` values win.
    pub fn merge(self, other: &AppConfig) -> AppConfig {
        AppConfig {
            general: GeneralConfig {
                default_path: other
                    .general
                    .default_path
                    .clone()
                    .or(self.general.default_path),
                show_hidden: other.general.show_hidden.or(self.general.show_hidden),
            },
            tree: TreeConfig {
                sort_by: other.tree.sort_by.clone().or(self.tree.sort_by),
                descending: other.tree.descending.or(self.tree.descending),
                dirs_first: other.tree.dirs_first.or(self.tree.dirs_first),
                collapse_delay_ms: other
                    .tree
                    .collapse_delay_ms
                    .or(self.tree.collapse_delay_ms),
            },
            watcher: WatcherConfig {
                enabled: other.watcher.enabled.or(self.watcher.enabled),
                debounce_ms: other.watcher.debounce_ms.or(self.watcher.debounce_ms),
                ignore: other.watcher.ignore.clone().or(self.watcher.ignore),
            },
        }
    }

    /// Load the final merged configuration.
    ///
    /// `cli_config_path` is an explicit config file path from `--config`.
    /// `cli_overrides` are partial overrides derived from CLI flags.
    pub fn load(cli_config_path: Option<&Path>, cli_overrides: Option<&AppConfig>) -> AppConfig {
        let mut config = AppConfig::default();

        // Lowest priority first so higher-priority files overwrite.
        for path in candidate_paths().iter().rev() {
            if let Some(file_cfg) = load_file(path) {
                config = config.merge(&file_cfg);
            }
        }

        if let Some(cli_path) = cli_config_path {
            match load_file(cli_path) {
                Some(file_cfg) => config = config.merge(&file_cfg),
                None => log::warn!("config file {} not usable", cli_path.display()),
            }
        }

        if let Some(overrides) = cli_overrides {
            config = config.merge(overrides);
        }

        config
    }

    // ── Convenience getters with built-in defaults ──────────────────────────

    pub fn show_hidden(&self) -> bool {
        self.general.show_hidden.unwrap_or(false)
    }

    /// Sort attribute key, `"name"` by default.
    pub fn sort_by(&self) -> &str {
        self.tree.sort_by.as_deref().unwrap_or("name")
    }

    pub fn descending(&self) -> bool {
        self.tree.descending.unwrap_or(false)
    }

    /// Whether directories are listed before files.
    pub fn dirs_first(&self) -> bool {
        self.tree.dirs_first.unwrap_or(true)
    }

    /// The model sort order described by the `[tree]` section.
    pub fn sort_spec(&self) -> SortSpec {
        SortSpec {
            attribute: SortAttribute::from_str(self.sort_by()),
            direction: SortDirection::from_descending(self.descending()),
            directories_first: self.dirs_first(),
        }
    }

    pub fn collapse_delay_ms(&self) -> u64 {
        self.tree
            .collapse_delay_ms
            .unwrap_or(DEFAULT_COLLAPSE_DELAY_MS)
    }

    /// Whether the watcher is enabled.
    pub fn watcher_enabled(&self) -> bool {
        self.watcher.enabled.unwrap_or(true)
    }

    /// Watcher debounce interval in milliseconds.
    pub fn debounce_ms(&self) -> u64 {
        self.watcher.debounce_ms.unwrap_or(DEFAULT_DEBOUNCE_MS)
    }

    /// Ignored path components.
    pub fn ignore_patterns(&self) -> Vec<String> {
        match &self.watcher.ignore {
            Some(patterns) => patterns.clone(),
            None => DEFAULT_IGNORE_PATTERNS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_values() {
        let cfg = AppConfig::default();
        assert!(!cfg.show_hidden());
        assert_eq!(cfg.sort_by(), "name");
        assert!(!cfg.descending());
        assert!(cfg.dirs_first());
        assert_eq!(cfg.collapse_delay_ms(), 2000);
        assert!(cfg.watcher_enabled());
        assert_eq!(cfg.debounce_ms(), 300);
        assert!(cfg.ignore_patterns().contains(&".git".to_string()));
        assert_eq!(cfg.sort_spec(), SortSpec::default());
    }

    #[test]
    fn test_toml_parsing_full() {
        let toml = r#"
[general]
show_hidden = true

[tree]
sort_by = "size"
descending = true
dirs_first = false
collapse_delay_ms = 500

[watcher]
enabled = false
debounce_ms = 50
ignore = ["build"]
"#;
        let cfg: AppConfig = toml::from_str(toml).expect("parse failed");
        assert!(cfg.show_hidden());
        assert_eq!(cfg.collapse_delay_ms(), 500);
        assert!(!cfg.watcher_enabled());
        assert_eq!(cfg.debounce_ms(), 50);
        assert_eq!(cfg.ignore_patterns(), vec!["build".to_string()]);
        assert_eq!(
            cfg.sort_spec(),
            SortSpec {
                attribute: SortAttribute::Size,
                direction: SortDirection::Descending,
                directories_first: false,
            }
        );
    }

    #[test]
    fn test_unknown_sort_key_falls_back_to_name() {
        let cfg: AppConfig = toml::from_str("[tree]\nsort_by = \"colour\"").expect("parse");
        assert_eq!(cfg.sort_spec().attribute, SortAttribute::Name);
    }

    #[test]
    fn test_toml_parsing_empty() {
        let cfg: AppConfig = toml::from_str("").expect("parse failed");
        assert!(!cfg.show_hidden());
        assert!(cfg.dirs_first());
    }

    #[test]
    fn test_merge_overrides() {
        let base = AppConfig {
            general: GeneralConfig {
                show_hidden: Some(false),
                ..Default::default()
            },
            tree: TreeConfig {
                sort_by: Some("size".into()),
                dirs_first: Some(false),
                ..Default::default()
            },
            ..Default::default()
        };
        let over = AppConfig {
            general: GeneralConfig {
                show_hidden: Some(true),
                ..Default::default()
            },
            tree: TreeConfig {
                sort_by: Some("modified".into()),
                ..Default::default()
            },
            ..Default::default()
        };

        let merged = base.merge(&over);
        assert!(merged.show_hidden());
        assert_eq!(merged.sort_by(), "modified");
        assert!(!merged.dirs_first());
    }

    #[test]
    fn test_merge_none_does_not_clear_some() {
        let base = AppConfig {
            watcher: WatcherConfig {
                enabled: Some(false),
                debounce_ms: Some(500),
                ignore: Some(vec![]),
            },
            ..Default::default()
        };
        let merged = base.merge(&AppConfig::default());
        assert!(!merged.watcher_enabled());
        assert_eq!(merged.debounce_ms(), 500);
        assert!(merged.ignore_patterns().is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg_path = dir.path().join("test-config.toml");
        let mut f = std::fs::File::create(&cfg_path).expect("create");
        writeln!(
            f,
            r#"
[general]
show_hidden = true

[tree]
sort_by = "modified"
"#
        )
        .expect("write");

        let cfg = load_file(&cfg_path).expect("load");
        assert!(cfg.show_hidden());
        assert_eq!(cfg.sort_by(), "modified");
        assert_eq!(cfg.debounce_ms(), 300);
    }

    #[test]
    fn test_load_missing_file() {
        assert!(load_file(Path::new("/nonexistent/config.toml")).is_none());
    }

    #[test]
    fn test_load_invalid_toml_returns_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg_path = dir.path().join("bad.toml");
        std::fs::write(&cfg_path, "this is { not valid toml").expect("write");
        assert!(load_file(&cfg_path).is_none());
    }

    #[test]
    fn test_load_with_cli_overrides() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg_path = dir.path().join("config.toml");
        std::fs::write(
            &cfg_path,
            r#"
[general]
show_hidden = true

[tree]
sort_by = "type"
"#,
        )
        .expect("write");

        let cli_overrides = AppConfig {
            tree: TreeConfig {
                sort_by: Some("size".into()),
                ..Default::default()
            },
            ..Default::default()
        };

        let cfg = AppConfig::load(Some(&cfg_path), Some(&cli_overrides));
        assert_eq!(cfg.sort_by(), "size");
        assert!(cfg.show_hidden());
    }
}
