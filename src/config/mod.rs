// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Configuration management for Sortwise
//!
//! An [`AppConfig`] is built once (config file plus CLI overrides), checked
//! with [`AppConfig::validate`] and then shared read-only behind an `Arc`.
//! Every component receives it explicitly.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::categories;
use crate::record::FileKind;
use crate::{Result, SortwiseError};

/// Main application configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    /// Directories to organize and watch
    pub watch_paths: Vec<String>,

    /// Destination root for sorted files (defaults to each source root)
    #[serde(default)]
    pub output_dir: Option<String>,

    /// Traversal and filter settings
    #[serde(default)]
    pub scan: ScanConfig,

    /// Sorting, dedup and archive rules
    #[serde(default)]
    pub rules: RuleConfig,

    /// AI engine configuration
    #[serde(default)]
    pub ai_engine: EngineConfig,

    /// Watch mode settings
    #[serde(default)]
    pub watch: WatchConfig,

    /// Database settings
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Move journal settings
    #[serde(default)]
    pub history: HistoryConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ScanConfig {
    /// Maximum depth below the root; 1 means only files directly inside it
    #[serde(default)]
    pub max_depth: Option<usize>,
    #[serde(default)]
    pub include_hidden: bool,
    /// Only these extensions are processed when non-empty
    #[serde(default)]
    pub file_types: Vec<String>,
    /// Only these file kinds ("image", "document", ...) when non-empty
    #[serde(default)]
    pub domains: Vec<String>,
    /// Glob patterns excluded from the walk
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// What happens to a file classified as a duplicate
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateAction {
    /// Leave the duplicate where it is
    #[default]
    Skip,
    /// Move it into the quarantine directory
    Quarantine,
    /// Remove it
    Delete,
}

impl FromStr for DuplicateAction {
    type Err = SortwiseError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "quarantine" => Ok(Self::Quarantine),
            "delete" => Ok(Self::Delete),
            other => Err(SortwiseError::Config(format!("Unknown duplicate action: {}", other))),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RuleConfig {
    /// Add a per-extension subdirectory under each category
    #[serde(default)]
    pub sort_by_type: bool,
    #[serde(default = "default_true")]
    pub deduplicate: bool,
    /// Deduplicate against every previous run (implies `deduplicate`)
    #[serde(default)]
    pub global_dedup: bool,
    #[serde(default)]
    pub duplicate_action: DuplicateAction,
    #[serde(default = "default_quarantine_dir")]
    pub quarantine_dir: String,
    #[serde(default)]
    pub custom_categories: Vec<String>,
    #[serde(default = "default_fallback_category")]
    pub fallback_category: String,
    #[serde(default)]
    pub extract_archives: bool,
    /// Remove archives after a successful extraction (needs `extract_archives`)
    #[serde(default)]
    pub delete_archives: bool,
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EngineConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_engine_url")]
    pub url: String,
    #[serde(default = "default_text_model")]
    pub model: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_retries")]
    pub retries: u32,
    /// Upper bound on classifier calls in flight
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Bytes of text content sent along with the metadata
    #[serde(default = "default_excerpt_bytes")]
    pub excerpt_bytes: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WatchConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Maximum time spent waiting for a file to stop growing
    #[serde(default = "default_stability_timeout")]
    pub stability_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HistoryConfig {
    #[serde(default = "default_history_path")]
    pub path: String,
}

// Default value functions
fn default_true() -> bool { true }
fn default_engine_url() -> String { "http://localhost:11434".to_string() }
fn default_text_model() -> String { "llama3.2:3b".to_string() }
fn default_timeout() -> u64 { 30 }
fn default_retries() -> u32 { 1 }
fn default_max_concurrent() -> usize { 4 }
fn default_excerpt_bytes() -> usize { 2048 }
fn default_debounce_ms() -> u64 { 300 }
fn default_stability_timeout() -> u64 { 10 }
fn default_quarantine_dir() -> String { ".duplicates".to_string() }
fn default_fallback_category() -> String { "Uncategorized".to_string() }
fn default_db_path() -> String { "sortwise.db".to_string() }
fn default_history_path() -> String { "sortwise_history.jsonl".to_string() }

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            watch_paths: vec!["./inbox".to_string()],
            output_dir: None,
            scan: ScanConfig::default(),
            rules: RuleConfig::default(),
            ai_engine: EngineConfig::default(),
            watch: WatchConfig::default(),
            database: DatabaseConfig::default(),
            history: HistoryConfig::default(),
        }
    }
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            sort_by_type: false,
            deduplicate: true,
            global_dedup: false,
            duplicate_action: DuplicateAction::Skip,
            quarantine_dir: default_quarantine_dir(),
            custom_categories: Vec::new(),
            fallback_category: default_fallback_category(),
            extract_archives: false,
            delete_archives: false,
            dry_run: false,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: default_engine_url(),
            model: default_text_model(),
            timeout_secs: default_timeout(),
            retries: default_retries(),
            max_concurrent: default_max_concurrent(),
            excerpt_bytes: default_excerpt_bytes(),
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            debounce_ms: default_debounce_ms(),
            stability_timeout_secs: default_stability_timeout(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: default_db_path() }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { path: default_history_path() }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = serde_json::from_str(&content)
                .map_err(|e| SortwiseError::Config(format!("Failed to parse config: {}", e)))?;
            Ok(config)
        } else {
            tracing::info!("Config file not found at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject invalid or contradictory settings before any file is touched.
    pub fn validate(&self) -> Result<()> {
        if self.watch_paths.is_empty() {
            return Err(SortwiseError::Config("No source directories configured".to_string()));
        }
        if self.scan.max_depth == Some(0) {
            return Err(SortwiseError::Config("max_depth must be at least 1".to_string()));
        }
        if self.ai_engine.max_concurrent == 0 {
            return Err(SortwiseError::Config("max_concurrent must be at least 1".to_string()));
        }
        if self.ai_engine.timeout_secs == 0 {
            return Err(SortwiseError::Config("timeout_secs must be at least 1".to_string()));
        }
        if self.watch.debounce_ms == 0 {
            return Err(SortwiseError::Config("debounce_ms must be at least 1".to_string()));
        }
        if self.rules.duplicate_action == DuplicateAction::Quarantine
            && self.rules.quarantine_dir.trim().is_empty()
        {
            return Err(SortwiseError::Config(
                "duplicate_action is quarantine but quarantine_dir is empty".to_string(),
            ));
        }

        check_category_name(&self.rules.fallback_category)?;
        for name in categories::resolve(self) {
            check_category_name(&name)?;
        }

        for domain in &self.scan.domains {
            FileKind::from_str(domain)?;
        }
        for pattern in &self.scan.exclude {
            glob::Pattern::new(pattern)?;
        }

        if self.rules.delete_archives && !self.rules.extract_archives {
            tracing::warn!("delete_archives has no effect while extract_archives is off");
        }

        Ok(())
    }

    /// Local dedup is on whenever either dedup flag is set.
    pub fn dedup_enabled(&self) -> bool {
        self.rules.deduplicate || self.rules.global_dedup
    }

    pub fn global_dedup_enabled(&self) -> bool {
        self.rules.global_dedup
    }

    /// Archives are only ever deleted as part of an extraction.
    pub fn deletes_archives(&self) -> bool {
        self.rules.extract_archives && self.rules.delete_archives
    }

    /// Destination root for files found under `root`.
    pub fn output_root(&self, root: &Path) -> PathBuf {
        match &self.output_dir {
            Some(dir) => PathBuf::from(dir),
            None => root.to_path_buf(),
        }
    }

    /// Quarantine location for duplicates found under `root`.
    pub fn quarantine_root(&self, root: &Path) -> PathBuf {
        let dir = Path::new(&self.rules.quarantine_dir);
        if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            root.join(dir)
        }
    }

    /// Configured source roots
    pub fn roots(&self) -> Vec<PathBuf> {
        self.watch_paths.iter().map(PathBuf::from).collect()
    }

    /// Check an extension against the file-type filter.
    pub fn accepts_extension(&self, extension: &str) -> bool {
        self.scan.file_types.is_empty()
            || self.scan.file_types.iter().any(|t| {
                t.trim().trim_start_matches('.').eq_ignore_ascii_case(extension)
            })
    }

    /// Check a file kind against the domain filter.
    pub fn accepts_kind(&self, kind: FileKind) -> bool {
        self.scan.domains.is_empty()
            || self
                .scan
                .domains
                .iter()
                .any(|d| FileKind::from_str(d).map(|k| k == kind).unwrap_or(false))
    }
}

/// Category names become directory names.
fn check_category_name(name: &str) -> Result<()> {
    let trimmed = name.trim();
    if trimmed.is_empty()
        || trimmed == "."
        || trimmed == ".."
        || trimmed.contains(['/', '\\'])
    {
        return Err(SortwiseError::Config(format!("Invalid category name: {:?}", name)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.dedup_enabled());
        assert!(!config.deletes_archives());
    }

    #[test]
    fn test_global_dedup_implies_dedup() {
        let mut config = AppConfig::default();
        config.rules.deduplicate = false;
        config.rules.global_dedup = true;
        assert!(config.dedup_enabled());
    }

    #[test]
    fn test_delete_archives_inert_without_extraction() {
        let mut config = AppConfig::default();
        config.rules.delete_archives = true;
        assert!(!config.deletes_archives());
        config.rules.extract_archives = true;
        assert!(config.deletes_archives());
    }

    #[test]
    fn test_validate_rejects_bad_settings() {
        let mut config = AppConfig::default();
        config.scan.max_depth = Some(0);
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.rules.custom_categories = vec!["../escape".to_string()];
        assert!(matches!(config.validate(), Err(SortwiseError::Config(_))));

        let mut config = AppConfig::default();
        config.scan.domains = vec!["spaceship".to_string()];
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.ai_engine.max_concurrent = 0;
        assert!(config.validate().unwrap_err().is_fatal());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{ "watch_paths": ["/tmp/in"], "rules": { "global_dedup": true } }"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.watch.debounce_ms, 300);
        assert_eq!(config.rules.fallback_category, "Uncategorized");
        assert!(config.rules.deduplicate);
        assert!(config.global_dedup_enabled());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut config = AppConfig::default();
        config.rules.duplicate_action = DuplicateAction::Quarantine;
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.rules.duplicate_action, DuplicateAction::Quarantine);
    }

    #[test]
    fn test_filters() {
        let mut config = AppConfig::default();
        assert!(config.accepts_extension("pdf"));
        config.scan.file_types = vec![".PDF".to_string(), "txt".to_string()];
        assert!(config.accepts_extension("pdf"));
        assert!(!config.accepts_extension("jpg"));

        config.scan.domains = vec!["image".to_string()];
        assert!(config.accepts_kind(FileKind::Image));
        assert!(!config.accepts_kind(FileKind::Code));
    }
}
