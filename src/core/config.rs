//! Configuration: TOML file + `SRW_*` env overrides + defaults.

#![allow(missing_docs)]

use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, SrwError};
use crate::core::paths::{check_root_relative, excluded_ancestor};
use crate::logger::jsonl::{JsonlConfig, default_log_path};
use crate::rules::RuleSpec;

/// Full srw configuration model.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub deletion: DeletionConfig,
    pub logging: LoggingConfig,
    /// Ordered rule set; later rules see the output of earlier ones.
    pub rules: Vec<RuleSpec>,
    /// File this config was loaded from (or would have been).
    #[serde(skip)]
    pub config_file: PathBuf,
}

/// Which files a run visits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    pub root: PathBuf,
    /// Case-sensitive file-name suffixes to rewrite.
    pub extensions: Vec<String>,
    /// Directory names never entered.
    pub excluded_dirs: Vec<String>,
    /// File-name suffixes skipped even when an extension matches.
    pub excluded_suffixes: Vec<String>,
    pub dry_run: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            extensions: vec![".ts".to_string(), ".tsx".to_string()],
            excluded_dirs: ["node_modules", ".git", "dist", "build"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            excluded_suffixes: vec![".d.ts".to_string()],
            dry_run: false,
        }
    }
}

/// Files removed before the walk, relative to the root.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DeletionConfig {
    pub paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    pub enabled: bool,
    pub jsonl_path: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            jsonl_path: default_log_path(),
        }
    }
}

impl LoggingConfig {
    pub fn jsonl_config(&self) -> JsonlConfig {
        JsonlConfig {
            path: self.jsonl_path.clone(),
            ..JsonlConfig::default()
        }
    }
}

impl Config {
    /// `$HOME/.config/srw/config.toml`.
    #[must_use]
    pub fn default_path() -> PathBuf {
        let home = env::var_os("HOME").map_or_else(|| PathBuf::from("/tmp"), PathBuf::from);
        home.join(".config/srw/config.toml")
    }

    /// Load config from the default or an explicit path, then apply env overrides.
    ///
    /// A missing file at the default path yields defaults; a missing explicit
    /// file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, env_var)
    }

    /// Like [`Config::load`], reading overrides through `lookup` instead of the
    /// process environment.
    pub fn load_with_env<F>(path: Option<&Path>, lookup: F) -> Result<Self>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| SrwError::io(&path_buf, source))?;
            Self::from_toml(&raw)?
        } else if path.is_some() {
            return Err(SrwError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.config_file = path_buf;
        cfg.apply_env_overrides_from(lookup)?;
        cfg.normalize();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse TOML without env overrides or validation.
    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// FNV-1a over the canonical JSON form; stable across processes and releases.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    pub fn excluded_dir_set(&self) -> BTreeSet<String> {
        self.engine.excluded_dirs.iter().cloned().collect()
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("SRW_ENGINE_ROOT") {
            self.engine.root = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("SRW_ENGINE_DRY_RUN") {
            self.engine.dry_run = parse_env_bool("SRW_ENGINE_DRY_RUN", &raw)?;
        }
        if let Some(raw) = lookup("SRW_ENGINE_EXTENSIONS") {
            self.engine.extensions = parse_env_list(&raw);
        }
        if let Some(raw) = lookup("SRW_ENGINE_EXCLUDED_DIRS") {
            self.engine.excluded_dirs = parse_env_list(&raw);
        }
        if let Some(raw) = lookup("SRW_ENGINE_EXCLUDED_SUFFIXES") {
            self.engine.excluded_suffixes = parse_env_list(&raw);
        }
        if let Some(raw) = lookup("SRW_LOGGING_ENABLED") {
            self.logging.enabled = parse_env_bool("SRW_LOGGING_ENABLED", &raw)?;
        }
        if let Some(raw) = lookup("SRW_LOGGING_JSONL_PATH") {
            self.logging.jsonl_path = PathBuf::from(raw);
        }
        Ok(())
    }

    fn normalize(&mut self) {
        let root = self.engine.root.to_string_lossy();
        if root.len() > 1 && root.ends_with('/') {
            self.engine.root = PathBuf::from(root.trim_end_matches('/'));
        }
        for list in [
            &mut self.engine.extensions,
            &mut self.engine.excluded_dirs,
            &mut self.engine.excluded_suffixes,
        ] {
            for item in list.iter_mut() {
                *item = item.trim().to_string();
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.engine.root.as_os_str().is_empty() {
            return Err(invalid("engine.root must not be empty".to_string()));
        }
        if self.engine.extensions.is_empty() {
            return Err(invalid("engine.extensions must not be empty".to_string()));
        }
        if self.engine.extensions.iter().any(String::is_empty) {
            return Err(invalid("engine.extensions contains an empty entry".to_string()));
        }
        for dir in &self.engine.excluded_dirs {
            if dir.is_empty() || dir == "." || dir == ".." || dir.contains(['/', '\\']) {
                return Err(invalid(format!(
                    "engine.excluded_dirs entries must be plain directory names, got {dir:?}"
                )));
            }
        }
        if self.engine.excluded_suffixes.iter().any(String::is_empty) {
            return Err(invalid("engine.excluded_suffixes contains an empty entry".to_string()));
        }

        let excluded = self.excluded_dir_set();
        for path in &self.deletion.paths {
            check_root_relative(path)
                .map_err(|reason| invalid(format!("deletion path {}: {reason}", path.display())))?;
            if let Some(dir) = excluded_ancestor(path, &excluded) {
                return Err(invalid(format!(
                    "deletion path {} is inside excluded directory {dir:?}",
                    path.display()
                )));
            }
        }

        let mut ids = BTreeSet::new();
        for rule in &self.rules {
            if rule.id().trim().is_empty() {
                return Err(invalid(format!("a {} rule has an empty id", rule.kind())));
            }
            if !ids.insert(rule.id()) {
                return Err(SrwError::DuplicateRule {
                    rule_id: rule.id().to_string(),
                });
            }
        }

        if self.logging.enabled && self.logging.jsonl_path.as_os_str().is_empty() {
            return Err(invalid("logging.jsonl_path must be set when logging is enabled".to_string()));
        }
        Ok(())
    }
}

fn invalid(details: String) -> SrwError {
    SrwError::InvalidConfig { details }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn parse_env_bool(name: &str, raw: &str) -> Result<bool> {
    raw.trim()
        .parse::<bool>()
        .map_err(|error| SrwError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })
}

/// Comma-separated list; blank items are dropped.
fn parse_env_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn load_from(raw: &str, env: &HashMap<String, String>) -> Result<Config> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, raw).unwrap();
        Config::load_with_env(Some(&path), |name| env.get(name).cloned())
    }

    #[test]
    fn default_config_is_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let err = Config::load_with_env(Some(Path::new("/nonexistent/srw/config.toml")), |_| None)
            .unwrap_err();
        assert!(matches!(err, SrwError::MissingConfig { .. }));
    }

    #[test]
    fn sections_and_rules_parse() {
        let cfg = load_from(
            r#"
            [engine]
            root = "app/"
            extensions = [".ts", ".tsx", ".js"]
            dry_run = true

            [deletion]
            paths = ["components/BombaCard.tsx"]

            [logging]
            enabled = false

            [[rules]]
            kind = "literal"
            id = "rename"
            needle = "BombaOption"
            replacement = "PumpOption"
            "#,
            &HashMap::new(),
        )
        .unwrap();

        assert_eq!(cfg.engine.root, PathBuf::from("app"));
        assert_eq!(cfg.engine.extensions.len(), 3);
        assert!(cfg.engine.dry_run);
        assert_eq!(cfg.engine.excluded_dirs, EngineConfig::default().excluded_dirs);
        assert_eq!(cfg.deletion.paths, vec![PathBuf::from("components/BombaCard.tsx")]);
        assert!(!cfg.logging.enabled);
        assert_eq!(cfg.rules[0].id(), "rename");
    }

    #[test]
    fn env_overrides_apply() {
        let env = vars(&[
            ("SRW_ENGINE_ROOT", "/srv/app"),
            ("SRW_ENGINE_DRY_RUN", "true"),
            ("SRW_ENGINE_EXTENSIONS", ".js, .jsx ,"),
            ("SRW_ENGINE_EXCLUDED_DIRS", "vendor"),
            ("SRW_LOGGING_ENABLED", "false"),
        ]);
        let cfg = load_from("", &env).unwrap();
        assert_eq!(cfg.engine.root, PathBuf::from("/srv/app"));
        assert!(cfg.engine.dry_run);
        assert_eq!(cfg.engine.extensions, vec![".js", ".jsx"]);
        assert_eq!(cfg.engine.excluded_dirs, vec!["vendor"]);
        assert!(!cfg.logging.enabled);
    }

    #[test]
    fn invalid_env_bool_is_a_parse_error() {
        let err = load_from("", &vars(&[("SRW_ENGINE_DRY_RUN", "maybe")])).unwrap_err();
        assert!(matches!(err, SrwError::ConfigParse { context: "env", .. }));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = load_from("[engine\nroot = 1", &HashMap::new()).unwrap_err();
        assert_eq!(err.code(), "SRW-1003");
    }

    #[test]
    fn empty_extensions_rejected() {
        let mut cfg = Config::default();
        cfg.engine.extensions.clear();
        assert!(cfg.validate().unwrap_err().to_string().contains("extensions"));
    }

    #[test]
    fn excluded_dirs_must_be_names() {
        let mut cfg = Config::default();
        cfg.engine.excluded_dirs.push("src/generated".to_string());
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn unsafe_deletion_paths_rejected() {
        let mut cfg = Config::default();
        cfg.deletion.paths = vec![PathBuf::from("../outside.ts")];
        assert!(cfg.validate().unwrap_err().to_string().contains(".."));

        cfg.deletion.paths = vec![PathBuf::from("node_modules/x/index.ts")];
        assert!(cfg.validate().unwrap_err().to_string().contains("excluded"));
    }

    #[test]
    fn duplicate_rule_ids_rejected() {
        let err = load_from(
            r#"
            [[rules]]
            kind = "literal"
            id = "a"
            needle = "x"

            [[rules]]
            kind = "literal"
            id = "a"
            needle = "y"
            "#,
            &HashMap::new(),
        )
        .unwrap_err();
        assert_eq!(err.code(), "SRW-1202");
    }

    #[test]
    fn stable_hash_tracks_content() {
        let base = Config::default();
        assert_eq!(base.stable_hash().unwrap(), base.stable_hash().unwrap());
        let mut changed = base.clone();
        changed.engine.dry_run = true;
        assert_ne!(base.stable_hash().unwrap(), changed.stable_hash().unwrap());
    }

    #[test]
    fn toml_round_trip_preserves_rules() {
        let cfg = Config::from_toml(
            r#"
            [[rules]]
            kind = "import_relocation"
            id = "api"
            from = "lib/api"
            to = "lib/api-client"
            depths = [1, 2]
            "#,
        )
        .unwrap();
        let again = Config::from_toml(&cfg.to_toml().unwrap()).unwrap();
        assert_eq!(cfg.rules, again.rules);
    }
}
