// content-index/src/config.rs
//! Index configuration.
//!
//! Sources, lowest priority first: built-in defaults, a TOML file, then
//! `CONTENT_INDEX_*` environment variables (e.g. `CONTENT_INDEX_UPDATE_INTERVAL_MS`).

use figment::{
    providers::{
        Env,
        Format,
        Serialized,
        Toml
    },
    Figment,
};
use serde::{
    Deserialize,
    Serialize
};
use std::path::{
    Path,
    PathBuf
};
use crate::{
    error::{
        IndexError,
        Result
    },
    util,
    walker::{
        WalkOptions,
        DEFAULT_EXTENSIONS
    },
};


pub const ENV_PREFIX: &str = "CONTENT_INDEX_";
pub const DEFAULT_CACHE_FILE: &str = "hash_path_cache.json";
pub const DEFAULT_UPDATE_INTERVAL_MS: u64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Scanned in order on every rebuild.
    pub roots: Vec<PathBuf>,
    pub cache_file: PathBuf,
    pub extensions: Vec<String>,
    pub update_interval_ms: u64,
    pub follow_symlinks: bool,
    /// Size of the hashing pool; `None` uses one worker per core.
    pub hash_threads: Option<usize>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            cache_file: PathBuf::from(DEFAULT_CACHE_FILE),
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            update_interval_ms: DEFAULT_UPDATE_INTERVAL_MS,
            follow_symlinks: false,
            hash_threads: None,
        }
    }
}

impl IndexConfig {
    /// Defaults plus the given roots and cache file, normalized like a
    /// loaded config so mapped paths are absolute.
    pub fn new<I, P>(roots: I, cache_file: impl Into<PathBuf>) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
            cache_file: cache_file.into(),
            ..Self::default()
        }
        .normalized()
    }

    /// Defaults < `path` (if it exists) < environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(Self::default()));
        if let Some(p) = path {
            figment = figment.merge(Toml::file(p));
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX));
        Self::extract(figment)
    }

    pub fn from_toml(toml: &str) -> Result<Self> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::string(toml));
        Self::extract(figment)
    }

    fn extract(figment: Figment) -> Result<Self> {
        let cfg: Self = figment
            .extract()
            .map_err(|e| IndexError::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg.normalized())
    }

    pub fn validate(&self) -> Result<()> {
        if self.update_interval_ms == 0 {
            return Err(IndexError::Config("update_interval_ms must be greater than zero".into()));
        }
        if self.hash_threads == Some(0) {
            return Err(IndexError::Config("hash_threads must be at least 1".into()));
        }
        if self.extensions.iter().any(|e| e.trim().trim_start_matches('.').is_empty()) {
            return Err(IndexError::Config("extensions must not contain empty entries".into()));
        }
        Ok(())
    }

    /// Absolute roots, expanded cache path, normalized extensions.
    pub fn normalized(mut self) -> Self {
        self.roots = self.roots.iter().map(|r| util::absolutize(r)).collect();
        if let Some(s) = self.cache_file.to_str() {
            self.cache_file = util::expand_path(s);
        }
        let mut seen = std::collections::HashSet::new();
        self.extensions = self
            .extensions
            .iter()
            .map(|e| util::normalize_extension(e))
            .filter(|e| seen.insert(e.clone()))
            .collect();
        self
    }

    pub fn walk_options(&self) -> WalkOptions {
        WalkOptions {
            extensions: self.extensions.iter().map(|e| util::normalize_extension(e)).collect(),
            follow_symlinks: self.follow_symlinks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_behavior() {
        let cfg = IndexConfig::default();
        assert_eq!(cfg.cache_file, PathBuf::from("hash_path_cache.json"));
        assert_eq!(cfg.extensions, vec![".jpg", ".jpeg", ".png", ".gif"]);
        assert_eq!(cfg.update_interval_ms, 86_400_000);
        assert!(!cfg.follow_symlinks);
    }

    #[test]
    fn toml_overrides_and_normalizes() {
        let cfg = IndexConfig::from_toml(
            r#"
            roots = ["/images", "/more/images"]
            cache_file = "/var/cache/idx.json"
            extensions = ["JPG", ".webp"]
            update_interval_ms = 43200000
            hash_threads = 4
            "#,
        )
        .unwrap();
        assert_eq!(cfg.roots, vec![PathBuf::from("/images"), PathBuf::from("/more/images")]);
        assert_eq!(cfg.extensions, vec![".jpg", ".webp"]);
        assert_eq!(cfg.update_interval_ms, 43_200_000);
        assert_eq!(cfg.hash_threads, Some(4));
    }

    #[test]
    fn rejects_zero_interval() {
        let err = IndexConfig::from_toml("update_interval_ms = 0").unwrap_err();
        assert!(matches!(err, IndexError::Config(_)));
    }

    #[test]
    fn rejects_zero_threads_and_blank_extensions() {
        assert!(IndexConfig::from_toml("hash_threads = 0").is_err());
        assert!(IndexConfig::from_toml(r#"extensions = ["."]"#).is_err());
    }

    #[test]
    fn new_makes_roots_absolute() {
        let cfg = IndexConfig::new(["photos", "/abs/images"], "cache.json");
        assert!(cfg.roots[0].is_absolute());
        assert!(cfg.roots[0].ends_with("photos"));
        assert_eq!(cfg.roots[1], PathBuf::from("/abs/images"));
    }

    #[test]
    fn relative_roots_become_absolute() {
        let cfg = IndexConfig::from_toml(r#"roots = ["pics"]"#).unwrap();
        assert!(cfg.roots[0].is_absolute());
        assert!(cfg.roots[0].ends_with("pics"));
    }
}
