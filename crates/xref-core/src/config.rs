//! Configuration for an indexing run.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::CoreError;

/// Environment variable that overrides the configured platform tag.
pub const PLATFORM_ENV: &str = "XREF_PLATFORM";

/// Indexer configuration.
///
/// Built once per run and handed by reference to every component that needs
/// it. Nothing reads configuration from globals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerConfig {
    /// Root of the checked-in source tree
    #[serde(default)]
    pub src_dir: PathBuf,

    /// Root of the build output tree (generated files)
    #[serde(default)]
    pub obj_dir: PathBuf,

    /// Directory holding the per-file record databases
    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,

    /// Platform tag salted into symbols of generated files
    #[serde(default)]
    pub platform: String,

    /// String-literal prefixes indexed as URL references
    #[serde(default = "default_url_schemes")]
    pub url_schemes: Vec<String>,

    /// String-literal prefix that names a file in the source tree
    #[serde(default = "default_source_url_scheme")]
    pub source_url_scheme: String,

    /// Re-flowing of recorded macro expansions
    #[serde(default)]
    pub macro_reflow: MacroReflowConfig,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Macro expansion re-flow configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacroReflowConfig {
    /// Re-flow expansion text at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Size limit for expansions located in header-like files
    #[serde(default = "default_header_threshold")]
    pub header_threshold: usize,

    /// Size limit for expansions located anywhere else
    #[serde(default = "default_main_threshold")]
    pub main_threshold: usize,
}

fn default_out_dir() -> PathBuf {
    PathBuf::from("xref-out")
}

fn default_url_schemes() -> Vec<String> {
    vec!["chrome://".to_string(), "resource://".to_string()]
}

fn default_source_url_scheme() -> String {
    "moz-src:///".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_header_threshold() -> usize {
    20_000
}

fn default_main_threshold() -> usize {
    200_000
}

impl Default for MacroReflowConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            header_threshold: default_header_threshold(),
            main_threshold: default_main_threshold(),
        }
    }
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            src_dir: PathBuf::new(),
            obj_dir: PathBuf::new(),
            out_dir: default_out_dir(),
            platform: String::new(),
            url_schemes: default_url_schemes(),
            source_url_scheme: default_source_url_scheme(),
            macro_reflow: MacroReflowConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl IndexerConfig {
    /// Create a configuration for the given roots with defaults elsewhere.
    pub fn new(
        src_dir: impl Into<PathBuf>,
        obj_dir: impl Into<PathBuf>,
        out_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            src_dir: src_dir.into(),
            obj_dir: obj_dir.into(),
            out_dir: out_dir.into(),
            ..Default::default()
        }
    }

    /// Default location of the configuration file.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("xref")
            .join("config.yaml")
    }

    /// Load configuration from the default location, falling back to defaults
    pub fn load() -> Self {
        let config_path = Self::default_path();

        let config = if config_path.exists() {
            match Self::load_from(&config_path) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!(path = ?config_path, "Failed to load config file: {}", e);
                    Self::default()
                }
            }
        } else {
            Self::default()
        };

        config.with_env_overrides()
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Apply environment overrides (currently only the platform tag).
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(platform) = std::env::var(PLATFORM_ENV) {
            self.platform = platform;
        }
        self
    }

    /// Reject configurations that cannot classify any file.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.src_dir.as_os_str().is_empty() {
            return Err(CoreError::InvalidConfig("src_dir is not set".to_string()));
        }
        if self.obj_dir.as_os_str().is_empty() {
            return Err(CoreError::InvalidConfig("obj_dir is not set".to_string()));
        }
        if self.out_dir.as_os_str().is_empty() {
            return Err(CoreError::InvalidConfig("out_dir is not set".to_string()));
        }
        if self.url_schemes.iter().any(|s| s.is_empty()) {
            return Err(CoreError::InvalidConfig(
                "url_schemes must not contain empty prefixes".to_string(),
            ));
        }
        Ok(())
    }

    /// Source root as a string without a trailing separator.
    pub fn src_root(&self) -> String {
        trim_separator(&self.src_dir)
    }

    /// Build root as a string without a trailing separator.
    pub fn obj_root(&self) -> String {
        trim_separator(&self.obj_dir)
    }
}

fn trim_separator(path: &Path) -> String {
    let s = path.to_string_lossy();
    let trimmed = s.trim_end_matches(['/', '\\']);
    if trimmed.is_empty() && !s.is_empty() {
        // The filesystem root itself.
        return String::new();
    }
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = IndexerConfig::default();
        assert_eq!(config.out_dir, PathBuf::from("xref-out"));
        assert_eq!(config.url_schemes, vec!["chrome://", "resource://"]);
        assert_eq!(config.macro_reflow.header_threshold, 20_000);
        assert_eq!(config.macro_reflow.main_threshold, 200_000);
        assert!(config.macro_reflow.enabled);
    }

    #[test]
    fn test_config_serialization() {
        let config = IndexerConfig::new("/src", "/obj", "/out");
        let json = serde_json::to_string(&config).unwrap();
        let parsed: IndexerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config.src_dir, parsed.src_dir);
        assert_eq!(config.obj_dir, parsed.obj_dir);
    }

    #[test]
    fn test_load_from_yaml_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "src_dir: /work/src\nobj_dir: /work/obj\nplatform: linux64\nmacro_reflow:\n  enabled: false\n",
        )
        .unwrap();

        let config = IndexerConfig::load_from(&path).unwrap();
        assert_eq!(config.src_dir, PathBuf::from("/work/src"));
        assert_eq!(config.platform, "linux64");
        assert!(!config.macro_reflow.enabled);
        assert_eq!(config.macro_reflow.header_threshold, 20_000);
        assert_eq!(config.out_dir, PathBuf::from("xref-out"));
    }

    #[test]
    fn test_load_from_invalid_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "src_dir: [unterminated").unwrap();

        let err = IndexerConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, CoreError::Serialization(_)));
    }

    #[test]
    fn test_validate_requires_roots() {
        assert!(IndexerConfig::default().validate().is_err());
        assert!(IndexerConfig::new("/src", "/obj", "/out").validate().is_ok());
    }

    #[test]
    fn test_roots_drop_trailing_separator() {
        let config = IndexerConfig::new("/work/src/", "/work/obj//", "/out");
        assert_eq!(config.src_root(), "/work/src");
        assert_eq!(config.obj_root(), "/work/obj");
    }
}
