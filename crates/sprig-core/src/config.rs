//! Settings loaded from `$SPRIG_HOME/config.toml`.
//!
//! The file is read once at startup into an immutable [`Settings`] value that
//! callers pass down explicitly. Named sections (`[mirror.<name>]`) are also
//! reachable through the [`ConfigSource`] trait, which is the only view the
//! mirror resolver needs.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid config value: {0}")]
    Invalid(#[from] toml::de::Error),
}

/// Read-only access to named configuration sections.
pub trait ConfigSource {
    /// Names of all sections of the given kind, in file order.
    fn section_names(&self, kind: &str) -> Vec<String>;

    /// A string value from section `[kind.name]`.
    fn value(&self, kind: &str, name: &str, key: &str) -> Option<String>;
}

/// A parsed configuration document.
#[derive(Debug, Clone, Default)]
pub struct TomlConfig {
    table: toml::Table,
}

impl TomlConfig {
    /// Parse configuration text.
    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        Ok(Self {
            table: text.parse()?,
        })
    }

    /// Load configuration from `path`. A missing file yields an empty config.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        Self::parse(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn section(&self, kind: &str) -> Option<&toml::Table> {
        self.table.get(kind).and_then(toml::Value::as_table)
    }
}

impl ConfigSource for TomlConfig {
    fn section_names(&self, kind: &str) -> Vec<String> {
        self.section(kind)
            .map(|t| t.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn value(&self, kind: &str, name: &str, key: &str) -> Option<String> {
        self.section(kind)?
            .get(name)?
            .as_table()?
            .get(key)?
            .as_str()
            .map(str::to_string)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSettings {
    packages: Option<PathBuf>,
    install: Option<PathBuf>,
    checksum: Option<bool>,
    stage: RawStage,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawStage {
    path: Option<PathBuf>,
    use_tmp: Option<bool>,
    tmp_dirs: Option<Vec<String>>,
}

/// Everything a stage needs to place itself on disk and find mirrors.
#[derive(Debug, Clone)]
pub struct StageConfig {
    /// Directory holding every stage (named stages live at `stage_root/<name>`).
    pub stage_root: PathBuf,
    /// Put stage contents under a temp root and symlink them into `stage_root`.
    pub use_tmp_stage: bool,
    /// Candidate temp roots, tried in order; `%u` already expanded.
    pub tmp_dirs: Vec<PathBuf>,
    /// Mirror base URLs, tried in order before the primary source.
    pub mirrors: Vec<String>,
}

impl StageConfig {
    /// A config that stages directly under `stage_root` with no mirrors.
    pub fn new(stage_root: impl Into<PathBuf>) -> Self {
        Self {
            stage_root: stage_root.into(),
            use_tmp_stage: false,
            tmp_dirs: Vec::new(),
            mirrors: Vec::new(),
        }
    }

    /// Enable temp staging over the given candidate roots.
    pub fn with_tmp_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.use_tmp_stage = true;
        self.tmp_dirs = dirs;
        self
    }

    /// Use the given mirror bases.
    pub fn with_mirrors(mut self, mirrors: Vec<String>) -> Self {
        self.mirrors = mirrors;
        self
    }
}

/// Immutable runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub packages_root: PathBuf,
    pub install_root: PathBuf,
    /// Refuse to fetch versions that have no known checksum.
    pub checksum: bool,
    pub stage: StageConfig,
}

impl Settings {
    /// Load settings from `$SPRIG_HOME/config.toml`.
    pub fn load() -> Result<Self, ConfigError> {
        let config = TomlConfig::load(&crate::config_path())?;
        Self::from_config(&config, &crate::sprig_home())
    }

    /// Build settings from a parsed document, resolving relative paths
    /// against `home`.
    pub fn from_config(config: &TomlConfig, home: &Path) -> Result<Self, ConfigError> {
        let raw: RawSettings = toml::Value::Table(config.table.clone()).try_into()?;
        let resolve = |p: Option<PathBuf>, default: &str| match p {
            Some(p) if p.is_absolute() => p,
            Some(p) => home.join(p),
            None => home.join(default),
        };

        let user = current_user();
        let tmp_dirs = raw
            .stage
            .tmp_dirs
            .unwrap_or_else(default_tmp_dirs)
            .iter()
            .map(|d| PathBuf::from(d.replace("%u", &user)))
            .collect();

        Ok(Self {
            packages_root: resolve(raw.packages, "packages"),
            install_root: resolve(raw.install, "opt"),
            checksum: raw.checksum.unwrap_or(true),
            stage: StageConfig {
                stage_root: resolve(raw.stage.path, "stage"),
                use_tmp_stage: raw.stage.use_tmp.unwrap_or(true),
                tmp_dirs,
                mirrors: crate::mirror::mirror_bases(config),
            },
        })
    }
}

fn default_tmp_dirs() -> Vec<String> {
    let mut dirs = vec!["/var/tmp/%u".to_string(), "/tmp/%u".to_string()];
    let system = std::env::temp_dir().join("%u").to_string_lossy().into_owned();
    if !dirs.contains(&system) {
        dirs.push(system);
    }
    dirs
}

fn current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("LOGNAME"))
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "sprig".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
checksum = false
packages = "recipes"

[stage]
path = "/scratch/stage"
use_tmp = false
tmp_dirs = ["/nfs/tmp/%u", "/tmp"]

[mirror.primary]
url = "https://mirror.example.com/sprig/"

[mirror.local]
url = "file:///srv/mirror"
"#;

    #[test]
    fn test_sections_keep_file_order() {
        let config = TomlConfig::parse(SAMPLE).unwrap();
        assert_eq!(config.section_names("mirror"), vec!["primary", "local"]);
        assert_eq!(
            config.value("mirror", "local", "url").as_deref(),
            Some("file:///srv/mirror")
        );
        assert_eq!(config.value("mirror", "missing", "url"), None);
        assert!(config.section_names("compiler").is_empty());
    }

    #[test]
    fn test_settings_from_config() {
        let config = TomlConfig::parse(SAMPLE).unwrap();
        let settings = Settings::from_config(&config, Path::new("/home/me/.sprig")).unwrap();

        assert!(!settings.checksum);
        assert_eq!(settings.packages_root, Path::new("/home/me/.sprig/recipes"));
        assert_eq!(settings.install_root, Path::new("/home/me/.sprig/opt"));
        assert_eq!(settings.stage.stage_root, Path::new("/scratch/stage"));
        assert!(!settings.stage.use_tmp_stage);
        assert_eq!(settings.stage.tmp_dirs.len(), 2);
        assert!(!settings.stage.tmp_dirs[0].to_string_lossy().contains("%u"));
        assert_eq!(settings.stage.tmp_dirs[1], Path::new("/tmp"));
        assert_eq!(
            settings.stage.mirrors,
            vec!["https://mirror.example.com/sprig", "file:///srv/mirror"]
        );
    }

    #[test]
    fn test_defaults_for_empty_config() {
        let settings =
            Settings::from_config(&TomlConfig::default(), Path::new("/home/me/.sprig")).unwrap();
        assert!(settings.checksum);
        assert!(settings.stage.use_tmp_stage);
        assert_eq!(settings.stage.stage_root, Path::new("/home/me/.sprig/stage"));
        assert!(!settings.stage.tmp_dirs.is_empty());
        assert!(settings.stage.mirrors.is_empty());
    }

    #[test]
    fn test_invalid_value_type() {
        let config = TomlConfig::parse("checksum = \"yes\"").unwrap();
        assert!(matches!(
            Settings::from_config(&config, Path::new("/h")),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let config = TomlConfig::load(&dir.path().join("config.toml")).unwrap();
        assert!(config.section_names("mirror").is_empty());
    }
}
