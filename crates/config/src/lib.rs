//! Configuration for bindery.
//!
//! Values are layered, later sources overriding earlier ones:
//!
//! 1. Built-in defaults.
//! 2. A configuration file: either the one passed to [`Config::load_from`],
//!    or `config.toml` in the platform configuration directory if it exists.
//!    TOML, YAML and JSON are accepted, chosen by file extension.
//! 3. Environment variables prefixed with `BINDERY_`, nested keys separated
//!    by `__` (e.g. `BINDERY_STORAGE__ROOT=/srv/books`).

pub mod error;

use crate::error::{ErrorKind, Result};
use bindery_extract::Placeholders;
use bindery_extract::models::{DEFAULT_COVER, UNKNOWN_AUTHOR};
use bindery_storage::{DEFAULT_COVER_DIR, DEFAULT_EBOOK_DIR, StorageLayout, validate_name};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::instrument;

/// Prefix of environment variables that override configuration values.
pub const ENV_PREFIX: &str = "BINDERY_";
const APPLICATION: &str = "bindery";

/// Where ingested files are stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Base directory; created on first ingestion.
    pub root: PathBuf,
    /// Subdirectory of `root` for raw ebook files.
    pub ebook_dir: String,
    /// Subdirectory of `root` for cover images.
    pub cover_dir: String,
}
impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: project_dirs().map(|dirs| dirs.data_dir().join("library")).unwrap_or_else(|| PathBuf::from("library")),
            ebook_dir: DEFAULT_EBOOK_DIR.to_string(),
            cover_dir: DEFAULT_COVER_DIR.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    /// Recorded as the cover path of books without a usable cover.
    pub default_cover: String,
    /// Recorded as the author of books that declare none.
    pub unknown_author: String,
}
impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            default_cover: DEFAULT_COVER.to_string(),
            unknown_author: UNKNOWN_AUTHOR.to_string(),
        }
    }
}

impl Config {
    /// Load from defaults, the platform configuration file (if present) and
    /// the environment.
    pub fn load() -> Result<Self> {
        let file = Self::default_path().filter(|path| path.is_file());
        Self::extract(file.as_deref())
    }

    /// Load from defaults, the given file and the environment. The file must
    /// exist.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            exn::bail!(ErrorKind::NotFound(path.to_path_buf()));
        }
        Self::extract(Some(path))
    }

    /// `config.toml` in the platform configuration directory.
    pub fn default_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
    }

    #[instrument(level = "debug")]
    fn extract(file: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(file) = file {
            figment = match file.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref() {
                Some("toml") => figment.merge(Toml::file(file)),
                Some("yaml" | "yml") => figment.merge(Yaml::file(file)),
                Some("json") => figment.merge(Json::file(file)),
                _ => exn::bail!(ErrorKind::Invalid(format!(
                    "unrecognised configuration file format: {}",
                    file.display()
                ))),
            };
        }
        let config: Self = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        tracing::debug!(root = %config.storage.root.display(), "Configuration loaded");
        Ok(config)
    }

    /// Check every value is usable.
    pub fn validate(&self) -> Result<()> {
        if self.storage.root.as_os_str().is_empty() {
            exn::bail!(ErrorKind::Invalid("storage.root must not be empty".into()));
        }
        for (key, dir) in [("storage.ebook_dir", &self.storage.ebook_dir), ("storage.cover_dir", &self.storage.cover_dir)] {
            validate_name(dir).or_raise(|| ErrorKind::Invalid(format!("{key} must be a single directory name")))?;
        }
        if self.storage.ebook_dir == self.storage.cover_dir {
            exn::bail!(ErrorKind::Invalid("storage.ebook_dir and storage.cover_dir must differ".into()));
        }
        if self.default_cover.trim().is_empty() {
            exn::bail!(ErrorKind::Invalid("default_cover must not be empty".into()));
        }
        if self.unknown_author.trim().is_empty() {
            exn::bail!(ErrorKind::Invalid("unknown_author must not be empty".into()));
        }
        Ok(())
    }

    pub fn layout(&self) -> Result<StorageLayout> {
        StorageLayout::with_dirs(&self.storage.root, &self.storage.ebook_dir, &self.storage.cover_dir)
            .or_raise(|| ErrorKind::Invalid("storage directories must be single directory names".into()))
    }

    pub fn placeholders(&self) -> Placeholders {
        Placeholders {
            default_cover: self.default_cover.clone(),
            unknown_author: self.unknown_author.clone(),
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", APPLICATION)
}
