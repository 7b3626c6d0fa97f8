//! Project configuration (`tabula.toml`).
//!
//! ```toml
//! sources = ["tables"]
//! generated_path = "src/config_tables.rs"
//! snapshot_path = "assets/config.bin"
//! continuation_path = "target/tabula/pending.json"
//! name_separator = "_"
//! container_name = "ConfigTables"
//! runtime_crate = "tabula_core"
//!
//! [rebuild]
//! command = ["cargo", "build"]
//! poll_interval_ms = 500
//! timeout_secs = 600
//! ```
//!
//! Every key is optional. Relative paths are resolved against the directory
//! holding the configuration file. A `.json` file with the same keys is
//! accepted too.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::coordinator::CoordinatorSettings;
use crate::emit::{self, EmitOptions};
use crate::naming::Naming;
use crate::rebuild::{CommandRebuild, RebuildError};
use crate::source::CsvSource;

/// File name looked up when no configuration path is given.
pub const DEFAULT_CONFIG_FILE: &str = "tabula.toml";

// ===========================================================================
// Errors
// ===========================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse error in {path}: {detail}")]
    Parse { path: PathBuf, detail: String },

    #[error("unsupported config format: {path}")]
    UnsupportedFormat { path: PathBuf },

    #[error("invalid value for '{key}': {detail}")]
    Invalid { key: &'static str, detail: String },
}

// ===========================================================================
// Types
// ===========================================================================

/// How the host program is rebuilt after code generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RebuildConfig {
    /// Program and arguments. Empty means the host is rebuilt out of band.
    pub command: Vec<String>,
    pub poll_interval_ms: u64,
    pub timeout_secs: u64,
}

impl Default for RebuildConfig {
    fn default() -> Self {
        Self {
            command: vec!["cargo".to_string(), "build".to_string()],
            poll_interval_ms: 500,
            timeout_secs: 600,
        }
    }
}

/// Settings for one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
    /// CSV files or directories of CSV files, read in order.
    pub sources: Vec<PathBuf>,
    pub generated_path: PathBuf,
    pub snapshot_path: PathBuf,
    pub continuation_path: PathBuf,
    pub name_separator: String,
    pub container_name: String,
    pub runtime_crate: String,
    pub rebuild: RebuildConfig,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            sources: vec![PathBuf::from("tables")],
            generated_path: PathBuf::from("src/config_tables.rs"),
            snapshot_path: PathBuf::from("assets/config.bin"),
            continuation_path: PathBuf::from("target/tabula/pending.json"),
            name_separator: "_".to_string(),
            container_name: "ConfigTables".to_string(),
            runtime_crate: "tabula_core".to_string(),
            rebuild: RebuildConfig::default(),
        }
    }
}

// ===========================================================================
// Loading
// ===========================================================================

impl ProjectConfig {
    /// Load the configuration at `path` and resolve its relative paths.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let parse_err = |detail: String| ConfigError::Parse {
            path: path.to_path_buf(),
            detail,
        };
        let config: ProjectConfig = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&content).map_err(|e| parse_err(e.to_string()))?,
            Some("json") => serde_json::from_str(&content).map_err(|e| parse_err(e.to_string()))?,
            _ => {
                return Err(ConfigError::UnsupportedFormat {
                    path: path.to_path_buf(),
                });
            }
        };
        config.validate()?;

        let base = path.parent().unwrap_or(Path::new(""));
        tracing::debug!(path = %path.display(), "loaded project config");
        Ok(config.resolved_against(base))
    }

    /// Load `tabula.toml` from `dir` if present, the defaults otherwise.
    pub fn discover(dir: &Path) -> Result<Self, ConfigError> {
        let path = dir.join(DEFAULT_CONFIG_FILE);
        if path.is_file() {
            Self::load(&path)
        } else {
            Ok(Self::default().resolved_against(dir))
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !emit::is_container_name(&self.container_name) {
            return Err(ConfigError::Invalid {
                key: "container_name",
                detail: format!(
                    "'{}' is not a capitalized type name free for generated code",
                    self.container_name
                ),
            });
        }
        if self.runtime_crate.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "runtime_crate",
                detail: "must not be empty".to_string(),
            });
        }
        if self.rebuild.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "rebuild.poll_interval_ms",
                detail: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Rewrite relative paths as `base`-relative.
    pub fn resolved_against(mut self, base: &Path) -> Self {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        self.sources.iter_mut().for_each(resolve);
        resolve(&mut self.generated_path);
        resolve(&mut self.snapshot_path);
        resolve(&mut self.continuation_path);
        self
    }

    // -----------------------------------------------------------------------
    // Derived settings
    // -----------------------------------------------------------------------

    pub fn emit_options(&self) -> EmitOptions {
        EmitOptions {
            naming: Naming::new(self.name_separator.clone()),
            container: self.container_name.clone(),
            runtime_crate: self.runtime_crate.clone(),
        }
    }

    pub fn coordinator_settings(&self) -> CoordinatorSettings {
        CoordinatorSettings {
            generated_path: self.generated_path.clone(),
            snapshot_path: self.snapshot_path.clone(),
            emit: self.emit_options(),
            poll_interval: Duration::from_millis(self.rebuild.poll_interval_ms),
            rebuild_timeout: Duration::from_secs(self.rebuild.timeout_secs),
        }
    }

    pub fn csv_sources(&self) -> Vec<CsvSource> {
        self.sources.iter().map(CsvSource::new).collect()
    }

    /// The configured rebuild command, or `None` when it is empty.
    pub fn rebuild_command(&self) -> Result<Option<CommandRebuild>, RebuildError> {
        if self.rebuild.command.is_empty() {
            return Ok(None);
        }
        CommandRebuild::from_argv(&self.rebuild.command).map(Some)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
