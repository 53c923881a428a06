//! Configuration and the theater home directory.
//!
//! Everything persistent lives under one home directory:
//!
//! ```text
//! <home>/config.toml   user settings (optional)
//! <home>/handles.db    saved folder capability
//! ```

use std::path::{Path, PathBuf};

use dirs_next::home_dir;
use serde::{Deserialize, Serialize};

use crate::catalog::InspectOptions;
use crate::error::{Result, TheaterError};
use crate::metadata;
use crate::source::{Extensions, THEATER_EXTENSIONS};

/// Environment variable overriding the home directory.
pub const HOME_ENV: &str = "THEATER_HOME";

const CONFIG_FILE: &str = "config.toml";
const HANDLES_DB: &str = "handles.db";

/// Centralized default values.
pub struct ConfigDefaults;

impl ConfigDefaults {
    pub const PREFIX_BYTES: usize = metadata::RECOMMENDED_PREFIX_BYTES;
    pub const STRIP_PII: bool = false;
    pub const PII_REPLACEMENT: &'static str = metadata::DEFAULT_PII_REPLACEMENT;
    pub const AUTO_REQUEST_PERMISSION: bool = true;
}

fn default_extensions() -> Vec<String> {
    THEATER_EXTENSIONS.iter().map(|e| e.to_string()).collect()
}
fn default_prefix_bytes() -> usize {
    ConfigDefaults::PREFIX_BYTES
}
fn default_strip_pii() -> bool {
    ConfigDefaults::STRIP_PII
}
fn default_pii_replacement() -> String {
    ConfigDefaults::PII_REPLACEMENT.to_string()
}
fn default_auto_request_permission() -> bool {
    ConfigDefaults::AUTO_REQUEST_PERMISSION
}

/// User settings from `config.toml`. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Theater file extensions, matched case-insensitively.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// How many leading bytes to read for metadata.
    #[serde(default = "default_prefix_bytes")]
    pub prefix_bytes: usize,
    /// Strip session-name PII from export manifests by default.
    #[serde(default = "default_strip_pii")]
    pub strip_pii: bool,
    #[serde(default = "default_pii_replacement")]
    pub pii_replacement: String,
    /// Ask for permission again when restoring a saved folder.
    #[serde(default = "default_auto_request_permission")]
    pub auto_request_permission: bool,
    /// Where archives are written. Current directory if unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            prefix_bytes: default_prefix_bytes(),
            strip_pii: default_strip_pii(),
            pii_replacement: default_pii_replacement(),
            auto_request_permission: default_auto_request_permission(),
            export_dir: None,
        }
    }
}

impl Config {
    /// Load `<home>/config.toml`, or defaults if there is none.
    pub fn load(home: &Path) -> Result<Self> {
        let path = home.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)?;
        Self::parse(&content)
            .map_err(|e| TheaterError::Config(format!("{}: {}", path.display(), e)))
    }

    fn parse(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn extensions(&self) -> Extensions {
        Extensions::new(&self.extensions)
    }

    pub fn inspect_options(&self) -> InspectOptions {
        InspectOptions {
            prefix_bytes: self.prefix_bytes,
            pii_replacement: self.pii_replacement.clone(),
        }
    }
}

/// Resolve the home directory.
///
/// Precedence:
/// 1. `home_override` (from `--home`)
/// 2. `THEATER_HOME`
/// 3. `~/.theater`
pub fn resolve_home(home_override: Option<PathBuf>) -> Result<PathBuf> {
    resolve_home_from(home_override, std::env::var(HOME_ENV).ok())
}

fn resolve_home_from(
    home_override: Option<PathBuf>,
    env_home: Option<String>,
) -> Result<PathBuf> {
    if let Some(path) = home_override {
        return Ok(path);
    }
    if let Some(path) = env_home.filter(|p| !p.trim().is_empty()) {
        return Ok(PathBuf::from(path));
    }
    let home =
        home_dir().ok_or_else(|| TheaterError::Config("home directory not found".into()))?;
    Ok(home.join(".theater"))
}

/// Where the capability store keeps its database.
pub fn handles_db_path(home: &Path) -> PathBuf {
    home.join(HANDLES_DB)
}
