use crate::catalog::Catalog;
use crate::error::{RegistryError, Result};
use crate::paths;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// SchoolConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchoolConfig {
    #[serde(default = "default_school_name")]
    pub name: String,
}

fn default_school_name() -> String {
    "اعدادية الديوانية الصناعية".to_string()
}

impl Default for SchoolConfig {
    fn default() -> Self {
        Self {
            name: default_school_name(),
        }
    }
}

// ---------------------------------------------------------------------------
// SearchConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_search_limit")]
    pub limit: usize,
}

fn default_search_limit() -> usize {
    100
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            limit: default_search_limit(),
        }
    }
}

// ---------------------------------------------------------------------------
// AuditConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Entries returned by an audit read when the caller gives no limit.
    #[serde(default = "default_tail")]
    pub default_tail: usize,
}

fn default_tail() -> usize {
    500
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            default_tail: default_tail(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub school: SchoolConfig,
    #[serde(default)]
    pub catalog: Catalog,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub audit: AuditConfig,
}

fn default_version() -> u32 {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: 1,
            school: SchoolConfig::default(),
            catalog: Catalog::default(),
            search: SearchConfig::default(),
            audit: AuditConfig::default(),
        }
    }
}

static TRACK_CODE_RE: OnceLock<Regex> = OnceLock::new();

fn track_code_re() -> &'static Regex {
    TRACK_CODE_RE.get_or_init(|| Regex::new(r"^[A-Z]{2}$").unwrap())
}

impl Config {
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(RegistryError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        crate::io::atomic_write(&path, self.to_yaml()?.as_bytes())
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = validate_catalog(&self.catalog);

        if self.search.limit == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "search.limit is 0: every search will return nothing".to_string(),
            });
        }

        warnings
    }
}

/// Catalog checks shared by `config validate`, `Registry::open` and catalog
/// reloads.
pub fn validate_catalog(catalog: &Catalog) -> Vec<ConfigWarning> {
    let mut warnings = Vec::new();
    let mut push = |level: WarnLevel, message: String| {
        warnings.push(ConfigWarning { level, message });
    };

    // Roll numbers embed the track code at a fixed width.
    let mut seen = HashSet::new();
    for track in &catalog.specialists {
        if !track_code_re().is_match(&track.code) {
            push(
                WarnLevel::Error,
                format!(
                    "specialist code '{}' must be two uppercase ASCII letters",
                    track.code
                ),
            );
        }
        if !seen.insert(track.code.as_str()) {
            push(
                WarnLevel::Error,
                format!("specialist code '{}' is used by more than one track", track.code),
            );
        }
        if track.short_name.trim().is_empty()
            || track.full_name.trim().is_empty()
            || track.machine_name.trim().is_empty()
        {
            push(
                WarnLevel::Warning,
                format!("specialist '{}' has an empty name field", track.code),
            );
        }
    }

    for (label, code) in &catalog.registry_types {
        if code.chars().count() != 1 {
            push(
                WarnLevel::Error,
                format!("registry type '{label}' maps to '{code}': code must be one character"),
            );
        }
    }

    warnings
}

/// Fail with a validation error when the catalog has any error-level finding.
pub fn ensure_catalog(catalog: &Catalog) -> Result<()> {
    let errors: Vec<String> = validate_catalog(catalog)
        .into_iter()
        .filter(|w| w.level == WarnLevel::Error)
        .map(|w| w.message)
        .collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(RegistryError::Validation(format!(
            "invalid catalog: {}",
            errors.join("; ")
        )))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
