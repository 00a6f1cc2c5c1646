//! Campaign configuration (YAML).
//!
//! ```yaml
//! project: cultexec
//! data_dir: data/cultexec          # relative to this file
//! output_dir: output/cultexec      # relative to this file
//! breakpoints: [1, 2, 4, 8, 15, 29, 56]
//! token:
//!   label: EXEC
//!   sources: [exec_holders.csv]    # relative to data_dir, all mandatory
//! collections_dir: collections     # relative to data_dir
//! priority: [milady, remilio]
//! umbrellas:
//!   - name: remilia-family
//!     members: [radbro, schizoposters]
//! selection:
//!   max_group_size: 3
//! workers: 0
//! ```

use std::collections::HashSet;
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::allocator::selector::DEFAULT_MAX_GROUP_SIZE;
use crate::allocator::{CampaignPlan, PriorityList, SelectionPolicy, DEFAULT_BREAKPOINTS};
use crate::data::collections::UmbrellaRule;

pub const CONFIG_ENV_VAR: &str = "TIERMINT_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "tiermint.yaml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unable to read config '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("unable to parse config '{}': {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("invalid config '{}': {}", .path.display(), summarize(.report))]
    Invalid { path: PathBuf, report: ValidationReport },
}

fn summarize(report: &ValidationReport) -> String {
    report
        .errors()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ValidationSeverity {
    Error,
    Warning,
}

impl ValidationSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
        }
    }
}

impl fmt::Display for ValidationSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationDiagnostic {
    pub severity: ValidationSeverity,
    pub context: String,
    pub message: String,
}

impl fmt::Display for ValidationDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.context, self.message)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub diagnostics: Vec<ValidationDiagnostic>,
}

impl ValidationReport {
    pub fn push(
        &mut self,
        severity: ValidationSeverity,
        context: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.diagnostics.push(ValidationDiagnostic {
            severity,
            context: context.into(),
            message: message.into(),
        });
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    pub fn errors(&self) -> impl Iterator<Item = &ValidationDiagnostic> {
        self.diagnostics
            .iter()
            .filter(|diag| diag.severity == ValidationSeverity::Error)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenConfig {
    /// Symbol used in threshold tier names.
    pub label: String,
    /// Balance snapshots, relative to `data_dir`. Every one must yield rows.
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignConfig {
    pub project: String,
    pub data_dir: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_breakpoints")]
    pub breakpoints: Vec<f64>,
    pub token: TokenConfig,
    #[serde(default = "default_collections_dir")]
    pub collections_dir: PathBuf,
    #[serde(default)]
    pub priority: Vec<String>,
    #[serde(default)]
    pub umbrellas: Vec<UmbrellaRule>,
    #[serde(default)]
    pub selection: SelectionPolicy,
    /// Snapshot parsing threads; 0 uses every core.
    #[serde(default)]
    pub workers: usize,
    /// Directory relative paths resolve against (the config file's directory).
    #[serde(skip)]
    pub base_dir: PathBuf,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_breakpoints() -> Vec<f64> {
    DEFAULT_BREAKPOINTS.to_vec()
}

fn default_collections_dir() -> PathBuf {
    PathBuf::from("collections")
}

impl CampaignConfig {
    pub fn data_path(&self) -> PathBuf {
        self.base_dir.join(&self.data_dir)
    }

    pub fn output_path(&self) -> PathBuf {
        self.base_dir.join(&self.output_dir)
    }

    pub fn collections_path(&self) -> PathBuf {
        self.data_path().join(&self.collections_dir)
    }

    pub fn token_source_paths(&self) -> Vec<PathBuf> {
        let data = self.data_path();
        self.token.sources.iter().map(|source| data.join(source)).collect()
    }

    pub fn plan(&self) -> CampaignPlan {
        CampaignPlan {
            token_label: self.token.label.clone(),
            breakpoints: self.breakpoints.clone(),
            priorities: PriorityList::new(self.priority.iter().cloned()),
            policy: self.selection.clone(),
        }
    }

    pub fn validate(&self) -> ValidationReport {
        use ValidationSeverity::{Error, Warning};

        let mut report = ValidationReport::default();

        if self.project.trim().is_empty() {
            report.push(Error, "project", "must not be empty");
        }
        if self.token.label.trim().is_empty() {
            report.push(Error, "token.label", "must not be empty");
        }
        if self.token.sources.is_empty() {
            report.push(Error, "token.sources", "at least one balance snapshot is required");
        }

        if self.breakpoints.is_empty() {
            report.push(Error, "breakpoints", "at least one breakpoint is required");
        }
        for (index, pct) in self.breakpoints.iter().enumerate() {
            if !(pct.is_finite() && *pct > 0.0 && *pct <= 100.0) {
                report.push(
                    Error,
                    format!("breakpoints[{index}]"),
                    format!("{pct} is outside (0, 100]"),
                );
            }
        }
        for (index, pair) in self.breakpoints.windows(2).enumerate() {
            if pair[1] <= pair[0] {
                report.push(
                    Error,
                    format!("breakpoints[{}]", index + 1),
                    format!("{} does not exceed previous breakpoint {}", pair[1], pair[0]),
                );
            }
        }

        let mut seen = HashSet::new();
        for name in &self.priority {
            if !seen.insert(name.as_str()) {
                report.push(Warning, "priority", format!("'{name}' listed more than once"));
            }
        }

        let mut claimed: HashSet<&str> = HashSet::new();
        let mut umbrella_names: HashSet<&str> = HashSet::new();
        for rule in &self.umbrellas {
            let context = format!("umbrellas.{}", rule.name);
            if rule.name.trim().is_empty() {
                report.push(Error, "umbrellas", "umbrella name must not be empty");
            }
            if !umbrella_names.insert(rule.name.as_str()) {
                report.push(Error, context.clone(), "umbrella name defined more than once");
            }
            if rule.members.len() < 2 {
                report.push(Warning, context.clone(), "fewer than two members; merge is a rename");
            }
            for member in &rule.members {
                if !claimed.insert(member.as_str()) {
                    report.push(
                        Error,
                        context.clone(),
                        format!("'{member}' already belongs to another umbrella"),
                    );
                }
            }
        }

        let policy = &self.selection;
        if policy.max_group_size == 0 {
            report.push(Error, "selection.max_group_size", "must be at least 1");
        } else if policy.max_group_size > DEFAULT_MAX_GROUP_SIZE {
            report.push(
                Warning,
                "selection.max_group_size",
                format!(
                    "{} exceeds {DEFAULT_MAX_GROUP_SIZE}; the combination search grows as C(n, k)",
                    policy.max_group_size
                ),
            );
        }
        for (field, value) in [
            ("selection.priority_limit_factor", policy.priority_limit_factor),
            ("selection.large_limit_factor", policy.large_limit_factor),
            ("selection.default_limit_factor", policy.default_limit_factor),
        ] {
            if !(value.is_finite() && value > 0.0) {
                report.push(Error, field, format!("{value} must be positive"));
            }
        }
        for (field, value) in [
            ("selection.growth_weight", policy.growth_weight),
            ("selection.priority_weight", policy.priority_weight),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                report.push(Error, field, format!("{value} must be non-negative"));
            }
        }

        report
    }
}

/// Read and parse without validating.
pub fn read_config(path: impl AsRef<Path>) -> Result<CampaignConfig, ConfigError> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut config: CampaignConfig =
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    config.base_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    Ok(config)
}

/// Read, parse and validate. Any error-level diagnostic fails the load.
pub fn load_config(path: impl AsRef<Path>) -> Result<CampaignConfig, ConfigError> {
    let path = path.as_ref();
    let config = read_config(path)?;
    let report = config.validate();
    if report.has_errors() {
        return Err(ConfigError::Invalid {
            path: path.to_path_buf(),
            report,
        });
    }
    Ok(config)
}

/// Explicit path, else `TIERMINT_CONFIG`, else `tiermint.yaml`.
pub fn resolve_config_path(explicit: Option<&str>) -> PathBuf {
    explicit
        .map(PathBuf::from)
        .or_else(|| env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
