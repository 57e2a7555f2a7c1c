//! Settings
//!
//! User-facing options and the tag vocabulary, loaded from YAML.
//!
//! # Example YAML Format
//!
//! ```yaml
//! report_malformed_task: false
//! unclassified_workflows_available_to_all_projects: true
//! priority_tags: [urgent, hi, lo]
//! tags:
//!   step_prefix: "#tpm/step/"
//! rate_limit:
//!   window_ms: 1000
//!   max_rate: 3.0
//! ```

use std::fs;
use std::time::Duration;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::workflow::WorkflowKind;

/// Settings recognised by the database and the reconciliation engine.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Emit a notice for every malformed task or workflow record
    pub report_malformed_task: bool,

    /// Workflows resolved to `Unclassified` may be used from any project
    pub unclassified_workflows_available_to_all_projects: bool,

    /// Project views also list workflows defined in subprojects
    pub show_subproject_workflows: bool,

    /// Priority suffixes under the managed tag prefix, highest first
    pub priority_tags: Vec<String>,

    /// Tag and frontmatter vocabulary
    pub tags: TagConfig,

    /// Rebuild throttling
    pub rate_limit: RateLimitConfig,

    /// Retry interval used until the first rebuild succeeds
    pub retry_interval_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            report_malformed_task: true,
            unclassified_workflows_available_to_all_projects: true,
            show_subproject_workflows: true,
            priority_tags: vec!["hi".to_string(), "med".to_string(), "lo".to_string()],
            tags: TagConfig::default(),
            rate_limit: RateLimitConfig::default(),
            retry_interval_ms: 1000,
        }
    }
}

impl Settings {
    /// Retry interval as a duration.
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    /// Checks value ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let rl = &self.rate_limit;
        if rl.window_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "rate_limit.window_ms",
                reason: "must be positive".to_string(),
            });
        }
        if rl.min_rate.is_nan() || rl.min_rate <= 0.0 {
            return Err(ConfigError::Invalid {
                key: "rate_limit.min_rate",
                reason: format!("must be positive, got {}", rl.min_rate),
            });
        }
        if rl.min_rate > rl.max_rate {
            return Err(ConfigError::Invalid {
                key: "rate_limit.min_rate",
                reason: format!("{} exceeds max_rate {}", rl.min_rate, rl.max_rate),
            });
        }
        if self.retry_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "retry_interval_ms",
                reason: "must be positive".to_string(),
            });
        }
        for (key, prefix) in [
            ("tags.workflow_prefix", &self.tags.workflow_prefix),
            ("tags.step_prefix", &self.tags.step_prefix),
            ("tags.project_prefix", &self.tags.project_prefix),
            ("tags.managed_prefix", &self.tags.managed_prefix),
        ] {
            if !prefix.starts_with('#') {
                return Err(ConfigError::Invalid {
                    key,
                    reason: format!("tag prefix '{}' must start with '#'", prefix),
                });
            }
        }
        Ok(())
    }
}

/// Tag prefixes and frontmatter keys.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct TagConfig {
    /// Tag marking a line as a chain workflow definition
    pub chain_type_tag: String,
    /// Tag marking a line as a checkbox workflow definition
    pub checkbox_type_tag: String,
    /// Workflow tag = prefix + workflow name
    pub workflow_prefix: String,
    pub step_prefix: String,
    /// Per-entity project override, e.g. `#tpm/project/Main/Sub1`
    pub project_prefix: String,
    /// User-defined filter tags
    pub managed_prefix: String,
    /// Frontmatter key declaring the containing folder as a project root
    pub folder_project_key: String,
    /// Frontmatter key declaring the file itself as a project
    pub file_project_key: String,
}

impl Default for TagConfig {
    fn default() -> Self {
        Self {
            chain_type_tag: "#tpm/workflow_type/chain".to_string(),
            checkbox_type_tag: "#tpm/workflow_type/checkbox".to_string(),
            workflow_prefix: "#tpm/workflow/".to_string(),
            step_prefix: "#tpm/step/".to_string(),
            project_prefix: "#tpm/project/".to_string(),
            managed_prefix: "#tpm/tag/".to_string(),
            folder_project_key: "tpm_project_root".to_string(),
            file_project_key: "tpm_project_name".to_string(),
        }
    }
}

impl TagConfig {
    /// Known workflow kinds paired with their defining tag.
    pub fn type_tags(&self) -> [(WorkflowKind, &str); 2] {
        [
            (WorkflowKind::Chain, self.chain_type_tag.as_str()),
            (WorkflowKind::Checkbox, self.checkbox_type_tag.as_str()),
        ]
    }

    pub fn is_type_tag(&self, tag: &str) -> bool {
        tag == self.chain_type_tag || tag == self.checkbox_type_tag
    }

    /// Tag carried by tasks that use the named workflow.
    pub fn workflow_tag(&self, name: &str) -> String {
        format!("{}{}", self.workflow_prefix, name)
    }

    pub fn is_step_tag(&self, tag: &str) -> bool {
        tag.len() > self.step_prefix.len() && tag.starts_with(&self.step_prefix)
    }

    /// Project name carried by an override tag.
    pub fn project_override<'a>(&self, tag: &'a str) -> Option<&'a str> {
        tag.strip_prefix(self.project_prefix.as_str())
            .filter(|name| !name.is_empty())
    }

    /// A managed tag is under the managed prefix and belongs to no other family.
    pub fn is_managed_tag(&self, tag: &str) -> bool {
        tag.len() > self.managed_prefix.len()
            && tag.starts_with(&self.managed_prefix)
            && !self.is_type_tag(tag)
            && !tag.starts_with(&self.workflow_prefix)
            && !tag.starts_with(&self.step_prefix)
            && !tag.starts_with(&self.project_prefix)
    }
}

/// Adaptive throttle parameters.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Sliding window length
    pub window_ms: u64,
    /// Ceiling for the allowed threshold (requests per second)
    pub max_rate: f64,
    /// Floor for the allowed threshold (requests per second)
    pub min_rate: f64,
    /// Frequency above which the threshold is halved
    pub busy_rate: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_ms: 1000,
            max_rate: 3.0,
            min_rate: 1.0 / 3.0,
            busy_rate: 3.0,
        }
    }
}

/// Loads settings from a YAML file and validates them.
pub fn load_settings(path: &str) -> Result<Settings, ConfigError> {
    info!("Loading settings from: {}", path);

    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_string(),
        source,
    })?;

    let settings = parse_settings(&content).map_err(|e| match e {
        ConfigError::Parse { message, .. } => ConfigError::Parse {
            path: path.to_string(),
            message,
        },
        other => other,
    })?;

    debug!("Settings loaded: {:?}", settings);
    Ok(settings)
}

/// Parses settings from YAML text. An empty document yields the defaults.
pub fn parse_settings(yaml: &str) -> Result<Settings, ConfigError> {
    if yaml.trim().is_empty() {
        return Ok(Settings::default());
    }

    let settings: Settings = serde_yaml::from_str(yaml).map_err(|e| ConfigError::Parse {
        path: String::new(),
        message: e.to_string(),
    })?;
    settings.validate()?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert!(settings.report_malformed_task);
        assert!(settings.unclassified_workflows_available_to_all_projects);
        assert_eq!(settings.rate_limit.max_rate, 3.0);
        assert_eq!(settings.retry_interval(), Duration::from_secs(1));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let settings = parse_settings("report_malformed_task: false\n").unwrap();
        assert!(!settings.report_malformed_task);
        assert_eq!(settings.tags, TagConfig::default());
        assert_eq!(settings.priority_tags.len(), 3);
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(parse_settings("  \n").unwrap(), Settings::default());
    }

    #[test]
    fn test_invalid_rate_bounds() {
        let result = parse_settings("rate_limit:\n  min_rate: 5.0\n  max_rate: 2.0\n");
        assert!(matches!(
            result,
            Err(ConfigError::Invalid { key: "rate_limit.min_rate", .. })
        ));
    }

    #[test]
    fn test_prefix_must_be_tag() {
        let result = parse_settings("tags:\n  step_prefix: step/\n");
        assert!(matches!(
            result,
            Err(ConfigError::Invalid { key: "tags.step_prefix", .. })
        ));
    }

    #[test]
    fn test_load_settings_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "show_subproject_workflows: false").unwrap();
        writeln!(file, "priority_tags: [urgent]").unwrap();

        let settings = load_settings(file.path().to_str().unwrap()).unwrap();
        assert!(!settings.show_subproject_workflows);
        assert_eq!(settings.priority_tags, vec!["urgent".to_string()]);
    }

    #[test]
    fn test_load_settings_missing_file() {
        let result = load_settings("/nonexistent/settings.yaml");
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_tag_families() {
        let tags = TagConfig::default();
        assert!(tags.is_type_tag("#tpm/workflow_type/chain"));
        assert!(tags.is_step_tag("#tpm/step/review"));
        assert!(!tags.is_step_tag("#tpm/step/"));
        assert_eq!(tags.workflow_tag("Write"), "#tpm/workflow/Write");
        assert_eq!(tags.project_override("#tpm/project/Main/Sub1"), Some("Main/Sub1"));
        assert_eq!(tags.project_override("#tpm/project/"), None);
        assert!(tags.is_managed_tag("#tpm/tag/hi"));
        assert!(!tags.is_managed_tag("#tpm/step/hi"));
        assert!(!tags.is_managed_tag("#other"));
    }
}
