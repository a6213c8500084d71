//! Configuration management.
//!
//! [`Config`] is the persisted, user-editable file. [`RunContext`] is the
//! immutable value derived from it that every pipeline stage receives.

use crate::error::{Result, ScosError};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Component whose image anchors the composed release.
pub const DEFAULT_RELEASE_ROOT: &str = "cluster-version-operator";

/// Build argument that selects the SCOS variant in upstream recipes.
pub const DEFAULT_BUILD_ARG: &str = "TAGS=scos";

/// Persistent configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Registry namespace rebuilt images are pushed to (e.g. `quay.io/okd/scos-content`).
    pub target_registry: String,
    /// Release the composition starts from.
    pub base_release: String,
    /// Reference the composed release is pushed to.
    pub output_release: String,
    pub work_dir: String,
    pub release_root_component: String,
    /// `KEY=VALUE` build argument passed to every build.
    pub build_arg: String,
    pub continue_on_failure: bool,
    pub auto_confirm: bool,
    pub execute_compose: bool,
    pub collaborator_timeout_secs: u64,
    pub log_level: String,
    pub tools: ToolConfig,
}

/// Binaries backing the collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    pub skopeo: String,
    pub git: String,
    pub podman: String,
    pub oc: String,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            skopeo: "skopeo".to_string(),
            git: "git".to_string(),
            podman: "podman".to_string(),
            oc: "oc".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target_registry: String::new(),
            base_release: String::new(),
            output_release: String::new(),
            work_dir: paths::work_dir().to_string_lossy().to_string(),
            release_root_component: DEFAULT_RELEASE_ROOT.to_string(),
            build_arg: DEFAULT_BUILD_ARG.to_string(),
            continue_on_failure: true,
            auto_confirm: false,
            execute_compose: false,
            collaborator_timeout_secs: 30 * 60,
            log_level: "info".to_string(),
            tools: ToolConfig::default(),
        }
    }
}

impl Config {
    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        paths::config_dir().join("config.json")
    }

    /// Load configuration from the default location.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from disk, falling back to defaults when absent.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| ScosError::InvalidConfig {
            reason: format!("Failed to read config: {}", e),
        })?;
        serde_json::from_str(&content).map_err(|e| ScosError::InvalidConfig {
            reason: format!("Failed to parse config: {}", e),
        })
    }

    pub fn collaborator_timeout(&self) -> Duration {
        Duration::from_secs(self.collaborator_timeout_secs)
    }

    /// Validate and freeze this configuration into a [`RunContext`].
    pub fn into_context(self) -> Result<RunContext> {
        let registry = self.target_registry.trim_end_matches('/').to_string();
        if registry.is_empty() {
            return Err(ScosError::InvalidConfig { reason: "target_registry is not set".into() });
        }
        if self.base_release.is_empty() {
            return Err(ScosError::InvalidConfig { reason: "base_release is not set".into() });
        }
        if self.output_release.is_empty() {
            return Err(ScosError::InvalidConfig { reason: "output_release is not set".into() });
        }
        let build_arg = match self.build_arg.split_once('=') {
            Some((key, value)) if !key.is_empty() => (key.to_string(), value.to_string()),
            _ => {
                return Err(ScosError::InvalidConfig {
                    reason: format!("build_arg must be KEY=VALUE, got '{}'", self.build_arg),
                })
            }
        };

        Ok(RunContext {
            work_dir: PathBuf::from(self.work_dir),
            registry,
            base_release: self.base_release,
            output_release: self.output_release,
            release_root: self.release_root_component,
            build_arg,
            continue_on_failure: self.continue_on_failure,
            execute_compose: self.execute_compose,
        })
    }
}

/// Explicit run state threaded through every stage call.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub work_dir: PathBuf,
    pub registry: String,
    pub base_release: String,
    pub output_release: String,
    pub release_root: String,
    pub build_arg: (String, String),
    pub continue_on_failure: bool,
    pub execute_compose: bool,
}

impl RunContext {
    pub fn db_path(&self) -> PathBuf {
        paths::db_path(&self.work_dir)
    }

    pub fn source_dir(&self, component: &str) -> PathBuf {
        paths::source_dir(&self.work_dir, component)
    }

    /// Repository a component's rebuilt image is pushed to.
    pub fn image_repository(&self, component: &str) -> String {
        format!("{}/{}", self.registry, component)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> Config {
        Config {
            target_registry: "quay.io/okd/scos-content/".into(),
            base_release: "quay.io/openshift/okd:4.16".into(),
            output_release: "quay.io/okd/scos-release:4.16".into(),
            work_dir: "/srv/migrate".into(),
            ..Config::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.release_root_component, "cluster-version-operator");
        assert_eq!(config.build_arg, "TAGS=scos");
        assert!(config.continue_on_failure);
        assert!(!config.auto_confirm);
        assert!(!config.execute_compose);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"target_registry": "reg2", "auto_confirm": true}"#).unwrap();
        assert_eq!(config.target_registry, "reg2");
        assert!(config.auto_confirm);
        assert_eq!(config.tools.podman, "podman");
        assert_eq!(config.collaborator_timeout_secs, 1800);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = Config::load_from(Path::new("/nonexistent/scos/config.json")).unwrap();
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_into_context() {
        let ctx = configured().into_context().unwrap();
        assert_eq!(ctx.registry, "quay.io/okd/scos-content");
        assert_eq!(ctx.build_arg, ("TAGS".to_string(), "scos".to_string()));
        assert_eq!(ctx.image_repository("cli"), "quay.io/okd/scos-content/cli");
        assert_eq!(ctx.source_dir("cli"), PathBuf::from("/srv/migrate/sources/cli"));
    }

    #[test]
    fn test_into_context_rejects_missing_registry() {
        let config = Config { target_registry: String::new(), ..configured() };
        assert!(matches!(config.into_context(), Err(ScosError::InvalidConfig { .. })));
    }

    #[test]
    fn test_into_context_rejects_bad_build_arg() {
        let config = Config { build_arg: "scos".into(), ..configured() };
        assert!(matches!(config.into_context(), Err(ScosError::InvalidConfig { .. })));
    }
}
