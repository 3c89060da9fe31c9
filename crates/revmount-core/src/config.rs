//! Harness configuration.
//!
//! Configuration is read from `--config <path>`, `$REVMOUNT_CONFIG`, or
//! `~/.config/revmount/config.toml` (XDG standard), in that order. A missing
//! default file means built-in defaults.
//!
//! # Example configuration
//!
//! ```toml
//! [tools]
//! backup = ["rdiff-backup"]
//! mount = "./rdiff-backup-fs"
//! unmount = "fusermount"
//!
//! [timing]
//! revision_resolution = "1s"
//! mount_ready_timeout = "5s"
//!
//! [workspace]
//! base_dir = "/tmp"
//! require_mount_point = true
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::builder::DEFAULT_BACKUP_PROGRAM;
use crate::clock::DEFAULT_REVISION_RESOLUTION;
use crate::error::{HarnessError, Result};
use crate::mount::{DEFAULT_MOUNT_EXECUTABLE, DEFAULT_MOUNT_READY_TIMEOUT, DEFAULT_UNMOUNT_EXECUTABLE};
use crate::tool::ToolCommand;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "REVMOUNT_CONFIG";
/// Overrides `tools.backup` (whitespace-separated program and arguments).
pub const BACKUP_ENV: &str = "REVMOUNT_BACKUP";
/// Overrides `tools.mount`.
pub const MOUNT_ENV: &str = "REVMOUNT_MOUNT";
/// Overrides `tools.unmount`.
pub const UNMOUNT_ENV: &str = "REVMOUNT_UNMOUNT";

/// Main configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// External programs.
    pub tools: ToolsConfig,
    /// Revision spacing and mount readiness.
    pub timing: TimingConfig,
    /// Where per-case directories are created.
    pub workspace: WorkspaceConfig,
}

/// External programs the harness drives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Backup driver program and leading arguments.
    pub backup: Vec<String>,
    /// Mount executable.
    pub mount: String,
    /// Unmount utility (called with `-u <target>`).
    pub unmount: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            backup: vec![DEFAULT_BACKUP_PROGRAM.to_string()],
            mount: DEFAULT_MOUNT_EXECUTABLE.to_string(),
            unmount: DEFAULT_UNMOUNT_EXECUTABLE.to_string(),
        }
    }
}

/// Timing knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Timestamp resolution of the backup driver's revision identifiers.
    #[serde(with = "humantime_serde")]
    pub revision_resolution: Duration,
    /// How long to wait for the view after the mount executable exits.
    #[serde(with = "humantime_serde")]
    pub mount_ready_timeout: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            revision_resolution: DEFAULT_REVISION_RESOLUTION,
            mount_ready_timeout: DEFAULT_MOUNT_READY_TIMEOUT,
        }
    }
}

/// Per-case directory placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Parent directory for per-case temp dirs; system temp dir if unset.
    pub base_dir: Option<PathBuf>,
    /// Require a new filesystem at the mount target before verifying.
    pub require_mount_point: bool,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            base_dir: None,
            require_mount_point: true,
        }
    }
}

impl HarnessConfig {
    /// Loads from an explicit path, `$REVMOUNT_CONFIG`, or the default
    /// location, then applies environment overrides.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match std::env::var_os(CONFIG_ENV) {
                Some(path) => Self::from_file(Path::new(&path))?,
                None => match config_path() {
                    Some(path) if path.exists() => Self::from_file(&path)?,
                    _ => Self::default(),
                },
            },
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parses a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            HarnessError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml(&content)
            .map_err(|e| HarnessError::Config(format!("{}: {e}", path.display())))
    }

    /// Parses TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| HarnessError::Config(e.to_string()))
    }

    /// Applies `REVMOUNT_*` overrides read through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(backup) = lookup(BACKUP_ENV) {
            self.tools.backup = backup.split_whitespace().map(str::to_string).collect();
        }
        if let Some(mount) = lookup(MOUNT_ENV) {
            self.tools.mount = mount;
        }
        if let Some(unmount) = lookup(UNMOUNT_ENV) {
            self.tools.unmount = unmount;
        }
    }

    /// Rejects settings the harness cannot run with.
    pub fn validate(&self) -> Result<()> {
        if ToolCommand::from_argv(self.tools.backup.iter().cloned()).is_none() {
            return Err(HarnessError::Config("tools.backup is empty".to_string()));
        }
        if self.tools.mount.is_empty() {
            return Err(HarnessError::Config("tools.mount is empty".to_string()));
        }
        if self.tools.unmount.is_empty() {
            return Err(HarnessError::Config("tools.unmount is empty".to_string()));
        }
        if self.workspace.require_mount_point && self.timing.mount_ready_timeout.is_zero() {
            return Err(HarnessError::Config(
                "timing.mount_ready_timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// The backup driver invocation.
    pub fn backup_command(&self) -> Result<ToolCommand> {
        ToolCommand::from_argv(self.tools.backup.iter().cloned())
            .ok_or_else(|| HarnessError::Config("tools.backup is empty".to_string()))
    }
}

/// Default configuration file location.
///
/// Uses the XDG config directory on Linux, Application Support on macOS.
pub fn config_path() -> Option<PathBuf> {
    let base_dirs = directories::BaseDirs::new()?;
    Some(base_dirs.config_dir().join("revmount").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = HarnessConfig::default();
        assert_eq!(config.tools.backup, vec!["rdiff-backup".to_string()]);
        assert_eq!(config.tools.mount, "./rdiff-backup-fs");
        assert_eq!(config.tools.unmount, "fusermount");
        assert_eq!(config.timing.revision_resolution, Duration::from_secs(1));
        assert!(config.workspace.require_mount_point);
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = HarnessConfig::from_toml(
            r#"
            [tools]
            mount = "/usr/local/bin/rdiff-backup-fs"

            [timing]
            mount_ready_timeout = "750ms"
            "#,
        )
        .unwrap();
        assert_eq!(config.tools.mount, "/usr/local/bin/rdiff-backup-fs");
        assert_eq!(config.tools.unmount, "fusermount");
        assert_eq!(config.timing.mount_ready_timeout, Duration::from_millis(750));
        assert_eq!(config.timing.revision_resolution, Duration::from_secs(1));
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = HarnessConfig::from_toml("[timing]\nrevision_resolution = \"soon\"").unwrap_err();
        assert!(matches!(err, HarnessError::Config(_)));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (BACKUP_ENV, "python3 -m rdiff_backup"),
            (UNMOUNT_ENV, "/bin/fusermount3"),
        ]
        .into_iter()
        .collect();
        let mut config = HarnessConfig::default();
        config.apply_env(|key| env.get(key).map(ToString::to_string));

        let backup = config.backup_command().unwrap();
        assert_eq!(backup.program(), "python3");
        assert_eq!(backup.leading_args(), ["-m".to_string(), "rdiff_backup".to_string()]);
        assert_eq!(config.tools.unmount, "/bin/fusermount3");
        assert_eq!(config.tools.mount, "./rdiff-backup-fs");
    }

    #[test]
    fn test_validate_rejects_empty_backup() {
        let mut config = HarnessConfig::default();
        config.tools.backup.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_ready_timeout() {
        let mut config = HarnessConfig::default();
        config.timing.mount_ready_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
        config.workspace.require_mount_point = false;
        config.validate().unwrap();
    }

    #[test]
    fn test_from_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "[workspace]\nbase_dir = \"/var/tmp/revmount\"\n").unwrap();
        let config = HarnessConfig::from_file(&path).unwrap();
        assert_eq!(config.workspace.base_dir, Some(PathBuf::from("/var/tmp/revmount")));
    }

    #[test]
    fn test_missing_file_is_error() {
        let err = HarnessConfig::from_file(Path::new("/nonexistent/revmount.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/revmount.toml"));
    }
}
