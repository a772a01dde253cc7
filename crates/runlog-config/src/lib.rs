//! Runlog Config
//!
//! Storage configuration for runlog. Every path the storage layer resolves
//! starts from a [`StorageConfig`] handed in by the host process; nothing is
//! read from process-wide state after construction.
//!
//! The layout mirrors a project checkout:
//!
//! ```text
//! {base_dir}/
//! └── {repo}/              <- repo_path, default output path is "{repo}"
//!     └── ...
//! {variables_dir}/         <- root of all persisted execution output
//! ```

use std::path::{Component, Path, PathBuf};

use tracing::debug;

/// Environment variable naming the project repository path.
pub const REPO_PATH_ENV: &str = "RUNLOG_REPO_PATH";

/// Environment variable naming the variables root directory.
pub const VARIABLES_DIR_ENV: &str = "RUNLOG_VARIABLES_DIR";

/// Environment variable holding the default secret key.
pub const SECRET_KEY_ENV: &str = "RUNLOG_SECRET_KEY";

const DEFAULT_DATA_DIR: &str = ".runlog";
const DEFAULT_REPO_NAME: &str = "default_repo";

/// Errors raised while building a configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  /// No explicit repo path and no home directory to default under.
  #[error("could not determine home directory for the default repo path")]
  NoHomeDir,

  /// A configured value was present but unusable.
  #[error("invalid value for {name}: {message}")]
  InvalidValue { name: String, message: String },
}

/// Root paths for execution output storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
  /// Directory that contains the project repository.
  pub base_dir: PathBuf,
  /// Project repository root.
  pub repo_path: PathBuf,
  /// Root directory under which all execution output is persisted.
  pub variables_dir: PathBuf,
  /// Default key for encrypted dictionaries.
  pub secret_key: Option<String>,
}

impl StorageConfig {
  /// Build a configuration for the given repository.
  ///
  /// Variables are stored inside the repository unless overridden with
  /// [`StorageConfig::with_variables_dir`].
  pub fn new(repo_path: impl Into<PathBuf>) -> Self {
    let repo_path = repo_path.into();
    let base_dir = repo_path
      .parent()
      .map(Path::to_path_buf)
      .unwrap_or_default();

    Self {
      base_dir,
      variables_dir: repo_path.clone(),
      repo_path,
      secret_key: None,
    }
  }

  /// Override the variables root.
  pub fn with_variables_dir(mut self, variables_dir: impl Into<PathBuf>) -> Self {
    self.variables_dir = variables_dir.into();
    self
  }

  /// Set the default secret key.
  pub fn with_secret_key(mut self, key: impl Into<String>) -> Self {
    self.secret_key = Some(key.into());
    self
  }

  /// Build a configuration from the process environment.
  pub fn from_env() -> Result<Self, ConfigError> {
    Self::from_lookup(|name| std::env::var(name).ok())
  }

  /// Build a configuration from an arbitrary variable lookup.
  ///
  /// Unset variables fall back to `~/.runlog/default_repo`.
  pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
  where
    F: Fn(&str) -> Option<String>,
  {
    let repo_path = match non_empty(&lookup, REPO_PATH_ENV)? {
      Some(path) => PathBuf::from(path),
      None => dirs::home_dir()
        .ok_or(ConfigError::NoHomeDir)?
        .join(DEFAULT_DATA_DIR)
        .join(DEFAULT_REPO_NAME),
    };

    let mut config = Self::new(repo_path);
    if let Some(dir) = non_empty(&lookup, VARIABLES_DIR_ENV)? {
      config.variables_dir = PathBuf::from(dir);
    }
    config.secret_key = lookup(SECRET_KEY_ENV).filter(|k| !k.is_empty());

    debug!(
      repo_path = %config.repo_path.display(),
      variables_dir = %config.variables_dir.display(),
      "storage config loaded"
    );

    Ok(config)
  }

  /// Default root-relative output path: the repository path with the base
  /// directory stripped (e.g. `/home/src/default_repo` -> `default_repo`).
  pub fn default_output_path(&self) -> String {
    self.relative_to_base(&self.repo_path)
  }

  /// Make a caller supplied path relative to the base directory.
  ///
  /// Paths outside the base directory are returned with their root removed
  /// so they always resolve beneath the variables root.
  pub fn relative_to_base(&self, path: impl AsRef<Path>) -> String {
    let path = path.as_ref();
    let relative = path.strip_prefix(&self.base_dir).unwrap_or(path);

    relative
      .components()
      .filter_map(|c| match c {
        Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
        _ => None,
      })
      .collect::<Vec<_>>()
      .join("/")
  }
}

fn non_empty<F>(lookup: &F, name: &str) -> Result<Option<String>, ConfigError>
where
  F: Fn(&str) -> Option<String>,
{
  match lookup(name) {
    None => Ok(None),
    Some(value) if value.trim().is_empty() => Err(ConfigError::InvalidValue {
      name: name.to_string(),
      message: "value is empty".to_string(),
    }),
    Some(value) => Ok(Some(value)),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashMap;

  fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
      .iter()
      .map(|(k, v)| (k.to_string(), v.to_string()))
      .collect();
    move |name| map.get(name).cloned()
  }

  #[test]
  fn test_new_derives_base_and_variables_dir() {
    let config = StorageConfig::new("/home/src/default_repo");
    assert_eq!(config.base_dir, PathBuf::from("/home/src"));
    assert_eq!(config.variables_dir, PathBuf::from("/home/src/default_repo"));
    assert_eq!(config.default_output_path(), "default_repo");
  }

  #[test]
  fn test_relative_to_base_strips_prefix() {
    let config = StorageConfig::new("/home/src/default_repo");
    assert_eq!(
      config.relative_to_base("/home/src/default_repo/pipelines/etl"),
      "default_repo/pipelines/etl"
    );
    assert_eq!(config.relative_to_base("/elsewhere/out"), "elsewhere/out");
    assert_eq!(config.relative_to_base("already/relative"), "already/relative");
  }

  #[test]
  fn test_from_lookup_reads_overrides() {
    let config = StorageConfig::from_lookup(lookup_from(&[
      (REPO_PATH_ENV, "/srv/projects/repo"),
      (VARIABLES_DIR_ENV, "/var/lib/runlog"),
      (SECRET_KEY_ENV, "k1"),
    ]))
    .unwrap();

    assert_eq!(config.repo_path, PathBuf::from("/srv/projects/repo"));
    assert_eq!(config.variables_dir, PathBuf::from("/var/lib/runlog"));
    assert_eq!(config.secret_key.as_deref(), Some("k1"));
  }

  #[test]
  fn test_from_lookup_rejects_empty_repo_path() {
    let result = StorageConfig::from_lookup(lookup_from(&[(REPO_PATH_ENV, "  ")]));
    assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
  }

  #[test]
  fn test_from_lookup_defaults_under_home() {
    if dirs::home_dir().is_none() {
      return;
    }
    let config = StorageConfig::from_lookup(lookup_from(&[])).unwrap();
    assert!(config.repo_path.ends_with(".runlog/default_repo"));
    assert_eq!(config.default_output_path(), "default_repo");
    assert!(config.secret_key.is_none());
  }
}
