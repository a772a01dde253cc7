//! Output record manager.
//!
//! An [`OutputManager`] addresses one execution directory by
//! `(path, namespace, uuid)` and carries no other state, so any number of
//! managers for the same triple can be created and used concurrently.

use std::path::{Path, PathBuf};

use futures::StreamExt;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::fs;
use tracing::{debug, info, instrument, warn};

use crate::blob;
use crate::context::StoreContext;
use crate::error::StoreError;
use crate::messages;
use crate::namespace::Namespace;
use crate::output::ExecutionOutput;
use crate::paths;
use crate::secrets::Variables;

pub const MESSAGES_FILENAME: &str = "messages";
pub const LOCALS_FILENAME: &str = "locals.pkl";
pub const OUTPUT_FILENAME: &str = "output.pkl";
pub const VARIABLES_FILENAME: &str = "variables.joblib";
pub const ENVIRONMENT_VARIABLES_FILENAME: &str = "environment_variables.joblib";

/// Maximum number of executions read at once by
/// [`OutputManager::load_with_messages`].
pub const LOAD_CONCURRENCY: usize = 16;

/// Reads and writes the artifacts of a single execution.
#[derive(Debug, Clone)]
pub struct OutputManager {
  ctx: StoreContext,
  path: String,
  namespace: Namespace,
  uuid: String,
  dir: PathBuf,
}

impl OutputManager {
  /// Address the execution `uuid` of `namespace` under `path`.
  ///
  /// Fails with [`StoreError::InvalidExecutionId`] unless `uuid` is a single
  /// plain directory name.
  pub fn new(
    ctx: StoreContext,
    path: impl Into<String>,
    namespace: Namespace,
    uuid: impl Into<String>,
  ) -> Result<Self, StoreError> {
    let path = path.into();
    let uuid = uuid.into();
    let dir = paths::resolve(ctx.variables_dir(), &path, &namespace, &uuid)?;
    Ok(Self {
      ctx,
      path,
      namespace,
      uuid,
      dir,
    })
  }

  /// Execution id for callers that don't supply one: microseconds since the
  /// epoch, so directory names sort chronologically.
  pub fn generate_uuid() -> String {
    chrono::Utc::now().timestamp_micros().to_string()
  }

  pub fn path(&self) -> &str {
    &self.path
  }

  pub fn namespace(&self) -> &Namespace {
    &self.namespace
  }

  pub fn uuid(&self) -> &str {
    &self.uuid
  }

  pub fn context(&self) -> &StoreContext {
    &self.ctx
  }

  pub fn absolute_path(&self) -> PathBuf {
    self.dir.clone()
  }

  fn file(&self, filename: &str) -> PathBuf {
    self.dir.join(filename)
  }

  /// True only when the execution directory exists and is still empty.
  ///
  /// NOTE: a populated directory reports `false`, which reads inverted from
  /// the name. Kept as is until product owners settle the intended meaning;
  /// callers that want "has output" should check for the message log.
  pub async fn exists(&self) -> bool {
    let dir = self.absolute_path();
    match fs::metadata(&dir).await {
      Ok(meta) if meta.is_dir() => is_empty_dir(&dir).await.unwrap_or(false),
      _ => false,
    }
  }

  /// Remove the execution directory.
  ///
  /// With `if_empty` set, a directory that has any entries is left alone.
  /// Deleting a missing directory is a no-op.
  #[instrument(skip(self), fields(path = %self.dir.display()))]
  pub async fn delete(&self, if_empty: bool) -> Result<(), StoreError> {
    let dir = self.dir.as_path();
    match fs::metadata(dir).await {
      Ok(_) => {}
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
      Err(e) => return Err(StoreError::io(dir, e)),
    }

    if if_empty && !is_empty_dir(dir).await? {
      debug!("execution directory not empty, keeping it");
      return Ok(());
    }

    match fs::remove_dir_all(dir).await {
      Ok(()) => {
        info!("execution directory deleted");
        Ok(())
      }
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
      Err(e) => Err(StoreError::io(dir, e)),
    }
  }

  /// Append one serialized record to the message log.
  pub async fn append_message(&self, data: &str, filename: Option<&str>) -> Result<(), StoreError> {
    messages::append_line(&self.file(filename.unwrap_or(MESSAGES_FILENAME)), data).await
  }

  /// Serialize `record` and append it to the message log.
  pub async fn append_record<T>(&self, record: &T, filename: Option<&str>) -> Result<(), StoreError>
  where
    T: Serialize + ?Sized,
  {
    messages::append(&self.file(filename.unwrap_or(MESSAGES_FILENAME)), record).await
  }

  pub async fn store_local_variables<T>(
    &self,
    data: &T,
    filename: Option<&str>,
  ) -> Result<(), StoreError>
  where
    T: Serialize + ?Sized,
  {
    blob::store(&self.file(filename.unwrap_or(LOCALS_FILENAME)), data).await
  }

  pub async fn store_output<T>(&self, data: &T, filename: Option<&str>) -> Result<(), StoreError>
  where
    T: Serialize + ?Sized,
  {
    blob::store(&self.file(filename.unwrap_or(OUTPUT_FILENAME)), data).await
  }

  pub async fn load_local_variables<T>(&self, filename: Option<&str>) -> Result<T, StoreError>
  where
    T: DeserializeOwned,
  {
    blob::load(&self.file(filename.unwrap_or(LOCALS_FILENAME))).await
  }

  pub async fn load_output<T>(&self, filename: Option<&str>) -> Result<T, StoreError>
  where
    T: DeserializeOwned,
  {
    blob::load(&self.file(filename.unwrap_or(OUTPUT_FILENAME))).await
  }

  /// Store configuration variables; string values are encrypted.
  pub async fn store_variables(
    &self,
    data: &Variables,
    filename: Option<&str>,
  ) -> Result<(), StoreError> {
    self
      .store_encrypted_dictionary(filename.unwrap_or(VARIABLES_FILENAME), data, None)
      .await
  }

  /// Store environment variables; string values are encrypted.
  pub async fn store_environment_variables(
    &self,
    data: &Variables,
    filename: Option<&str>,
  ) -> Result<(), StoreError> {
    self
      .store_encrypted_dictionary(
        filename.unwrap_or(ENVIRONMENT_VARIABLES_FILENAME),
        data,
        None,
      )
      .await
  }

  /// Store a dictionary, encrypting its string values with `key` or the
  /// context's default key.
  pub async fn store_encrypted_dictionary(
    &self,
    filename: &str,
    data: &Variables,
    key: Option<&str>,
  ) -> Result<(), StoreError> {
    blob::store_encrypted(&self.file(filename), data, self.ctx.cipher(), key).await
  }

  /// Read a dictionary written by [`OutputManager::store_encrypted_dictionary`].
  pub async fn read_encrypted_dictionary(
    &self,
    filename: &str,
    key: Option<&str>,
  ) -> Result<Variables, StoreError> {
    blob::load_encrypted(&self.file(filename), self.ctx.cipher(), key).await
  }

  /// Read the message log and snapshot this execution.
  pub async fn build_output(&self) -> Result<ExecutionOutput, StoreError> {
    let messages = messages::read_all(&self.file(MESSAGES_FILENAME)).await?;
    Ok(ExecutionOutput::new(self, messages))
  }

  /// Snapshot every execution stored under `(path, namespace)`.
  ///
  /// Executions are the non-hidden subdirectories of the namespace directory,
  /// sorted case-insensitively by name and truncated to `limit`. They are read
  /// with bounded concurrency; each entry carries its own result so one bad
  /// log doesn't hide the others. A missing namespace directory yields no
  /// entries.
  #[instrument(skip(ctx, namespace), fields(namespace = %namespace))]
  pub async fn load_with_messages(
    ctx: &StoreContext,
    path: &str,
    namespace: &Namespace,
    limit: Option<usize>,
  ) -> Result<Vec<Result<ExecutionOutput, StoreError>>, StoreError> {
    let dir = paths::namespace_dir(ctx.variables_dir(), path, namespace);
    let mut names = match list_execution_dirs(&dir).await {
      Ok(names) => names,
      Err(StoreError::NotFound { .. }) => return Ok(Vec::new()),
      Err(e) => return Err(e),
    };

    names.sort_by_key(|name| name.to_lowercase());
    if let Some(limit) = limit {
      names.truncate(limit);
    }

    debug!(count = names.len(), "loading executions");

    let results: Vec<_> = futures::stream::iter(names)
      .map(|uuid| {
        let manager = OutputManager::new(ctx.clone(), path, namespace.clone(), uuid);
        async move { manager?.build_output().await }
      })
      .buffered(LOAD_CONCURRENCY)
      .collect()
      .await;

    for result in &results {
      if let Err(e) = result {
        warn!(error = %e, "failed to load execution");
      }
    }

    Ok(results)
  }
}

async fn list_execution_dirs(dir: &Path) -> Result<Vec<String>, StoreError> {
  let mut entries = fs::read_dir(dir).await.map_err(|e| StoreError::io(dir, e))?;
  let mut names = Vec::new();

  while let Some(entry) = entries
    .next_entry()
    .await
    .map_err(|e| StoreError::io(dir, e))?
  {
    let name = entry.file_name().to_string_lossy().into_owned();
    if name.starts_with('.') {
      continue;
    }
    let file_type = entry
      .file_type()
      .await
      .map_err(|e| StoreError::io(&entry.path(), e))?;
    if file_type.is_dir() {
      names.push(name);
    }
  }

  Ok(names)
}

async fn is_empty_dir(dir: &Path) -> Result<bool, StoreError> {
  let mut entries = fs::read_dir(dir).await.map_err(|e| StoreError::io(dir, e))?;
  let first = entries
    .next_entry()
    .await
    .map_err(|e| StoreError::io(dir, e))?;
  Ok(first.is_none())
}
