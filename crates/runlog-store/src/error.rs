//! Storage error types.

use std::io;
use std::path::{Path, PathBuf};

use runlog_crypto::CryptoError;

/// Errors that can occur while reading or writing execution output.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
  /// A file or directory required for a read was missing.
  #[error("not found: {}", path.display())]
  NotFound { path: PathBuf },

  /// A blob could not be encoded or decoded.
  #[error("serialization failed for {}: {message}", path.display())]
  Serialization { path: PathBuf, message: String },

  /// A message log line was not valid JSON.
  #[error("malformed record at {}:{line}", path.display())]
  Parse {
    path: PathBuf,
    line: usize,
    #[source]
    source: serde_json::Error,
  },

  /// Any other file system failure, including permission errors.
  #[error("io error at {}", path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  /// A secret value could not be encrypted or decrypted.
  #[error("encryption failed for entry '{entry}'")]
  Encryption {
    entry: String,
    #[source]
    source: CryptoError,
  },

  /// An execution id that does not name a single directory.
  #[error("invalid execution id '{uuid}': {reason}")]
  InvalidExecutionId { uuid: String, reason: &'static str },

  /// A record cannot be written as a single log line.
  #[error("invalid record: {message}")]
  InvalidRecord { message: String },
}

impl StoreError {
  /// Map an I/O error, turning `NotFound` into [`StoreError::NotFound`].
  pub(crate) fn io(path: &Path, source: io::Error) -> Self {
    if source.kind() == io::ErrorKind::NotFound {
      Self::NotFound {
        path: path.to_path_buf(),
      }
    } else {
      Self::Io {
        path: path.to_path_buf(),
        source,
      }
    }
  }

  pub(crate) fn serialization(path: &Path, message: impl std::fmt::Display) -> Self {
    Self::Serialization {
      path: path.to_path_buf(),
      message: message.to_string(),
    }
  }

  /// True when the error is a permission failure from the file system.
  pub fn is_permission_denied(&self) -> bool {
    matches!(self, Self::Io { source, .. } if source.kind() == io::ErrorKind::PermissionDenied)
  }
}
