//! Process error types.

use runlog_store::StoreError;

/// Errors returned by process dispatch and by the runners themselves.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
  /// The process was cancelled before it finished.
  #[error("process cancelled")]
  Cancelled,

  /// The runner reported a failure.
  #[error("process failed: {message}")]
  Failed { message: String },

  /// The process task panicked.
  #[error("process panicked: {message}")]
  Panicked { message: String },

  /// Writing or reading execution output failed.
  #[error("output storage failed")]
  Store(#[from] StoreError),
}

impl ProcessError {
  pub fn failed(message: impl Into<String>) -> Self {
    Self::Failed {
      message: message.into(),
    }
  }
}
