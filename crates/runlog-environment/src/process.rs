//! Handles to running processes.

use std::future::Future;

use runlog_store::OutputManager;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::ProcessError;

/// Free-form options forwarded to the runner.
pub type ProcessOptions = serde_json::Map<String, Value>;

/// A process started by a runner.
///
/// The process writes its results through the [`OutputManager`] it was given;
/// the handle only reports completion. Dropping the handle does not stop the
/// process, call [`ProcessHandle::cancel`] for that.
pub struct ProcessHandle {
  output: OutputManager,
  cancel: CancellationToken,
  task: JoinHandle<Result<Value, ProcessError>>,
}

impl ProcessHandle {
  /// Spawn `work` on the current runtime, stopping it when `cancel` fires.
  pub fn spawn<F>(output: OutputManager, cancel: CancellationToken, work: F) -> Self
  where
    F: Future<Output = Result<Value, ProcessError>> + Send + 'static,
  {
    let token = cancel.clone();
    let execution = output.uuid().to_string();
    let task = tokio::spawn(async move {
      tokio::select! {
          _ = token.cancelled() => {
              warn!(execution = %execution, "process cancelled");
              Err(ProcessError::Cancelled)
          }
          result = work => result,
      }
    });

    Self {
      output,
      cancel,
      task,
    }
  }

  /// Execution id the process writes under.
  pub fn request_uuid(&self) -> &str {
    self.output.uuid()
  }

  /// The sink the process writes to.
  pub fn output(&self) -> &OutputManager {
    &self.output
  }

  /// Request cancellation. Writes that already completed are kept.
  pub fn cancel(&self) {
    self.cancel.cancel();
  }

  pub fn is_finished(&self) -> bool {
    self.task.is_finished()
  }

  /// Wait for the process to finish.
  pub async fn wait(self) -> Result<Value, ProcessError> {
    let execution = self.output.uuid().to_string();
    let result = match self.task.await {
      Ok(result) => result,
      Err(e) if e.is_cancelled() => Err(ProcessError::Cancelled),
      Err(e) => Err(ProcessError::Panicked {
        message: e.to_string(),
      }),
    };

    if result.is_ok() {
      info!(execution = %execution, "process completed");
    }
    result
  }
}

impl std::fmt::Debug for ProcessHandle {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ProcessHandle")
      .field("request_uuid", &self.request_uuid())
      .field("finished", &self.task.is_finished())
      .finish()
  }
}
