//! Materialized execution snapshots.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::StoreContext;
use crate::error::StoreError;
use crate::manager::OutputManager;
use crate::namespace::Namespace;

/// The environment an execution ran in, as recovered from its namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentRef {
  #[serde(rename = "type")]
  pub kind: String,
  pub uuid: String,
}

impl EnvironmentRef {
  /// Recover the environment from a namespace; `None` for an empty namespace.
  pub fn from_namespace(namespace: &Namespace) -> Option<Self> {
    if namespace.is_empty() {
      return None;
    }
    Some(Self {
      kind: namespace.kind().to_string(),
      uuid: namespace.id().to_string(),
    })
  }

  pub fn namespace(&self) -> Namespace {
    Namespace::new(self.kind.clone(), self.uuid.clone())
  }
}

/// Read-only snapshot of everything stored for one execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOutput {
  uuid: String,
  namespace: Namespace,
  path: String,
  absolute_path: PathBuf,
  environment: Option<EnvironmentRef>,
  messages: Vec<Value>,
  #[serde(skip_serializing_if = "Option::is_none")]
  output: Option<Value>,
}

impl ExecutionOutput {
  pub(crate) fn new(manager: &OutputManager, messages: Vec<Value>) -> Self {
    Self {
      uuid: manager.uuid().to_string(),
      namespace: manager.namespace().clone(),
      path: manager.path().to_string(),
      absolute_path: manager.absolute_path(),
      environment: EnvironmentRef::from_namespace(manager.namespace()),
      messages,
      output: None,
    }
  }

  /// Replace the environment recovered from the namespace.
  pub fn with_environment(mut self, environment: EnvironmentRef) -> Self {
    self.environment = Some(environment);
    self
  }

  /// Attach a deserialized output payload.
  pub fn with_output(mut self, output: Value) -> Self {
    self.output = Some(output);
    self
  }

  pub fn uuid(&self) -> &str {
    &self.uuid
  }

  pub fn namespace(&self) -> &Namespace {
    &self.namespace
  }

  pub fn path(&self) -> &str {
    &self.path
  }

  pub fn absolute_path(&self) -> &Path {
    &self.absolute_path
  }

  pub fn environment(&self) -> Option<&EnvironmentRef> {
    self.environment.as_ref()
  }

  pub fn messages(&self) -> &[Value] {
    &self.messages
  }

  pub fn output(&self) -> Option<&Value> {
    self.output.as_ref()
  }

  /// A manager addressing the same execution directory.
  ///
  /// Snapshots can be deserialized from anywhere, so the execution id is
  /// validated again.
  pub fn manager(&self, ctx: &StoreContext) -> Result<OutputManager, StoreError> {
    OutputManager::new(
      ctx.clone(),
      self.path.clone(),
      self.namespace.clone(),
      self.uuid.clone(),
    )
  }

  /// Delete the execution directory this snapshot was read from.
  pub async fn delete(&self, ctx: &StoreContext) -> Result<(), StoreError> {
    self.manager(ctx)?.delete(false).await
  }
}
