//! Execution environments.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use runlog_store::{
  EnvironmentRef, Namespace, OutputManager, StoreContext, StoreError, Variables,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::error::ProcessError;
use crate::process::{ProcessHandle, ProcessOptions};
use crate::runner::{KernelRunner, PipelineContext, PipelineFactory};

/// Environment id used when none is given.
pub const DEFAULT_ENVIRONMENT_UUID: &str = "execution";

/// The kind of execution context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvironmentType {
  Code,
  Pipeline,
}

impl EnvironmentType {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Code => "code",
      Self::Pipeline => "pipeline",
    }
  }
}

impl fmt::Display for EnvironmentType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Unknown environment type name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown environment type: {0}")]
pub struct UnknownEnvironmentType(pub String);

impl FromStr for EnvironmentType {
  type Err = UnknownEnvironmentType;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "code" => Ok(Self::Code),
      "pipeline" => Ok(Self::Pipeline),
      other => Err(UnknownEnvironmentType(other.to_string())),
    }
  }
}

/// An execution context: a type and id, plus its variable maps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Environment {
  #[serde(rename = "type", default)]
  pub kind: Option<EnvironmentType>,
  #[serde(default)]
  pub uuid: Option<String>,
  #[serde(default)]
  pub environment_variables: Variables,
  #[serde(default)]
  pub variables: Variables,
}

impl Default for Environment {
  fn default() -> Self {
    Self {
      kind: Some(EnvironmentType::Code),
      uuid: Some(DEFAULT_ENVIRONMENT_UUID.to_string()),
      environment_variables: Variables::new(),
      variables: Variables::new(),
    }
  }
}

impl Environment {
  pub fn new(kind: EnvironmentType, uuid: impl Into<String>) -> Self {
    Self {
      kind: Some(kind),
      uuid: Some(uuid.into()),
      ..Self::default()
    }
  }

  pub fn with_variables(mut self, variables: Variables) -> Self {
    self.variables = variables;
    self
  }

  pub fn with_environment_variables(mut self, environment_variables: Variables) -> Self {
    self.environment_variables = environment_variables;
    self
  }

  /// `"{type}/{uuid}"` as a structured namespace; empty unless both are set.
  pub fn namespace(&self) -> Namespace {
    match (&self.kind, self.uuid.as_deref()) {
      (Some(kind), Some(uuid)) if !uuid.is_empty() => Namespace::new(kind.as_str(), uuid),
      _ => Namespace::empty(),
    }
  }

  fn pipeline_uuid(&self) -> Option<&str> {
    match (self.kind, self.uuid.as_deref()) {
      (Some(EnvironmentType::Pipeline), Some(uuid)) if !uuid.is_empty() => Some(uuid),
      _ => None,
    }
  }

  /// Start a process for `message` in this environment.
  ///
  /// Output goes to `(output_path or the project default, namespace,
  /// request_uuid or a timestamp)`. Pipeline environments with an id are run
  /// through the host's pipeline factory; everything else goes straight to
  /// the kernel. Runner errors are returned unchanged.
  #[instrument(
    name = "environment_run_process",
    skip(self, host, message, options),
    fields(namespace = %self.namespace())
  )]
  pub async fn run_process(
    &self,
    host: &ProcessHost,
    message: &str,
    request_uuid: Option<&str>,
    output_path: Option<&Path>,
    options: Option<ProcessOptions>,
  ) -> Result<ProcessHandle, ProcessError> {
    let output = host.output_manager(&self.namespace(), request_uuid, output_path)?;
    let options = options.unwrap_or_default();

    match self.pipeline_uuid() {
      Some(pipeline_uuid) => {
        info!(
          pipeline_uuid = %pipeline_uuid,
          execution = %output.uuid(),
          "dispatching to pipeline"
        );
        let pipeline = host
          .pipelines
          .create(PipelineContext {
            pipeline_uuid: pipeline_uuid.to_string(),
            kernel: host.kernel.clone(),
            output,
            environment_variables: self.environment_variables.clone(),
            variables: self.variables.clone(),
          })
          .await?;
        pipeline.run_process(message, request_uuid, options).await
      }
      None => {
        info!(execution = %output.uuid(), "dispatching to kernel");
        host
          .kernel
          .run(message, request_uuid, output, options)
          .await
      }
    }
  }
}

impl TryFrom<&EnvironmentRef> for Environment {
  type Error = UnknownEnvironmentType;

  fn try_from(value: &EnvironmentRef) -> Result<Self, Self::Error> {
    Ok(Self::new(value.kind.parse()?, value.uuid.clone()))
  }
}

/// Collaborators needed to run processes: storage, the kernel, and the
/// pipeline factory.
#[derive(Clone)]
pub struct ProcessHost {
  store: StoreContext,
  kernel: Arc<dyn KernelRunner>,
  pipelines: Arc<dyn PipelineFactory>,
}

impl ProcessHost {
  pub fn new(
    store: StoreContext,
    kernel: Arc<dyn KernelRunner>,
    pipelines: Arc<dyn PipelineFactory>,
  ) -> Self {
    Self {
      store,
      kernel,
      pipelines,
    }
  }

  pub fn store(&self) -> &StoreContext {
    &self.store
  }

  /// The manager a process for `namespace` writes to.
  pub fn output_manager(
    &self,
    namespace: &Namespace,
    request_uuid: Option<&str>,
    output_path: Option<&Path>,
  ) -> Result<OutputManager, StoreError> {
    let config = self.store.config();
    let path = match output_path {
      Some(path) => config.relative_to_base(path),
      None => config.default_output_path(),
    };
    let uuid = request_uuid
      .map(str::to_string)
      .unwrap_or_else(OutputManager::generate_uuid);

    OutputManager::new(self.store.clone(), path, namespace.clone(), uuid)
  }
}

impl fmt::Debug for ProcessHost {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ProcessHost")
      .field("store", &self.store)
      .finish_non_exhaustive()
  }
}
