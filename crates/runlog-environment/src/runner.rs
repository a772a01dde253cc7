//! Collaborator contracts for process execution.
//!
//! Kernels and pipelines live outside this crate. Both receive an
//! [`OutputManager`] as the sink for everything the process produces.

use std::sync::Arc;

use async_trait::async_trait;
use runlog_store::{OutputManager, Variables};

use crate::error::ProcessError;
use crate::process::{ProcessHandle, ProcessOptions};

/// Runs a single message directly on a kernel.
#[async_trait]
pub trait KernelRunner: Send + Sync {
  async fn run(
    &self,
    message: &str,
    request_uuid: Option<&str>,
    output: OutputManager,
    options: ProcessOptions,
  ) -> Result<ProcessHandle, ProcessError>;
}

/// Everything a pipeline needs to run on behalf of an environment.
pub struct PipelineContext {
  /// Pipeline id (the environment's uuid).
  pub pipeline_uuid: String,
  pub kernel: Arc<dyn KernelRunner>,
  pub output: OutputManager,
  pub environment_variables: Variables,
  pub variables: Variables,
}

/// A multi-step pipeline bound to one execution.
#[async_trait]
pub trait PipelineRunner: Send + Sync {
  async fn run_process(
    &self,
    message: &str,
    request_uuid: Option<&str>,
    options: ProcessOptions,
  ) -> Result<ProcessHandle, ProcessError>;
}

/// Builds a [`PipelineRunner`] for an execution.
#[async_trait]
pub trait PipelineFactory: Send + Sync {
  async fn create(&self, context: PipelineContext) -> Result<Box<dyn PipelineRunner>, ProcessError>;
}
