//! Runlog Environment
//!
//! Execution environments and process dispatch.
//!
//! # Architecture
//!
//! ```text
//! Environment::run_process(host, message, ...)
//! ├── ProcessHost::output_manager() -> OutputManager  (sink for results)
//! ├── type == pipeline && uuid set
//! │   └── PipelineFactory::create(ctx) -> PipelineRunner::run_process()
//! └── otherwise
//!     └── KernelRunner::run()
//!                     │
//!                     ▼
//!               ProcessHandle  (wait / cancel)
//! ```
//!
//! # Usage
//!
//! ```ignore
//! let host = ProcessHost::new(store, kernel, pipelines);
//! let env = Environment::new(EnvironmentType::Code, "exec1");
//!
//! let process = env.run_process(&host, "print(1)", None, None, None).await?;
//! process.wait().await?;
//! ```

mod environment;
mod error;
mod process;
mod runner;

pub use environment::{
  DEFAULT_ENVIRONMENT_UUID, Environment, EnvironmentType, ProcessHost, UnknownEnvironmentType,
};
pub use error::ProcessError;
pub use process::{ProcessHandle, ProcessOptions};
pub use runner::{KernelRunner, PipelineContext, PipelineFactory, PipelineRunner};
