//! Runlog Store
//!
//! Persistence for the output of execution runs. Every execution is addressed
//! by `(path, namespace, uuid)` and owns one directory:
//!
//! ```text
//! {variables_dir}/{path}/{type}/{id}/{uuid}/
//! ├── messages                       # newline-delimited JSON, append-only
//! ├── locals.pkl                     # CBOR blob
//! ├── output.pkl                     # CBOR blob
//! ├── variables.joblib               # CBOR, string values encrypted
//! └── environment_variables.joblib   # CBOR, string values encrypted
//! ```
//!
//! [`OutputManager`] is the entry point. It holds no state beyond its address
//! and a shared [`StoreContext`]; safety under concurrent use comes from the
//! individual file operations (atomic appends, write-then-rename blobs), not
//! from in-process locks.

mod context;
mod error;
mod manager;
mod namespace;
mod output;

pub mod blob;
pub mod messages;
pub mod paths;
pub mod secrets;

pub use context::StoreContext;
pub use error::StoreError;
pub use manager::{
  ENVIRONMENT_VARIABLES_FILENAME, LOAD_CONCURRENCY, LOCALS_FILENAME, MESSAGES_FILENAME,
  OUTPUT_FILENAME, OutputManager, VARIABLES_FILENAME,
};
pub use namespace::Namespace;
pub use output::{EnvironmentRef, ExecutionOutput};
pub use secrets::{PlainValue, SealedValue, VariableValue, Variables};
