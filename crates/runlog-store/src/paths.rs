//! Path resolution for execution directories.
//!
//! Layout under the variables root:
//!
//! ```text
//! {variables_root}/{path}/{type}/{id}/{execution}/
//! ```
//!
//! `path` may span several directories: both `/` and `\` separate its
//! segments, and empty, `.` and `..` segments are dropped so it never climbs
//! out of the root. The namespace type and id are always one segment each;
//! separators inside them are percent-encoded. Execution ids must already be a
//! single plain segment and are rejected otherwise. Nothing here touches the
//! file system.

use std::path::{Path, PathBuf};

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

use crate::error::StoreError;
use crate::namespace::Namespace;

const SEGMENT: &AsciiSet = &CONTROLS.add(b'%').add(b'/').add(b'\\');

/// Resolve the directory holding one execution's artifacts.
pub fn resolve(
  variables_root: &Path,
  path: &str,
  namespace: &Namespace,
  uuid: &str,
) -> Result<PathBuf, StoreError> {
  validate_execution_id(uuid)?;
  let mut resolved = namespace_dir(variables_root, path, namespace);
  resolved.push(uuid);
  Ok(resolved)
}

/// Resolve the directory containing every execution of a namespace.
pub fn namespace_dir(variables_root: &Path, path: &str, namespace: &Namespace) -> PathBuf {
  let mut resolved = variables_root.to_path_buf();
  push_segments(&mut resolved, path);
  if !namespace.is_empty() {
    resolved.push(encode_segment(namespace.kind()));
    resolved.push(encode_segment(namespace.id()));
  }
  resolved
}

/// Check that `uuid` names exactly one directory below its namespace.
pub fn validate_execution_id(uuid: &str) -> Result<(), StoreError> {
  let reason = if uuid.is_empty() {
    Some("empty")
  } else if matches!(uuid, "." | "..") {
    Some("relative directory")
  } else if uuid.contains(['/', '\\', '\0']) {
    Some("contains a path separator")
  } else {
    None
  };

  match reason {
    Some(reason) => Err(StoreError::InvalidExecutionId {
      uuid: uuid.to_string(),
      reason,
    }),
    None => Ok(()),
  }
}

fn push_segments(buf: &mut PathBuf, value: &str) {
  for segment in value.split(['/', '\\']) {
    if matches!(segment, "" | "." | "..") {
      continue;
    }
    buf.push(segment);
  }
}

fn encode_segment(value: &str) -> String {
  match value {
    "." => "%2E".to_string(),
    ".." => "%2E%2E".to_string(),
    other => utf8_percent_encode(other, SEGMENT).to_string(),
  }
}
