//! Append-only newline-delimited JSON message logs.
//!
//! Each append is one blocking `write_all` of `json + "\n"` on a file opened
//! in append mode, so concurrent appenders interleave whole lines. Ordering
//! between concurrent appenders is unspecified.

use std::io::{self, Write};
use std::path::Path;

use serde::Serialize;
use serde_json::Value;
use tokio::fs;

use crate::error::StoreError;

/// Serialize `record` and append it as one line.
pub async fn append<T>(path: &Path, record: &T) -> Result<(), StoreError>
where
  T: Serialize + ?Sized,
{
  let line = serde_json::to_string(record).map_err(|e| StoreError::InvalidRecord {
    message: e.to_string(),
  })?;
  append_line(path, &line).await
}

/// Append already serialized text as one line.
///
/// A single trailing newline is tolerated; any other line break would split
/// the record and is rejected.
pub async fn append_line(path: &Path, text: &str) -> Result<(), StoreError> {
  let text = text
    .strip_suffix('\n')
    .map(|t| t.strip_suffix('\r').unwrap_or(t))
    .unwrap_or(text);
  if text.contains('\n') {
    return Err(StoreError::InvalidRecord {
      message: "record contains a line break".to_string(),
    });
  }

  let mut line = String::with_capacity(text.len() + 1);
  line.push_str(text);
  line.push('\n');

  let target = path.to_path_buf();
  tokio::task::spawn_blocking(move || write_line(&target, line.as_bytes()))
    .await
    .map_err(|e| StoreError::io(path, io::Error::other(e)))?
}

// One `write_all` per record. tokio's async file writes are split into 2 MiB
// chunks, which concurrent appenders can interleave.
fn write_line(path: &Path, line: &[u8]) -> Result<(), StoreError> {
  if let Some(parent) = path.parent() {
    std::fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
  }

  let mut file = std::fs::OpenOptions::new()
    .create(true)
    .append(true)
    .open(path)
    .map_err(|e| StoreError::io(path, e))?;
  file.write_all(line).map_err(|e| StoreError::io(path, e))?;
  file.sync_data().map_err(|e| StoreError::io(path, e))?;

  Ok(())
}

/// Read every record in the log, in file order.
///
/// A missing file is an empty log. The first malformed line fails the read.
pub async fn read_all(path: &Path) -> Result<Vec<Value>, StoreError> {
  let text = match fs::read_to_string(path).await {
    Ok(text) => text,
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
    Err(e) => return Err(StoreError::io(path, e)),
  };

  parse_lines(path, &text)
}

fn parse_lines(path: &Path, text: &str) -> Result<Vec<Value>, StoreError> {
  let mut records = Vec::new();
  for (index, line) in text.split('\n').enumerate() {
    let line = line.trim();
    if line.is_empty() {
      continue;
    }
    let record = serde_json::from_str(line).map_err(|source| StoreError::Parse {
      path: path.to_path_buf(),
      line: index + 1,
      source,
    })?;
    records.push(record);
  }
  Ok(records)
}
