//! Blob persistence.
//!
//! Values are encoded as CBOR and written through a temporary sibling file
//! that is renamed over the target, so readers see either the previous file
//! or the complete new one. Concurrent writers to the same file are
//! last-writer-wins.

use std::path::Path;

use runlog_crypto::Cipher;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};

use crate::error::StoreError;
use crate::secrets::{self, SealedValue, Variables};

/// Encode `value` and write it to `path`, creating parent directories.
pub async fn store<T>(path: &Path, value: &T) -> Result<(), StoreError>
where
  T: Serialize + ?Sized,
{
  let bytes = serde_cbor::to_vec(&value).map_err(|e| StoreError::serialization(path, e))?;
  write_atomic(path, &bytes).await
}

/// Read and decode the blob at `path`.
pub async fn load<T>(path: &Path) -> Result<T, StoreError>
where
  T: DeserializeOwned,
{
  let bytes = fs::read(path).await.map_err(|e| StoreError::io(path, e))?;
  serde_cbor::from_slice(&bytes).map_err(|e| StoreError::serialization(path, e))
}

/// Encrypt the string values of `data` and store the result.
pub async fn store_encrypted(
  path: &Path,
  data: &Variables,
  cipher: &dyn Cipher,
  key: Option<&str>,
) -> Result<(), StoreError> {
  let sealed = secrets::seal(data, cipher, key)?;
  store(path, &sealed).await
}

/// Load a dictionary written by [`store_encrypted`], decrypting its secrets.
pub async fn load_encrypted(
  path: &Path,
  cipher: &dyn Cipher,
  key: Option<&str>,
) -> Result<Variables, StoreError> {
  let sealed: std::collections::BTreeMap<String, SealedValue> = load(path).await?;
  secrets::unseal(sealed, cipher, key)
}

#[instrument(level = "debug", skip_all, fields(path = %path.display(), size = bytes.len()))]
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
  let parent = path.parent().ok_or_else(|| StoreError::InvalidRecord {
    message: format!("blob path has no parent: {}", path.display()),
  })?;
  let file_name = path
    .file_name()
    .ok_or_else(|| StoreError::InvalidRecord {
      message: format!("blob path has no file name: {}", path.display()),
    })?
    .to_string_lossy();

  fs::create_dir_all(parent)
    .await
    .map_err(|e| StoreError::io(parent, e))?;

  let tmp = parent.join(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));
  if let Err(e) = write_file(&tmp, bytes).await {
    let _ = fs::remove_file(&tmp).await;
    return Err(e);
  }

  if let Err(e) = fs::rename(&tmp, path).await {
    let _ = fs::remove_file(&tmp).await;
    return Err(StoreError::io(path, e));
  }

  debug!("blob written");
  Ok(())
}

async fn write_file(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
  let mut file = File::create(path)
    .await
    .map_err(|e| StoreError::io(path, e))?;
  file
    .write_all(bytes)
    .await
    .map_err(|e| StoreError::io(path, e))?;
  file.flush().await.map_err(|e| StoreError::io(path, e))?;
  file.sync_all().await.map_err(|e| StoreError::io(path, e))?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use runlog_crypto::ChaChaCipher;
  use serde::Deserialize;
  use serde_json::json;

  #[derive(Debug, PartialEq, Serialize, Deserialize)]
  struct Frame {
    name: String,
    rows: Vec<u32>,
  }

  #[tokio::test]
  async fn test_store_creates_parent_directories() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a/b/c/output.pkl");

    store(&path, &json!({"k": 1})).await.unwrap();
    assert!(path.exists());
  }

  #[tokio::test]
  async fn test_nested_value_survives_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("locals.pkl");
    let value = json!({"outer": {"list": [1, 2, 3], "ratio": 0.25}, "name": "df"});

    store(&path, &value).await.unwrap();
    let loaded: serde_json::Value = load(&path).await.unwrap();
    assert_eq!(loaded, value);
  }

  #[tokio::test]
  async fn test_typed_struct_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("frame.pkl");
    let frame = Frame {
      name: "sales".to_string(),
      rows: vec![3, 1, 4],
    };

    store(&path, &frame).await.unwrap();
    assert_eq!(load::<Frame>(&path).await.unwrap(), frame);
  }

  #[tokio::test]
  async fn test_store_unsized_values() {
    let dir = tempfile::tempdir().unwrap();
    let text_path = dir.path().join("text.pkl");
    let rows_path = dir.path().join("rows.pkl");

    store(&text_path, "plain text").await.unwrap();
    let rows: &[u32] = &[3, 1, 4];
    store(&rows_path, rows).await.unwrap();

    assert_eq!(load::<String>(&text_path).await.unwrap(), "plain text");
    assert_eq!(load::<Vec<u32>>(&rows_path).await.unwrap(), vec![3, 1, 4]);
  }

  #[tokio::test]
  async fn test_load_missing_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let result = load::<serde_json::Value>(&dir.path().join("absent.pkl")).await;
    assert!(matches!(result, Err(StoreError::NotFound { .. })));
  }

  #[tokio::test]
  async fn test_load_truncated_is_serialization_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("output.pkl");
    store(&path, &json!({"key": "a fairly long value"})).await.unwrap();

    let bytes = std::fs::read(&path).unwrap();
    std::fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();

    let result = load::<serde_json::Value>(&path).await;
    assert!(matches!(result, Err(StoreError::Serialization { .. })));
  }

  #[tokio::test]
  async fn test_load_incompatible_type_is_serialization_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("output.pkl");
    store(&path, &json!([1, 2, 3])).await.unwrap();

    let result = load::<Frame>(&path).await;
    assert!(matches!(result, Err(StoreError::Serialization { .. })));
  }

  #[tokio::test]
  async fn test_no_temp_files_left_behind() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("output.pkl");
    store(&path, &json!(1)).await.unwrap();
    store(&path, &json!(2)).await.unwrap();

    let names: Vec<_> = std::fs::read_dir(dir.path())
      .unwrap()
      .map(|e| e.unwrap().file_name())
      .collect();
    assert_eq!(names, vec![std::ffi::OsString::from("output.pkl")]);
  }

  #[tokio::test]
  async fn test_concurrent_writers_leave_one_valid_blob() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("output.pkl");

    let writers: Vec<_> = (0..8)
      .map(|i| {
        let path = path.clone();
        tokio::spawn(async move { store(&path, &json!({"writer": i, "pad": vec![i; 512]})).await })
      })
      .collect();
    for writer in futures::future::join_all(writers).await {
      writer.unwrap().unwrap();
    }

    let loaded: serde_json::Value = load(&path).await.unwrap();
    let writer = loaded["writer"].as_u64().unwrap();
    assert!(writer < 8);
    assert_eq!(loaded["pad"].as_array().unwrap().len(), 512);
  }

  #[tokio::test]
  async fn test_encrypted_dictionary_on_disk_shape() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("variables.joblib");
    let cipher = ChaChaCipher::with_default_key("k");
    let data: Variables = [
      ("a".to_string(), json!("secret")),
      ("b".to_string(), json!(42)),
    ]
    .into_iter()
    .collect();

    store_encrypted(&path, &data, &cipher, None).await.unwrap();

    let raw: std::collections::BTreeMap<String, SealedValue> = load(&path).await.unwrap();
    match &raw["a"] {
      SealedValue::Encrypted(ciphertext) => assert_ne!(ciphertext, "secret"),
      other => panic!("expected ciphertext, got {:?}", other),
    }
    match &raw["b"] {
      SealedValue::Plain(plain) => assert_eq!(plain.as_value(), &json!(42)),
      other => panic!("expected plain value, got {:?}", other),
    }

    let loaded = load_encrypted(&path, &cipher, None).await.unwrap();
    assert_eq!(loaded, data);
  }
}
