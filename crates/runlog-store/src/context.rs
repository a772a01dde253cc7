//! Shared storage context.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use runlog_config::StorageConfig;
use runlog_crypto::{ChaChaCipher, Cipher};

/// Configuration and services shared by every [`crate::OutputManager`].
///
/// Cheap to clone; managers hold their own copy.
#[derive(Clone)]
pub struct StoreContext {
  config: Arc<StorageConfig>,
  cipher: Arc<dyn Cipher>,
}

impl StoreContext {
  pub fn new(config: StorageConfig, cipher: Arc<dyn Cipher>) -> Self {
    Self {
      config: Arc::new(config),
      cipher,
    }
  }

  /// Build a context using [`ChaChaCipher`] keyed by the configured secret.
  pub fn from_config(config: StorageConfig) -> Self {
    let cipher = match &config.secret_key {
      Some(key) => ChaChaCipher::with_default_key(key.clone()),
      None => ChaChaCipher::new(),
    };
    Self::new(config, Arc::new(cipher))
  }

  pub fn config(&self) -> &StorageConfig {
    &self.config
  }

  pub fn variables_dir(&self) -> &Path {
    &self.config.variables_dir
  }

  pub fn cipher(&self) -> &dyn Cipher {
    self.cipher.as_ref()
  }
}

impl fmt::Debug for StoreContext {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("StoreContext")
      .field("variables_dir", &self.config.variables_dir)
      .finish_non_exhaustive()
  }
}
