use std::path::{Path, PathBuf};

use solana_sdk::signature::{read_keypair_file, Keypair};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeyStoreError {
  #[error("key store directory {0} does not exist")]
  MissingDir(PathBuf),

  #[error("failed to read publish key pair from {0}: {1}")]
  ReadFailed(PathBuf, String),
}

/// Minimal directory-based key loader: holds the path to a directory
/// expected to contain one `publish_key_pair.json` file in the standard
/// Solana CLI keypair format. File-permission enforcement and
/// mapping/program key-pair creation tooling are the responsibility of an
/// external key-management step and are not implemented here.
pub struct KeyStore {
  dir: PathBuf,
}

impl KeyStore {
  pub fn open(dir: impl Into<PathBuf>) -> Result<Self, KeyStoreError> {
    let dir = dir.into();
    if !dir.is_dir() {
      return Err(KeyStoreError::MissingDir(dir));
    }
    Ok(KeyStore { dir })
  }

  pub fn load_publish_key(&self) -> Result<Keypair, KeyStoreError> {
    let path = self.publish_key_path();
    read_keypair_file(&path).map_err(|e| KeyStoreError::ReadFailed(path, e.to_string()))
  }

  fn publish_key_path(&self) -> PathBuf {
    self.dir.join("publish_key_pair.json")
  }

  pub fn dir(&self) -> &Path {
    &self.dir
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn open_rejects_a_missing_directory() {
    let err = KeyStore::open("/nonexistent/quoracle/keys").unwrap_err();
    matches!(err, KeyStoreError::MissingDir(_));
  }
}
