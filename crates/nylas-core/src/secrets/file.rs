//! Encrypted-file secret store
//!
//! Fallback for hosts without a usable OS keyring. Secrets live in a
//! single JSON map at `~/.config/nylas-cli/secrets.enc`, each value
//! encrypted with AES-256-GCM under a key derived via HKDF-SHA256
//! from a machine-local master key. The secrets file and master key
//! are owner-only (0600), the directory 0700.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hkdf::Hkdf;
use sha2::Sha256;
use tracing::debug;

use crate::error::{Error, Result};

use super::SecretStore;

/// Nonce size for AES-256-GCM (96 bits = 12 bytes)
const NONCE_SIZE: usize = 12;

const SECRETS_FILE: &str = "secrets.enc";
const KEY_FILE: &str = "secrets.key";

/// File-backed secret store with encryption at rest
pub struct EncryptedFileStore {
    path: PathBuf,
    cipher: Aes256Gcm,
}

impl EncryptedFileStore {
    /// Open (or initialize) the store under the default config directory
    pub fn open() -> Result<Self> {
        Self::open_at(crate::config::config_dir())
    }

    /// Open (or initialize) the store under a specific directory
    pub fn open_at(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&dir, fs::Permissions::from_mode(0o700))?;
        }

        let key_path = dir.join(KEY_FILE);
        let master = if key_path.exists() {
            fs::read(&key_path)?
        } else {
            let key = Aes256Gcm::generate_key(&mut OsRng);
            write_owner_only(&key_path, key.as_slice())?;
            debug!("Generated new secret store master key at {:?}", key_path);
            key.to_vec()
        };

        let derived = Self::derive_key(&master)?;
        let cipher = Aes256Gcm::new(&derived.into());

        Ok(Self {
            path: dir.join(SECRETS_FILE),
            cipher,
        })
    }

    /// Derive the 256-bit file key from the master key via HKDF
    fn derive_key(master: &[u8]) -> Result<[u8; 32]> {
        let hkdf = Hkdf::<Sha256>::new(Some(b"nylas-cli-secrets"), master);
        let mut okm = [0u8; 32];
        hkdf.expand(b"aes-256-gcm", &mut okm)
            .map_err(|_| Error::Secret("Failed to derive encryption key".to_string()))?;
        Ok(okm)
    }

    /// Encrypt one value as base64(nonce || ciphertext)
    fn encrypt(&self, value: &str) -> Result<String> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, value.as_bytes())
            .map_err(|_| Error::Secret("Encryption failed".to_string()))?;

        let mut blob = nonce.to_vec();
        blob.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(blob))
    }

    fn decrypt(&self, encoded: &str) -> Result<String> {
        let blob = BASE64
            .decode(encoded)
            .map_err(|_| Error::Secret("Corrupt secret store entry".to_string()))?;
        if blob.len() < NONCE_SIZE {
            return Err(Error::Secret("Corrupt secret store entry".to_string()));
        }

        let (nonce, ciphertext) = blob.split_at(NONCE_SIZE);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| Error::Secret("Failed to decrypt secret store entry".to_string()))?;

        String::from_utf8(plaintext)
            .map_err(|_| Error::Secret("Invalid secret encoding".to_string()))
    }

    fn read_map(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> Result<()> {
        let contents = serde_json::to_string_pretty(map)?;
        write_owner_only(&self.path, contents.as_bytes())
    }
}

fn write_owner_only(path: &Path, contents: &[u8]) -> Result<()> {
    fs::write(path, contents)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }

    Ok(())
}

#[async_trait]
impl SecretStore for EncryptedFileStore {
    async fn get(&self, key: &str) -> Result<String> {
        let map = self.read_map()?;
        match map.get(key) {
            Some(encoded) => self.decrypt(encoded),
            None => Err(Error::SecretNotFound(key.to_string())),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut map = self.read_map()?;
        map.insert(key.to_string(), self.encrypt(value)?);
        self.write_map(&map)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut map = self.read_map()?;
        if map.remove(key).is_some() {
            self.write_map(&map)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = EncryptedFileStore::open_at(dir.path().to_path_buf()).unwrap();

        store.set("api_key", "nyk_secret_123").await.unwrap();
        assert_eq!(store.get("api_key").await.unwrap(), "nyk_secret_123");

        store.delete("api_key").await.unwrap();
        let err = store.get("api_key").await.unwrap_err();
        assert!(matches!(err, Error::SecretNotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_missing_key_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let store = EncryptedFileStore::open_at(dir.path().to_path_buf()).unwrap();
        store.delete("never_existed").await.unwrap();
    }

    #[tokio::test]
    async fn test_values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();

        let store = EncryptedFileStore::open_at(dir.path().to_path_buf()).unwrap();
        store.set("client_id", "abc").await.unwrap();
        store.set("client_secret", "xyz").await.unwrap();
        drop(store);

        let reopened = EncryptedFileStore::open_at(dir.path().to_path_buf()).unwrap();
        assert_eq!(reopened.get("client_id").await.unwrap(), "abc");
        assert_eq!(reopened.get("client_secret").await.unwrap(), "xyz");
    }

    #[tokio::test]
    async fn test_values_are_not_stored_in_plaintext() {
        let dir = tempfile::tempdir().unwrap();
        let store = EncryptedFileStore::open_at(dir.path().to_path_buf()).unwrap();
        store.set("api_key", "super-secret-value").await.unwrap();

        let raw = fs::read_to_string(dir.path().join(SECRETS_FILE)).unwrap();
        assert!(!raw.contains("super-secret-value"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_owner_only_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = EncryptedFileStore::open_at(dir.path().to_path_buf()).unwrap();
        store.set("api_key", "v").await.unwrap();

        for file in [SECRETS_FILE, KEY_FILE] {
            let mode = fs::metadata(dir.path().join(file)).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600, "{} should be owner-only", file);
        }
        let dir_mode = fs::metadata(dir.path()).unwrap().permissions().mode();
        assert_eq!(dir_mode & 0o777, 0o700);
    }
}
