//! Pluggable secret storage
//!
//! `SecretStore` abstracts where named secrets (API key, OAuth client
//! credentials, the serialized grant list) live. `open_secret_store`
//! picks the backend once at construction: the OS keyring when one is
//! usable, otherwise an encrypted file under the config directory.
//! Callers never see which backend they got.

mod file;
mod keychain;

pub use file::EncryptedFileStore;
pub use keychain::KeychainStore;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::Result;

/// Logical secret names. These are persisted key names; changing
/// them breaks existing installations.
pub mod keys {
    pub const API_KEY: &str = "api_key";
    pub const CLIENT_ID: &str = "client_id";
    pub const CLIENT_SECRET: &str = "client_secret";
    pub const GRANTS: &str = "grants";
    pub const DEFAULT_GRANT: &str = "default_grant";
}

/// Key-value secret persistence.
///
/// Implementations must be thread-safe (`Send + Sync`) so one store
/// can be shared across the auth service and the CLI command handlers.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fails with `Error::SecretNotFound` if the key is absent.
    async fn get(&self, key: &str) -> Result<String>;

    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Idempotent: deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Open the process-wide secret store.
///
/// Prefers the OS keyring; hosts without one (headless machines,
/// missing keyring daemon) silently get the encrypted-file fallback.
pub fn open_secret_store() -> Result<Arc<dyn SecretStore>> {
    if KeychainStore::is_available() {
        debug!("Using OS keyring for secret storage");
        Ok(Arc::new(KeychainStore::new()))
    } else {
        debug!("OS keyring unavailable, falling back to encrypted file storage");
        Ok(Arc::new(EncryptedFileStore::open()?))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::error::{Error, Result};

    use super::SecretStore;

    /// In-memory secret store for unit tests
    #[derive(Default)]
    pub(crate) struct MemorySecretStore {
        entries: Mutex<HashMap<String, String>>,
    }

    impl MemorySecretStore {
        pub(crate) fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl SecretStore for MemorySecretStore {
        async fn get(&self, key: &str) -> Result<String> {
            self.entries
                .lock()
                .unwrap()
                .get(key)
                .cloned()
                .ok_or_else(|| Error::SecretNotFound(key.to_string()))
        }

        async fn set(&self, key: &str, value: &str) -> Result<()> {
            self.entries
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }

        async fn delete(&self, key: &str) -> Result<()> {
            self.entries.lock().unwrap().remove(key);
            Ok(())
        }
    }
}
