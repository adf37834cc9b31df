//! OS keyring integration for secret storage
//!
//! Cross-platform credential storage:
//! - macOS: Keychain
//! - Windows: Credential Manager
//! - Linux: Secret Service (requires D-Bus and a keyring daemon)

use async_trait::async_trait;
use keyring::Entry;

use crate::error::{Error, Result};
use crate::KEYRING_SERVICE;

use super::SecretStore;

/// Secret store backed by the OS-native credential store, one keyring
/// entry per logical key.
pub struct KeychainStore {
    _private: (),
}

impl KeychainStore {
    pub fn new() -> Self {
        Self { _private: () }
    }

    /// Check if a keyring backend is usable on this system.
    pub fn is_available() -> bool {
        match Entry::new(KEYRING_SERVICE, "__probe__") {
            Ok(entry) => match entry.get_password() {
                // NoEntry means the store answered, so it works
                Err(keyring::Error::NoStorageAccess(_)) => false,
                Err(keyring::Error::PlatformFailure(_)) => false,
                _ => true,
            },
            Err(_) => false,
        }
    }

    fn entry(key: &str) -> Result<Entry> {
        Entry::new(KEYRING_SERVICE, key).map_err(|e| Error::Keyring(e.to_string()))
    }
}

impl Default for KeychainStore {
    fn default() -> Self {
        Self::new()
    }
}

// Entry operations are synchronous; keyring access is fast enough
// that blocking inside the async trait methods is acceptable here.
#[async_trait]
impl SecretStore for KeychainStore {
    async fn get(&self, key: &str) -> Result<String> {
        match Self::entry(key)?.get_password() {
            Ok(value) => Ok(value),
            Err(keyring::Error::NoEntry) => Err(Error::SecretNotFound(key.to_string())),
            Err(e) => Err(Error::Keyring(e.to_string())),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        Self::entry(key)?
            .set_password(value)
            .map_err(|e| Error::Keyring(e.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        match Self::entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(Error::Keyring(e.to_string())),
        }
    }
}
