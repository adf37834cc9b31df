//! Persisted grant storage
//!
//! `GrantStore` layers on `SecretStore`: the whole grant list is one
//! serialized secret replaced atomically on every write, plus a
//! separate default-grant pointer. One CLI invocation runs one command
//! at a time, so no locking beyond the backend's own is needed;
//! concurrent invocations are last-writer-wins.

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::models::Grant;
use crate::secrets::{keys, SecretStore};

/// Store for OAuth grants and the default-grant pointer
#[derive(Clone)]
pub struct GrantStore {
    secrets: Arc<dyn SecretStore>,
}

impl GrantStore {
    pub fn new(secrets: Arc<dyn SecretStore>) -> Self {
        Self { secrets }
    }

    async fn load(&self) -> Result<Vec<Grant>> {
        match self.secrets.get(keys::GRANTS).await {
            Ok(json) => Ok(serde_json::from_str(&json)?),
            Err(Error::SecretNotFound(_)) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    async fn store(&self, grants: &[Grant]) -> Result<()> {
        let json = serde_json::to_string(grants)?;
        self.secrets.set(keys::GRANTS, &json).await
    }

    /// All persisted grants, in insertion order.
    pub async fn list_grants(&self) -> Result<Vec<Grant>> {
        self.load().await
    }

    /// Look up a grant by its provider-issued ID.
    pub async fn get_grant(&self, id: &str) -> Result<Grant> {
        self.load()
            .await?
            .into_iter()
            .find(|g| g.id == id)
            .ok_or_else(|| Error::GrantNotFound(id.to_string()))
    }

    /// Look up a grant by email address.
    ///
    /// One mailbox may be connected under several providers; this
    /// returns the first match. Callers relying on uniqueness should
    /// look up by ID instead.
    pub async fn get_grant_by_email(&self, email: &str) -> Result<Grant> {
        self.load()
            .await?
            .into_iter()
            .find(|g| g.email == email)
            .ok_or_else(|| Error::GrantNotFound(email.to_string()))
    }

    /// Upsert by ID: an existing grant is replaced in place, a new one
    /// is appended.
    pub async fn save_grant(&self, grant: Grant) -> Result<()> {
        let mut grants = self.load().await?;
        match grants.iter_mut().find(|g| g.id == grant.id) {
            Some(existing) => {
                debug!(grant_id = %grant.id, "Replacing existing grant");
                *existing = grant;
            }
            None => {
                info!(grant_id = %grant.id, email = %grant.email, "Saving new grant");
                grants.push(grant);
            }
        }
        self.store(&grants).await
    }

    /// Remove a grant. Idempotent; if the grant was the default, the
    /// default pointer is cleared in the same operation so it never
    /// dangles.
    pub async fn delete_grant(&self, id: &str) -> Result<()> {
        let mut grants = self.load().await?;
        let before = grants.len();
        grants.retain(|g| g.id != id);
        if grants.len() != before {
            self.store(&grants).await?;
            info!(grant_id = %id, "Deleted grant");
        }

        if let Ok(default) = self.get_default_grant().await {
            if default == id {
                self.clear_default_grant().await?;
            }
        }
        Ok(())
    }

    /// Wipe all grants and the default pointer.
    pub async fn clear_grants(&self) -> Result<()> {
        self.secrets.delete(keys::GRANTS).await?;
        self.clear_default_grant().await
    }

    /// ID of the grant used when a command omits an explicit grant.
    pub async fn get_default_grant(&self) -> Result<String> {
        match self.secrets.get(keys::DEFAULT_GRANT).await {
            Ok(id) if !id.is_empty() => Ok(id),
            Ok(_) | Err(Error::SecretNotFound(_)) => Err(Error::NoDefaultGrant),
            Err(e) => Err(e),
        }
    }

    /// Point the default at `id`. The store does not validate that the
    /// grant exists; callers have just created or fetched it.
    pub async fn set_default_grant(&self, id: &str) -> Result<()> {
        self.secrets.set(keys::DEFAULT_GRANT, id).await
    }

    pub async fn clear_default_grant(&self) -> Result<()> {
        self.secrets.delete(keys::DEFAULT_GRANT).await
    }
}
