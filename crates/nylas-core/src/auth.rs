//! OAuth login and grant lifecycle orchestration
//!
//! `AuthService` composes the Nylas client, grant store, callback
//! server, and browser launcher (all injected once at construction)
//! and drives the browser-based login dance plus logout/revoke and
//! default-grant bookkeeping.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::browser::Browser;
use crate::callback::CallbackServer;
use crate::client::NylasClient;
use crate::error::{Error, Result};
use crate::grants::GrantStore;
use crate::models::{Grant, Provider};

/// Orchestrates the login flow and grant lifecycle.
pub struct AuthService {
    client: Arc<dyn NylasClient>,
    grants: GrantStore,
    server: Box<dyn CallbackServer>,
    browser: Arc<dyn Browser>,
}

impl AuthService {
    pub fn new(
        client: Arc<dyn NylasClient>,
        grants: GrantStore,
        server: Box<dyn CallbackServer>,
        browser: Arc<dyn Browser>,
    ) -> Self {
        Self {
            client,
            grants,
            server,
            browser,
        }
    }

    /// The underlying grant store, for read-only status queries.
    pub fn grants(&self) -> &GrantStore {
        &self.grants
    }

    /// Run the full browser-based login flow for `provider`.
    ///
    /// Steps are strictly sequential: bind the callback listener,
    /// build the hosted-auth URL, open the browser, wait for the
    /// redirect (the single suspension point, bounded by `timeout`),
    /// exchange the code, persist the grant, make it the default if
    /// none is set. Any failure aborts the whole flow; no partial
    /// grant is ever persisted. The listener is closed on every path.
    pub async fn login(&mut self, provider: Provider, timeout: Duration) -> Result<Grant> {
        self.server.start().await?;
        let redirect_uri = self.server.redirect_uri();

        let auth_url = self.client.build_auth_url(provider, &redirect_uri);
        info!(%provider, "Starting login flow");

        // Best-effort: the listener is up either way, so the user can
        // still open the URL by hand.
        if let Err(e) = self.browser.open(&auth_url) {
            warn!(
                "Failed to launch browser ({}); open this URL manually: {}",
                e, auth_url
            );
        }

        let code = self.server.wait_for_code(timeout).await?;
        debug!("Authorization code received");

        let grant = self.client.exchange_code(&code, &redirect_uri).await?;
        self.grants.save_grant(grant.clone()).await?;

        // The first grant becomes the default; later logins never
        // steal an existing default.
        if let Err(Error::NoDefaultGrant) = self.grants.get_default_grant().await {
            self.grants.set_default_grant(&grant.id).await?;
            info!(grant_id = %grant.id, "Set default grant");
        }

        info!(grant_id = %grant.id, email = %grant.email, "Login complete");
        Ok(grant)
    }

    /// Log out the default grant.
    pub async fn logout(&self) -> Result<()> {
        let id = self.grants.get_default_grant().await?;
        self.logout_grant(&id).await
    }

    /// Revoke a grant remotely and delete it locally.
    ///
    /// A grant the provider no longer knows is still removed locally
    /// (revoking twice is not an error from the user's perspective);
    /// any other remote failure aborts before the local delete so the
    /// two sides never diverge silently.
    pub async fn logout_grant(&self, id: &str) -> Result<()> {
        match self.client.revoke_grant(id).await {
            Ok(()) => {}
            Err(Error::GrantNotFound(_)) => {
                debug!(grant_id = %id, "Grant already revoked on the provider side");
            }
            Err(e) => return Err(e),
        }

        self.grants.delete_grant(id).await?;
        self.auto_switch_default().await;
        Ok(())
    }

    /// Re-point the default at the first remaining grant when it no
    /// longer references one; best-effort.
    async fn auto_switch_default(&self) {
        let grants = match self.grants.list_grants().await {
            Ok(grants) => grants,
            Err(_) => return,
        };

        match self.grants.get_default_grant().await {
            Ok(id) if grants.iter().any(|g| g.id == id) => {}
            _ => {
                if let Some(first) = grants.first() {
                    if self.grants.set_default_grant(&first.id).await.is_ok() {
                        info!(grant_id = %first.id, "Switched default grant");
                    }
                } else {
                    let _ = self.grants.clear_default_grant().await;
                }
            }
        }
    }

    /// Grants known to the Nylas application. The remote API is the
    /// source of truth; a network failure fails the listing.
    pub async fn list_grants(&self) -> Result<Vec<Grant>> {
        self.client.list_grants().await
    }

    /// The grant commands use when none is named explicitly, fetched
    /// fresh from the API.
    pub async fn current_grant(&self) -> Result<Grant> {
        let id = self.grants.get_default_grant().await?;
        self.client.get_grant(&id).await
    }

    /// Make `id_or_email` the default grant, resolving by grant ID
    /// first, then by email against the local store.
    pub async fn switch(&self, id_or_email: &str) -> Result<Grant> {
        let grant = match self.grants.get_grant(id_or_email).await {
            Ok(grant) => grant,
            Err(Error::GrantNotFound(_)) => self.grants.get_grant_by_email(id_or_email).await?,
            Err(e) => return Err(e),
        };

        self.grants.set_default_grant(&grant.id).await?;
        info!(grant_id = %grant.id, email = %grant.email, "Switched default grant");
        Ok(grant)
    }
}
