//! Nylas API client
//!
//! Only the auth-facing slice of the v3 API is implemented here: the
//! hosted-auth URL, the code-for-grant exchange, and grant
//! list/get/revoke. Everything else the CLI does with the API lives
//! behind other adapters.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{Grant, Provider};

/// Client credentials used by the auth endpoints
#[derive(Clone)]
pub struct ApiCredentials {
    pub api_key: String,
    pub client_id: String,
    pub client_secret: String,
}

/// The slice of the Nylas API the auth flow consumes.
#[async_trait]
pub trait NylasClient: Send + Sync {
    /// Hosted-auth URL the user's browser is sent to.
    fn build_auth_url(&self, provider: Provider, redirect_uri: &str) -> String;

    /// Exchange an authorization code for a grant.
    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<Grant>;

    /// All grants for the application. The remote list is the source
    /// of truth; there is no local fallback.
    async fn list_grants(&self) -> Result<Vec<Grant>>;

    async fn get_grant(&self, grant_id: &str) -> Result<Grant>;

    /// Fails with `Error::GrantNotFound` if the provider no longer
    /// knows the grant.
    async fn revoke_grant(&self, grant_id: &str) -> Result<()>;
}

/// `NylasClient` over reqwest against `api.{us,eu}.nylas.com`.
pub struct HttpClient {
    http: reqwest::Client,
    base_url: String,
    credentials: ApiCredentials,
}

#[derive(Deserialize)]
struct ExchangeResponse {
    grant_id: String,
    email: String,
    #[serde(default)]
    provider: Provider,
    #[serde(default)]
    scope: Option<String>,
}

#[derive(Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

impl HttpClient {
    pub fn new(config: &Config, credentials: ApiCredentials) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.api.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.api_base_url(),
            credentials,
        })
    }

    /// Read a non-success response into a typed API error.
    async fn api_error(response: reqwest::Response) -> Error {
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        error!(status, "Nylas API request failed: {}", message);
        Error::Api { status, message }
    }
}

#[async_trait]
impl NylasClient for HttpClient {
    fn build_auth_url(&self, provider: Provider, redirect_uri: &str) -> String {
        format!(
            "{}/v3/connect/auth?client_id={}&redirect_uri={}&response_type=code&provider={}&access_type=offline",
            self.base_url,
            urlencoding::encode(&self.credentials.client_id),
            urlencoding::encode(redirect_uri),
            provider,
        )
    }

    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<Grant> {
        info!("Exchanging authorization code for a grant");

        let payload = serde_json::json!({
            "code": code,
            "redirect_uri": redirect_uri,
            "grant_type": "authorization_code",
            "client_id": self.credentials.client_id,
            "client_secret": self.credentials.client_secret,
        });

        let response = self
            .http
            .post(format!("{}/v3/connect/token", self.base_url))
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        let exchanged: ExchangeResponse = response.json().await?;
        debug!(grant_id = %exchanged.grant_id, "Code exchange successful");

        Ok(Grant {
            id: exchanged.grant_id,
            email: exchanged.email,
            provider: exchanged.provider,
            grant_status: "valid".to_string(),
            scope: exchanged
                .scope
                .map(|s| s.split_whitespace().map(String::from).collect())
                .unwrap_or_default(),
            created_at: None,
            updated_at: None,
        })
    }

    async fn list_grants(&self) -> Result<Vec<Grant>> {
        let response = self
            .http
            .get(format!("{}/v3/grants", self.base_url))
            .bearer_auth(&self.credentials.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        let envelope: DataEnvelope<Vec<Grant>> = response.json().await?;
        Ok(envelope.data)
    }

    async fn get_grant(&self, grant_id: &str) -> Result<Grant> {
        let response = self
            .http
            .get(format!("{}/v3/grants/{}", self.base_url, grant_id))
            .bearer_auth(&self.credentials.api_key)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::GrantNotFound(grant_id.to_string()));
        }
        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        let envelope: DataEnvelope<Grant> = response.json().await?;
        Ok(envelope.data)
    }

    async fn revoke_grant(&self, grant_id: &str) -> Result<()> {
        let response = self
            .http
            .delete(format!("{}/v3/grants/{}", self.base_url, grant_id))
            .bearer_auth(&self.credentials.api_key)
            .send()
            .await?;

        match response.status() {
            reqwest::StatusCode::NOT_FOUND => Err(Error::GrantNotFound(grant_id.to_string())),
            status if status.is_success() => {
                info!(grant_id, "Revoked grant");
                Ok(())
            }
            _ => Err(Self::api_error(response).await),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> HttpClient {
        HttpClient::new(
            &Config::default(),
            ApiCredentials {
                api_key: "key".to_string(),
                client_id: "client id".to_string(),
                client_secret: "secret".to_string(),
            },
        )
        .unwrap()
    }

    #[test]
    fn test_build_auth_url() {
        let url = client().build_auth_url(Provider::Google, "http://127.0.0.1:8080/callback");

        assert!(url.starts_with("https://api.us.nylas.com/v3/connect/auth?"));
        assert!(url.contains("client_id=client%20id"));
        assert!(url.contains("redirect_uri=http%3A%2F%2F127.0.0.1%3A8080%2Fcallback"));
        assert!(url.contains("provider=google"));
        assert!(url.contains("response_type=code"));
    }

    #[test]
    fn test_base_url_follows_region() {
        let mut config = Config::default();
        config.region = crate::config::Region::Eu;
        let client = HttpClient::new(
            &config,
            ApiCredentials {
                api_key: String::new(),
                client_id: String::new(),
                client_secret: String::new(),
            },
        )
        .unwrap();

        let url = client.build_auth_url(Provider::Microsoft, "http://127.0.0.1:8080/callback");
        assert!(url.starts_with("https://api.eu.nylas.com/"));
        assert!(url.contains("provider=microsoft"));
    }
}
