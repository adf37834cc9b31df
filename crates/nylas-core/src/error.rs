//! Error types for the Nylas CLI

use thiserror::Error;

/// Result type alias using the CLI's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the Nylas CLI
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Nylas credentials are not configured")]
    NotConfigured,

    #[error("Configuration error: {0}")]
    Config(String),

    // Authentication errors
    #[error("Unsupported provider: {0}")]
    InvalidProvider(String),

    #[error("OAuth flow failed: {error}: {description}")]
    OAuthDenied { error: String, description: String },

    #[error("Timed out after {0} seconds waiting for the OAuth callback")]
    OAuthTimeout(u64),

    #[error("Callback port {0} is already in use")]
    PortInUse(u16),

    #[error("OAuth error: {0}")]
    OAuth(String),

    // Grant errors
    #[error("Grant not found: {0}")]
    GrantNotFound(String),

    #[error("No default grant set")]
    NoDefaultGrant,

    // Secret storage errors
    #[error("Secret not found: {0}")]
    SecretNotFound(String),

    #[error("Secret storage error: {0}")]
    Secret(String),

    #[error("Keyring error: {0}")]
    Keyring(String),

    // API errors
    #[error("Nylas API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_bw::Error),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Returns true for the typed "thing does not exist" errors,
    /// so callers can prompt for setup instead of failing hard.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::GrantNotFound(_) | Error::NoDefaultGrant | Error::SecretNotFound(_)
        )
    }

    /// Returns a user-friendly action message for recoverable errors
    pub fn action_hint(&self) -> Option<&'static str> {
        match self {
            Error::NotConfigured => {
                Some("Run `nylas auth config` to store your Nylas credentials")
            }
            Error::PortInUse(_) => {
                Some("Change callback_port in ~/.config/nylas-cli/config.yaml and retry")
            }
            Error::OAuthTimeout(_) => {
                Some("Re-run `nylas auth login` and complete the sign-in in your browser")
            }
            Error::NoDefaultGrant => {
                Some("Run `nylas auth login` to connect an account")
            }
            _ => None,
        }
    }
}
