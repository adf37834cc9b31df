//! Nylas CLI Core Library
//!
//! OAuth authentication and grant lifecycle against the Nylas v3 API:
//! configuration, secret storage (OS keyring with an encrypted-file
//! fallback), grant persistence, the local OAuth callback listener,
//! and the login/logout orchestration the CLI drives.

pub mod auth;
pub mod browser;
pub mod callback;
pub mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod grants;
pub mod models;
pub mod secrets;

pub use config::Config;
pub use error::{Error, Result};
pub use models::*;

/// Application name for config paths
pub const APP_NAME: &str = "nylas-cli";

/// Service name for OS keyring entries
pub const KEYRING_SERVICE: &str = "nylas-cli";
