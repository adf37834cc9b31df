//! Grant and provider types

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Mailbox vendor a grant is associated with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Google,
    Microsoft,
    Imap,
    Ews,
    Yahoo,
    Icloud,
    Zoom,
    Other,
}

impl Provider {
    /// All providers accepted by `nylas auth login --provider`
    pub const ALL: &'static [Provider] = &[
        Provider::Google,
        Provider::Microsoft,
        Provider::Imap,
        Provider::Ews,
        Provider::Yahoo,
        Provider::Icloud,
        Provider::Zoom,
        Provider::Other,
    ];

    /// Wire name used in auth URLs and grant payloads
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Google => "google",
            Provider::Microsoft => "microsoft",
            Provider::Imap => "imap",
            Provider::Ews => "ews",
            Provider::Yahoo => "yahoo",
            Provider::Icloud => "icloud",
            Provider::Zoom => "zoom",
            Provider::Other => "other",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "google" => Ok(Provider::Google),
            "microsoft" => Ok(Provider::Microsoft),
            "imap" => Ok(Provider::Imap),
            "ews" => Ok(Provider::Ews),
            "yahoo" => Ok(Provider::Yahoo),
            "icloud" => Ok(Provider::Icloud),
            "zoom" => Ok(Provider::Zoom),
            "other" => Ok(Provider::Other),
            _ => Err(Error::InvalidProvider(s.to_string())),
        }
    }
}

impl Default for Provider {
    fn default() -> Self {
        Provider::Google
    }
}

/// One authorized mailbox connection.
///
/// The `id` is provider-issued and immutable; `grant_status` is the
/// only field expected to change in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grant {
    pub id: String,

    pub email: String,

    #[serde(default)]
    pub provider: Provider,

    /// "valid" or a provider-specific revoked/expired state
    #[serde(default = "default_grant_status")]
    pub grant_status: String,

    /// Granted OAuth scopes, in the order the provider returned them
    #[serde(default)]
    pub scope: Vec<String>,

    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_grant_status() -> String {
    "valid".to_string()
}

impl Grant {
    pub fn is_valid(&self) -> bool {
        self.grant_status == "valid"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_round_trip() {
        for p in Provider::ALL {
            assert_eq!(p.as_str().parse::<Provider>().unwrap(), *p);
        }
    }

    #[test]
    fn test_provider_rejects_unknown() {
        let err = "hotmail".parse::<Provider>().unwrap_err();
        assert!(matches!(err, Error::InvalidProvider(_)));
    }

    #[test]
    fn test_grant_deserializes_api_payload() {
        let json = r#"{
            "id": "grant-1",
            "email": "a@b.com",
            "provider": "microsoft",
            "grant_status": "valid",
            "scope": ["Mail.Read", "Calendars.Read"],
            "created_at": 1700000000,
            "updated_at": 1700000500
        }"#;

        let grant: Grant = serde_json::from_str(json).unwrap();
        assert_eq!(grant.id, "grant-1");
        assert_eq!(grant.provider, Provider::Microsoft);
        assert_eq!(grant.scope.len(), 2);
        assert!(grant.is_valid());
        assert!(grant.created_at.unwrap() < grant.updated_at.unwrap());
    }

    #[test]
    fn test_grant_defaults_for_sparse_payload() {
        let grant: Grant = serde_json::from_str(r#"{"id": "g", "email": "a@b.com"}"#).unwrap();
        assert_eq!(grant.grant_status, "valid");
        assert_eq!(grant.provider, Provider::Google);
        assert!(grant.scope.is_empty());
        assert!(grant.created_at.is_none());
    }
}
