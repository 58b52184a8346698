//! Shared data contracts: principals, realms, sender settings.

use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use uuid::Uuid;

/// An identity record subject to authentication. Owned by the credential
/// store; the gate only ever reads it.
#[derive(Clone, Debug)]
pub struct Principal {
    pub id: Uuid,
    /// Login identifier (contract number). Unique within a realm.
    pub identifier: String,
    pub email: String,
    pub enabled: bool,
    pub email_verified: bool,
    /// Preferred locale; falls back to the request or realm locale when unset.
    pub locale: Option<String>,
}

impl Principal {
    /// Both flags must be set before a login can succeed.
    #[must_use]
    pub fn is_activated(&self) -> bool {
        self.enabled && self.email_verified
    }
}

/// An isolated namespace of principals plus its notification settings.
/// Immutable for the duration of one authentication attempt.
#[derive(Clone, Debug)]
pub struct Realm {
    pub id: Uuid,
    pub name: String,
    /// Template set used to localize notification messages.
    pub theme: String,
    pub default_locale: String,
    pub sender: SenderConfig,
}

/// Outbound mail settings carried by a realm.
#[derive(Clone, Deserialize)]
pub struct SenderConfig {
    pub host: String,
    #[serde(default = "default_submission_port")]
    pub port: u16,
    pub from: String,
    #[serde(default)]
    pub reply_to: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub password: Option<SecretString>,
}

const fn default_submission_port() -> u16 {
    587
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.map(SecretString::from))
}

impl std::fmt::Debug for SenderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SenderConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("from", &self.from)
            .field("reply_to", &self.reply_to)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Per-request context the surrounding layer passes into the gate, today only
/// the locale hint resolved from the request (e.g. `Accept-Language`).
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    pub locale: Option<String>,
}

impl RequestContext {
    #[must_use]
    pub fn with_locale(locale: impl Into<String>) -> Self {
        Self {
            locale: Some(locale.into()),
        }
    }
}
