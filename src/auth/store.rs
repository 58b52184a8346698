//! Credential and realm store abstractions.
//!
//! Principal records and realm configuration are owned by whatever sits behind
//! these traits; the gate and the registration trigger only read through them.

use crate::auth::principal::{Principal, Realm};
use anyhow::Result;
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

/// Resolves principals and verifies their secrets.
///
/// The secret is opaque to callers: whether it is compared against an argon2
/// hash, an external IdP, or plaintext (dev) is the store's business.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Look up a principal by its login identifier within `realm`.
    ///
    /// # Errors
    /// Returns an error on store I/O failure; an absent principal is `Ok(None)`.
    async fn find_by_identifier(&self, realm: &Realm, identifier: &str)
        -> Result<Option<Principal>>;

    /// Look up a principal by id within `realm`.
    ///
    /// # Errors
    /// Returns an error on store I/O failure; an absent principal is `Ok(None)`.
    async fn find_by_id(&self, realm: &Realm, id: Uuid) -> Result<Option<Principal>>;

    /// Verify `secret` against the stored credential of `principal`.
    ///
    /// # Errors
    /// Returns an error on store I/O failure; a mismatch is `Ok(false)`.
    async fn verify_secret(&self, principal: &Principal, secret: &SecretString) -> Result<bool>;
}

/// Resolves realm configuration.
#[async_trait]
pub trait RealmStore: Send + Sync {
    /// # Errors
    /// Returns an error on store I/O failure; an unknown realm is `Ok(None)`.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Realm>>;

    /// # Errors
    /// Returns an error on store I/O failure; an unknown realm is `Ok(None)`.
    async fn find_by_name(&self, name: &str) -> Result<Option<Realm>>;
}

/// In-process store for local development and tests. Secrets are compared in
/// plaintext, so this must never back a real deployment.
#[derive(Default)]
pub struct MemoryStore {
    realms: RwLock<Vec<Realm>>,
    principals: RwLock<HashMap<Uuid, Entry>>,
}

struct Entry {
    realm_id: Uuid,
    principal: Principal,
    secret: SecretString,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Panics
    /// Panics if the internal lock is poisoned.
    pub fn add_realm(&self, realm: Realm) {
        self.realms
            .write()
            .expect("realm lock poisoned")
            .push(realm);
    }

    /// # Panics
    /// Panics if the internal lock is poisoned.
    pub fn add_principal(&self, realm_id: Uuid, principal: Principal, secret: SecretString) {
        self.principals.write().expect("principal lock poisoned").insert(
            principal.id,
            Entry {
                realm_id,
                principal,
                secret,
            },
        );
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn find_by_identifier(
        &self,
        realm: &Realm,
        identifier: &str,
    ) -> Result<Option<Principal>> {
        let principals = self.principals.read().expect("principal lock poisoned");
        Ok(principals
            .values()
            .find(|entry| entry.realm_id == realm.id && entry.principal.identifier == identifier)
            .map(|entry| entry.principal.clone()))
    }

    async fn find_by_id(&self, realm: &Realm, id: Uuid) -> Result<Option<Principal>> {
        let principals = self.principals.read().expect("principal lock poisoned");
        Ok(principals
            .get(&id)
            .filter(|entry| entry.realm_id == realm.id)
            .map(|entry| entry.principal.clone()))
    }

    async fn verify_secret(&self, principal: &Principal, secret: &SecretString) -> Result<bool> {
        let principals = self.principals.read().expect("principal lock poisoned");
        Ok(principals
            .get(&principal.id)
            .is_some_and(|entry| entry.secret.expose_secret() == secret.expose_secret()))
    }
}

#[async_trait]
impl RealmStore for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Realm>> {
        let realms = self.realms.read().expect("realm lock poisoned");
        Ok(realms.iter().find(|realm| realm.id == id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Realm>> {
        let realms = self.realms.read().expect("realm lock poisoned");
        Ok(realms.iter().find(|realm| realm.name == name).cloned())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::auth::principal::SenderConfig;

    pub fn test_realm(name: &str) -> Realm {
        Realm {
            id: Uuid::new_v4(),
            name: name.to_string(),
            theme: "base".to_string(),
            default_locale: "en".to_string(),
            sender: SenderConfig {
                host: "mail.example.com".to_string(),
                port: 587,
                from: "noreply@example.com".to_string(),
                reply_to: None,
                username: None,
                password: None,
            },
        }
    }

    pub fn test_principal(identifier: &str, enabled: bool, email_verified: bool) -> Principal {
        Principal {
            id: Uuid::new_v4(),
            identifier: identifier.to_string(),
            email: format!("{identifier}@example.com"),
            enabled,
            email_verified,
            locale: None,
        }
    }
}
