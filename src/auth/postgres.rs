//! Postgres-backed credential and realm store.
//!
//! Secrets are stored as argon2 PHC strings in `principals.secret_hash`; realm
//! sender configuration lives in a `sender` JSONB column (see `sql/schema.sql`).

use crate::auth::principal::{Principal, Realm, SenderConfig};
use crate::auth::store::{CredentialStore, RealmStore};
use anyhow::{Context, Result};
use argon2::{Argon2, PasswordHash, PasswordVerifier};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use sqlx::{PgPool, Row};
use tracing::{info_span, Instrument};
use uuid::Uuid;

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_principal(&self, query: &str, bind: Bind<'_>) -> Result<Option<Principal>> {
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );

        let mut q = sqlx::query(query);
        q = match bind {
            Bind::Identifier(realm_id, identifier) => q.bind(realm_id).bind(identifier),
            Bind::Id(realm_id, id) => q.bind(realm_id).bind(id),
        };

        let row = q
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to query principal")?;

        row.map(|row| -> Result<Principal> {
            Ok(Principal {
                id: row.try_get("id")?,
                identifier: row.try_get("identifier")?,
                email: row.try_get("email")?,
                enabled: row.try_get("enabled")?,
                email_verified: row.try_get("email_verified")?,
                locale: row.try_get("locale")?,
            })
        })
        .transpose()
        .context("failed to decode principal row")
    }

    async fn fetch_realm(&self, query: &str, bind: RealmBind<'_>) -> Result<Option<Realm>> {
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );

        let q = match bind {
            RealmBind::Id(id) => sqlx::query(query).bind(id),
            RealmBind::Name(name) => sqlx::query(query).bind(name),
        };

        let row = q
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to query realm")?;

        row.map(|row| -> Result<Realm> {
            let sender: serde_json::Value = row.try_get("sender")?;
            let sender: SenderConfig =
                serde_json::from_value(sender).context("malformed realm sender configuration")?;

            Ok(Realm {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
                theme: row.try_get("theme")?,
                default_locale: row.try_get("default_locale")?,
                sender,
            })
        })
        .transpose()
        .context("failed to decode realm row")
    }
}

enum Bind<'a> {
    Identifier(Uuid, &'a str),
    Id(Uuid, Uuid),
}

enum RealmBind<'a> {
    Id(Uuid),
    Name(&'a str),
}

#[async_trait]
impl CredentialStore for PgStore {
    async fn find_by_identifier(
        &self,
        realm: &Realm,
        identifier: &str,
    ) -> Result<Option<Principal>> {
        let query = "SELECT id, identifier, email, enabled, email_verified, locale \
                     FROM principals WHERE realm_id = $1 AND identifier = $2";
        self.fetch_principal(query, Bind::Identifier(realm.id, identifier))
            .await
    }

    async fn find_by_id(&self, realm: &Realm, id: Uuid) -> Result<Option<Principal>> {
        let query = "SELECT id, identifier, email, enabled, email_verified, locale \
                     FROM principals WHERE realm_id = $1 AND id = $2";
        self.fetch_principal(query, Bind::Id(realm.id, id)).await
    }

    async fn verify_secret(&self, principal: &Principal, secret: &SecretString) -> Result<bool> {
        let query = "SELECT secret_hash FROM principals WHERE id = $1";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );

        let Some(row) = sqlx::query(query)
            .bind(principal.id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to query secret hash")?
        else {
            return Ok(false);
        };

        let stored: String = row
            .try_get("secret_hash")
            .context("failed to decode secret hash")?;
        let hash = PasswordHash::new(&stored).context("stored secret hash is not PHC format")?;

        // A mismatch is a normal outcome, anything else from the verifier is
        // a store-level error.
        match Argon2::default().verify_password(secret.expose_secret().as_bytes(), &hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(err) => Err(anyhow::anyhow!("secret verification failed: {err}")),
        }
    }
}

#[async_trait]
impl RealmStore for PgStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Realm>> {
        let query = "SELECT id, name, theme, default_locale, sender FROM realms WHERE id = $1";
        self.fetch_realm(query, RealmBind::Id(id)).await
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Realm>> {
        let query = "SELECT id, name, theme, default_locale, sender FROM realms WHERE name = $1";
        self.fetch_realm(query, RealmBind::Name(name)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argon2::password_hash::rand_core::OsRng;
    use argon2::password_hash::SaltString;
    use argon2::PasswordHasher;

    #[test]
    fn argon2_hashes_round_trip() -> Result<()> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(b"correct", &salt)
            .map_err(|err| anyhow::anyhow!("hashing failed: {err}"))?
            .to_string();

        let parsed = PasswordHash::new(&hash).map_err(|err| anyhow::anyhow!("{err}"))?;
        assert!(Argon2::default()
            .verify_password(b"correct", &parsed)
            .is_ok());
        assert!(matches!(
            Argon2::default().verify_password(b"wrong", &parsed),
            Err(argon2::password_hash::Error::Password)
        ));
        Ok(())
    }

    #[test]
    fn malformed_hash_is_an_error() {
        assert!(PasswordHash::new("not-a-phc-string").is_err());
    }
}
