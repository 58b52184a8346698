//! Lifecycle event reactions.
//!
//! Currently one reaction exists: a welcome mail queued when a principal
//! registers. Event handling is fire-and-forget, a failed reaction never
//! surfaces to whoever emitted the event.

use crate::auth::principal::RequestContext;
use crate::auth::store::{CredentialStore, RealmStore};
use crate::notify::{NotificationRequest, NotifyHandle, WELCOME_KEYS};
use std::sync::Arc;
use tracing::{debug, error};
use uuid::Uuid;

pub struct RegistrationTrigger {
    realms: Arc<dyn RealmStore>,
    store: Arc<dyn CredentialStore>,
    notifier: NotifyHandle,
}

impl RegistrationTrigger {
    #[must_use]
    pub fn new(
        realms: Arc<dyn RealmStore>,
        store: Arc<dyn CredentialStore>,
        notifier: NotifyHandle,
    ) -> Self {
        Self {
            realms,
            store,
            notifier,
        }
    }

    /// React to a completed registration by queueing the welcome mail.
    ///
    /// Infallible by contract: unknown realm or principal and store failures
    /// are logged and swallowed, registration itself already succeeded.
    pub async fn on_principal_registered(&self, principal_id: Uuid, realm_id: Uuid) {
        let realm = match self.realms.find_by_id(realm_id).await {
            Ok(Some(realm)) => realm,
            Ok(None) => {
                debug!(%realm_id, "registration event for unknown realm, ignoring");
                return;
            }
            Err(err) => {
                error!(%realm_id, "failed to load realm for registration event: {err}");
                return;
            }
        };

        let principal = match self.store.find_by_id(&realm, principal_id).await {
            Ok(Some(principal)) => principal,
            Ok(None) => {
                debug!(%principal_id, realm = %realm.name, "registration event for unknown principal, ignoring");
                return;
            }
            Err(err) => {
                error!(%principal_id, realm = %realm.name, "failed to load principal for registration event: {err}");
                return;
            }
        };

        debug!(
            identifier = %principal.identifier,
            realm = %realm.name,
            "queueing welcome mail"
        );
        self.notifier.enqueue(NotificationRequest {
            principal,
            realm,
            // Registration events carry no request, the principal preference
            // and realm default decide the locale.
            context: RequestContext::default(),
            keys: WELCOME_KEYS,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::principal::{Principal, Realm};
    use crate::auth::store::testing::{test_principal, test_realm};
    use crate::auth::store::MemoryStore;
    use crate::notify::queue;
    use anyhow::Result;
    use secrecy::SecretString;

    #[tokio::test]
    async fn registration_queues_welcome_mail() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        let realm = test_realm("tenant");
        store.add_realm(realm.clone());
        let principal = test_principal("frida", false, false);
        store.add_principal(realm.id, principal.clone(), SecretString::from("pw"));

        let (notifier, mut rx) = queue(4);
        let trigger = RegistrationTrigger::new(store.clone(), store, notifier);

        trigger.on_principal_registered(principal.id, realm.id).await;

        let request = rx.try_recv()?;
        assert_eq!(request.keys, WELCOME_KEYS);
        assert_eq!(request.principal.identifier, "frida");
        assert!(request.context.locale.is_none());
        assert!(rx.try_recv().is_err());
        Ok(())
    }

    #[tokio::test]
    async fn unknown_principal_is_a_quiet_no_op() {
        let store = Arc::new(MemoryStore::new());
        let realm = test_realm("tenant");
        store.add_realm(realm.clone());

        let (notifier, mut rx) = queue(4);
        let trigger = RegistrationTrigger::new(store.clone(), store, notifier);

        trigger
            .on_principal_registered(Uuid::new_v4(), realm.id)
            .await;
        assert!(rx.try_recv().is_err());
    }

    struct BrokenStore;

    #[async_trait::async_trait]
    impl RealmStore for BrokenStore {
        async fn find_by_id(&self, _id: Uuid) -> anyhow::Result<Option<Realm>> {
            Err(anyhow::anyhow!("store unavailable"))
        }

        async fn find_by_name(
            &self,
            _name: &str,
        ) -> anyhow::Result<Option<Realm>> {
            Err(anyhow::anyhow!("store unavailable"))
        }
    }

    #[async_trait::async_trait]
    impl CredentialStore for BrokenStore {
        async fn find_by_identifier(
            &self,
            _realm: &Realm,
            _identifier: &str,
        ) -> anyhow::Result<Option<Principal>> {
            Err(anyhow::anyhow!("store unavailable"))
        }

        async fn find_by_id(
            &self,
            _realm: &Realm,
            _id: Uuid,
        ) -> anyhow::Result<Option<Principal>> {
            Err(anyhow::anyhow!("store unavailable"))
        }

        async fn verify_secret(
            &self,
            _principal: &Principal,
            _secret: &SecretString,
        ) -> anyhow::Result<bool> {
            Err(anyhow::anyhow!("store unavailable"))
        }
    }

    #[tokio::test]
    async fn realm_store_failure_is_swallowed() {
        let (notifier, mut rx) = queue(4);
        let trigger =
            RegistrationTrigger::new(Arc::new(BrokenStore), Arc::new(BrokenStore), notifier);

        // Must not panic or propagate; registration already succeeded upstream.
        trigger
            .on_principal_registered(Uuid::new_v4(), Uuid::new_v4())
            .await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn principal_store_failure_is_swallowed() {
        let realms = Arc::new(MemoryStore::new());
        let realm = test_realm("tenant");
        realms.add_realm(realm.clone());

        let (notifier, mut rx) = queue(4);
        let trigger = RegistrationTrigger::new(realms, Arc::new(BrokenStore), notifier);

        trigger
            .on_principal_registered(Uuid::new_v4(), realm.id)
            .await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unknown_realm_is_a_quiet_no_op() {
        let store = Arc::new(MemoryStore::new());
        let (notifier, mut rx) = queue(4);
        let trigger = RegistrationTrigger::new(store.clone(), store, notifier);

        trigger
            .on_principal_registered(Uuid::new_v4(), Uuid::new_v4())
            .await;
        assert!(rx.try_recv().is_err());
    }
}
