//! Credential evaluation.
//!
//! [`AuthenticationGate::evaluate`] is the decision core: it resolves the
//! principal, verifies the secret, checks the activation flags, and produces
//! exactly one [`Outcome`]. Its only side effect is queueing the activation
//! mail for valid-but-inactive accounts; it never mutates the principal and
//! never retries.

pub mod postgres;
pub mod principal;
pub mod store;

use crate::notify::{NotificationRequest, NotifyHandle, ACTIVATION_KEYS};
use anyhow::Result;
use principal::{Principal, Realm, RequestContext};
use secrecy::SecretString;
use std::sync::Arc;
use store::CredentialStore;
use tracing::{debug, info};

/// The result of one authentication attempt.
#[derive(Clone, Debug)]
pub enum Outcome {
    /// Credentials valid and the account is activated; carries the
    /// authenticated identity.
    Success(Principal),
    /// No principal with that identifier in the realm.
    UnknownPrincipal,
    /// Principal found but the secret does not match.
    InvalidSecret,
    /// Credentials valid but the account is not yet enabled and
    /// email-verified; an activation mail was queued. Recorded as "attempted",
    /// never as a hard failure.
    PendingActivation,
}

pub struct AuthenticationGate {
    store: Arc<dyn CredentialStore>,
    notifier: NotifyHandle,
}

impl AuthenticationGate {
    #[must_use]
    pub fn new(store: Arc<dyn CredentialStore>, notifier: NotifyHandle) -> Self {
        Self { store, notifier }
    }

    /// Evaluate a submitted identifier and secret against `realm`.
    ///
    /// Checks run in order and the first failing one wins: unknown principal,
    /// then secret mismatch, then activation state. Unknown identifier and
    /// wrong secret stay distinct outcomes here so logs can tell them apart;
    /// whether they render distinctly is the presentation layer's call.
    ///
    /// # Errors
    ///
    /// Returns an error only when the credential store itself fails; decision
    /// results are `Ok` outcomes.
    pub async fn evaluate(
        &self,
        identifier: &str,
        secret: &SecretString,
        realm: &Realm,
        ctx: &RequestContext,
    ) -> Result<Outcome> {
        let Some(principal) = self.store.find_by_identifier(realm, identifier).await? else {
            debug!(identifier, realm = %realm.name, "unknown principal");
            return Ok(Outcome::UnknownPrincipal);
        };

        if !self.store.verify_secret(&principal, secret).await? {
            debug!(identifier, realm = %realm.name, "secret mismatch");
            return Ok(Outcome::InvalidSecret);
        }

        if !principal.is_activated() {
            info!(
                identifier,
                email = %principal.email,
                realm = %realm.name,
                "credentials valid but account pending activation, queueing mail"
            );
            self.notifier.enqueue(NotificationRequest {
                principal,
                realm: realm.clone(),
                context: ctx.clone(),
                keys: ACTIVATION_KEYS,
            });
            return Ok(Outcome::PendingActivation);
        }

        debug!(identifier, realm = %realm.name, "login successful");
        Ok(Outcome::Success(principal))
    }
}
