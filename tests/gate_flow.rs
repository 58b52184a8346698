//! End-to-end flow through the public API: gate or trigger enqueues, the
//! background worker localizes and formats, and the channel receives the
//! finished message.

use anyhow::Result;
use async_trait::async_trait;
use einlass::auth::principal::{Principal, Realm, RequestContext, SenderConfig};
use einlass::auth::store::MemoryStore;
use einlass::auth::{AuthenticationGate, Outcome};
use einlass::events::RegistrationTrigger;
use einlass::notify::channel::NotificationChannel;
use einlass::notify::template::{DefaultLocaleResolver, StaticTemplateSource, TemplateSet};
use einlass::notify::{spawn_worker, NotificationDispatcher, NotifyWorkerConfig};
use secrecy::SecretString;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

#[derive(Debug, Default)]
struct RecordingChannel {
    sent: Mutex<Vec<(String, String, String)>>,
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    async fn send(
        &self,
        _sender: &SenderConfig,
        to: &str,
        subject: &str,
        text_body: &str,
        _html_body: &str,
    ) -> Result<()> {
        self.sent.lock().expect("sent lock poisoned").push((
            to.to_string(),
            subject.to_string(),
            text_body.to_string(),
        ));
        Ok(())
    }
}

fn realm() -> Realm {
    Realm {
        id: Uuid::new_v4(),
        name: "tenant".to_string(),
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

fn principal(identifier: &str, enabled: bool, email_verified: bool) -> Principal {
    Principal {
        id: Uuid::new_v4(),
        identifier: identifier.to_string(),
        email: format!("{identifier}@example.com"),
        enabled,
        email_verified,
        locale: Some("de".to_string()),
    }
}

fn templates() -> StaticTemplateSource {
    StaticTemplateSource::new().with_set(
        "base",
        "de",
        TemplateSet::new(HashMap::from([
            (
                "mailSubject".to_string(),
                "Bitte Konto aktivieren".to_string(),
            ),
            (
                "mailTextBody".to_string(),
                "Ihr Konto ist noch nicht aktiv.".to_string(),
            ),
            ("mailHTMLBody".to_string(), "<p>inaktiv</p>".to_string()),
            ("welcomeSubject".to_string(), "Willkommen!".to_string()),
            (
                "welcomeBody".to_string(),
                "Danke für Ihre Registrierung.".to_string(),
            ),
            (
                "welcomeBodyHtml".to_string(),
                "<p>Willkommen!</p>".to_string(),
            ),
        ])),
    )
}

#[tokio::test]
async fn pending_login_ends_in_activation_mail() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let realm = realm();
    store.add_realm(realm.clone());
    let carol = principal("40012345", false, true);
    store.add_principal(realm.id, carol, SecretString::from("correct"));

    let channel = Arc::new(RecordingChannel::default());
    let dispatcher = NotificationDispatcher::new(
        Arc::new(DefaultLocaleResolver),
        Arc::new(templates()),
        channel.clone(),
    );
    let (notifier, task) = spawn_worker(dispatcher, NotifyWorkerConfig::new());
    let gate = AuthenticationGate::new(store, notifier);

    let outcome = gate
        .evaluate(
            "40012345",
            &SecretString::from("correct"),
            &realm,
            &RequestContext::default(),
        )
        .await?;
    assert!(matches!(outcome, Outcome::PendingActivation));

    // Dropping the gate drops the last producer handle; the worker drains the
    // queue and exits.
    drop(gate);
    task.await?;

    let sent = channel.sent.lock().expect("sent lock poisoned");
    assert_eq!(sent.len(), 1);
    let (to, subject, text_body) = &sent[0];
    assert_eq!(to, "40012345@example.com");
    assert_eq!(subject, "Bitte Konto aktivieren");
    assert_eq!(text_body, "Ihr Konto ist noch nicht aktiv.");
    Ok(())
}

#[tokio::test]
async fn successful_login_sends_nothing() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let realm = realm();
    store.add_realm(realm.clone());
    store.add_principal(
        realm.id,
        principal("40067890", true, true),
        SecretString::from("correct"),
    );

    let channel = Arc::new(RecordingChannel::default());
    let dispatcher = NotificationDispatcher::new(
        Arc::new(DefaultLocaleResolver),
        Arc::new(templates()),
        channel.clone(),
    );
    let (notifier, task) = spawn_worker(dispatcher, NotifyWorkerConfig::new());
    let gate = AuthenticationGate::new(store, notifier);

    let outcome = gate
        .evaluate(
            "40067890",
            &SecretString::from("correct"),
            &realm,
            &RequestContext::default(),
        )
        .await?;
    assert!(matches!(outcome, Outcome::Success(_)));

    drop(gate);
    task.await?;

    assert!(channel.sent.lock().expect("sent lock poisoned").is_empty());
    Ok(())
}

#[tokio::test]
async fn registration_ends_in_welcome_mail() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let realm = realm();
    store.add_realm(realm.clone());
    let frida = principal("40055555", false, false);
    store.add_principal(realm.id, frida.clone(), SecretString::from("pw"));

    let channel = Arc::new(RecordingChannel::default());
    let dispatcher = NotificationDispatcher::new(
        Arc::new(DefaultLocaleResolver),
        Arc::new(templates()),
        channel.clone(),
    );
    let (notifier, task) = spawn_worker(dispatcher, NotifyWorkerConfig::new());
    let trigger = RegistrationTrigger::new(store.clone(), store, notifier);

    trigger.on_principal_registered(frida.id, realm.id).await;

    drop(trigger);
    task.await?;

    let sent = channel.sent.lock().expect("sent lock poisoned");
    assert_eq!(sent.len(), 1);
    let (to, subject, text_body) = &sent[0];
    assert_eq!(to, "40055555@example.com");
    assert_eq!(subject, "Willkommen!");
    assert_eq!(text_body, "Danke für Ihre Registrierung.");
    Ok(())
}
