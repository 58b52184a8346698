//! Notification queue, worker, and dispatch.
//!
//! Login and registration flows enqueue a [`NotificationRequest`] on a bounded
//! in-process queue and return immediately; a background task is the sole
//! consumer. Per request the worker resolves the effective locale, loads the
//! realm's template set, formats subject/text/html, and hands the result to a
//! [`channel::NotificationChannel`].
//!
//! ### Failure policy
//!
//! Nothing in here can fail an authentication attempt. Enqueueing uses
//! `try_send` and drops with a warning when the queue is full; an unresolvable
//! locale or missing template set skips the request with a log line; delivery
//! failures are retried with exponential backoff and jitter until a max
//! attempt threshold, then dropped.
//!
//! The default channel for local dev is [`channel::LogMailer`], which logs and
//! returns `Ok(())`. Queue capacity and retry/backoff settings are
//! configurable via [`NotifyWorkerConfig`].

pub mod channel;
pub mod template;

use crate::auth::principal::{Principal, Realm, RequestContext};
use channel::NotificationChannel;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use template::{LocaleResolver, TemplateSource};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// The subject/text/html key triple of one message kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TemplateKeys {
    pub subject: &'static str,
    pub text_body: &'static str,
    pub html_body: &'static str,
}

/// Keys for the "account not yet activated" mail queued on login.
pub const ACTIVATION_KEYS: TemplateKeys = TemplateKeys {
    subject: "mailSubject",
    text_body: "mailTextBody",
    html_body: "mailHTMLBody",
};

/// Keys for the welcome mail queued on registration.
pub const WELCOME_KEYS: TemplateKeys = TemplateKeys {
    subject: "welcomeSubject",
    text_body: "welcomeBody",
    html_body: "welcomeBodyHtml",
};

/// One message to localize, format, and deliver. Built by the gate or the
/// registration trigger, consumed by the worker.
#[derive(Clone, Debug)]
pub struct NotificationRequest {
    pub principal: Principal,
    pub realm: Realm,
    pub context: RequestContext,
    pub keys: TemplateKeys,
}

/// Producer side of the notification queue.
///
/// Enqueueing never blocks and never reports failure to the caller: a full or
/// closed queue drops the request with a warning, because a lost mail must not
/// fail the authentication attempt that triggered it.
#[derive(Clone)]
pub struct NotifyHandle {
    tx: mpsc::Sender<NotificationRequest>,
}

impl NotifyHandle {
    pub fn enqueue(&self, request: NotificationRequest) {
        match self.tx.try_send(request) {
            Ok(()) => {}
            Err(TrySendError::Full(request)) => {
                warn!(
                    identifier = %request.principal.identifier,
                    "notification queue full, dropping request"
                );
            }
            Err(TrySendError::Closed(request)) => {
                warn!(
                    identifier = %request.principal.identifier,
                    "notification queue closed, dropping request"
                );
            }
        }
    }
}

/// Create a queue without a worker, for callers that consume requests
/// themselves (tests, custom consumers).
#[must_use]
pub fn queue(capacity: usize) -> (NotifyHandle, mpsc::Receiver<NotificationRequest>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (NotifyHandle { tx }, rx)
}

#[derive(Clone, Copy, Debug)]
pub struct NotifyWorkerConfig {
    queue_capacity: usize,
    max_attempts: u32,
    backoff_base: Duration,
    backoff_max: Duration,
}

impl NotifyWorkerConfig {
    /// Default worker config: 256 queued requests, 5 max attempts, and
    /// 5s->5m exponential backoff with jitter.
    #[must_use]
    pub fn new() -> Self {
        Self {
            queue_capacity: 256,
            max_attempts: 5,
            backoff_base: Duration::from_secs(5),
            backoff_max: Duration::from_secs(300),
        }
    }

    #[must_use]
    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    #[must_use]
    pub fn with_backoff_base_seconds(mut self, seconds: u64) -> Self {
        self.backoff_base = Duration::from_secs(seconds);
        self
    }

    #[must_use]
    pub fn with_backoff_max_seconds(mut self, seconds: u64) -> Self {
        self.backoff_max = Duration::from_secs(seconds);
        self
    }

    #[must_use]
    pub fn normalize(self) -> Self {
        let queue_capacity = self.queue_capacity.max(1);
        let max_attempts = self.max_attempts.max(1);
        let backoff_base = if self.backoff_base.is_zero() {
            Duration::from_secs(1)
        } else {
            self.backoff_base
        };
        let backoff_max = if self.backoff_max < backoff_base {
            backoff_base
        } else {
            self.backoff_max
        };
        Self {
            queue_capacity,
            max_attempts,
            backoff_base,
            backoff_max,
        }
    }

    #[must_use]
    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[must_use]
    pub fn backoff_base(&self) -> Duration {
        self.backoff_base
    }

    #[must_use]
    pub fn backoff_max(&self) -> Duration {
        self.backoff_max
    }
}

impl Default for NotifyWorkerConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves, formats, and delivers one request at a time.
pub struct NotificationDispatcher {
    locales: Arc<dyn LocaleResolver>,
    templates: Arc<dyn TemplateSource>,
    channel: Arc<dyn NotificationChannel>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DispatchStatus {
    Sent,
    /// Locale or templates unavailable; not retryable.
    Skipped,
    /// Channel delivery failed; worth retrying.
    Failed,
}

impl NotificationDispatcher {
    #[must_use]
    pub fn new(
        locales: Arc<dyn LocaleResolver>,
        templates: Arc<dyn TemplateSource>,
        channel: Arc<dyn NotificationChannel>,
    ) -> Self {
        Self {
            locales,
            templates,
            channel,
        }
    }

    /// Deliver one request, absorbing every failure. Callers never observe
    /// delivery problems; they are logged here.
    pub async fn dispatch(&self, request: &NotificationRequest) {
        let _ = self.deliver(request).await;
    }

    async fn deliver(&self, request: &NotificationRequest) -> DispatchStatus {
        let Some(locale) =
            self.locales
                .resolve(&request.principal, &request.realm, &request.context)
        else {
            warn!(
                identifier = %request.principal.identifier,
                realm = %request.realm.name,
                "no locale resolved, skipping notification"
            );
            return DispatchStatus::Skipped;
        };

        let set = match self.templates.template_set(&request.realm.theme, &locale) {
            Ok(set) => set,
            Err(err) => {
                error!(
                    theme = %request.realm.theme,
                    locale = %locale,
                    "failed to load template set: {err:#}"
                );
                return DispatchStatus::Skipped;
            }
        };

        let subject = set.format(request.keys.subject);
        let text_body = set.format(request.keys.text_body);
        let html_body = set.format(request.keys.html_body);

        match self
            .channel
            .send(
                &request.realm.sender,
                &request.principal.email,
                &subject,
                &text_body,
                &html_body,
            )
            .await
        {
            Ok(()) => {
                info!(
                    to = %request.principal.email,
                    subject = %request.keys.subject,
                    "notification sent"
                );
                DispatchStatus::Sent
            }
            Err(err) => {
                error!(
                    to = %request.principal.email,
                    "notification send failed: {err:#}"
                );
                DispatchStatus::Failed
            }
        }
    }
}

/// Spawn the queue consumer. Returns the producer handle and the worker task;
/// the worker exits once every handle is dropped and the queue drains.
#[must_use]
pub fn spawn_worker(
    dispatcher: NotificationDispatcher,
    config: NotifyWorkerConfig,
) -> (NotifyHandle, tokio::task::JoinHandle<()>) {
    let config = config.normalize();
    let (handle, mut rx) = queue(config.queue_capacity());

    let task = tokio::spawn(async move {
        while let Some(request) = rx.recv().await {
            let mut attempt: u32 = 1;
            loop {
                match dispatcher.deliver(&request).await {
                    DispatchStatus::Sent | DispatchStatus::Skipped => break,
                    DispatchStatus::Failed if attempt >= config.max_attempts() => {
                        error!(
                            attempts = attempt,
                            to = %request.principal.email,
                            "giving up on notification"
                        );
                        break;
                    }
                    DispatchStatus::Failed => {
                        sleep(backoff_delay(
                            attempt,
                            config.backoff_base(),
                            config.backoff_max(),
                        ))
                        .await;
                        attempt += 1;
                    }
                }
            }
        }
        // Reached when every producer handle is gone and the queue drained,
        // or never on a healthy server. A panic above skips this line, so its
        // absence in the logs flags a dead worker.
        info!("notification worker stopped");
    });

    (handle, task)
}

fn backoff_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    let shift = attempt.saturating_sub(1).min(31);
    let factor = 1u32 << shift;
    let delay = base.checked_mul(factor).unwrap_or(max);
    let capped = if delay > max { max } else { delay };
    jitter_delay(capped)
}

fn jitter_delay(delay: Duration) -> Duration {
    let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
    if delay_ms < 2 {
        return delay;
    }
    let half = delay_ms / 2;
    let jitter = rand::thread_rng().gen_range(0..=half);
    Duration::from_millis(half + jitter)
}
