//! # Einlass (Contract Login Gate)
//!
//! `einlass` decides whether a session may be established for a submitted
//! contract number and password, and reacts to registration events with a
//! localized welcome mail.
//!
//! ## Realm Model
//!
//! Realms are the tenant boundary: each realm owns its principals, its
//! outbound mail sender settings, and the template set ("theme") used to
//! localize notification messages.
//!
//! ## Evaluation Outcomes
//!
//! One authentication attempt produces exactly one outcome: `Success`,
//! `UnknownPrincipal`, `InvalidSecret`, or `PendingActivation`. A principal
//! must be both enabled and email-verified before `Success` is reachable;
//! valid credentials on a not-yet-activated account queue an activation mail
//! and report `PendingActivation` instead.
//!
//! ## Notifications
//!
//! Notification delivery never runs on the authentication path. The gate
//! enqueues a request on a bounded in-process queue and returns; a background
//! worker resolves the locale and templates, formats the message, and hands it
//! to the configured delivery channel with retry and backoff. Delivery
//! problems are logged, never surfaced to the login caller.

pub mod api;
pub mod auth;
pub mod cli;
pub mod events;
pub mod notify;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
