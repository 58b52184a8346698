//! HTTP route handlers and shared request utilities.
//!
//! Handlers are thin adapters: they validate the payload, resolve the realm
//! from the path, and hand off to the gate or the registration trigger. All
//! decision logic lives below this layer.

pub mod events;
pub mod health;
pub mod login;

use crate::auth::principal::Realm;
use crate::auth::store::RealmStore;
use axum::http::{header::ACCEPT_LANGUAGE, HeaderMap, StatusCode};
use regex::Regex;
use std::sync::Arc;
use tracing::error;

/// Lightweight identifier sanity check before hitting the store. Identifiers
/// are tenant-defined account names, not necessarily email addresses.
pub fn valid_identifier(identifier: &str) -> bool {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._@+-]{0,254}$").is_ok_and(|re| re.is_match(identifier))
}

/// Extract the locale hint from `Accept-Language`, first tag only, quality
/// weights ignored.
pub fn request_locale(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(ACCEPT_LANGUAGE)?.to_str().ok()?;
    let tag = raw.split(',').next()?.split(';').next()?.trim();
    if tag.is_empty() || tag == "*" {
        None
    } else {
        Some(tag.to_string())
    }
}

/// Resolve the realm named in the request path, mapping the outcomes to HTTP.
pub async fn lookup_realm(
    realms: &Arc<dyn RealmStore>,
    name: &str,
) -> Result<Realm, (StatusCode, String)> {
    match realms.find_by_name(name).await {
        Ok(Some(realm)) => Ok(realm),
        Ok(None) => Err((StatusCode::NOT_FOUND, "Unknown realm".to_string())),
        Err(err) => {
            error!("Failed to load realm {name}: {err:?}");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error loading realm".to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn identifier_validation() {
        assert!(valid_identifier("40012345"));
        assert!(valid_identifier("user@example.com"));
        assert!(valid_identifier("j.doe_1"));
        assert!(!valid_identifier(""));
        assert!(!valid_identifier(" leading-space"));
        assert!(!valid_identifier("new\nline"));
        assert!(!valid_identifier(&"x".repeat(300)));
    }

    #[test]
    fn locale_from_accept_language() {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static("de-CH, de;q=0.9, en;q=0.8"),
        );
        assert_eq!(request_locale(&headers).as_deref(), Some("de-CH"));

        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("fr;q=0.7"));
        assert_eq!(request_locale(&headers).as_deref(), Some("fr"));

        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("*"));
        assert!(request_locale(&headers).is_none());

        assert!(request_locale(&HeaderMap::new()).is_none());
    }
}
