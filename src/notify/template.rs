//! Localized message templates and locale resolution.
//!
//! A template set is the key→string map for one locale, fetched fresh per
//! dispatch; nothing here caches. Missing keys fall back to the key itself so
//! a misconfigured theme still produces a visible (if ugly) mail instead of
//! none at all.

use crate::auth::principal::{Principal, Realm, RequestContext};
use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;
use std::path::PathBuf;

/// Localized message strings for one locale.
#[derive(Clone, Debug, Default)]
pub struct TemplateSet {
    messages: HashMap<String, String>,
}

impl TemplateSet {
    #[must_use]
    pub fn new(messages: HashMap<String, String>) -> Self {
        Self { messages }
    }

    /// Look up `key` (falling back to the key itself when absent) and apply
    /// message formatting with zero substitution arguments.
    #[must_use]
    pub fn format(&self, key: &str) -> String {
        let template = self.messages.get(key).map_or(key, String::as_str);
        format_message(template, &[])
    }
}

// Formatting currently passes the template through untouched: no message uses
// substitution arguments yet. The indirection is the extension point for
// parameterized messages (recipient name etc.) without touching callers.
fn format_message(template: &str, _args: &[&str]) -> String {
    template.to_string()
}

/// Determines the effective locale for one notification.
pub trait LocaleResolver: Send + Sync {
    fn resolve(&self, principal: &Principal, realm: &Realm, ctx: &RequestContext)
        -> Option<String>;
}

/// Principal preference first, then the request hint, then the realm default.
pub struct DefaultLocaleResolver;

impl LocaleResolver for DefaultLocaleResolver {
    fn resolve(
        &self,
        principal: &Principal,
        realm: &Realm,
        ctx: &RequestContext,
    ) -> Option<String> {
        principal
            .locale
            .clone()
            .or_else(|| ctx.locale.clone())
            .or_else(|| {
                if realm.default_locale.is_empty() {
                    None
                } else {
                    Some(realm.default_locale.clone())
                }
            })
    }
}

/// Provides the template set for a (theme, locale) pair.
pub trait TemplateSource: Send + Sync {
    /// # Errors
    /// Returns an error when the set cannot be loaded (missing theme or
    /// locale, I/O failure, malformed content).
    fn template_set(&self, theme: &str, locale: &str) -> Result<TemplateSet>;
}

/// Loads template sets from theme directories on disk:
/// `<root>/<theme>/messages_<locale>.json`, a flat string map per file.
pub struct FsTemplateSource {
    root: PathBuf,
}

impl FsTemplateSource {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl TemplateSource for FsTemplateSource {
    fn template_set(&self, theme: &str, locale: &str) -> Result<TemplateSet> {
        // Identifiers come from realm configuration, not requests, so a bad
        // value is a deployment error worth failing loudly on.
        if !valid_component(theme) || !valid_component(locale) {
            return Err(anyhow!(
                "invalid theme or locale identifier: {theme}/{locale}"
            ));
        }

        let path = self.root.join(theme).join(format!("messages_{locale}.json"));
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read template set {}", path.display()))?;
        let messages: HashMap<String, String> = serde_json::from_str(&raw)
            .with_context(|| format!("malformed template set {}", path.display()))?;

        Ok(TemplateSet::new(messages))
    }
}

fn valid_component(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// In-memory template source for local development and tests.
#[derive(Default)]
pub struct StaticTemplateSource {
    sets: HashMap<(String, String), TemplateSet>,
}

impl StaticTemplateSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_set(mut self, theme: &str, locale: &str, set: TemplateSet) -> Self {
        self.sets.insert((theme.to_string(), locale.to_string()), set);
        self
    }
}

impl TemplateSource for StaticTemplateSource {
    fn template_set(&self, theme: &str, locale: &str) -> Result<TemplateSet> {
        self.sets
            .get(&(theme.to_string(), locale.to_string()))
            .cloned()
            .ok_or_else(|| anyhow!("no template set for {theme}/{locale}"))
    }
}
