//! Tab registry — page instances currently showing a known chat provider.

use std::collections::HashMap;

use chatbridge_core::{Error, Result};
use chatbridge_protocol::Provider;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

/// A tracked page instance.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TabEntry {
    pub id: String,
    pub url: String,
    pub title: String,
    pub provider: Provider,
    pub connected: bool,
    pub last_seen: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct TabRegistry {
    tabs: HashMap<String, TabEntry>,
}

impl TabRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or refresh the entry for `id`. A URL that matches no known
    /// provider leaves no entry behind, even if one existed before.
    pub fn upsert(&mut self, id: &str, url: &str, title: &str) -> Option<&TabEntry> {
        let Some(provider) = Provider::from_url(url) else {
            if self.tabs.remove(id).is_some() {
                debug!(tab = id, url, "Tab left a known provider, untracked");
            }
            return None;
        };

        let entry = TabEntry {
            id: id.to_string(),
            url: url.to_string(),
            title: title.to_string(),
            provider,
            connected: true,
            last_seen: Utc::now(),
        };
        self.tabs.insert(id.to_string(), entry);
        self.tabs.get(id)
    }

    /// Forget `id`. Removing an unknown id is a no-op.
    pub fn remove(&mut self, id: &str) -> Option<TabEntry> {
        self.tabs.remove(id)
    }

    /// Resolve the destination of an inbound envelope.
    pub fn route(&self, tab_ref: &str) -> Result<&TabEntry> {
        self.tabs
            .get(tab_ref)
            .ok_or_else(|| Error::RouteNotFound(tab_ref.to_string()))
    }

    pub fn get(&self, id: &str) -> Option<&TabEntry> {
        self.tabs.get(id)
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    /// Snapshot of all entries, ordered by id.
    pub fn entries(&self) -> Vec<TabEntry> {
        let mut entries: Vec<TabEntry> = self.tabs.values().cloned().collect();
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_known_provider() {
        let mut registry = TabRegistry::new();
        let entry = registry.upsert("7", "https://claude.ai/chat", "T").unwrap();
        assert_eq!(entry.provider, Provider::Claude);
        assert_eq!(entry.title, "T");
        assert!(entry.connected);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_upsert_refreshes_existing_entry() {
        let mut registry = TabRegistry::new();
        registry.upsert("7", "https://claude.ai/chat", "Old");
        let first_seen = registry.get("7").unwrap().last_seen;

        registry.upsert("7", "https://gemini.google.com/app", "New");
        let entry = registry.get("7").unwrap();
        assert_eq!(entry.provider, Provider::Gemini);
        assert_eq!(entry.title, "New");
        assert!(entry.last_seen >= first_seen);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unrecognized_url_leaves_no_entry() {
        let mut registry = TabRegistry::new();
        assert!(registry.upsert("1", "https://example.com/", "Example").is_none());
        assert!(registry.is_empty());

        registry.upsert("2", "https://chat.openai.com/", "ChatGPT");
        assert!(registry.upsert("2", "https://example.com/", "Away").is_none());
        assert!(registry.get("2").is_none());
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut registry = TabRegistry::new();
        registry.upsert("1", "https://claude.ai/", "T");
        assert!(registry.remove("1").is_some());
        assert!(registry.remove("1").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_route() {
        let mut registry = TabRegistry::new();
        registry.upsert("42", "https://claude.ai/chat", "T");

        assert_eq!(registry.route("42").unwrap().id, "42");
        match registry.route("999") {
            Err(Error::RouteNotFound(tab)) => assert_eq!(tab, "999"),
            other => panic!("expected RouteNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_entries_sorted_and_serialized_camel_case() {
        let mut registry = TabRegistry::new();
        registry.upsert("b", "https://claude.ai/", "B");
        registry.upsert("a", "https://chatgpt.com/", "A");

        let entries = registry.entries();
        assert_eq!(entries[0].id, "a");
        assert_eq!(entries[1].id, "b");

        let value = serde_json::to_value(&entries[0]).unwrap();
        assert_eq!(value["provider"], "ChatGPT");
        assert!(value.get("lastSeen").is_some());
    }
}
