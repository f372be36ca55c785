//! Known AI-chat providers — a declarative table of host rules and selectors.
//!
//! Adding a provider is a data change: append a [`ProviderProfile`] to
//! [`PROFILES`] and a variant to [`Provider`].

use serde::{Deserialize, Serialize};

/// Supported AI chat sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Provider {
    #[serde(rename = "ChatGPT")]
    ChatGpt,
    Claude,
    Gemini,
}

impl Provider {
    pub fn all() -> &'static [Provider] {
        &[Self::ChatGpt, Self::Claude, Self::Gemini]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::ChatGpt => "ChatGPT",
            Self::Claude => "Claude",
            Self::Gemini => "Gemini",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "chatgpt" => Some(Self::ChatGpt),
            "claude" => Some(Self::Claude),
            "gemini" => Some(Self::Gemini),
            _ => None,
        }
    }

    /// Identify the provider serving `url`, if it is a known host.
    pub fn from_url(url: &str) -> Option<Self> {
        let parsed = url::Url::parse(url).ok()?;
        let host = parsed.host_str()?;
        PROFILES
            .iter()
            .find(|p| p.matches_host(host))
            .map(|p| p.provider)
    }

    pub fn profile(&self) -> &'static ProviderProfile {
        match self {
            Self::ChatGpt => &PROFILES[0],
            Self::Claude => &PROFILES[1],
            Self::Gemini => &PROFILES[2],
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Predicate identifying a chat message element by attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementRule {
    /// Element carries the attribute, any value.
    HasAttribute(&'static str),
    /// Element carries the attribute with exactly this value.
    AttributeEquals(&'static str, &'static str),
}

impl ElementRule {
    /// Evaluate the rule against an attribute lookup.
    pub fn test<'a>(&self, attr: impl Fn(&str) -> Option<&'a str>) -> bool {
        match self {
            Self::HasAttribute(name) => attr(name).is_some(),
            Self::AttributeEquals(name, value) => attr(name) == Some(*value),
        }
    }

    /// The equivalent CSS attribute selector.
    pub fn css(&self) -> String {
        match self {
            Self::HasAttribute(name) => format!("[{}]", name),
            Self::AttributeEquals(name, value) => format!("[{}=\"{}\"]", name, value),
        }
    }
}

/// Everything the bridge needs to know about one provider's page layout.
#[derive(Debug)]
pub struct ProviderProfile {
    pub provider: Provider,
    /// Host names served by the provider; subdomains match too.
    pub hosts: &'static [&'static str],
    /// Identifies a freshly added chat message element.
    pub message_rule: ElementRule,
    /// CSS selector whose matches (in document order) form the capture context.
    pub context_selector: &'static str,
    /// CSS selector of the chat input used when no explicit selector is given.
    pub input_selector: &'static str,
}

impl ProviderProfile {
    pub fn matches_host(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        self.hosts.iter().any(|h| {
            host == *h
                || host
                    .strip_suffix(h)
                    .map_or(false, |prefix| prefix.ends_with('.'))
        })
    }
}

/// Provider table, indexed in [`Provider::all`] order.
pub static PROFILES: [ProviderProfile; 3] = [
    ProviderProfile {
        provider: Provider::ChatGpt,
        hosts: &["chat.openai.com", "chatgpt.com"],
        message_rule: ElementRule::HasAttribute("data-message-author-role"),
        context_selector: ".markdown, [data-message-author-role]",
        input_selector: "textarea[data-id=\"root\"], [contenteditable=\"true\"]",
    },
    ProviderProfile {
        provider: Provider::Claude,
        hosts: &["claude.ai"],
        message_rule: ElementRule::AttributeEquals("data-testid", "message"),
        context_selector: "[data-testid=\"message\"] .markdown, [data-testid=\"message\"]",
        input_selector: "textarea, [contenteditable=\"true\"]",
    },
    ProviderProfile {
        provider: Provider::Gemini,
        hosts: &["gemini.google.com"],
        message_rule: ElementRule::HasAttribute("data-message-container"),
        context_selector: "[data-message-container] .markdown, [data-message-container]",
        input_selector: "textarea, [contenteditable=\"true\"]",
    },
];
