//! Page adapters — provider-specific knowledge about a chat page's layout.

use std::collections::BTreeMap;

use chatbridge_protocol::{Provider, ProviderProfile};

/// Detached description of an element added to the page, with its subtree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeSnapshot {
    pub tag: String,
    pub attributes: BTreeMap<String, String>,
    pub children: Vec<NodeSnapshot>,
}

impl NodeSnapshot {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_child(mut self, child: NodeSnapshot) -> Self {
        self.children.push(child);
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// True if this node or any descendant satisfies `pred`.
    pub fn any(&self, pred: &impl Fn(&NodeSnapshot) -> bool) -> bool {
        pred(self) || self.children.iter().any(|c| c.any(pred))
    }
}

/// What the agent needs to know about the page it runs on.
pub trait PageAdapter: Send + Sync {
    /// The known provider, or `None` for the generic fallback.
    fn provider(&self) -> Option<Provider>;

    /// Human-readable identity, `"Generic"` for unknown sites.
    fn label(&self) -> &'static str;

    /// Whether an added node is (or contains) a chat message.
    fn is_message_element(&self, node: &NodeSnapshot) -> bool;

    /// Selector whose matches form the capture context.
    fn context_selector(&self) -> Option<&'static str>;

    /// Input element used when a command names no selector, and for streams.
    fn default_input(&self) -> Option<&'static str>;
}

/// Adapter driven by a row of the provider table.
#[derive(Debug, Clone, Copy)]
pub struct ProviderAdapter {
    profile: &'static ProviderProfile,
}

impl ProviderAdapter {
    pub fn new(provider: Provider) -> Self {
        Self {
            profile: provider.profile(),
        }
    }
}

impl PageAdapter for ProviderAdapter {
    fn provider(&self) -> Option<Provider> {
        Some(self.profile.provider)
    }

    fn label(&self) -> &'static str {
        self.profile.provider.name()
    }

    fn is_message_element(&self, node: &NodeSnapshot) -> bool {
        let rule = self.profile.message_rule;
        node.any(&|n: &NodeSnapshot| rule.test(|name| n.attr(name)))
    }

    fn context_selector(&self) -> Option<&'static str> {
        Some(self.profile.context_selector)
    }

    fn default_input(&self) -> Option<&'static str> {
        Some(self.profile.input_selector)
    }
}

/// Fallback for unknown sites: observed, but nothing counts as a message.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericAdapter;

impl PageAdapter for GenericAdapter {
    fn provider(&self) -> Option<Provider> {
        None
    }

    fn label(&self) -> &'static str {
        "Generic"
    }

    fn is_message_element(&self, _node: &NodeSnapshot) -> bool {
        false
    }

    fn context_selector(&self) -> Option<&'static str> {
        None
    }

    fn default_input(&self) -> Option<&'static str> {
        None
    }
}

/// Pick the adapter for a page address.
pub fn adapter_for(url: &str) -> Box<dyn PageAdapter> {
    match Provider::from_url(url) {
        Some(provider) => Box::new(ProviderAdapter::new(provider)),
        None => Box::new(GenericAdapter),
    }
}
