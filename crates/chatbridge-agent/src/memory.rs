//! In-memory page surface for headless hosts and tests.
//!
//! Elements answer to an explicit list of selectors instead of being
//! matched by a CSS engine. A selector list such as `"textarea, [contenteditable=\"true\"]"`
//! matches an element that answers to any of its comma-separated parts.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::adapter::adapter_for;
use crate::surface::{DomEvent, ElementKind, PageSurface};

#[derive(Debug, Clone)]
struct MemoryElement {
    selectors: Vec<String>,
    kind: ElementKind,
    content: String,
}

impl MemoryElement {
    fn matches(&self, selector: &str) -> bool {
        selector
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .any(|part| self.selectors.iter().any(|s| s == part))
    }
}

#[derive(Debug, Default)]
struct PageState {
    url: String,
    title: String,
    lang: Option<String>,
    model: Option<String>,
    elements: Vec<MemoryElement>,
    events: Vec<(usize, DomEvent)>,
    focused: Option<usize>,
}

/// Shared handle to an in-memory page. Clones see the same page.
#[derive(Debug, Clone, Default)]
pub struct MemoryPage {
    inner: Arc<Mutex<PageState>>,
}

impl MemoryPage {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        let page = Self::default();
        {
            let mut state = page.inner.lock();
            state.url = url.into();
            state.title = title.into();
        }
        page
    }

    /// A page with one empty input answering to the provider's default
    /// input selector. Returns the page and the input's element id.
    pub fn with_chat_input(url: impl Into<String>, title: impl Into<String>) -> (Self, Option<usize>) {
        let page = Self::new(url, title);
        let url = page.url();
        let input = adapter_for(&url).default_input().map(|selector| {
            let parts: Vec<&str> = selector.split(',').map(str::trim).collect();
            page.add_element(&parts, ElementKind::Value, "")
        });
        (page, input)
    }

    pub fn set_lang(&self, lang: impl Into<String>) {
        self.inner.lock().lang = Some(lang.into());
    }

    pub fn set_model(&self, model: impl Into<String>) {
        self.inner.lock().model = Some(model.into());
    }

    pub fn set_title(&self, title: impl Into<String>) {
        self.inner.lock().title = title.into();
    }

    /// Append an element; returns its id (document position).
    pub fn add_element(&self, selectors: &[&str], kind: ElementKind, content: &str) -> usize {
        let mut state = self.inner.lock();
        state.elements.push(MemoryElement {
            selectors: selectors.iter().map(|s| s.to_string()).collect(),
            kind,
            content: content.to_string(),
        });
        state.elements.len() - 1
    }

    /// Append a non-editable chat message element.
    pub fn add_message(&self, selector: &str, text: &str) -> usize {
        self.add_element(&[selector], ElementKind::Other, text)
    }

    pub fn content_of(&self, id: usize) -> Option<String> {
        self.inner.lock().elements.get(id).map(|e| e.content.clone())
    }

    /// Every synthesized event so far, as `(element id, event)`.
    pub fn events(&self) -> Vec<(usize, DomEvent)> {
        self.inner.lock().events.clone()
    }

    pub fn focused(&self) -> Option<usize> {
        self.inner.lock().focused
    }
}

impl PageSurface for MemoryPage {
    type Element = usize;

    fn url(&self) -> String {
        self.inner.lock().url.clone()
    }

    fn title(&self) -> String {
        self.inner.lock().title.clone()
    }

    fn lang(&self) -> Option<String> {
        self.inner.lock().lang.clone()
    }

    fn model_name(&self) -> Option<String> {
        self.inner.lock().model.clone()
    }

    fn texts(&self, selector: &str) -> Vec<String> {
        self.inner
            .lock()
            .elements
            .iter()
            .filter(|e| e.matches(selector))
            .map(|e| e.content.clone())
            .collect()
    }

    fn query(&self, selector: &str) -> Option<usize> {
        self.inner
            .lock()
            .elements
            .iter()
            .position(|e| e.matches(selector))
    }

    fn kind(&self, element: &usize) -> ElementKind {
        self.inner
            .lock()
            .elements
            .get(*element)
            .map_or(ElementKind::Other, |e| e.kind)
    }

    fn content(&self, element: &usize) -> String {
        self.content_of(*element).unwrap_or_default()
    }

    fn set_content(&mut self, element: &usize, text: &str) {
        if let Some(e) = self.inner.lock().elements.get_mut(*element) {
            e.content = text.to_string();
        }
    }

    fn dispatch(&mut self, element: &usize, event: DomEvent) {
        self.inner.lock().events.push((*element, event));
    }

    fn focus(&mut self, element: &usize) {
        self.inner.lock().focused = Some(*element);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_list_matching() {
        let page = MemoryPage::new("https://claude.ai/chat", "T");
        page.add_message("[data-testid=\"message\"]", "one");
        let input = page.add_element(&["textarea"], ElementKind::Value, "");

        assert_eq!(page.query("textarea, [contenteditable=\"true\"]"), Some(input));
        assert_eq!(page.query(".missing"), None);
        assert_eq!(page.texts("[data-testid=\"message\"] .markdown, [data-testid=\"message\"]"), vec!["one"]);
    }

    #[test]
    fn test_with_chat_input_uses_provider_default() {
        let (page, input) = MemoryPage::with_chat_input("https://chat.openai.com/", "ChatGPT");
        let input = input.unwrap();
        assert_eq!(page.query("textarea[data-id=\"root\"]"), Some(input));

        let (_, generic_input) = MemoryPage::with_chat_input("https://example.com/", "Example");
        assert!(generic_input.is_none());
    }

    #[test]
    fn test_clones_share_state() {
        let page = MemoryPage::new("https://claude.ai/", "T");
        let id = page.add_element(&["textarea"], ElementKind::Value, "");
        let mut other = page.clone();
        other.set_content(&id, "hello");
        other.dispatch(&id, DomEvent::Input);
        assert_eq!(page.content_of(id).as_deref(), Some("hello"));
        assert_eq!(page.events(), vec![(id, DomEvent::Input)]);
    }
}
