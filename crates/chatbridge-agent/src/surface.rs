//! The host page as seen by the agent.
//!
//! A host (browser extension runtime, automation driver, or the in-memory
//! [`MemoryPage`](crate::memory::MemoryPage)) implements [`PageSurface`].
//! Selectors are CSS selector strings and are resolved by the host.

/// How an element holds user-editable text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    /// `<textarea>` / `<input>`: text lives in the value.
    Value,
    /// `contenteditable` element: text lives in the content.
    Editable,
    /// Anything else.
    Other,
}

impl ElementKind {
    pub fn is_editable(&self) -> bool {
        matches!(self, Self::Value | Self::Editable)
    }
}

/// Notifications synthesized so the page's own reactivity sees a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomEvent {
    Input,
    Change,
    Click,
}

impl DomEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Change => "change",
            Self::Click => "click",
        }
    }
}

pub trait PageSurface: Send + 'static {
    /// Host handle to a live element.
    type Element: Clone + Send + std::fmt::Debug;

    fn url(&self) -> String;

    fn title(&self) -> String;

    /// Document language (`<html lang>`), if declared.
    fn lang(&self) -> Option<String> {
        None
    }

    /// Model the chat page reports it is using, if the host can tell.
    fn model_name(&self) -> Option<String> {
        None
    }

    /// Text content of every element matching `selector`, in document order.
    fn texts(&self, selector: &str) -> Vec<String>;

    /// First element matching `selector`.
    fn query(&self, selector: &str) -> Option<Self::Element>;

    fn kind(&self, element: &Self::Element) -> ElementKind;

    fn content(&self, element: &Self::Element) -> String;

    fn set_content(&mut self, element: &Self::Element, text: &str);

    fn dispatch(&mut self, element: &Self::Element, event: DomEvent);

    fn focus(&mut self, element: &Self::Element);
}
