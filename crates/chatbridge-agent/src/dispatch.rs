//! Applying inbound commands and stream deltas to the page.

use chatbridge_protocol::{CommandBody, StreamBody};

use crate::adapter::PageAdapter;
use crate::surface::{DomEvent, PageSurface};

/// Actions a `CMD` envelope may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Append text to the target element.
    Inject,
    /// Overwrite the target element's text.
    Replace,
    Focus,
    Click,
}

impl Action {
    pub fn parse(action: &str) -> Option<Self> {
        match action {
            "inject" => Some(Self::Inject),
            "replace" => Some(Self::Replace),
            "focus" => Some(Self::Focus),
            "click" => Some(Self::Click),
            _ => None,
        }
    }
}

/// What happened to an inbound operation. Nothing is reported back to the
/// external process; the outcome is only logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Applied,
    UnknownAction(String),
    /// No element matched the explicit or default selector.
    NoTarget,
    /// The target holds no editable text.
    NotEditable,
    EmptyDelta,
}

pub fn apply_command<S: PageSurface>(
    surface: &mut S,
    adapter: &dyn PageAdapter,
    command: &CommandBody,
) -> DispatchOutcome {
    let Some(action) = Action::parse(&command.action) else {
        return DispatchOutcome::UnknownAction(command.action.clone());
    };
    let explicit = command.selector.as_deref().filter(|s| !s.trim().is_empty());
    let text = command.text.as_deref().unwrap_or_default();

    match action {
        Action::Inject | Action::Replace => {
            let element = input_element(surface, adapter, explicit);
            write_text(surface, element, text, action == Action::Inject, true)
        }
        Action::Focus => match input_element(surface, adapter, explicit) {
            Some(element) => {
                surface.focus(&element);
                DispatchOutcome::Applied
            }
            None => DispatchOutcome::NoTarget,
        },
        // Clicks only ever target an explicit selector.
        Action::Click => match explicit.and_then(|s| surface.query(s)) {
            Some(element) => {
                surface.dispatch(&element, DomEvent::Click);
                DispatchOutcome::Applied
            }
            None => DispatchOutcome::NoTarget,
        },
    }
}

pub fn apply_stream<S: PageSurface>(
    surface: &mut S,
    adapter: &dyn PageAdapter,
    stream: &StreamBody,
) -> DispatchOutcome {
    if stream.delta.is_empty() {
        return DispatchOutcome::EmptyDelta;
    }
    let element = input_element(surface, adapter, None);
    write_text(surface, element, &stream.delta, true, false)
}

fn input_element<S: PageSurface>(
    surface: &S,
    adapter: &dyn PageAdapter,
    explicit: Option<&str>,
) -> Option<S::Element> {
    explicit
        .or_else(|| adapter.default_input())
        .and_then(|selector| surface.query(selector))
}

fn write_text<S: PageSurface>(
    surface: &mut S,
    element: Option<S::Element>,
    text: &str,
    append: bool,
    fire_change: bool,
) -> DispatchOutcome {
    let Some(element) = element else {
        return DispatchOutcome::NoTarget;
    };
    if !surface.kind(&element).is_editable() {
        return DispatchOutcome::NotEditable;
    }

    let next = if append {
        let mut current = surface.content(&element);
        current.push_str(text);
        current
    } else {
        text.to_string()
    };
    surface.set_content(&element, &next);
    surface.dispatch(&element, DomEvent::Input);
    if fire_change {
        surface.dispatch(&element, DomEvent::Change);
    }
    DispatchOutcome::Applied
}
