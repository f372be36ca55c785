//! Page agent runtime. One task per page instance.
//!
//! The agent owns its [`PageSurface`] and reacts to two ordered inputs:
//! host events (mutations, selection changes, key presses) and inbound
//! envelopes forwarded by the connector. Everything it produces goes to the
//! connector as [`AgentMessage`]s.

use std::collections::VecDeque;
use std::time::Duration;

use chatbridge_core::BridgeConfig;
use chatbridge_protocol::{AgentMessage, Body, Envelope, Meta, PushBody, RegisterTab};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, trace, warn};

use crate::adapter::{adapter_for, NodeSnapshot, PageAdapter};
use crate::debounce::Debouncer;
use crate::dispatch::{self, DispatchOutcome};
use crate::surface::PageSurface;

/// Tunables for one agent.
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub debounce: Duration,
    /// How many trailing message elements form the capture context.
    pub context_messages: usize,
    /// One full capture this long after start; `None` disables it.
    pub initial_capture_delay: Option<Duration>,
}

impl AgentSettings {
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self {
            debounce: config.debounce(),
            context_messages: config.context_messages,
            initial_capture_delay: Some(config.initial_capture_delay()),
        }
    }
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self::from_config(&BridgeConfig::default())
    }
}

/// Something the host observed on the page.
#[derive(Debug, Clone, PartialEq)]
pub enum PageEvent {
    /// Elements added to the live document.
    Mutations(Vec<NodeSnapshot>),
    /// The document selection changed to this text.
    SelectionChanged(String),
    KeyDown { alt: bool, key: String },
    /// Explicit request for a full capture (e.g. from a status popup).
    CaptureRequested,
}

/// Keyboard shortcuts the agent handles itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shortcut {
    /// Alt+M: send the current selection with context.
    SendSelection,
    /// Alt+R: capture the latest conversation state.
    RecallLastReply,
}

impl Shortcut {
    pub fn from_key(alt: bool, key: &str) -> Option<Self> {
        if !alt {
            return None;
        }
        match key {
            "m" => Some(Self::SendSelection),
            "r" => Some(Self::RecallLastReply),
            _ => None,
        }
    }
}

pub struct PageAgent<S: PageSurface> {
    surface: S,
    adapter: Box<dyn PageAdapter>,
    settings: AgentSettings,
    outbound: mpsc::Sender<AgentMessage>,
    debouncer: Debouncer,
    last_selection: String,
    /// Host events that arrived while a capture was being submitted.
    deferred: VecDeque<PageEvent>,
}

impl<S: PageSurface> PageAgent<S> {
    /// Create an agent, picking the adapter from the page's address.
    pub fn new(surface: S, settings: AgentSettings, outbound: mpsc::Sender<AgentMessage>) -> Self {
        let adapter = adapter_for(&surface.url());
        Self::with_adapter(surface, adapter, settings, outbound)
    }

    pub fn with_adapter(
        surface: S,
        adapter: Box<dyn PageAdapter>,
        settings: AgentSettings,
        outbound: mpsc::Sender<AgentMessage>,
    ) -> Self {
        Self {
            surface,
            adapter,
            debouncer: Debouncer::new(settings.debounce),
            settings,
            outbound,
            last_selection: String::new(),
            deferred: VecDeque::new(),
        }
    }

    pub fn adapter(&self) -> &dyn PageAdapter {
        self.adapter.as_ref()
    }

    /// Run until the host closes the event channel.
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<PageEvent>,
        mut inbound: mpsc::Receiver<Envelope>,
    ) {
        info!(
            provider = self.adapter.label(),
            url = %self.surface.url(),
            "Page agent started"
        );
        self.register().await;

        let initial_at = self
            .settings
            .initial_capture_delay
            .map(|delay| Instant::now() + delay);
        let mut initial_pending = initial_at.is_some();
        let mut inbound_open = true;

        loop {
            while let Some(event) = self.deferred.pop_front() {
                self.handle_event(event, &mut events).await;
            }

            let debounce_at = self.debouncer.deadline();
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event, &mut events).await,
                    None => break,
                },
                envelope = inbound.recv(), if inbound_open => match envelope {
                    Some(envelope) => self.apply(envelope),
                    None => inbound_open = false,
                },
                _ = sleep_until(debounce_at.unwrap_or_else(Instant::now)), if debounce_at.is_some() => {
                    if self.debouncer.take_due(Instant::now()) {
                        self.capture_current_state(&mut events).await;
                    }
                }
                _ = sleep_until(initial_at.unwrap_or_else(Instant::now)), if initial_pending => {
                    initial_pending = false;
                    self.capture_current_state(&mut events).await;
                }
            }
        }

        debug!(url = %self.surface.url(), "Page agent stopped");
    }

    async fn register(&self) {
        let message = AgentMessage::RegisterTab(RegisterTab {
            url: self.surface.url(),
            title: self.surface.title(),
            provider: self.adapter.provider(),
        });
        if self.outbound.send(message).await.is_err() {
            warn!("Connector channel closed before registration");
        }
    }

    async fn handle_event(&mut self, event: PageEvent, events: &mut mpsc::Receiver<PageEvent>) {
        match event {
            PageEvent::Mutations(nodes) => {
                if self.is_relevant(&nodes) && self.debouncer.notify(Instant::now()) {
                    trace!("Capture debounce restarted");
                }
            }
            PageEvent::SelectionChanged(text) => {
                let text = text.trim();
                if !text.is_empty() {
                    self.last_selection = text.to_string();
                    self.capture_selection(events).await;
                }
            }
            PageEvent::KeyDown { alt, key } => match Shortcut::from_key(alt, &key) {
                Some(Shortcut::SendSelection) => self.capture_selection(events).await,
                Some(Shortcut::RecallLastReply) => self.capture_current_state(events).await,
                None => {}
            },
            PageEvent::CaptureRequested => self.capture_current_state(events).await,
        }
    }

    fn is_relevant(&self, nodes: &[NodeSnapshot]) -> bool {
        nodes.iter().any(|n| self.adapter.is_message_element(n))
    }

    /// Capture recent conversation context plus the last selection.
    async fn capture_current_state(&mut self, events: &mut mpsc::Receiver<PageEvent>) {
        let context = self.extract_context();
        if context.is_empty() && self.last_selection.is_empty() {
            debug!("Nothing to capture");
            return;
        }
        let body = PushBody::user(self.last_selection.clone(), context);
        self.submit(body, events).await;
    }

    async fn capture_selection(&mut self, events: &mut mpsc::Receiver<PageEvent>) {
        if self.last_selection.is_empty() {
            return;
        }
        let body = PushBody::user(self.last_selection.clone(), self.extract_context());
        self.submit(body, events).await;
    }

    /// Trailing message texts, trimmed, joined by blank lines.
    fn extract_context(&self) -> String {
        let Some(selector) = self.adapter.context_selector() else {
            return String::new();
        };
        let texts = self.surface.texts(selector);
        let start = texts.len().saturating_sub(self.settings.context_messages);
        texts[start..]
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    fn build_capture(&self, body: PushBody) -> Envelope {
        let mut meta = Meta::new();
        if let Some(model) = self.surface.model_name() {
            meta.insert("model".into(), Value::String(model));
        }
        let lang = self.surface.lang().filter(|l| !l.is_empty());
        meta.insert("lang".into(), Value::String(lang.unwrap_or_else(|| "en".into())));
        meta.insert("tabTitle".into(), Value::String(self.surface.title()));
        Envelope::push(self.surface.url(), self.adapter.provider(), body, meta)
    }

    /// Hand a capture to the connector. Mutations seen meanwhile are
    /// dropped; other host events are replayed afterwards.
    async fn submit(&mut self, body: PushBody, events: &mut mpsc::Receiver<PageEvent>) {
        let envelope = self.build_capture(body);
        self.debouncer.begin_capture();

        let send = self.outbound.send(AgentMessage::Capture(envelope));
        tokio::pin!(send);
        let mut events_open = true;
        loop {
            tokio::select! {
                biased;
                result = &mut send => {
                    if result.is_err() {
                        warn!("Connector channel closed, capture dropped");
                    }
                    break;
                }
                event = events.recv(), if events_open => match event {
                    Some(PageEvent::Mutations(nodes)) => {
                        debug!(count = nodes.len(), "Ignoring mutations during capture");
                    }
                    Some(other) => self.deferred.push_back(other),
                    None => events_open = false,
                },
            }
        }

        self.debouncer.end_capture();
    }

    /// Apply an inbound envelope to the page.
    fn apply(&mut self, envelope: Envelope) {
        let outcome = match &envelope.body {
            Body::Command(command) => {
                dispatch::apply_command(&mut self.surface, self.adapter.as_ref(), command)
            }
            Body::Stream(stream) => {
                dispatch::apply_stream(&mut self.surface, self.adapter.as_ref(), stream)
            }
            Body::Push(_) => {
                debug!("Ignoring PUSH delivered to page agent");
                return;
            }
        };

        match outcome {
            DispatchOutcome::Applied | DispatchOutcome::EmptyDelta => {
                trace!(op = %envelope.op(), "Applied inbound operation");
            }
            DispatchOutcome::UnknownAction(action) => {
                warn!(action = %action, "Unknown command action");
            }
            other => {
                warn!(op = %envelope.op(), outcome = ?other, "Inbound operation had no effect");
            }
        }
    }
}
