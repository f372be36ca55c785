//! Connector — one task owning the bridge socket, the tab registry and
//! every page link.
//!
//! Everything reaches the task through a bounded command channel, so no
//! state is shared. Status changes are published on a `watch` channel.
//!
//! Delivery is best-effort in both directions: captures submitted while
//! the socket is down are dropped, and inbound envelopes for pages that are
//! not tracked (or whose channel is full) are dropped with a warning.

use std::collections::HashMap;

use chatbridge_core::{BridgeConfig, Error, Result};
use chatbridge_protocol::{codec, AgentMessage, Envelope, Op};
use futures::future::BoxFuture;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

use crate::backoff::Backoff;
use crate::registry::TabRegistry;
use crate::state::{BridgeStatus, ConnectionState};
use crate::transport::{FrameSink, FrameStream, Transport};

type ConnectFuture = BoxFuture<'static, Result<(FrameSink, FrameStream)>>;

/// Channels a page agent uses to talk to the connector.
#[derive(Debug)]
pub struct PageLink {
    /// Registration and captures from the page.
    pub outbound: mpsc::Sender<AgentMessage>,
    /// `CMD` and `STREAM` envelopes addressed to the page, in arrival order.
    pub inbound: mpsc::Receiver<Envelope>,
}

enum Command {
    Attach {
        tab: String,
        url: String,
        title: String,
        inbound: mpsc::Sender<Envelope>,
    },
    Agent {
        tab: String,
        message: AgentMessage,
    },
    Navigated {
        tab: String,
        url: String,
        title: String,
    },
    Close {
        tab: String,
    },
    Reconnect,
    Stop,
}

pub struct Connector<T: Transport> {
    transport: T,
    config: BridgeConfig,
    socket_url: String,
}

impl<T: Transport> Connector<T> {
    pub fn new(config: BridgeConfig, transport: T) -> Result<Self> {
        config.validate()?;
        let socket_url = config.socket_url()?;
        Ok(Self {
            transport,
            config,
            socket_url,
        })
    }

    /// Spawn the event loop and start connecting. Requires a tokio runtime.
    pub fn start(self) -> ConnectorHandle {
        let capacity = self.config.channel_capacity;
        let (command_tx, command_rx) = mpsc::channel(capacity);
        let (status_tx, status_rx) = watch::channel(BridgeStatus::default());

        let event_loop = EventLoop {
            transport: self.transport,
            socket_url: self.socket_url,
            commands: command_rx,
            status: status_tx,
            registry: TabRegistry::new(),
            pages: HashMap::new(),
            state: ConnectionState::Disconnected,
            backoff: Backoff::from_config(&self.config),
            exhausted: false,
            connecting: None,
            sink: None,
            stream: None,
            retry_at: None,
        };
        let task = tokio::spawn(event_loop.run());

        ConnectorHandle {
            commands: command_tx,
            status: status_rx,
            capacity,
            task,
        }
    }
}

/// Control surface of a running connector.
pub struct ConnectorHandle {
    commands: mpsc::Sender<Command>,
    status: watch::Receiver<BridgeStatus>,
    capacity: usize,
    task: JoinHandle<()>,
}

impl ConnectorHandle {
    /// Announce a new page instance and get the channels its agent uses.
    pub async fn attach_page(
        &self,
        tab: impl Into<String>,
        url: impl Into<String>,
        title: impl Into<String>,
    ) -> Result<PageLink> {
        let tab = tab.into();
        let (inbound_tx, inbound_rx) = mpsc::channel(self.capacity);
        self.send(Command::Attach {
            tab: tab.clone(),
            url: url.into(),
            title: title.into(),
            inbound: inbound_tx,
        })
        .await?;

        // Tag the page's messages with its id on the way to the event loop.
        let (outbound_tx, mut outbound_rx) = mpsc::channel::<AgentMessage>(self.capacity);
        let commands = self.commands.clone();
        tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                let command = Command::Agent {
                    tab: tab.clone(),
                    message,
                };
                if commands.send(command).await.is_err() {
                    break;
                }
            }
        });

        Ok(PageLink {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }

    /// The page finished loading a new address.
    pub async fn page_navigated(
        &self,
        tab: impl Into<String>,
        url: impl Into<String>,
        title: impl Into<String>,
    ) -> Result<()> {
        self.send(Command::Navigated {
            tab: tab.into(),
            url: url.into(),
            title: title.into(),
        })
        .await
    }

    /// The page instance is gone.
    pub async fn close_page(&self, tab: impl Into<String>) -> Result<()> {
        self.send(Command::Close { tab: tab.into() }).await
    }

    /// Reconnect now with a fresh attempt budget.
    pub async fn reconnect(&self) -> Result<()> {
        self.send(Command::Reconnect).await
    }

    pub fn status(&self) -> BridgeStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<BridgeStatus> {
        self.status.clone()
    }

    /// Close the socket and wait for the event loop to exit.
    pub async fn stop(self) -> Result<()> {
        // The loop may already be gone; joining below still succeeds.
        let _ = self.commands.send(Command::Stop).await;
        self.task
            .await
            .map_err(|e| Error::Internal(format!("connector task failed: {}", e)))
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| Error::Internal("connector is not running".into()))
    }
}

/// Last known address of a live page and where its inbound traffic goes.
struct PageSlot {
    url: String,
    title: String,
    inbound: mpsc::Sender<Envelope>,
}

struct EventLoop<T: Transport> {
    transport: T,
    socket_url: String,
    commands: mpsc::Receiver<Command>,
    status: watch::Sender<BridgeStatus>,
    registry: TabRegistry,
    pages: HashMap<String, PageSlot>,
    state: ConnectionState,
    backoff: Backoff,
    exhausted: bool,
    connecting: Option<ConnectFuture>,
    sink: Option<FrameSink>,
    stream: Option<FrameStream>,
    retry_at: Option<Instant>,
}

impl<T: Transport> EventLoop<T> {
    async fn run(mut self) {
        info!(url = %redact_token(&self.socket_url), "Connector started");
        self.begin_connect();

        loop {
            let retry_at = self.retry_at;
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Stop) | None => break,
                    Some(command) => self.handle_command(command).await,
                },
                result = finish_connect(&mut self.connecting) => {
                    self.connecting = None;
                    match result {
                        Ok((sink, stream)) => self.on_open(sink, stream),
                        Err(e) => {
                            warn!(error = %e, "Bridge connection failed");
                            self.on_disconnect();
                        }
                    }
                }
                frame = next_frame(&mut self.stream) => match frame {
                    Some(Ok(text)) => self.handle_frame(&text),
                    Some(Err(e)) => {
                        warn!(error = %e, "Bridge socket error");
                        self.on_disconnect();
                    }
                    None => {
                        info!("Bridge socket closed");
                        self.on_disconnect();
                    }
                },
                _ = sleep_until(retry_at.unwrap_or_else(Instant::now)), if retry_at.is_some() => {
                    self.retry_at = None;
                    self.begin_connect();
                }
            }
        }

        if let Some(mut sink) = self.sink.take() {
            if let Err(e) = sink.close().await {
                debug!(error = %e, "Bridge socket close failed");
            }
        }
        self.stream = None;
        self.connecting = None;
        self.state = ConnectionState::Disconnected;
        self.publish();
        info!("Connector stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Attach {
                tab,
                url,
                title,
                inbound,
            } => {
                debug!(tab = %tab, url = %url, "Page attached");
                let slot = PageSlot {
                    url,
                    title,
                    inbound,
                };
                if self.pages.insert(tab.clone(), slot).is_some() {
                    warn!(tab = %tab, "Page id attached twice, previous link replaced");
                }
            }
            Command::Agent { tab, message } => match message {
                AgentMessage::RegisterTab(register) => {
                    self.track(&tab, register.url, register.title);
                }
                AgentMessage::Capture(envelope) => self.forward_capture(tab, envelope).await,
            },
            Command::Navigated { tab, url, title } => self.track(&tab, url, title),
            Command::Close { tab } => {
                self.pages.remove(&tab);
                if self.registry.remove(&tab).is_some() {
                    debug!(tab = %tab, "Tab closed");
                    self.publish();
                }
            }
            Command::Reconnect => self.manual_reconnect(),
            // Handled by the loop.
            Command::Stop => {}
        }
    }

    /// Record the page's current address and track it if it is a known provider.
    fn track(&mut self, tab: &str, url: String, title: String) {
        // Registrations relayed after close_page must not resurrect the tab.
        let Some(slot) = self.pages.get_mut(tab) else {
            debug!(tab = %tab, url = %url, "Page not attached, registration ignored");
            return;
        };
        slot.url = url.clone();
        slot.title = title.clone();
        match self.registry.upsert(tab, &url, &title) {
            Some(entry) => info!(tab = %tab, provider = %entry.provider, "Tab registered"),
            None => debug!(tab = %tab, url = %url, "Not a known provider, tab not tracked"),
        }
        self.publish();
    }

    async fn forward_capture(&mut self, tab: String, mut envelope: Envelope) {
        envelope.tab_ref = tab;
        if let Some(entry) = self.registry.get(&envelope.tab_ref) {
            envelope.url = entry.url.clone();
            envelope.provider = Some(entry.provider);
            envelope
                .meta
                .insert("tabTitle".into(), Value::String(entry.title.clone()));
        }

        if let Err(e) = self.send_envelope(&envelope).await {
            warn!(tab = %envelope.tab_ref, error = %e, "Capture dropped");
        }
    }

    async fn send_envelope(&mut self, envelope: &Envelope) -> Result<()> {
        let Some(sink) = self.sink.as_mut() else {
            return Err(Error::SendWhileDisconnected(envelope.op().to_string()));
        };
        let text = codec::encode(envelope)?;
        let result = sink.send(text).await;
        if result.is_err() {
            self.on_disconnect();
        }
        result
    }

    fn handle_frame(&mut self, text: &str) {
        let envelope = match codec::decode(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, "Ignoring undecodable frame");
                return;
            }
        };
        if !envelope.op().is_inbound() {
            debug!(op = %envelope.op(), "Ignoring frame that is not for a page");
            return;
        }

        let op = envelope.op();
        let tab = envelope.tab_ref.clone();
        match self.deliver(envelope) {
            Ok(()) => debug!(tab = %tab, op = %op, "Routed inbound envelope"),
            Err(e) => warn!(tab = %tab, op = %op, error = %e, "Inbound envelope dropped"),
        }
    }

    fn deliver(&self, envelope: Envelope) -> Result<()> {
        let entry = self.registry.route(&envelope.tab_ref)?;
        let slot = self
            .pages
            .get(&entry.id)
            .ok_or_else(|| Error::RouteNotFound(entry.id.clone()))?;
        let what = match envelope.op() {
            Op::Stream => "stream delta".to_string(),
            op => op.to_string(),
        };
        slot.inbound.try_send(envelope).map_err(|e| match e {
            TrySendError::Full(_) => {
                Error::Internal(format!("page channel full, {} dropped", what))
            }
            TrySendError::Closed(_) => {
                Error::Internal(format!("page channel closed, {} dropped", what))
            }
        })
    }

    fn begin_connect(&mut self) {
        debug!(attempt = self.backoff.attempts(), "Connecting to bridge");
        self.state = ConnectionState::Connecting;
        self.connecting = Some(self.transport.connect(&self.socket_url));
        self.publish();
    }

    fn on_open(&mut self, sink: FrameSink, stream: FrameStream) {
        info!("Connected to bridge");
        self.sink = Some(sink);
        self.stream = Some(stream);
        self.state = ConnectionState::Connected;
        self.backoff.reset();
        self.exhausted = false;

        // Pages that became ready while we were offline.
        let pages: Vec<(String, String, String)> = self
            .pages
            .iter()
            .map(|(id, slot)| (id.clone(), slot.url.clone(), slot.title.clone()))
            .collect();
        for (id, url, title) in pages {
            self.registry.upsert(&id, &url, &title);
        }
        self.publish();
    }

    fn on_disconnect(&mut self) {
        self.sink = None;
        self.stream = None;
        self.connecting = None;
        self.state = ConnectionState::Disconnected;

        match self.backoff.next_delay() {
            Some(delay) => {
                info!(
                    attempt = self.backoff.attempts(),
                    delay_ms = delay.as_millis() as u64,
                    "Scheduling reconnect"
                );
                self.retry_at = Some(Instant::now() + delay);
            }
            None => {
                self.retry_at = None;
                self.exhausted = true;
                error!(
                    error = %Error::ReconnectBudgetExhausted(self.backoff.max_attempts()),
                    "Giving up on the bridge until a manual reconnect"
                );
            }
        }
        self.publish();
    }

    fn manual_reconnect(&mut self) {
        self.backoff.reset();
        self.exhausted = false;
        self.retry_at = None;
        match self.state {
            ConnectionState::Disconnected => {
                info!("Manual reconnect");
                self.begin_connect();
            }
            _ => {
                debug!(state = %self.state, "Manual reconnect while not disconnected");
                self.publish();
            }
        }
    }

    fn publish(&self) {
        self.status.send_replace(BridgeStatus {
            state: self.state,
            attempts: self.backoff.attempts(),
            exhausted: self.exhausted,
            tabs: self.registry.entries(),
        });
    }
}

async fn finish_connect(connecting: &mut Option<ConnectFuture>) -> Result<(FrameSink, FrameStream)> {
    match connecting {
        Some(future) => future.await,
        None => std::future::pending().await,
    }
}

async fn next_frame(stream: &mut Option<FrameStream>) -> Option<Result<String>> {
    match stream {
        Some(stream) => stream.next().await,
        None => std::future::pending().await,
    }
}

/// Socket URL with the bearer token masked, for logs.
fn redact_token(url: &str) -> String {
    match url.split_once("token=") {
        Some((head, _)) => format!("{}token=***", head),
        None => url.to_string(),
    }
}
