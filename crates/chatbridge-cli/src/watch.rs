//! `chatbridge watch` — run the connector with in-memory pages.
//!
//! Each target becomes a [`MemoryPage`] with an empty chat input and its
//! own page agent. Inbound commands and stream deltas land in that input,
//! which is printed whenever it changes. Lines typed on stdin drive the
//! pages:
//!
//! ```text
//! <text>                 select <text> on the first page
//! @<id> <text>           select <text> on page <id>
//! :capture [id]          full capture
//! :reconnect             reconnect with a fresh budget
//! :status                print tracked tabs
//! ```

use std::time::Duration;

use anyhow::Context;
use chatbridge_agent::{AgentSettings, MemoryPage, PageAgent, PageEvent};
use chatbridge_connector::{BridgeStatus, Connector, ConnectorHandle, WsTransport};
use chatbridge_core::BridgeConfig;
use chatbridge_protocol::Provider;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

const INPUT_POLL: Duration = Duration::from_millis(500);

/// A page to open: explicit `id=url` or a bare url with a generated id.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Target {
    id: String,
    url: String,
}

impl Target {
    fn parse(arg: &str) -> Self {
        match arg.split_once('=') {
            Some((id, url)) if !id.is_empty() && !id.contains('/') && !id.contains(':') => Self {
                id: id.to_string(),
                url: url.to_string(),
            },
            _ => Self {
                id: uuid::Uuid::new_v4().simple().to_string()[..8].to_string(),
                url: arg.to_string(),
            },
        }
    }

    fn title(&self) -> String {
        match Provider::from_url(&self.url) {
            Some(provider) => provider.name().to_string(),
            None => self.url.clone(),
        }
    }
}

struct WatchedPage {
    id: String,
    page: MemoryPage,
    input: Option<usize>,
    last_input: String,
    events: mpsc::Sender<PageEvent>,
}

impl WatchedPage {
    fn report_input(&mut self) {
        let Some(content) = self.input.and_then(|id| self.page.content_of(id)) else {
            return;
        };
        if content != self.last_input {
            println!("[{}] input: {}", self.id, content);
            self.last_input = content;
        }
    }
}

/// What a stdin line asks for.
#[derive(Debug, PartialEq, Eq)]
enum Line<'a> {
    Select { tab: Option<&'a str>, text: &'a str },
    Capture { tab: Option<&'a str> },
    Reconnect,
    Status,
    Empty,
}

impl<'a> Line<'a> {
    fn parse(line: &'a str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Empty;
        }
        if let Some(rest) = line.strip_prefix(':') {
            let mut parts = rest.split_whitespace();
            return match parts.next() {
                Some("capture") => Self::Capture { tab: parts.next() },
                Some("reconnect") => Self::Reconnect,
                Some("status") => Self::Status,
                _ => Self::Select { tab: None, text: line },
            };
        }
        if let Some(rest) = line.strip_prefix('@') {
            if let Some((tab, text)) = rest.split_once(char::is_whitespace) {
                return Self::Select {
                    tab: Some(tab),
                    text: text.trim(),
                };
            }
        }
        Self::Select { tab: None, text: line }
    }
}

pub async fn run(config: BridgeConfig, args: &[String]) -> anyhow::Result<()> {
    let targets: Vec<Target> = args.iter().map(|a| Target::parse(a)).collect();
    let settings = AgentSettings::from_config(&config);
    let handle = Connector::new(config, WsTransport)
        .context("Invalid bridge configuration")?
        .start();

    let mut pages = Vec::with_capacity(targets.len());
    for target in &targets {
        pages.push(open_page(&handle, target, &settings).await?);
    }

    let mut status = handle.subscribe();
    let mut ticker = tokio::time::interval(INPUT_POLL);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = status.borrow_and_update().clone();
                print_status(&snapshot);
            }
            _ = ticker.tick() => {
                for page in &mut pages {
                    page.report_input();
                }
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => handle_line(&handle, &pages, &line).await,
                Ok(None) => stdin_open = false,
                Err(e) => {
                    warn!("stdin closed: {}", e);
                    stdin_open = false;
                }
            },
        }
    }

    info!("Shutting down");
    for page in &pages {
        handle.close_page(page.id.as_str()).await?;
    }
    // Closing the event channels ends the agents.
    drop(pages);
    handle.stop().await?;
    Ok(())
}

async fn open_page(
    handle: &ConnectorHandle,
    target: &Target,
    settings: &AgentSettings,
) -> anyhow::Result<WatchedPage> {
    let title = target.title();
    let (page, input) = MemoryPage::with_chat_input(target.url.as_str(), title.as_str());
    let link = handle
        .attach_page(target.id.as_str(), target.url.as_str(), title.as_str())
        .await?;

    let (events_tx, events_rx) = mpsc::channel(64);
    let agent = PageAgent::new(page.clone(), settings.clone(), link.outbound);
    tokio::spawn(agent.run(events_rx, link.inbound));

    println!("[{}] opened {} ({})", target.id, target.url, title);
    if input.is_none() {
        println!("[{}] no known chat input on this page; inbound text is ignored", target.id);
    }

    Ok(WatchedPage {
        id: target.id.clone(),
        page,
        input,
        last_input: String::new(),
        events: events_tx,
    })
}

async fn handle_line(handle: &ConnectorHandle, pages: &[WatchedPage], line: &str) {
    let find = |tab: Option<&str>| match tab {
        Some(tab) => pages.iter().find(|p| p.id == tab),
        None => pages.first(),
    };

    let (page, event) = match Line::parse(line) {
        Line::Empty => return,
        Line::Reconnect => {
            if let Err(e) = handle.reconnect().await {
                warn!("Reconnect failed: {}", e);
            }
            return;
        }
        Line::Status => {
            print_status(&handle.status());
            return;
        }
        Line::Capture { tab } => (find(tab), PageEvent::CaptureRequested),
        Line::Select { tab, text } => (find(tab), PageEvent::SelectionChanged(text.to_string())),
    };

    match page {
        Some(page) => {
            if page.events.send(event).await.is_err() {
                warn!("Page {} is no longer running", page.id);
            }
        }
        None => eprintln!("No such page"),
    }
}

fn print_status(status: &BridgeStatus) {
    let indicator = status.indicator();
    println!(
        "{} {} [{}] tracked tabs: {}",
        indicator.badge(),
        indicator.label(),
        status.state,
        status.tabs.len()
    );
    for tab in &status.tabs {
        println!("    {} {} {} ({})", tab.id, tab.provider, tab.url, tab.title);
    }
    if status.exhausted {
        println!("  reconnect budget exhausted, type :reconnect to try again");
    }
}
