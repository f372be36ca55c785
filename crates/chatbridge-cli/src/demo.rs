//! `chatbridge demo` — plays the external process against the bridge socket.
//!
//! Checks bridge health, connects with the configured token, then sends a
//! capture, an inject command and a token-by-token stream addressed to one
//! tab, printing every frame the bridge sends back.

use std::time::Duration;

use anyhow::Context;
use chatbridge_connector::check_health;
use chatbridge_core::BridgeConfig;
use chatbridge_protocol::{
    codec, Body, CommandBody, Envelope, Meta, Provider, PushBody,
};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

pub const DEFAULT_TAB: &str = "demo-tab-123";

const DEMO_URL: &str = "https://chat.openai.com/";
const STREAM_TOKENS: &[&str] = &[
    "This", " is", " a", " streaming", " response", " that", " arrives", " token", " by",
    " token", ".", " It", " demonstrates", " real-time", " text", " injection", " capabilities",
    " of", " the", " bridge", ".",
];
const SCENARIO_PAUSE: Duration = Duration::from_millis(1000);
const TOKEN_PAUSE: Duration = Duration::from_millis(100);

fn demo_meta(pairs: &[(&str, &str)]) -> Meta {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
        .collect()
}

/// The capture a page on `tab` would have produced.
fn capture_envelope(tab: &str) -> Envelope {
    let mut envelope = Envelope::push(
        DEMO_URL,
        Some(Provider::ChatGpt),
        PushBody::user(
            "This is a sample text selection for demonstration purposes.",
            "Previous conversation context would be here...",
        ),
        demo_meta(&[("model", "gpt-4"), ("lang", "en"), ("tabTitle", "ChatGPT - Demo")]),
    );
    envelope.tab_ref = tab.to_string();
    envelope
}

fn inject_envelope(tab: &str) -> Envelope {
    let mut envelope = Envelope::command(
        tab,
        CommandBody {
            action: "inject".into(),
            text: Some(
                "This is a sample response from the local model. It demonstrates how the bridge \
                 can inject text back into the page."
                    .into(),
            ),
            selector: Some("textarea[data-id=\"root\"]".into()),
        },
    );
    envelope.url = DEMO_URL.into();
    envelope.provider = Some(Provider::ChatGpt);
    envelope.meta = demo_meta(&[("model", "gpt-4"), ("lang", "en")]);
    envelope
}

fn stream_envelopes(tab: &str) -> Vec<Envelope> {
    STREAM_TOKENS
        .iter()
        .map(|token| {
            let mut envelope = Envelope::stream(tab, *token);
            envelope.url = DEMO_URL.into();
            envelope.provider = Some(Provider::ChatGpt);
            envelope
        })
        .collect()
}

/// One-line summary of a received frame.
fn describe(envelope: &Envelope) -> String {
    let provider = envelope.provider.map(|p| p.name()).unwrap_or("-");
    let mut line = format!(
        "op={} tab={} provider={}",
        envelope.op(),
        envelope.tab_ref,
        provider
    );
    match &envelope.body {
        Body::Push(body) if !body.selection.is_empty() => {
            line.push_str(&format!(" selection={:?}", preview(&body.selection)));
        }
        Body::Command(body) => {
            line.push_str(&format!(" action={}", body.action));
            if let Some(text) = &body.text {
                line.push_str(&format!(" text={:?}", preview(text)));
            }
        }
        Body::Stream(body) => line.push_str(&format!(" delta={:?}", body.delta)),
        _ => {}
    }
    line
}

fn preview(text: &str) -> String {
    text.chars().take(50).collect()
}

pub async fn run(config: &BridgeConfig, tab: &str) -> anyhow::Result<()> {
    let health_url = config.health_url();
    let report = check_health(&health_url)
        .await
        .with_context(|| format!("Bridge is not running at {}", health_url))?;
    println!(
        "Bridge is healthy: status={} uptime={}s connections={} tabs={}",
        report.status,
        report.uptime_secs(),
        report.active_connections,
        report.active_tabs
    );

    let socket_url = config.socket_url()?;
    let (ws, _) = connect_async(socket_url.as_str())
        .await
        .context("Websocket connection failed")?;
    println!("Connected to bridge socket");
    let (mut write, mut read) = ws.split();

    let reader = tokio::spawn(async move {
        let mut count = 0usize;
        while let Some(message) = read.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    count += 1;
                    match codec::decode(&text) {
                        Ok(envelope) => println!("<- #{} {}", count, describe(&envelope)),
                        Err(e) => println!("<- #{} undecodable frame: {}", count, e),
                    }
                }
                Ok(Message::Close(_)) => break,
                Ok(other) => debug!("Ignoring frame {:?}", other),
                Err(e) => {
                    warn!("Socket error: {}", e);
                    break;
                }
            }
        }
        count
    });

    println!("Scenario 1: page capture");
    write.send(Message::Text(codec::encode(&capture_envelope(tab))?)).await?;
    tokio::time::sleep(SCENARIO_PAUSE).await;

    println!("Scenario 2: inject command");
    write.send(Message::Text(codec::encode(&inject_envelope(tab))?)).await?;
    tokio::time::sleep(SCENARIO_PAUSE).await;

    println!("Scenario 3: streamed response");
    for envelope in stream_envelopes(tab) {
        write.send(Message::Text(codec::encode(&envelope)?)).await?;
        tokio::time::sleep(TOKEN_PAUSE).await;
    }
    tokio::time::sleep(SCENARIO_PAUSE).await;

    write.send(Message::Close(None)).await?;
    let received = reader.await.unwrap_or(0);
    println!("Demo completed, {} frames received", received);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatbridge_protocol::{Op, Source};

    #[test]
    fn test_scenarios_target_tab() {
        let capture = capture_envelope("t1");
        assert_eq!(capture.op(), Op::Push);
        assert_eq!(capture.source, Source::Agent);
        assert_eq!(capture.tab_ref, "t1");
        assert_eq!(capture.meta["tabTitle"], "ChatGPT - Demo");

        let inject = inject_envelope("t1");
        assert_eq!(inject.op(), Op::Cmd);
        assert_eq!(inject.source, Source::External);

        let stream = stream_envelopes("t1");
        assert_eq!(stream.len(), STREAM_TOKENS.len());
        assert!(stream.iter().all(|e| e.tab_ref == "t1" && e.op() == Op::Stream));
    }

    #[test]
    fn test_scenarios_encode() {
        for envelope in std::iter::once(inject_envelope("x")).chain(stream_envelopes("x")) {
            let text = codec::encode(&envelope).unwrap();
            assert_eq!(codec::decode(&text).unwrap(), envelope);
        }
    }

    #[test]
    fn test_describe() {
        let line = describe(&Envelope::stream("42", "tok"));
        assert_eq!(line, "op=STREAM tab=42 provider=- delta=\"tok\"");
        assert!(describe(&inject_envelope("1")).contains("action=inject"));
    }
}
