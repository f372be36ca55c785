//! In-memory transport for connector tests.
//!
//! Each accepted connection hands the test a [`Peer`]: the frames the
//! connector wrote, and a sender for frames the "external process" pushes.
//! Dropping `Peer::push` closes the connection from the far side.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chatbridge_connector::{BridgeStatus, FrameSink, FrameStream, Transport};
use chatbridge_core::{BridgeConfig, Error, Result};
use chatbridge_protocol::{codec, Envelope};
use futures::channel::mpsc as fmpsc;
use futures::future::{self, BoxFuture};
use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::time::{timeout, Instant};

pub struct Peer {
    pub sent: fmpsc::UnboundedReceiver<String>,
    pub push: fmpsc::UnboundedSender<Result<String>>,
}

impl Peer {
    /// Next envelope the connector wrote, decoded.
    pub async fn next_envelope(&mut self) -> Envelope {
        let text = timeout(Duration::from_secs(60), self.sent.next())
            .await
            .expect("no frame from connector")
            .expect("connection closed");
        codec::decode(&text).expect("connector wrote an invalid frame")
    }

    /// Assert the connector writes nothing for a while.
    pub async fn expect_quiet(&mut self) {
        let next = timeout(Duration::from_secs(10), self.sent.next()).await;
        assert!(next.is_err(), "unexpected frame: {:?}", next);
    }

    pub fn send_text(&self, text: impl Into<String>) {
        self.push.unbounded_send(Ok(text.into())).unwrap();
    }

    pub fn send_envelope(&self, envelope: &Envelope) {
        self.send_text(codec::encode(envelope).unwrap());
    }
}

#[derive(Default)]
struct Shared {
    accept: AtomicBool,
    calls: Mutex<Vec<(Instant, String)>>,
}

#[derive(Clone)]
pub struct ChannelTransport {
    shared: Arc<Shared>,
    peers: mpsc::UnboundedSender<Peer>,
}

impl ChannelTransport {
    pub fn new(accept: bool) -> (Self, mpsc::UnboundedReceiver<Peer>) {
        let (peers_tx, peers_rx) = mpsc::unbounded_channel();
        let transport = Self {
            shared: Arc::new(Shared::default()),
            peers: peers_tx,
        };
        transport.set_accept(accept);
        (transport, peers_rx)
    }

    pub fn set_accept(&self, accept: bool) {
        self.shared.accept.store(accept, Ordering::SeqCst);
    }

    /// When each connection attempt was made, relative to `start`.
    pub fn attempt_offsets(&self, start: Instant) -> Vec<u128> {
        self.shared
            .calls
            .lock()
            .unwrap()
            .iter()
            .map(|(at, _)| (*at - start).as_millis())
            .collect()
    }

    pub fn urls(&self) -> Vec<String> {
        self.shared
            .calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, url)| url.clone())
            .collect()
    }
}

impl Transport for ChannelTransport {
    fn connect(&self, url: &str) -> BoxFuture<'static, Result<(FrameSink, FrameStream)>> {
        self.shared
            .calls
            .lock()
            .unwrap()
            .push((Instant::now(), url.to_string()));

        if !self.shared.accept.load(Ordering::SeqCst) {
            return Box::pin(future::ready(Err(Error::ConnectFailure(
                "connection refused".into(),
            ))));
        }

        let (sent_tx, sent_rx) = fmpsc::unbounded::<String>();
        let (push_tx, push_rx) = fmpsc::unbounded::<Result<String>>();
        let _ = self.peers.send(Peer {
            sent: sent_rx,
            push: push_tx,
        });

        let sink: FrameSink =
            Box::pin(sent_tx.sink_map_err(|e| Error::ConnectFailure(e.to_string())));
        let stream: FrameStream = Box::pin(push_rx);
        Box::pin(future::ready(Ok((sink, stream))))
    }
}

pub fn config() -> BridgeConfig {
    BridgeConfig::default()
}

/// Wait until the published status satisfies `pred`.
pub async fn wait_status(
    status: &mut watch::Receiver<BridgeStatus>,
    pred: impl FnMut(&BridgeStatus) -> bool,
) -> BridgeStatus {
    timeout(Duration::from_secs(120), status.wait_for(pred))
        .await
        .expect("status condition not reached")
        .expect("connector gone")
        .clone()
}
