//! Socket transport. The connector only sees text frames, so tests can
//! swap the websocket for in-memory channels.

use std::pin::Pin;

use chatbridge_core::{Error, Result};
use futures::future::{self, BoxFuture};
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

/// Outgoing half of an open connection.
pub type FrameSink = Pin<Box<dyn Sink<String, Error = Error> + Send>>;

/// Incoming half. Ends when the peer closes the connection.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

pub trait Transport: Send + Sync + 'static {
    /// Open a connection to `url`. Resolves once the handshake completes.
    fn connect(&self, url: &str) -> BoxFuture<'static, Result<(FrameSink, FrameStream)>>;
}

/// Websocket transport over `tokio-tungstenite`.
#[derive(Debug, Clone, Default)]
pub struct WsTransport;

impl Transport for WsTransport {
    fn connect(&self, url: &str) -> BoxFuture<'static, Result<(FrameSink, FrameStream)>> {
        let url = url.to_string();
        Box::pin(async move {
            let (ws_stream, _) = connect_async(url.as_str())
                .await
                .map_err(|e| Error::ConnectFailure(e.to_string()))?;
            let (write, read) = ws_stream.split();

            let sink = write
                .sink_map_err(|e| Error::ConnectFailure(e.to_string()))
                .with(|text: String| future::ready(Ok::<_, Error>(Message::Text(text))));

            let stream = read.filter_map(|message| {
                future::ready(match message {
                    Ok(Message::Text(text)) => Some(Ok(text)),
                    Ok(Message::Close(frame)) => {
                        debug!(?frame, "Bridge socket close frame");
                        None
                    }
                    // Pings are answered by tungstenite; binary frames carry nothing for us.
                    Ok(_) => None,
                    Err(e) => Some(Err(Error::ConnectFailure(e.to_string()))),
                })
            });

            let sink: FrameSink = Box::pin(sink);
            let stream: FrameStream = Box::pin(stream);
            Ok((sink, stream))
        })
    }
}
