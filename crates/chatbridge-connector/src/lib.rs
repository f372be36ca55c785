//! Chat bridge connector — the single owner of the bridge socket.
//!
//! Tracks which page instances show a known chat provider, keeps the socket
//! alive with bounded exponential backoff, enriches page captures on the
//! way out and routes inbound commands and stream deltas to their page.

pub mod backoff;
pub mod connector;
pub mod health;
pub mod registry;
pub mod state;
pub mod transport;

pub use backoff::Backoff;
pub use connector::{Connector, ConnectorHandle, PageLink};
pub use health::{check_health, HealthReport};
pub use registry::{TabEntry, TabRegistry};
pub use state::{BridgeStatus, ConnectionState, StatusIndicator};
pub use transport::{FrameSink, FrameStream, Transport, WsTransport};
