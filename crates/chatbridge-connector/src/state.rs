//! Connection state and the status snapshot published to observers.

use serde::Serialize;

use crate::registry::TabEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        };
        f.write_str(s)
    }
}

/// Two-state badge shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusIndicator {
    Connected,
    Disconnected,
}

impl StatusIndicator {
    pub fn badge(&self) -> &'static str {
        match self {
            Self::Connected => "✓",
            Self::Disconnected => "✗",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Self::Connected => "#4CAF50",
            Self::Disconnected => "#F44336",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Connected => "Connected",
            Self::Disconnected => "Disconnected",
        }
    }
}

/// Point-in-time view of the connector.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeStatus {
    pub state: ConnectionState,
    /// Reconnect attempts since the last successful connection.
    pub attempts: u32,
    /// Budget spent; only a manual reconnect leaves this state.
    pub exhausted: bool,
    pub tabs: Vec<TabEntry>,
}

impl BridgeStatus {
    pub fn connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn indicator(&self) -> StatusIndicator {
        if self.connected() {
            StatusIndicator::Connected
        } else {
            StatusIndicator::Disconnected
        }
    }
}

impl Default for BridgeStatus {
    fn default() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            attempts: 0,
            exhausted: false,
            tabs: Vec::new(),
        }
    }
}
