//! In-process messages from a page agent to the connector.
//!
//! Serialized as `{"type": "REGISTER_TAB", "payload": {...}}` and
//! `{"type": "CAPTURE", "payload": <envelope>}` so a host that crosses a
//! process or script boundary can forward them unchanged.

use serde::{Deserialize, Serialize};

use crate::envelope::Envelope;
use crate::provider::Provider;

/// Raw facts a page reports about itself when it becomes ready.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterTab {
    pub url: String,
    pub title: String,
    pub provider: Option<Provider>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentMessage {
    RegisterTab(RegisterTab),
    Capture(Envelope),
}
