//! Envelope codec — text frames in, envelopes out, and back.
//!
//! Validation here is purely syntactic: presence and types of fields plus
//! the protocol version. Whether a `CMD` action makes sense is up to the
//! page agent.

use chatbridge_core::{Error, Result};
use tracing::debug;

use crate::envelope::Envelope;

/// Serialize an envelope into a single-line JSON text frame.
pub fn encode(envelope: &Envelope) -> Result<String> {
    serde_json::to_string(envelope).map_err(|e| Error::Encoding(e.to_string()))
}

/// Parse a text frame into an envelope.
pub fn decode(text: &str) -> Result<Envelope> {
    serde_json::from_str(text).map_err(|e| {
        debug!(len = text.len(), error = %e, "Rejected frame");
        Error::Decoding(e.to_string())
    })
}
