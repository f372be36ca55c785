//! Bridge protocol — the versioned envelope exchanged with the external
//! process, its codec, the known-provider table, and the in-process
//! messages a page agent submits to the connector.

pub mod codec;
pub mod envelope;
pub mod message;
pub mod provider;

pub use codec::{decode, encode};
pub use envelope::{
    Body, CommandBody, Envelope, Meta, Op, PushBody, Source, StreamBody, PROTOCOL_VERSION,
};
pub use message::{AgentMessage, RegisterTab};
pub use provider::{ElementRule, Provider, ProviderProfile};
