//! Envelope — the versioned message unit exchanged over the bridge socket.
//!
//! On the wire an envelope is a flat JSON object with short keys:
//!
//! ```json
//! {"v":1,"op":"PUSH","src":"ext","tab":"42","url":"https://claude.ai/chat",
//!  "provider":"Claude","ts":"2025-01-01T00:00:00.000Z",
//!  "body":{"selection":"","context":"...","role":"user"},"meta":{}}
//! ```
//!
//! Every key is always emitted. `v`, `op` and `body` are required when
//! decoding; the rest fall back to empty values.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::provider::Provider;

/// Protocol version spoken by this crate.
pub const PROTOCOL_VERSION: u32 = 1;

/// Open metadata mapping (model name, language, page title, ...).
pub type Meta = serde_json::Map<String, Value>;

/// Operation type; determines the shape of the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Op {
    /// Outbound capture from a page.
    Push,
    /// Inbound command against a page's input surface.
    Cmd,
    /// Inbound incremental text fragment.
    Stream,
}

impl Op {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Push => "PUSH",
            Self::Cmd => "CMD",
            Self::Stream => "STREAM",
        }
    }

    /// Whether the connector forwards this op to a page agent.
    pub fn is_inbound(&self) -> bool {
        matches!(self, Self::Cmd | Self::Stream)
    }
}

impl std::fmt::Display for Op {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which side produced the envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Source {
    #[serde(rename = "ext", alias = "agent")]
    Agent,
    #[serde(rename = "owui", alias = "external")]
    External,
}

/// `PUSH` body: what the user selected plus the surrounding conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushBody {
    pub selection: String,
    pub context: String,
    pub role: String,
}

impl PushBody {
    pub fn user(selection: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            selection: selection.into(),
            context: context.into(),
            role: "user".into(),
        }
    }
}

/// `CMD` body. `action` is kept as text; the page agent decides what it means.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandBody {
    pub action: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub selector: Option<String>,
}

/// `STREAM` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamBody {
    pub delta: String,
}

/// Operation-specific payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Body {
    Push(PushBody),
    Command(CommandBody),
    Stream(StreamBody),
}

impl Body {
    pub fn op(&self) -> Op {
        match self {
            Self::Push(_) => Op::Push,
            Self::Command(_) => Op::Cmd,
            Self::Stream(_) => Op::Stream,
        }
    }

    fn from_value(op: Op, value: Value) -> Result<Self, serde_json::Error> {
        Ok(match op {
            Op::Push => Self::Push(serde_json::from_value(value)?),
            Op::Cmd => Self::Command(serde_json::from_value(value)?),
            Op::Stream => Self::Stream(serde_json::from_value(value)?),
        })
    }
}

/// A bridge message. The op is carried by the body variant so the two can
/// never disagree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "WireEnvelope", try_from = "WireEnvelope")]
pub struct Envelope {
    pub version: u32,
    pub source: Source,
    /// Page instance the envelope targets or came from. Empty until the
    /// connector stamps it.
    pub tab_ref: String,
    pub url: String,
    pub provider: Option<Provider>,
    /// ISO-8601 creation time.
    pub timestamp: String,
    pub body: Body,
    pub meta: Meta,
}

impl Envelope {
    /// A capture produced by a page agent. `tab_ref` is left empty.
    pub fn push(url: impl Into<String>, provider: Option<Provider>, body: PushBody, meta: Meta) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            source: Source::Agent,
            tab_ref: String::new(),
            url: url.into(),
            provider,
            timestamp: now_iso8601(),
            body: Body::Push(body),
            meta,
        }
    }

    /// A command issued by the external process.
    pub fn command(tab_ref: impl Into<String>, body: CommandBody) -> Self {
        Self::external(tab_ref, Body::Command(body))
    }

    /// A stream delta issued by the external process.
    pub fn stream(tab_ref: impl Into<String>, delta: impl Into<String>) -> Self {
        Self::external(tab_ref, Body::Stream(StreamBody { delta: delta.into() }))
    }

    fn external(tab_ref: impl Into<String>, body: Body) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            source: Source::External,
            tab_ref: tab_ref.into(),
            url: String::new(),
            provider: None,
            timestamp: now_iso8601(),
            body,
            meta: Meta::new(),
        }
    }

    pub fn op(&self) -> Op {
        self.body.op()
    }
}

/// Current time the way browsers print it (`2025-01-01T12:00:00.000Z`).
pub fn now_iso8601() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Flat wire shape of an envelope.
#[derive(Serialize, Deserialize)]
struct WireEnvelope {
    v: u32,
    op: Op,
    #[serde(default = "default_source", deserialize_with = "lenient_source")]
    src: Source,
    #[serde(default, deserialize_with = "tab_ref_text")]
    tab: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    url: String,
    #[serde(default, deserialize_with = "lenient_provider")]
    provider: Option<Provider>,
    #[serde(default, deserialize_with = "null_as_empty")]
    ts: String,
    body: Value,
    #[serde(default, deserialize_with = "null_as_empty")]
    meta: Meta,
}

impl From<Envelope> for WireEnvelope {
    fn from(env: Envelope) -> Self {
        Self {
            v: env.version,
            op: env.body.op(),
            src: env.source,
            tab: env.tab_ref,
            url: env.url,
            provider: env.provider,
            ts: env.timestamp,
            // Body only holds strings and options; conversion cannot fail.
            body: serde_json::to_value(&env.body).unwrap_or(Value::Null),
            meta: env.meta,
        }
    }
}

impl TryFrom<WireEnvelope> for Envelope {
    type Error = String;

    fn try_from(wire: WireEnvelope) -> Result<Self, Self::Error> {
        if wire.v != PROTOCOL_VERSION {
            return Err(format!("unsupported protocol version {}", wire.v));
        }
        let body = Body::from_value(wire.op, wire.body)
            .map_err(|e| format!("invalid {} body: {}", wire.op, e))?;
        Ok(Self {
            version: wire.v,
            source: wire.src,
            tab_ref: wire.tab,
            url: wire.url,
            provider: wire.provider,
            timestamp: wire.ts,
            body,
            meta: wire.meta,
        })
    }
}

fn default_source() -> Source {
    Source::External
}

/// Unknown or null sources are treated as external.
fn lenient_source<'de, D: Deserializer<'de>>(de: D) -> Result<Source, D::Error> {
    let raw: Option<String> = Option::deserialize(de)?;
    Ok(match raw.as_deref() {
        Some("ext") | Some("agent") => Source::Agent,
        _ => Source::External,
    })
}

/// Unknown provider names (e.g. `"Generic"`) decode as no provider.
fn lenient_provider<'de, D: Deserializer<'de>>(de: D) -> Result<Option<Provider>, D::Error> {
    let raw: Option<String> = Option::deserialize(de)?;
    Ok(raw.as_deref().and_then(Provider::from_name))
}

/// Tab refs are strings, but numeric ids are accepted too.
fn tab_ref_text<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(de)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Null => String::new(),
        other => {
            return Err(serde::de::Error::custom(format!(
                "tab must be a string, got {}",
                other
            )))
        }
    })
}

fn null_as_empty<'de, D, T>(de: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(de)?.unwrap_or_default())
}
