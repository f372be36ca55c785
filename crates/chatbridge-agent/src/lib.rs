//! Page agent — runs once per chat page.
//!
//! Observes the page through a host-provided [`PageSurface`], turns
//! relevant changes into debounced `PUSH` captures, and applies inbound
//! `CMD`/`STREAM` envelopes to the page's input element. Provider-specific
//! knowledge lives behind [`PageAdapter`].

pub mod adapter;
pub mod agent;
pub mod debounce;
pub mod dispatch;
pub mod memory;
pub mod surface;

pub use adapter::{adapter_for, GenericAdapter, NodeSnapshot, PageAdapter, ProviderAdapter};
pub use agent::{AgentSettings, PageAgent, PageEvent, Shortcut};
pub use debounce::Debouncer;
pub use dispatch::{Action, DispatchOutcome};
pub use memory::MemoryPage;
pub use surface::{DomEvent, ElementKind, PageSurface};
