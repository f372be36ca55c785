//! Chat bridge core — error taxonomy and configuration shared by every crate.

pub mod config;
pub mod error;

pub use config::BridgeConfig;
pub use error::{Error, Result};
