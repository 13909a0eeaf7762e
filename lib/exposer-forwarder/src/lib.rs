//! Client for the host-side port forwarder
pub mod client;
pub mod config;
pub mod error;
pub mod wire;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use client::{Forwarder, HttpForwarder};
pub use config::ForwarderConfig;
pub use error::{ForwarderError, Result};
pub use wire::{ExposeRequest, UnexposeRequest};
