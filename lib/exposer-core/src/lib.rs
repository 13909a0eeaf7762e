//! Core data model and port-delta policy for the NodePort exposer
//!
//! This library provides:
//! - Service snapshots as observed from the cluster watch
//! - Expose/unexpose actions and the events that produce them
//! - The port-delta policy mapping one event to an ordered action list

pub mod error;
pub mod event;
pub mod policy;
pub mod snapshot;

pub use error::{CoreError, Result};
pub use event::{EventKind, PortAction, ServiceEvent};
pub use policy::{plan, Decision, Plan};
pub use snapshot::{NodePort, ServiceSnapshot, ServiceType};
