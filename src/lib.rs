//! # reducer-rs
//!
//! A unidirectional state core. Callers dispatch actions; a [`Behavior`]
//! turns each action into asynchronous work that emits mutations; the
//! engine reduces those mutations into state one at a time and publishes
//! every change.
//!
//! The engine tracks in-flight work, cancels work the behavior declares
//! superseded, and cancels everything when it is dropped.

pub mod behavior;
pub mod config;
pub mod engine;
pub mod error;
pub mod mutator;
pub mod proxy;
pub mod registry;
pub mod revision;
pub mod telemetry;

pub use behavior::{ActionItem, Behavior};
pub use engine::Engine;
pub use error::{Error, Result};
pub use mutator::Mutator;
pub use proxy::ProxyBehavior;
pub use revision::Revision;
