//! Project lifecycle events.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`PlatformEvent`]: the event envelope.
//! - [`event_types`]: the event names the pipeline emits.

pub mod bus;

pub use bus::{event_types, EventBus, PlatformEvent};
