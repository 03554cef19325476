//! Event bus: fan-out notifications with independent listeners.

pub mod bus;
pub mod definitions;

pub use bus::{Event, EventBus, EventHandler, FnEvent, SubscribeOptions, WILDCARD};
