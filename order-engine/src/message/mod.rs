//! 实时变更总线
//!
//! Committed record changes fan out to per-topic broadcast channels. The
//! engine publishes; in-process subscribers and transport adapters
//! (LAN / WAN) subscribe.

pub mod bus;

pub use bus::{BusError, MessageBus, OwnedSubscription, TopicSubscription};
