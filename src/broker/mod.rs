//! Broker module - the host controller relaying packets on the debug bus.
//!
//! The [`HostController`] binds a bus endpoint and forwards packets between
//! every connected module and tool:
//! - lifecycle state machine (stopped → running → stopped, restartable)
//! - forwarding activity: decode, route by destination address, relay

mod controller;
mod relay;

pub use controller::{
    BrokerConfig, HostController, DEFAULT_EVENT_CAPACITY, DEFAULT_SHUTDOWN_TIMEOUT,
};
