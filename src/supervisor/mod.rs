//! Source supervisors
//!
//! One connection supervisor per push-based source, one timer-driven
//! polling supervisor for the UTXO chain. Each runs as its own task and
//! publishes its connection state for the orchestrator's status query.

pub mod connection;
pub mod polling;

pub use connection::{
    backoff_delay, ConnectionSupervisor, Connector, ReconnectPolicy, Transport, WsConnector,
};
pub use polling::PollingSupervisor;
