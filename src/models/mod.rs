//! Data models shared across the monitor

pub mod connection;
pub mod event;

pub use connection::ConnectionState;
pub use event::{
    CanonicalEvent, ChainSource, EventCategory, PositionSide, VenueMeta, UNKNOWN_PARTY,
};
