//! Cerberus Monitor Library
//!
//! Multi-chain real-time transaction monitor: normalizes pushes and polls
//! from heterogeneous sources into one canonical event shape and
//! dispatches threshold-based alerts. This library exposes core modules
//! for testing.

pub mod alerts;
pub mod classify;
pub mod config;
pub mod dedup;
pub mod error;
pub mod handlers;
pub mod models;
pub mod orchestrator;
pub mod pipeline;
pub mod sources;
pub mod supervisor;

// Re-export commonly used types for tests
pub use alerts::{AlertDispatcher, ExplorerLinks, Notifier, TelegramNotifier};
pub use classify::{classify, Thresholds, Verdict};
pub use config::MonitorConfig;
pub use dedup::DedupCache;
pub use error::{MonitorError, MonitorResult};
pub use models::{
    CanonicalEvent, ChainSource, ConnectionState, EventCategory, PositionSide, VenueMeta,
};
pub use orchestrator::{MonitorOrchestrator, MonitorStatus, SourceRuntime, StartOutcome, StopOutcome};
pub use pipeline::AlertPipeline;
pub use supervisor::{backoff_delay, ConnectionSupervisor, PollingSupervisor, ReconnectPolicy};
