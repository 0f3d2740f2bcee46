//! Monitor lifecycle orchestration
//!
//! Owns the shared dedup cache and threshold configuration (through the
//! pipeline), starts and stops every source supervisor, and answers the
//! status query. start/stop are idempotent.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::models::{ChainSource, ConnectionState};
use crate::pipeline::AlertPipeline;
use crate::sources::{SourceAdapter, UtxoChainClient};
use crate::supervisor::{ConnectionSupervisor, Connector, PollingSupervisor, ReconnectPolicy};

/// What a start request did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
}

/// What a stop request did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    NotRunning,
}

/// Snapshot of the monitor for the status surface
#[derive(Debug, Clone, Serialize)]
pub struct MonitorStatus {
    pub active: bool,
    pub connections: HashMap<ChainSource, ConnectionState>,
}

/// One source's runtime ingredients
pub enum SourceRuntime {
    /// Push-based source driven by a connection supervisor
    Push {
        adapter: Arc<dyn SourceAdapter>,
        connector: Arc<dyn Connector>,
    },
    /// Polled source driven by a timer loop
    Poll {
        source: ChainSource,
        client: Arc<dyn UtxoChainClient>,
        interval: Duration,
    },
}

impl SourceRuntime {
    fn source(&self) -> ChainSource {
        match self {
            SourceRuntime::Push { adapter, .. } => adapter.source(),
            SourceRuntime::Poll { source, .. } => *source,
        }
    }
}

struct RunningMonitor {
    cancel: CancellationToken,
    states: HashMap<ChainSource, watch::Receiver<ConnectionState>>,
    tasks: Vec<JoinHandle<()>>,
}

pub struct MonitorOrchestrator {
    sources: Vec<SourceRuntime>,
    pipeline: Arc<AlertPipeline>,
    policy: ReconnectPolicy,
    running: Mutex<Option<RunningMonitor>>,
}

impl MonitorOrchestrator {
    pub fn new(
        sources: Vec<SourceRuntime>,
        pipeline: Arc<AlertPipeline>,
        policy: ReconnectPolicy,
    ) -> Self {
        Self {
            sources,
            pipeline,
            policy,
            running: Mutex::new(None),
        }
    }

    /// Start every supervisor. No-op when already running.
    pub fn start(&self) -> StartOutcome {
        let mut running = self.running.lock();
        if running.is_some() {
            tracing::info!("Monitor already running");
            return StartOutcome::AlreadyRunning;
        }

        let cancel = CancellationToken::new();
        let mut states = HashMap::new();
        let mut tasks = Vec::new();

        for runtime in &self.sources {
            match runtime {
                SourceRuntime::Push { adapter, connector } => {
                    let (supervisor, state_rx) = ConnectionSupervisor::new(
                        adapter.clone(),
                        connector.clone(),
                        self.policy.clone(),
                        cancel.child_token(),
                    );
                    states.insert(adapter.source(), state_rx);
                    tasks.push(tokio::spawn(supervisor.run()));
                }
                SourceRuntime::Poll {
                    source,
                    client,
                    interval,
                } => {
                    let (supervisor, state_rx) = PollingSupervisor::new(
                        *source,
                        client.clone(),
                        self.pipeline.clone(),
                        *interval,
                        cancel.child_token(),
                    );
                    states.insert(*source, state_rx);
                    tasks.push(tokio::spawn(supervisor.run()));
                }
            }
        }

        tracing::info!(source_count = self.sources.len(), "Monitor started");
        *running = Some(RunningMonitor {
            cancel,
            states,
            tasks,
        });
        StartOutcome::Started
    }

    /// Stop all supervisors and wait for them to wind down. Safe to call
    /// when some supervisors have already stopped on their own.
    pub async fn stop(&self) -> StopOutcome {
        let monitor = { self.running.lock().take() };
        let Some(monitor) = monitor else {
            tracing::info!("Monitor not running");
            return StopOutcome::NotRunning;
        };

        monitor.cancel.cancel();
        for task in monitor.tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Supervisor task ended abnormally");
            }
        }

        tracing::info!("Monitor stopped");
        StopOutcome::Stopped
    }

    /// Current per-source connection states plus the overall active flag
    pub fn status(&self) -> MonitorStatus {
        let running = self.running.lock();
        match running.as_ref() {
            Some(monitor) => MonitorStatus {
                active: true,
                connections: monitor
                    .states
                    .iter()
                    .map(|(source, rx)| (*source, *rx.borrow()))
                    .collect(),
            },
            None => MonitorStatus {
                active: false,
                connections: self
                    .sources
                    .iter()
                    .map(|runtime| (runtime.source(), ConnectionState::Disconnected))
                    .collect(),
            },
        }
    }
}
