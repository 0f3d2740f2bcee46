//! Timer-driven polling supervisor for the UTXO chain
//!
//! Fetches the chain tip on a fixed cadence and scans the last two blocks,
//! which covers depth-1 re-orgs and overlapping poll windows. Every
//! transaction is submitted to the pipeline regardless of duplicates; the
//! dedup cache keeps repeats from re-alerting.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::models::{ChainSource, ConnectionState};
use crate::pipeline::AlertPipeline;
use crate::sources::utxo_chain::{self, UtxoChainClient};

pub struct PollingSupervisor {
    source: ChainSource,
    client: Arc<dyn UtxoChainClient>,
    pipeline: Arc<AlertPipeline>,
    interval: Duration,
    state_tx: watch::Sender<ConnectionState>,
    cancel: CancellationToken,
}

impl PollingSupervisor {
    pub fn new(
        source: ChainSource,
        client: Arc<dyn UtxoChainClient>,
        pipeline: Arc<AlertPipeline>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> (Self, watch::Receiver<ConnectionState>) {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        (
            Self {
                source,
                client,
                pipeline,
                interval,
                state_tx,
                cancel,
            },
            state_rx,
        )
    }

    /// Run until stopped. A failed fetch logs and skips the tick; it never
    /// ends the loop.
    pub async fn run(self) {
        tracing::info!(
            source = %self.source,
            interval_secs = self.interval.as_secs(),
            "Starting chain polling task"
        );
        // A poller has no handshake; it counts as connected while the
        // timer loop is alive
        let _ = self.state_tx.send(ConnectionState::Connected);

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!(source = %self.source, "Polling task shutting down");
                    let _ = self.state_tx.send(ConnectionState::Stopped);
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.poll_once().await {
                        tracing::warn!(
                            source = %self.source,
                            error = %e,
                            "Poll cycle failed, skipping tick"
                        );
                    }
                }
            }
        }
    }

    async fn poll_once(&self) -> anyhow::Result<()> {
        let tip = self
            .client
            .tip_height()
            .await
            .context("Failed to fetch chain height")?;

        for height in tip.saturating_sub(1)..=tip {
            let txs = self
                .client
                .block_transactions(height)
                .await
                .with_context(|| format!("Failed to fetch block {height}"))?;

            tracing::debug!(
                source = %self.source,
                height,
                tx_count = txs.len(),
                "Scanned block"
            );

            for tx in &txs {
                if let Some(event) = utxo_chain::normalize_transaction(tx) {
                    self.pipeline.process(event).await;
                }
            }
        }

        Ok(())
    }
}
