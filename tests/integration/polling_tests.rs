//! Polling supervisor tests
//!
//! The UTXO chain has no push feed; the supervisor re-scans the last two
//! blocks every tick and leans on the dedup cache to stay quiet.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use cerberus_monitor::config::MonitorConfig;
use cerberus_monitor::models::{ChainSource, ConnectionState};
use cerberus_monitor::supervisor::PollingSupervisor;

use crate::common::{pipeline_with, utxo_tx, MockNotifier, MockUtxoClient};

fn setup() -> (Arc<MockNotifier>, Arc<cerberus_monitor::pipeline::AlertPipeline>) {
    let mut config = MonitorConfig::default();
    config.utxo_chain.spot_threshold_native = 10.0;
    let notifier = Arc::new(MockNotifier::default());
    let pipeline = pipeline_with(&config, notifier.clone());
    (notifier, pipeline)
}

#[tokio::test]
async fn test_repeated_ticks_alert_once_per_transaction() {
    let (notifier, pipeline) = setup();
    let client = Arc::new(MockUtxoClient::new(
        100,
        vec![
            (99, vec![utxo_tx("big-transfer", 12)]),
            (100, vec![utxo_tx("small-transfer", 5)]),
        ],
    ));

    let cancel = CancellationToken::new();
    let (supervisor, mut state_rx) = PollingSupervisor::new(
        ChainSource::UtxoChain,
        client,
        pipeline,
        Duration::from_millis(10),
        cancel.clone(),
    );
    let handle = tokio::spawn(supervisor.run());

    // Plenty of ticks; the whale transaction must only alert once and the
    // below-threshold one never
    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(notifier.sent_count(), 1);
    assert!(notifier.sent()[0].1.contains("BTC"));

    cancel.cancel();
    handle.await.unwrap();
    assert_eq!(*state_rx.borrow_and_update(), ConnectionState::Stopped);
}

#[tokio::test]
async fn test_both_recent_blocks_are_scanned() {
    let (notifier, pipeline) = setup();
    let client = Arc::new(MockUtxoClient::new(
        100,
        vec![
            (99, vec![utxo_tx("whale-a", 20)]),
            (100, vec![utxo_tx("whale-b", 30)]),
        ],
    ));

    let cancel = CancellationToken::new();
    let (supervisor, _state_rx) = PollingSupervisor::new(
        ChainSource::UtxoChain,
        client,
        pipeline,
        Duration::from_millis(10),
        cancel.clone(),
    );
    let handle = tokio::spawn(supervisor.run());

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(notifier.sent_count(), 2);

    cancel.cancel();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_failed_fetch_skips_tick_and_recovers() {
    let (notifier, pipeline) = setup();
    let client = Arc::new(MockUtxoClient::new(
        100,
        vec![(99, vec![]), (100, vec![utxo_tx("late-whale", 50)])],
    ));
    client.fail_next_tip();

    let cancel = CancellationToken::new();
    let (supervisor, state_rx) = PollingSupervisor::new(
        ChainSource::UtxoChain,
        client,
        pipeline,
        Duration::from_millis(10),
        cancel.clone(),
    );
    let handle = tokio::spawn(supervisor.run());

    tokio::time::sleep(Duration::from_millis(100)).await;

    // The first cycle failed, a later one delivered the alert, and the
    // timer never died
    assert_eq!(notifier.sent_count(), 1);
    assert_eq!(*state_rx.borrow(), ConnectionState::Connected);

    cancel.cancel();
    handle.await.unwrap();
}
