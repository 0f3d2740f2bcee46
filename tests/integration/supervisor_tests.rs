//! Connection supervisor and orchestrator lifecycle tests
//!
//! Scripted transports simulate connects, closes, and transport errors so
//! the reconnect state machine can be driven deterministically.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use cerberus_monitor::config::MonitorConfig;
use cerberus_monitor::models::{ChainSource, ConnectionState};
use cerberus_monitor::orchestrator::{
    MonitorOrchestrator, SourceRuntime, StartOutcome, StopOutcome,
};
use cerberus_monitor::pipeline::AlertPipeline;
use cerberus_monitor::sources::PerpVenueAdapter;
use cerberus_monitor::supervisor::{ConnectionSupervisor, ReconnectPolicy};

use crate::common::{
    pipeline_with, scripted_transport, settle, utxo_tx, MockConnector, MockNotifier,
    MockUtxoClient,
};

fn fast_policy(max_attempts: u32) -> ReconnectPolicy {
    ReconnectPolicy {
        base_delay: Duration::from_millis(20),
        max_delay: Duration::from_millis(100),
        max_attempts,
    }
}

fn perp_setup() -> (Arc<MockNotifier>, Arc<AlertPipeline>) {
    let mut config = MonitorConfig::default();
    config.perp_venue.contract_threshold_usd = 50_000.0;
    let notifier = Arc::new(MockNotifier::default());
    let pipeline = pipeline_with(&config, notifier.clone());
    (notifier, pipeline)
}

async fn wait_for_state(rx: &mut watch::Receiver<ConnectionState>, want: ConnectionState) {
    tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|state| *state == want))
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {want}"))
        .expect("state channel closed");
}

#[tokio::test]
async fn test_subscriptions_sent_on_connect() {
    let (_notifier, pipeline) = perp_setup();
    let adapter = Arc::new(PerpVenueAdapter::new(pipeline, vec!["ETH".to_string()]));

    let (script, transport) = scripted_transport();
    let connector = Arc::new(MockConnector::new(vec![transport]));

    let (supervisor, mut state_rx) = ConnectionSupervisor::new(
        adapter,
        connector,
        fast_policy(5),
        CancellationToken::new(),
    );
    let handle = tokio::spawn(supervisor.run());

    wait_for_state(&mut state_rx, ConnectionState::Connected).await;
    // trades + fills + liquidations for the one configured symbol
    assert_eq!(script.outbound().len(), 3);
    assert!(script.outbound()[0].contains("subscribe"));

    handle.abort();
}

#[tokio::test]
async fn test_reconnects_after_transport_close() {
    let (_notifier, pipeline) = perp_setup();
    let adapter = Arc::new(PerpVenueAdapter::new(pipeline, vec!["ETH".to_string()]));

    let (script1, transport1) = scripted_transport();
    let (script2, transport2) = scripted_transport();
    let connector = Arc::new(MockConnector::new(vec![transport1, transport2]));

    let (supervisor, mut state_rx) = ConnectionSupervisor::new(
        adapter,
        connector.clone(),
        fast_policy(5),
        CancellationToken::new(),
    );
    let handle = tokio::spawn(supervisor.run());

    wait_for_state(&mut state_rx, ConnectionState::Connected).await;

    // Peer drops the connection
    script1.close();
    wait_for_state(&mut state_rx, ConnectionState::Reconnecting).await;
    wait_for_state(&mut state_rx, ConnectionState::Connected).await;
    assert_eq!(connector.attempts(), 2);

    drop(script2);
    handle.abort();
}

#[tokio::test]
async fn test_transport_error_also_triggers_reconnect() {
    let (_notifier, pipeline) = perp_setup();
    let adapter = Arc::new(PerpVenueAdapter::new(pipeline, vec!["ETH".to_string()]));

    let (script1, transport1) = scripted_transport();
    let (_script2, transport2) = scripted_transport();
    let connector = Arc::new(MockConnector::new(vec![transport1, transport2]));

    let (supervisor, mut state_rx) = ConnectionSupervisor::new(
        adapter,
        connector,
        fast_policy(5),
        CancellationToken::new(),
    );
    let handle = tokio::spawn(supervisor.run());

    wait_for_state(&mut state_rx, ConnectionState::Connected).await;
    script1.error("connection reset by peer");
    wait_for_state(&mut state_rx, ConnectionState::Reconnecting).await;
    wait_for_state(&mut state_rx, ConnectionState::Connected).await;

    handle.abort();
}

#[tokio::test]
async fn test_stops_after_max_attempts_exhausted() {
    let (_notifier, pipeline) = perp_setup();
    let adapter = Arc::new(PerpVenueAdapter::new(pipeline, vec!["ETH".to_string()]));

    // Every connect fails
    let connector = Arc::new(MockConnector::new(vec![]));

    let (supervisor, mut state_rx) = ConnectionSupervisor::new(
        adapter,
        connector.clone(),
        fast_policy(3),
        CancellationToken::new(),
    );
    let handle = tokio::spawn(supervisor.run());

    wait_for_state(&mut state_rx, ConnectionState::Stopped).await;
    // Initial connect plus three retries; the fourth failure is fatal
    assert_eq!(connector.attempts(), 4);

    handle.await.unwrap();
}

#[tokio::test]
async fn test_stop_cancels_pending_retry() {
    let (_notifier, pipeline) = perp_setup();
    let adapter = Arc::new(PerpVenueAdapter::new(pipeline, vec!["ETH".to_string()]));
    let connector = Arc::new(MockConnector::new(vec![]));

    // A retry delay far longer than the test timeout
    let policy = ReconnectPolicy {
        base_delay: Duration::from_secs(60),
        max_delay: Duration::from_secs(60),
        max_attempts: 5,
    };

    let cancel = CancellationToken::new();
    let (supervisor, mut state_rx) =
        ConnectionSupervisor::new(adapter, connector, policy, cancel.clone());
    let handle = tokio::spawn(supervisor.run());

    wait_for_state(&mut state_rx, ConnectionState::Reconnecting).await;
    cancel.cancel();
    wait_for_state(&mut state_rx, ConnectionState::Stopped).await;

    handle.await.unwrap();
}

#[tokio::test]
async fn test_malformed_message_does_not_break_connection() {
    let (notifier, pipeline) = perp_setup();
    let adapter = Arc::new(PerpVenueAdapter::new(pipeline, vec!["ETH".to_string()]));

    let (script, transport) = scripted_transport();
    let connector = Arc::new(MockConnector::new(vec![transport]));

    let (supervisor, mut state_rx) = ConnectionSupervisor::new(
        adapter,
        connector,
        fast_policy(5),
        CancellationToken::new(),
    );
    let handle = tokio::spawn(supervisor.run());

    wait_for_state(&mut state_rx, ConnectionState::Connected).await;
    script.text("{garbage");
    script.text(
        r#"{"channel":"liquidations","data":[{"coin":"ETH","px":"6000","sz":"10","time":1700000000000}]}"#,
    );
    settle().await;

    assert_eq!(notifier.sent_count(), 1);
    assert_eq!(*state_rx.borrow(), ConnectionState::Connected);

    handle.abort();
}

#[tokio::test]
async fn test_orchestrator_start_stop_idempotent() {
    let (_notifier, pipeline) = perp_setup();
    let adapter = Arc::new(PerpVenueAdapter::new(pipeline.clone(), vec!["ETH".to_string()]));

    let (_script, transport) = scripted_transport();
    let connector = Arc::new(MockConnector::new(vec![transport]));
    let client = Arc::new(MockUtxoClient::new(100, vec![(99, vec![]), (100, vec![])]));

    let sources = vec![
        SourceRuntime::Push { adapter, connector },
        SourceRuntime::Poll {
            source: ChainSource::UtxoChain,
            client,
            interval: Duration::from_millis(10),
        },
    ];
    let orchestrator = MonitorOrchestrator::new(sources, pipeline, fast_policy(5));

    assert!(!orchestrator.status().active);
    assert_eq!(orchestrator.start(), StartOutcome::Started);
    assert_eq!(orchestrator.start(), StartOutcome::AlreadyRunning);

    settle().await;
    let status = orchestrator.status();
    assert!(status.active);
    assert_eq!(status.connections.len(), 2);
    assert_eq!(
        status.connections.get(&ChainSource::PerpVenue),
        Some(&ConnectionState::Connected)
    );
    assert_eq!(
        status.connections.get(&ChainSource::UtxoChain),
        Some(&ConnectionState::Connected)
    );

    assert_eq!(orchestrator.stop().await, StopOutcome::Stopped);
    assert_eq!(orchestrator.stop().await, StopOutcome::NotRunning);
    assert!(!orchestrator.status().active);
}

#[tokio::test]
async fn test_orchestrator_status_reports_dead_source() {
    let (_notifier, pipeline) = perp_setup();
    let adapter = Arc::new(PerpVenueAdapter::new(pipeline.clone(), vec!["ETH".to_string()]));

    // No transports at all: the push source burns its attempts and stops
    let connector = Arc::new(MockConnector::new(vec![]));
    let sources = vec![SourceRuntime::Push { adapter, connector }];
    let orchestrator = MonitorOrchestrator::new(sources, pipeline, fast_policy(1));

    orchestrator.start();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let status = orchestrator.status();
    assert!(status.active);
    assert_eq!(
        status.connections.get(&ChainSource::PerpVenue),
        Some(&ConnectionState::Stopped)
    );

    // Stopping is still safe after the supervisor already gave up
    assert_eq!(orchestrator.stop().await, StopOutcome::Stopped);
}

#[tokio::test]
async fn test_utxo_poll_flows_into_shared_pipeline() {
    let mut config = MonitorConfig::default();
    config.utxo_chain.spot_threshold_native = 10.0;
    let notifier = Arc::new(MockNotifier::default());
    let pipeline = pipeline_with(&config, notifier.clone());

    let client = Arc::new(MockUtxoClient::new(
        100,
        vec![(99, vec![utxo_tx("whale-tx", 12)]), (100, vec![])],
    ));
    let sources = vec![SourceRuntime::Poll {
        source: ChainSource::UtxoChain,
        client,
        interval: Duration::from_millis(10),
    }];
    let orchestrator = MonitorOrchestrator::new(sources, pipeline, fast_policy(5));

    orchestrator.start();
    tokio::time::sleep(Duration::from_millis(100)).await;
    orchestrator.stop().await;

    // Several ticks re-saw the same transaction; one alert
    assert_eq!(notifier.sent_count(), 1);
}
