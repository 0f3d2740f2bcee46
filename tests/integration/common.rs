//! Shared test doubles for the integration suite

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rust_decimal::prelude::*;
use tokio::sync::mpsc;

use cerberus_monitor::alerts::{AlertDispatcher, ExplorerLinks, Notifier};
use cerberus_monitor::classify::Thresholds;
use cerberus_monitor::config::MonitorConfig;
use cerberus_monitor::dedup::DedupCache;
use cerberus_monitor::error::{MonitorError, MonitorResult};
use cerberus_monitor::pipeline::AlertPipeline;
use cerberus_monitor::sources::{
    AccountTxDetails, TxLookup, UtxoChainClient, UtxoTransaction, TxInput, TxOutput,
};
use cerberus_monitor::supervisor::{Connector, Transport};

/// Notifier that records every message it is asked to deliver
#[derive(Default)]
pub struct MockNotifier {
    sent: Mutex<Vec<(String, String)>>,
}

impl MockNotifier {
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }
}

#[async_trait::async_trait]
impl Notifier for MockNotifier {
    async fn send(&self, destination: &str, message: &str) -> anyhow::Result<bool> {
        self.sent
            .lock()
            .push((destination.to_string(), message.to_string()));
        Ok(true)
    }

    fn is_enabled(&self) -> bool {
        true
    }
}

/// Build a pipeline around a recording notifier
pub fn pipeline_with(config: &MonitorConfig, notifier: Arc<MockNotifier>) -> Arc<AlertPipeline> {
    let dispatcher = AlertDispatcher::new(
        notifier,
        "test-chat".to_string(),
        ExplorerLinks {
            account_chain: "https://explorer.example".to_string(),
            utxo_chain: "https://explorer.example".to_string(),
            perp_venue: "https://explorer.example".to_string(),
        },
    );
    Arc::new(AlertPipeline::new(
        Thresholds::from_config(config),
        Arc::new(DedupCache::new(config.dedup.capacity)),
        dispatcher,
    ))
}

/// Frames a scripted transport yields to its supervisor
pub enum Frame {
    Text(String),
    Error(String),
    /// Peer closes the connection
    Close,
}

/// Test-side handle feeding frames into a scripted transport
pub struct TransportScript {
    tx: mpsc::UnboundedSender<Frame>,
    sent: Arc<Mutex<Vec<String>>>,
}

impl TransportScript {
    pub fn text(&self, raw: &str) {
        let _ = self.tx.send(Frame::Text(raw.to_string()));
    }

    pub fn error(&self, reason: &str) {
        let _ = self.tx.send(Frame::Error(reason.to_string()));
    }

    pub fn close(&self) {
        let _ = self.tx.send(Frame::Close);
    }

    /// Everything the supervisor wrote to this transport
    pub fn outbound(&self) -> Vec<String> {
        self.sent.lock().clone()
    }
}

pub struct ScriptedTransport {
    frames: mpsc::UnboundedReceiver<Frame>,
    sent: Arc<Mutex<Vec<String>>>,
}

pub fn scripted_transport() -> (TransportScript, ScriptedTransport) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sent = Arc::new(Mutex::new(Vec::new()));
    (
        TransportScript {
            tx,
            sent: sent.clone(),
        },
        ScriptedTransport { frames: rx, sent },
    )
}

#[async_trait::async_trait]
impl Transport for ScriptedTransport {
    async fn send(&mut self, text: String) -> MonitorResult<()> {
        self.sent.lock().push(text);
        Ok(())
    }

    async fn next_message(&mut self) -> Option<MonitorResult<String>> {
        match self.frames.recv().await {
            Some(Frame::Text(text)) => Some(Ok(text)),
            Some(Frame::Error(reason)) => Some(Err(MonitorError::Transport(reason))),
            Some(Frame::Close) | None => None,
        }
    }

    async fn close(&mut self) {}
}

/// Hands out scripted transports per connect; connects fail once the
/// scripts run out
pub struct MockConnector {
    transports: Mutex<VecDeque<ScriptedTransport>>,
    attempts: AtomicU32,
}

impl MockConnector {
    pub fn new(transports: Vec<ScriptedTransport>) -> Self {
        Self {
            transports: Mutex::new(transports.into()),
            attempts: AtomicU32::new(0),
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Connector for MockConnector {
    async fn connect(&self) -> MonitorResult<Box<dyn Transport>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        match self.transports.lock().pop_front() {
            Some(transport) => Ok(Box::new(transport)),
            None => Err(MonitorError::Transport("connection refused".to_string())),
        }
    }
}

/// Canned transaction lookups for the account chain
pub struct MockLookup {
    txs: Mutex<HashMap<String, AccountTxDetails>>,
    delay: Duration,
}

impl MockLookup {
    pub fn new(txs: Vec<AccountTxDetails>) -> Self {
        Self::with_delay(txs, Duration::ZERO)
    }

    pub fn with_delay(txs: Vec<AccountTxDetails>, delay: Duration) -> Self {
        Self {
            txs: Mutex::new(txs.into_iter().map(|tx| (tx.hash.clone(), tx)).collect()),
            delay,
        }
    }
}

#[async_trait::async_trait]
impl TxLookup for MockLookup {
    async fn lookup(&self, tx_hash: &str) -> anyhow::Result<Option<AccountTxDetails>> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(self.txs.lock().get(tx_hash).cloned())
    }
}

/// A plain value transfer as the lookup would resolve it
pub fn transfer_details(hash: &str, value: f64) -> AccountTxDetails {
    AccountTxDetails {
        hash: hash.to_string(),
        from: Some("0xwhale".to_string()),
        to: Some("0xexchange".to_string()),
        value: Decimal::from_f64_retain(value).unwrap(),
        block_time: Some(1_700_000_000),
        logs: Vec::new(),
    }
}

/// A push frame carrying only the transaction hash
pub fn account_notification(hash: &str) -> String {
    format!(
        r#"{{"jsonrpc":"2.0","method":"eth_subscription","params":{{"subscription":"0xsub","result":"{hash}"}}}}"#
    )
}

/// Canned chain state for the polling supervisor
pub struct MockUtxoClient {
    tip: Mutex<u64>,
    blocks: Mutex<HashMap<u64, Vec<UtxoTransaction>>>,
    fail_next_tip: AtomicBool,
}

impl MockUtxoClient {
    pub fn new(tip: u64, blocks: Vec<(u64, Vec<UtxoTransaction>)>) -> Self {
        Self {
            tip: Mutex::new(tip),
            blocks: Mutex::new(blocks.into_iter().collect()),
            fail_next_tip: AtomicBool::new(false),
        }
    }

    pub fn fail_next_tip(&self) {
        self.fail_next_tip.store(true, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl UtxoChainClient for MockUtxoClient {
    async fn tip_height(&self) -> anyhow::Result<u64> {
        if self.fail_next_tip.swap(false, Ordering::SeqCst) {
            anyhow::bail!("chain API unreachable");
        }
        Ok(*self.tip.lock())
    }

    async fn block_transactions(&self, height: u64) -> anyhow::Result<Vec<UtxoTransaction>> {
        Ok(self
            .blocks
            .lock()
            .get(&height)
            .cloned()
            .unwrap_or_default())
    }
}

/// A single-output transfer of `value` native units
pub fn utxo_tx(txid: &str, value: i64) -> UtxoTransaction {
    UtxoTransaction {
        txid: txid.to_string(),
        inputs: vec![TxInput {
            address: Some("bc1qsender".to_string()),
        }],
        outputs: vec![TxOutput {
            address: Some("bc1qrecipient".to_string()),
            value: Decimal::from(value),
        }],
        block_time: Some(1_700_000_000),
    }
}

/// Let spawned pipeline work settle before asserting
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}
