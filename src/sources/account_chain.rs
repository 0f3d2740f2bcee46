//! Account-chain adapter
//!
//! The push feed only carries transaction hashes; full details (value,
//! parties, event logs) come from a follow-up JSON-RPC lookup. Lookups run
//! on their own tasks so the subscription read loop is never stalled, and
//! their results are discarded if the monitor stops while they are in
//! flight.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;
use rust_decimal::prelude::*;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::config::DefiProgramConfig;
use crate::error::MonitorError;
use crate::models::{
    CanonicalEvent, ChainSource, EventCategory, PositionSide, VenueMeta, UNKNOWN_PARTY,
};
use crate::pipeline::AlertPipeline;
use crate::sources::SourceAdapter;

/// Log topics that open a position (keccak of the event signature)
const OPEN_POSITION_TOPICS: [&str; 2] = [
    // IncreasePosition(bytes32,address,address,address,uint256,uint256,bool,uint256,uint256)
    "0x2fe68525253654c21998f35787a8d0f361905ef647c854092430ab65f2f15022",
    // Borrow(address,address,address,uint256,uint8,uint256,uint16)
    "0xb3d084820fb1a9decffb176436bd02558d15fac9b0ddfed8c465bc7359d7dce0",
];

/// Log topics that close a position
const CLOSE_POSITION_TOPICS: [&str; 2] = [
    // DecreasePosition(bytes32,address,address,address,uint256,uint256,bool,uint256,uint256)
    "0x93d75d64d1f84fc6f430a64fc578bdd4c1e090e90ea2d51773e626d19de56d30",
    // Repay(address,address,address,uint256,bool)
    "0xa534c8dbe71f871f9f3530e97a74601fea17b426cae02e1c5aee42c96c784051",
];

const WEI_PER_ETH: u64 = 1_000_000_000_000_000_000;

/// Push frames seen on the subscription socket
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AccountChainFrame {
    SubscriptionAck {
        id: u64,
        result: String,
    },
    Notification {
        method: String,
        params: SubscriptionParams,
    },
}

#[derive(Debug, Deserialize)]
struct SubscriptionParams {
    subscription: String,
    /// Transaction hash; details require a lookup round-trip
    result: String,
}

/// One log record from the transaction receipt
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub address: String,
    pub topics: Vec<String>,
}

/// Resolved transaction details from the follow-up lookup
#[derive(Debug, Clone)]
pub struct AccountTxDetails {
    pub hash: String,
    pub from: Option<String>,
    pub to: Option<String>,
    /// Value in native units
    pub value: Decimal,
    pub block_time: Option<i64>,
    pub logs: Vec<LogEntry>,
}

/// Follow-up lookup contract; the push notification alone cannot produce
/// an event
#[async_trait::async_trait]
pub trait TxLookup: Send + Sync {
    /// Fetch full details for a pushed transaction hash. `None` when the
    /// node does not know the hash (yet).
    async fn lookup(&self, tx_hash: &str) -> anyhow::Result<Option<AccountTxDetails>>;
}

/// JSON-RPC lookup client
pub struct HttpTxLookup {
    client: reqwest::Client,
    rpc_url: String,
}

impl HttpTxLookup {
    pub fn new(rpc_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            rpc_url: rpc_url.to_string(),
        }
    }

    async fn call(&self, method: &str, params: Value) -> anyhow::Result<Value> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self
            .client
            .post(&self.rpc_url)
            .json(&payload)
            .send()
            .await
            .context("RPC request failed")?;

        let body: Value = response.json().await.context("Invalid RPC response")?;
        if let Some(error) = body.get("error") {
            return Err(MonitorError::Rpc(format!("{method} failed: {error}")).into());
        }

        Ok(body.get("result").cloned().unwrap_or(Value::Null))
    }

    /// Timestamp of the block a mined transaction landed in
    async fn block_time(&self, block_number: &str) -> Option<i64> {
        let block = self
            .call("eth_getBlockByNumber", json!([block_number, false]))
            .await
            .ok()?;
        let timestamp = block.get("timestamp")?.as_str()?;
        parse_hex_u128(timestamp).map(|t| t as i64)
    }
}

#[async_trait::async_trait]
impl TxLookup for HttpTxLookup {
    async fn lookup(&self, tx_hash: &str) -> anyhow::Result<Option<AccountTxDetails>> {
        let tx = self.call("eth_getTransactionByHash", json!([tx_hash])).await?;
        if tx.is_null() {
            return Ok(None);
        }

        let value = tx
            .get("value")
            .and_then(|v| v.as_str())
            .and_then(parse_hex_u128)
            .map(wei_to_native)
            .unwrap_or(Decimal::ZERO);

        let from = tx.get("from").and_then(|v| v.as_str()).map(str::to_string);
        let to = tx.get("to").and_then(|v| v.as_str()).map(str::to_string);

        // Pending transactions have no receipt or block yet; both lookups
        // are allowed to come back empty
        let receipt = self
            .call("eth_getTransactionReceipt", json!([tx_hash]))
            .await
            .unwrap_or(Value::Null);
        let logs = parse_receipt_logs(&receipt);

        let block_time = match tx.get("blockNumber").and_then(|v| v.as_str()) {
            Some(block_number) => self.block_time(block_number).await,
            None => None,
        };

        Ok(Some(AccountTxDetails {
            hash: tx_hash.to_string(),
            from,
            to,
            value,
            block_time,
            logs,
        }))
    }
}

fn parse_receipt_logs(receipt: &Value) -> Vec<LogEntry> {
    let Some(raw_logs) = receipt.get("logs").and_then(|l| l.as_array()) else {
        return Vec::new();
    };

    raw_logs
        .iter()
        .filter_map(|log| {
            let address = log.get("address")?.as_str()?.to_string();
            let topics = log
                .get("topics")?
                .as_array()?
                .iter()
                .filter_map(|t| t.as_str().map(str::to_string))
                .collect();
            Some(LogEntry { address, topics })
        })
        .collect()
}

fn parse_hex_u128(hex: &str) -> Option<u128> {
    u128::from_str_radix(hex.trim_start_matches("0x"), 16).ok()
}

fn wei_to_native(wei: u128) -> Decimal {
    Decimal::from_u128(wei).unwrap_or(Decimal::ZERO) / Decimal::from(WEI_PER_ETH)
}

/// Position direction from the receipt's log topics; `None` when no known
/// signature matched
fn position_side(logs: &[LogEntry]) -> Option<PositionSide> {
    for log in logs {
        let Some(first_topic) = log.topics.first() else {
            continue;
        };
        if OPEN_POSITION_TOPICS.contains(&first_topic.as_str()) {
            return Some(PositionSide::Open);
        }
        if CLOSE_POSITION_TOPICS.contains(&first_topic.as_str()) {
            return Some(PositionSide::Close);
        }
    }
    None
}

/// Account-chain source adapter
pub struct AccountChainAdapter {
    lookup: Arc<dyn TxLookup>,
    pipeline: Arc<AlertPipeline>,
    /// Lowercased protocol address -> label
    programs: HashMap<String, String>,
}

impl AccountChainAdapter {
    pub fn new(
        lookup: Arc<dyn TxLookup>,
        pipeline: Arc<AlertPipeline>,
        programs: &[DefiProgramConfig],
    ) -> Self {
        Self {
            lookup,
            pipeline,
            programs: programs
                .iter()
                .map(|p| (p.address.to_lowercase(), p.label.clone()))
                .collect(),
        }
    }

    /// Build the canonical event for one resolved transaction. Returns
    /// `None` for contract calls whose log signatures are all unknown.
    fn normalize(
        details: AccountTxDetails,
        programs: &HashMap<String, String>,
    ) -> Option<CanonicalEvent> {
        let from_party = details.from.unwrap_or_else(|| UNKNOWN_PARTY.to_string());
        let to_party = details.to.unwrap_or_else(|| UNKNOWN_PARTY.to_string());
        let observed_at = details
            .block_time
            .unwrap_or_else(CanonicalEvent::ingestion_time);

        if let Some(label) = programs.get(&to_party.to_lowercase()) {
            // Direction comes from the log topics; unrecognized contract
            // calls are dropped rather than misreported as transfers
            let side = position_side(&details.logs)?;

            return Some(CanonicalEvent {
                source: ChainSource::AccountChain,
                id: details.hash,
                from_party,
                to_party,
                notional: details.value,
                observed_at,
                category: EventCategory::Contract,
                venue_meta: Some(VenueMeta {
                    symbol: label.clone(),
                    side,
                    size_units: details.value,
                    price: None,
                }),
            });
        }

        Some(CanonicalEvent {
            source: ChainSource::AccountChain,
            id: details.hash,
            from_party,
            to_party,
            notional: details.value,
            observed_at,
            category: EventCategory::Spot,
            venue_meta: None,
        })
    }
}

#[async_trait::async_trait]
impl SourceAdapter for AccountChainAdapter {
    fn source(&self) -> ChainSource {
        ChainSource::AccountChain
    }

    fn subscriptions(&self) -> Vec<String> {
        vec![json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_subscribe",
            "params": ["newPendingTransactions"],
        })
        .to_string()]
    }

    async fn handle_message(&self, raw: &str, cancel: &CancellationToken) {
        let frame: AccountChainFrame = match serde_json::from_str(raw) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "Dropping unparseable account-chain frame");
                return;
            }
        };

        let tx_hash = match frame {
            AccountChainFrame::SubscriptionAck { id, result } => {
                tracing::debug!(request_id = id, subscription = %result, "Subscription confirmed");
                return;
            }
            AccountChainFrame::Notification { method, params } => {
                if method != "eth_subscription" {
                    tracing::debug!(%method, "Ignoring unexpected frame");
                    return;
                }
                tracing::trace!(
                    subscription = %params.subscription,
                    hash = %params.result,
                    "Transaction pushed"
                );
                params.result
            }
        };

        // The lookup round-trip must not stall the read loop; resolve it on
        // its own task and drop the result if the monitor stopped meanwhile
        let lookup = self.lookup.clone();
        let pipeline = self.pipeline.clone();
        let programs = self.programs.clone();
        let cancel = cancel.clone();

        tokio::spawn(async move {
            let details = match lookup.lookup(&tx_hash).await {
                Ok(Some(details)) => details,
                Ok(None) => {
                    tracing::trace!(hash = %tx_hash, "Transaction not found, dropping");
                    return;
                }
                Err(e) => {
                    tracing::warn!(error = %e, hash = %tx_hash, "Transaction lookup failed, dropping");
                    return;
                }
            };

            if cancel.is_cancelled() {
                return;
            }

            if let Some(event) = Self::normalize(details, &programs) {
                pipeline.process(event).await;
            }
        });
    }
}
