//! UTXO chain client and normalizer
//!
//! No push API exists for this chain; the polling supervisor drives an
//! esplora-style REST client on a fixed cadence. Notional value is the sum
//! of a transaction's outputs; counterparties are the first resolvable
//! input and output addresses.

use anyhow::Context;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::MonitorError;
use crate::models::{CanonicalEvent, ChainSource, EventCategory, UNKNOWN_PARTY};

const SATS_PER_COIN: u64 = 100_000_000;

/// One transaction input, reduced to what normalization needs
#[derive(Debug, Clone)]
pub struct TxInput {
    pub address: Option<String>,
}

/// One transaction output
#[derive(Debug, Clone)]
pub struct TxOutput {
    pub address: Option<String>,
    /// Value in native units
    pub value: Decimal,
}

/// Simplified transaction as consumed by the normalizer
#[derive(Debug, Clone)]
pub struct UtxoTransaction {
    pub txid: String,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub block_time: Option<i64>,
}

/// Chain client contract used by the polling supervisor
#[async_trait::async_trait]
pub trait UtxoChainClient: Send + Sync {
    /// Current chain tip height
    async fn tip_height(&self) -> anyhow::Result<u64>;

    /// All transactions of the block at `height`
    async fn block_transactions(&self, height: u64) -> anyhow::Result<Vec<UtxoTransaction>>;
}

/// Sum all outputs for the notional; a transaction with no usable id is
/// dropped
pub fn normalize_transaction(tx: &UtxoTransaction) -> Option<CanonicalEvent> {
    if tx.txid.is_empty() {
        return None;
    }

    let notional: Decimal = tx.outputs.iter().map(|o| o.value).sum();
    if notional < Decimal::ZERO {
        return None;
    }

    let from_party = tx
        .inputs
        .iter()
        .find_map(|input| input.address.clone())
        .unwrap_or_else(|| UNKNOWN_PARTY.to_string());
    let to_party = tx
        .outputs
        .iter()
        .find_map(|output| output.address.clone())
        .unwrap_or_else(|| UNKNOWN_PARTY.to_string());

    Some(CanonicalEvent {
        source: ChainSource::UtxoChain,
        id: tx.txid.clone(),
        from_party,
        to_party,
        notional,
        observed_at: tx
            .block_time
            .unwrap_or_else(CanonicalEvent::ingestion_time),
        category: EventCategory::Spot,
        venue_meta: None,
    })
}

/// Esplora-style REST client
pub struct EsploraClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct EsploraTx {
    txid: String,
    #[serde(default)]
    vin: Vec<EsploraVin>,
    #[serde(default)]
    vout: Vec<EsploraVout>,
    status: EsploraStatus,
}

#[derive(Debug, Deserialize)]
struct EsploraVin {
    #[serde(default)]
    prevout: Option<EsploraPrevout>,
}

#[derive(Debug, Deserialize)]
struct EsploraPrevout {
    #[serde(default)]
    scriptpubkey_address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EsploraVout {
    #[serde(default)]
    scriptpubkey_address: Option<String>,
    /// Satoshis
    value: u64,
}

#[derive(Debug, Deserialize)]
struct EsploraStatus {
    #[serde(default)]
    block_time: Option<i64>,
}

impl EsploraClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn get_text(&self, path: &str) -> anyhow::Result<String> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Request failed: {url}"))?;

        if !response.status().is_success() {
            return Err(
                MonitorError::Rpc(format!("Chain API error: {} for {}", response.status(), url))
                    .into(),
            );
        }

        response.text().await.context("Failed to read response body")
    }

    fn sats_to_native(sats: u64) -> Decimal {
        Decimal::from(sats) / Decimal::from(SATS_PER_COIN)
    }
}

#[async_trait::async_trait]
impl UtxoChainClient for EsploraClient {
    async fn tip_height(&self) -> anyhow::Result<u64> {
        let body = self.get_text("/blocks/tip/height").await?;
        body.trim()
            .parse::<u64>()
            .map_err(|_| MonitorError::Parse(format!("Invalid tip height: {body}")).into())
    }

    async fn block_transactions(&self, height: u64) -> anyhow::Result<Vec<UtxoTransaction>> {
        let hash = self.get_text(&format!("/block-height/{height}")).await?;
        let hash = hash.trim();

        let body = self.get_text(&format!("/block/{hash}/txs")).await?;
        let txs: Vec<EsploraTx> =
            serde_json::from_str(&body).context("Invalid block transaction list")?;

        Ok(txs
            .into_iter()
            .map(|tx| UtxoTransaction {
                txid: tx.txid,
                inputs: tx
                    .vin
                    .into_iter()
                    .map(|vin| TxInput {
                        address: vin.prevout.and_then(|p| p.scriptpubkey_address),
                    })
                    .collect(),
                outputs: tx
                    .vout
                    .into_iter()
                    .map(|vout| TxOutput {
                        address: vout.scriptpubkey_address,
                        value: Self::sats_to_native(vout.value),
                    })
                    .collect(),
                block_time: tx.status.block_time,
            })
            .collect())
    }
}
