//! Canonical event model - the one shape every source normalizes into

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Counterparty placeholder when an address cannot be resolved
pub const UNKNOWN_PARTY: &str = "Unknown";

/// Monitored data sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainSource {
    /// Account-oriented chain with push subscriptions
    AccountChain,
    /// UTXO chain, polled (no push API)
    UtxoChain,
    /// Perpetuals venue trade/fill/liquidation feed
    PerpVenue,
}

impl ChainSource {
    /// Ticker of the unit notional values are denominated in
    pub fn native_unit(&self) -> &'static str {
        match self {
            ChainSource::AccountChain => "ETH",
            ChainSource::UtxoChain => "BTC",
            ChainSource::PerpVenue => "USD",
        }
    }
}

impl std::fmt::Display for ChainSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChainSource::AccountChain => write!(f, "account-chain"),
            ChainSource::UtxoChain => write!(f, "utxo-chain"),
            ChainSource::PerpVenue => write!(f, "perp-venue"),
        }
    }
}

/// Event category, set by the normalizer and never inferred later
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventCategory {
    /// Plain value transfer between two addresses/accounts
    Spot,
    /// Interaction with a known protocol that opens or closes a position
    Contract,
    /// Forced closure of a leveraged position by the venue
    Liquidation,
}

impl std::fmt::Display for EventCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventCategory::Spot => write!(f, "SPOT"),
            EventCategory::Contract => write!(f, "CONTRACT"),
            EventCategory::Liquidation => write!(f, "LIQUIDATION"),
        }
    }
}

/// Position direction for contract/liquidation events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionSide {
    Open,
    Close,
}

impl std::fmt::Display for PositionSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PositionSide::Open => write!(f, "OPEN"),
            PositionSide::Close => write!(f, "CLOSE"),
        }
    }
}

/// Venue metadata, present on Contract and Liquidation events only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenueMeta {
    /// Instrument symbol or protocol label
    pub symbol: String,
    pub side: PositionSide,
    pub size_units: Decimal,
    /// Execution price, when the feed reports one
    pub price: Option<Decimal>,
}

/// One normalized observation of on-chain or venue activity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalEvent {
    pub source: ChainSource,
    /// Source-unique id: tx signature/hash, or synthesized when the feed
    /// carries no stable id
    pub id: String,
    pub from_party: String,
    pub to_party: String,
    /// Value in the source's native unit (USD for the perp venue),
    /// always >= 0
    pub notional: Decimal,
    /// Unix seconds; block time when available, else ingestion time
    pub observed_at: i64,
    pub category: EventCategory,
    pub venue_meta: Option<VenueMeta>,
}

impl CanonicalEvent {
    /// Current wall clock in unix seconds, for events without a block time
    pub fn ingestion_time() -> i64 {
        Utc::now().timestamp()
    }
}
