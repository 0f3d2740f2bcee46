//! Threshold-based event classification
//!
//! Pure decision: given one event and the configured thresholds, alert or
//! ignore. Spot events compare in native units; contract and liquidation
//! events compare an estimated USD notional against the contract threshold.

use rust_decimal::prelude::*;

use crate::config::MonitorConfig;
use crate::models::{CanonicalEvent, ChainSource, EventCategory};

/// Classification outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Ignore,
    Alert,
}

/// Per-source alert thresholds, read-only after configuration load
#[derive(Debug, Clone)]
pub struct Thresholds {
    account_spot: Decimal,
    account_contract_usd: Decimal,
    account_reference_price_usd: Decimal,
    perp_spot_usd: Decimal,
    perp_contract_usd: Decimal,
    utxo_spot: Decimal,
}

impl Thresholds {
    pub fn from_config(config: &MonitorConfig) -> Self {
        Self {
            account_spot: decimal(config.account_chain.spot_threshold_native),
            account_contract_usd: decimal(config.account_chain.contract_threshold_usd),
            account_reference_price_usd: decimal(config.account_chain.reference_price_usd),
            perp_spot_usd: decimal(config.perp_venue.spot_threshold_usd),
            perp_contract_usd: decimal(config.perp_venue.contract_threshold_usd),
            utxo_spot: decimal(config.utxo_chain.spot_threshold_native),
        }
    }

    /// Spot threshold in the source's native unit
    pub fn spot_threshold(&self, source: ChainSource) -> Decimal {
        match source {
            ChainSource::AccountChain => self.account_spot,
            ChainSource::UtxoChain => self.utxo_spot,
            ChainSource::PerpVenue => self.perp_spot_usd,
        }
    }

    /// Contract/liquidation threshold in USD
    pub fn contract_threshold_usd(&self, source: ChainSource) -> Decimal {
        match source {
            ChainSource::AccountChain => self.account_contract_usd,
            ChainSource::PerpVenue => self.perp_contract_usd,
            // The UTXO feed never yields contract events; an unreachable
            // threshold keeps the match total
            ChainSource::UtxoChain => Decimal::MAX,
        }
    }

    /// Estimated USD value of an event's notional. The perp venue already
    /// reports USD; the account chain converts through a configured
    /// reference price rather than a live quote.
    pub fn estimated_usd(&self, event: &CanonicalEvent) -> Decimal {
        match event.source {
            ChainSource::PerpVenue => event.notional,
            ChainSource::AccountChain => event.notional * self.account_reference_price_usd,
            ChainSource::UtxoChain => Decimal::ZERO,
        }
    }
}

fn decimal(value: f64) -> Decimal {
    Decimal::from_f64_retain(value).unwrap_or(Decimal::ZERO)
}

/// Decide whether an event clears its source's threshold. Boundary values
/// alert (inclusive compare).
pub fn classify(event: &CanonicalEvent, thresholds: &Thresholds) -> Verdict {
    let clears = match event.category {
        EventCategory::Spot => event.notional >= thresholds.spot_threshold(event.source),
        EventCategory::Contract | EventCategory::Liquidation => {
            thresholds.estimated_usd(event) >= thresholds.contract_threshold_usd(event.source)
        }
    };

    if clears {
        Verdict::Alert
    } else {
        Verdict::Ignore
    }
}
