//! Alert formatting and dispatch
//!
//! Builds a category-specific human-readable message for each alerted
//! event and hands it to the configured notifier. Delivery is best-effort:
//! a failed send is logged and dropped, never retried, and never surfaced
//! back to ingestion.

pub mod telegram;

pub use telegram::TelegramNotifier;

use std::sync::Arc;

use crate::models::{CanonicalEvent, ChainSource, EventCategory, PositionSide};

/// Delivery channel contract
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `message` to `destination`. `Ok(false)` means the channel
    /// accepted the call but refused delivery.
    async fn send(&self, destination: &str, message: &str) -> anyhow::Result<bool>;

    fn is_enabled(&self) -> bool;
}

/// Per-source block-explorer link bases
#[derive(Debug, Clone)]
pub struct ExplorerLinks {
    pub account_chain: String,
    pub utxo_chain: String,
    pub perp_venue: String,
}

impl ExplorerLinks {
    fn link(&self, event: &CanonicalEvent) -> String {
        match event.source {
            ChainSource::AccountChain => format!("{}/tx/{}", self.account_chain, event.id),
            ChainSource::UtxoChain => format!("{}/tx/{}", self.utxo_chain, event.id),
            // The venue has no per-event pages
            ChainSource::PerpVenue => self.perp_venue.clone(),
        }
    }
}

/// Formats classified events and hands them to the notifier
pub struct AlertDispatcher {
    notifier: Arc<dyn Notifier>,
    destination: String,
    explorers: ExplorerLinks,
}

impl AlertDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>, destination: String, explorers: ExplorerLinks) -> Self {
        Self {
            notifier,
            destination,
            explorers,
        }
    }

    /// Format and send one alert. Never propagates failure to the caller.
    pub async fn dispatch(&self, event: &CanonicalEvent) {
        let message = format_alert(event, &self.explorers);

        match self.notifier.send(&self.destination, &message).await {
            Ok(true) => {
                tracing::debug!(source = %event.source, id = %event.id, "Alert delivered");
            }
            Ok(false) => {
                tracing::warn!(source = %event.source, id = %event.id, "Notifier refused alert");
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    source = %event.source,
                    id = %event.id,
                    "Failed to deliver alert"
                );
            }
        }
    }
}

/// Category-specific message templates
pub fn format_alert(event: &CanonicalEvent, explorers: &ExplorerLinks) -> String {
    match event.category {
        EventCategory::Spot => format_spot(event, explorers),
        EventCategory::Contract => format_contract(event, explorers),
        EventCategory::Liquidation => format_liquidation(event, explorers),
    }
}

fn format_spot(event: &CanonicalEvent, explorers: &ExplorerLinks) -> String {
    format!(
        "🐋 Large transfer: {} {}\n{} → {}\n{}",
        event.notional,
        event.source.native_unit(),
        event.from_party,
        event.to_party,
        explorers.link(event),
    )
}

fn format_contract(event: &CanonicalEvent, explorers: &ExplorerLinks) -> String {
    let Some(meta) = &event.venue_meta else {
        return format!(
            "📊 Position activity: {} {}\n{}",
            event.notional,
            event.source.native_unit(),
            explorers.link(event),
        );
    };

    let (emoji, verb) = match meta.side {
        PositionSide::Open => ("📈", "opened"),
        PositionSide::Close => ("📉", "closed"),
    };
    let price = meta
        .price
        .map(|p| p.to_string())
        .unwrap_or_else(|| "market".to_string());

    format!(
        "{} {} position {}: {} units @ {} ({} {})\n{}",
        emoji,
        meta.symbol,
        verb,
        meta.size_units,
        price,
        event.notional,
        event.source.native_unit(),
        explorers.link(event),
    )
}

fn format_liquidation(event: &CanonicalEvent, explorers: &ExplorerLinks) -> String {
    let Some(meta) = &event.venue_meta else {
        return format!(
            "💥 Liquidation: {} {}\n{}",
            event.notional,
            event.source.native_unit(),
            explorers.link(event),
        );
    };

    let price = meta
        .price
        .map(|p| p.to_string())
        .unwrap_or_else(|| "market".to_string());

    format!(
        "💥 Liquidation: {} {} @ {} ({} {} notional)\n{}",
        meta.size_units,
        meta.symbol,
        price,
        event.notional,
        event.source.native_unit(),
        explorers.link(event),
    )
}
