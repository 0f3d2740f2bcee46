//! Perpetuals venue adapter
//!
//! The feed carries three shapes - trades, fills, and liquidations - all
//! denominated in USD. Every shape maps directly to one canonical event;
//! no lookup round-trip is needed.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::models::{
    CanonicalEvent, ChainSource, EventCategory, PositionSide, VenueMeta, UNKNOWN_PARTY,
};
use crate::pipeline::AlertPipeline;
use crate::sources::SourceAdapter;

/// One feed frame; the venue tags every message with its channel
#[derive(Debug, Deserialize)]
#[serde(tag = "channel", content = "data", rename_all = "camelCase")]
enum PerpVenueFrame {
    SubscriptionResponse(serde_json::Value),
    Trades(Vec<TradeMsg>),
    Fills(Vec<FillMsg>),
    Liquidations(Vec<LiquidationMsg>),
}

#[derive(Debug, Deserialize)]
struct TradeMsg {
    coin: String,
    px: Decimal,
    sz: Decimal,
    /// Milliseconds
    time: i64,
    #[serde(default)]
    tid: Option<u64>,
    /// [buyer, seller] when the venue discloses them
    #[serde(default)]
    users: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FillMsg {
    coin: String,
    px: Decimal,
    sz: Decimal,
    time: i64,
    #[serde(default)]
    hash: Option<String>,
    /// Present only when the fill closes a position
    #[serde(default)]
    closed_pnl: Option<Decimal>,
    #[serde(default)]
    user: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LiquidationMsg {
    coin: String,
    px: Decimal,
    sz: Decimal,
    time: i64,
    #[serde(default)]
    user: Option<String>,
}

/// `venue-symbol-time` id for shapes the feed gives no stable id
fn synthesized_id(coin: &str, time_ms: i64) -> String {
    format!("perp-{coin}-{time_ms}")
}

fn millis_to_secs(time_ms: i64) -> i64 {
    time_ms / 1000
}

impl TradeMsg {
    fn into_event(self) -> CanonicalEvent {
        let (to_party, from_party) = match self.users.as_deref() {
            Some([buyer, seller, ..]) => (buyer.clone(), seller.clone()),
            _ => (UNKNOWN_PARTY.to_string(), UNKNOWN_PARTY.to_string()),
        };

        CanonicalEvent {
            source: ChainSource::PerpVenue,
            id: self
                .tid
                .map(|tid| tid.to_string())
                .unwrap_or_else(|| synthesized_id(&self.coin, self.time)),
            from_party,
            to_party,
            notional: (self.px * self.sz).abs(),
            observed_at: millis_to_secs(self.time),
            category: EventCategory::Spot,
            venue_meta: None,
        }
    }
}

impl FillMsg {
    fn into_event(self) -> CanonicalEvent {
        let side = if self.closed_pnl.is_some() {
            PositionSide::Close
        } else {
            PositionSide::Open
        };

        CanonicalEvent {
            source: ChainSource::PerpVenue,
            id: self
                .hash
                .unwrap_or_else(|| synthesized_id(&self.coin, self.time)),
            from_party: self.user.unwrap_or_else(|| UNKNOWN_PARTY.to_string()),
            to_party: UNKNOWN_PARTY.to_string(),
            notional: (self.px * self.sz).abs(),
            observed_at: millis_to_secs(self.time),
            category: EventCategory::Contract,
            venue_meta: Some(VenueMeta {
                symbol: self.coin,
                side,
                size_units: self.sz,
                price: Some(self.px),
            }),
        }
    }
}

impl LiquidationMsg {
    fn into_event(self) -> CanonicalEvent {
        CanonicalEvent {
            source: ChainSource::PerpVenue,
            id: synthesized_id(&self.coin, self.time),
            from_party: self.user.unwrap_or_else(|| UNKNOWN_PARTY.to_string()),
            to_party: UNKNOWN_PARTY.to_string(),
            notional: (self.px * self.sz).abs(),
            observed_at: millis_to_secs(self.time),
            category: EventCategory::Liquidation,
            venue_meta: Some(VenueMeta {
                symbol: self.coin,
                side: PositionSide::Close,
                size_units: self.sz,
                price: Some(self.px),
            }),
        }
    }
}

/// Perpetuals venue source adapter
pub struct PerpVenueAdapter {
    pipeline: Arc<AlertPipeline>,
    symbols: Vec<String>,
}

impl PerpVenueAdapter {
    pub fn new(pipeline: Arc<AlertPipeline>, symbols: Vec<String>) -> Self {
        Self { pipeline, symbols }
    }
}

#[async_trait::async_trait]
impl SourceAdapter for PerpVenueAdapter {
    fn source(&self) -> ChainSource {
        ChainSource::PerpVenue
    }

    fn subscriptions(&self) -> Vec<String> {
        self.symbols
            .iter()
            .flat_map(|symbol| {
                ["trades", "fills", "liquidations"].into_iter().map(move |kind| {
                    json!({
                        "method": "subscribe",
                        "subscription": { "type": kind, "coin": symbol },
                    })
                    .to_string()
                })
            })
            .collect()
    }

    async fn handle_message(&self, raw: &str, _cancel: &CancellationToken) {
        let frame: PerpVenueFrame = match serde_json::from_str(raw) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "Dropping unparseable venue frame");
                return;
            }
        };

        // Batches stay in arrival order; events are processed sequentially
        match frame {
            PerpVenueFrame::SubscriptionResponse(ack) => {
                tracing::debug!(ack = %ack, "Subscription confirmed");
            }
            PerpVenueFrame::Trades(trades) => {
                for trade in trades {
                    self.pipeline.process(trade.into_event()).await;
                }
            }
            PerpVenueFrame::Fills(fills) => {
                for fill in fills {
                    self.pipeline.process(fill.into_event()).await;
                }
            }
            PerpVenueFrame::Liquidations(liquidations) => {
                for liquidation in liquidations {
                    self.pipeline.process(liquidation.into_event()).await;
                }
            }
        }
    }
}
