//! Per-source wire models and normalizers
//!
//! Each source speaks its own wire format; every shape normalizes into
//! [`CanonicalEvent`](crate::models::CanonicalEvent) and feeds the shared
//! alert pipeline. A malformed message is logged and dropped - it never
//! reaches the supervisor.

pub mod account_chain;
pub mod perp_venue;
pub mod utxo_chain;

pub use account_chain::{AccountChainAdapter, AccountTxDetails, HttpTxLookup, LogEntry, TxLookup};
pub use perp_venue::PerpVenueAdapter;
pub use utxo_chain::{EsploraClient, TxInput, TxOutput, UtxoChainClient, UtxoTransaction};

use tokio_util::sync::CancellationToken;

use crate::models::ChainSource;

/// A push-based source feeding a connection supervisor
#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    fn source(&self) -> ChainSource;

    /// Subscription frames to send once the transport is up
    fn subscriptions(&self) -> Vec<String>;

    /// Handle one raw inbound frame. Parse failures are logged and
    /// dropped. `cancel` guards deferred work: results produced after
    /// cancellation are discarded, not alerted.
    async fn handle_message(&self, raw: &str, cancel: &CancellationToken);
}
