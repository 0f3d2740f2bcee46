//! The shared alert funnel every source feeds
//!
//! classify -> dedup -> dispatch. Ownership of the dedup cache and the
//! threshold table sits with the orchestrator; normalizers only hold a
//! reference to this pipeline.

use std::sync::Arc;

use crate::alerts::AlertDispatcher;
use crate::classify::{classify, Thresholds, Verdict};
use crate::dedup::DedupCache;
use crate::models::CanonicalEvent;

pub struct AlertPipeline {
    thresholds: Thresholds,
    dedup: Arc<DedupCache>,
    dispatcher: AlertDispatcher,
}

impl AlertPipeline {
    pub fn new(thresholds: Thresholds, dedup: Arc<DedupCache>, dispatcher: AlertDispatcher) -> Self {
        Self {
            thresholds,
            dedup,
            dispatcher,
        }
    }

    /// Run one normalized event through the funnel
    pub async fn process(&self, event: CanonicalEvent) {
        if classify(&event, &self.thresholds) == Verdict::Ignore {
            tracing::trace!(
                source = %event.source,
                id = %event.id,
                notional = %event.notional,
                "Below threshold, ignoring"
            );
            return;
        }

        if !self.dedup.should_alert(event.source, &event.id).await {
            tracing::debug!(
                source = %event.source,
                id = %event.id,
                "Duplicate event, suppressing alert"
            );
            return;
        }

        tracing::info!(
            source = %event.source,
            id = %event.id,
            category = %event.category,
            notional = %event.notional,
            "Dispatching alert"
        );
        self.dispatcher.dispatch(&event).await;
    }
}
