//! Registry event watcher
//!
//! Each cycle scans `[watermark + 1, head]` (or a bounded lookback window on
//! first run) for the three registry event kinds, sends one notification per
//! event to its counterparty, then moves the watermark to `head`.
//!
//! Failures are contained at the smallest scope: a failed query skips that
//! kind, a failed URI lookup falls back to [`UNKNOWN_URI`], and a failed send
//! is logged and dropped. The watermark advances regardless, so delivery is
//! best-effort and a block range is never scanned twice.

use alloy::primitives::Address;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::events::{BlockRange, EventKind, RegistryEvent, UriSource, UNKNOWN_URI};
use super::state::{StateStore, WatcherState};
use crate::blockchain::Ledger;
use crate::messaging::Messenger;
use crate::types::RelayError;

/// What one cycle did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Scanned window; None for a no-op cycle
    pub range: Option<BlockRange>,
    pub events: usize,
    pub dispatched: usize,
    pub failed_dispatches: usize,
    pub placeholder_uris: usize,
    pub failed_queries: Vec<EventKind>,
}

/// Watcher context: collaborators plus the in-memory copy of the watermark
pub struct Watcher<L, M, S> {
    ledger: L,
    messenger: M,
    store: S,
    cold_start_lookback: u64,
    state: WatcherState,
}

impl<L, M, S> Watcher<L, M, S>
where
    L: Ledger,
    M: Messenger,
    S: StateStore,
{
    /// Load persisted state and build the watcher
    pub async fn new(
        ledger: L,
        messenger: M,
        store: S,
        cold_start_lookback: u64,
    ) -> Result<Self, RelayError> {
        let state = store.load().await?;

        if state.is_fresh() {
            info!(
                "No watcher state in {}, first cycle looks back {} blocks",
                store.describe(),
                cold_start_lookback
            );
        } else {
            info!("Resuming from {:?} ({})", state.last_processed_block, store.describe());
        }

        Ok(Self {
            ledger,
            messenger,
            store,
            cold_start_lookback,
            state,
        })
    }

    /// Poll forever: one cycle right away, then one per `period`.
    ///
    /// Cycles never overlap; a slow cycle delays the next tick instead of
    /// queueing extra ones.
    pub async fn run(mut self, period: Duration) {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            match self.run_cycle().await {
                Ok(_) => {}
                // Node hiccups are expected; local failures (state store) are not
                Err(e) if e.is_remote() => warn!("Watcher cycle skipped: {}", e),
                Err(e) => error!("Watcher cycle failed: {}", e),
            }
        }
    }

    /// One polling cycle. Errors only when the head or the state store is unusable.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, RelayError> {
        let head = self.ledger.head_height().await?;

        let Some(range) =
            BlockRange::next(self.state.last_processed_block, head, self.cold_start_lookback)
        else {
            debug!(
                "No new blocks (head {}, last processed {:?})",
                head, self.state.last_processed_block
            );
            return Ok(CycleReport::default());
        };

        info!("Scanning blocks {} ({} blocks)", range, range.len());

        let mut report = CycleReport {
            range: Some(range),
            ..Default::default()
        };

        for kind in EventKind::ALL {
            let events = match self.ledger.query_events(kind, range).await {
                Ok(events) => events,
                Err(e) => {
                    error!("Failed to query {} logs in {}: {}", kind, range, e);
                    report.failed_queries.push(kind);
                    continue;
                }
            };

            if !events.is_empty() {
                info!("{} {} event(s) in {}", events.len(), kind, range);
            }

            for event in events {
                report.events += 1;
                self.handle_event(&event, &mut report).await;
            }
        }

        let next = WatcherState::at(head);
        self.store.save(&next).await?;
        self.state = next;

        info!(
            "Cycle {:?} done: {} event(s), {} sent, {} failed, {} placeholder URI(s), failed queries {:?}",
            report.range,
            report.events,
            report.dispatched,
            report.failed_dispatches,
            report.placeholder_uris,
            report.failed_queries
        );

        Ok(report)
    }

    async fn handle_event(&self, event: &RegistryEvent, report: &mut CycleReport) {
        let uri = match self.resolve_uri(event).await {
            Ok(uri) if !uri.is_empty() => uri,
            Ok(_) => {
                report.placeholder_uris += 1;
                UNKNOWN_URI.to_string()
            }
            Err(e) => {
                warn!("Passport lookup failed for {}: {}", event.kind(), e);
                report.placeholder_uris += 1;
                UNKNOWN_URI.to_string()
            }
        };

        let recipient = event.recipient();
        let text = event.render(&uri);

        match self.dispatch(recipient, &text).await {
            Ok(()) => {
                info!("Notified {} of {}", recipient, event.kind());
                report.dispatched += 1;
            }
            Err(e) => {
                error!("Failed to notify {} of {}: {}", recipient, event.kind(), e);
                report.failed_dispatches += 1;
            }
        }
    }

    async fn resolve_uri(&self, event: &RegistryEvent) -> Result<String, RelayError> {
        match event.uri_source() {
            UriSource::Inline(uri) => Ok(uri.to_string()),
            UriSource::ById(agent_id) => self.ledger.agent_uri_by_id(agent_id).await,
            UriSource::ByAddress(agent) => self.ledger.agent_uri_by_address(agent).await,
        }
    }

    async fn dispatch(&self, recipient: Address, text: &str) -> Result<(), RelayError> {
        let channel = self.messenger.open_direct_channel(recipient).await?;
        self.messenger.send_text(&channel, text).await
    }
}
