//! Collects every trade of a set of wallets from the ledger.

use crate::domain::{
    Address, BlockRange, EventFilter, EventKind, NormalizedTrade, RawTradeEvent,
};
use crate::engine::{FetchError, RangedFetcher};
use crate::ledger::{Ledger, LedgerError};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum CollectError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

/// Summary of one collection job.
#[derive(Debug)]
pub struct CollectionResult {
    pub trades: Vec<NormalizedTrade>,
    /// Chain head captured at job start; every wallet was scanned up to it.
    pub latest_block: u64,
    pub events_fetched: usize,
    pub events_skipped: usize,
}

#[derive(Clone)]
pub struct WalletEventCollector {
    ledger: Arc<dyn Ledger>,
    fetcher: RangedFetcher,
    kind: EventKind,
    start_block: u64,
    wallet_concurrency: usize,
}

struct WalletTrades {
    trades: Vec<NormalizedTrade>,
    fetched: usize,
    skipped: usize,
}

type TimestampCache = Mutex<HashMap<u64, DateTime<Utc>>>;

impl WalletEventCollector {
    pub fn new(ledger: Arc<dyn Ledger>, fetcher: RangedFetcher) -> Self {
        Self {
            ledger,
            fetcher,
            kind: EventKind::PunkBought,
            start_block: 0,
            wallet_concurrency: 1,
        }
    }

    /// First block scanned for every wallet.
    pub fn with_start_block(mut self, start_block: u64) -> Self {
        self.start_block = start_block;
        self
    }

    /// How many wallets are scanned at once. Output order is unaffected.
    pub fn with_wallet_concurrency(mut self, wallet_concurrency: usize) -> Self {
        self.wallet_concurrency = wallet_concurrency.max(1);
        self
    }

    /// Fetch and normalize the trades of every wallet, in wallet order.
    ///
    /// The chain head is read once, so all wallets are scanned against the
    /// same snapshot. On cancellation nothing is returned.
    pub async fn collect(
        &self,
        wallets: &[Address],
        cancel: &CancellationToken,
    ) -> Result<CollectionResult, CollectError> {
        let latest_block = self.ledger.latest_block().await?;
        let range = BlockRange::new(self.start_block, latest_block);
        info!(
            "Scanning {} wallet(s) over blocks {}",
            wallets.len(),
            range
        );

        let cache: TimestampCache = Mutex::new(HashMap::new());
        let per_wallet: Vec<WalletTrades> = stream::iter(wallets)
            .map(|wallet| self.collect_wallet(wallet, range, &cache, cancel))
            .buffered(self.wallet_concurrency)
            .try_collect()
            .await?;
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled {
                cursor: latest_block,
            }
            .into());
        }

        let mut result = CollectionResult {
            trades: Vec::new(),
            latest_block,
            events_fetched: 0,
            events_skipped: 0,
        };
        for wallet in per_wallet {
            result.events_fetched += wallet.fetched;
            result.events_skipped += wallet.skipped;
            result.trades.extend(wallet.trades);
        }

        info!(
            "Collected {} trade(s) from {} event(s), {} skipped",
            result.trades.len(),
            result.events_fetched,
            result.events_skipped
        );
        Ok(result)
    }

    async fn collect_wallet(
        &self,
        wallet: &Address,
        range: BlockRange,
        cache: &TimestampCache,
        cancel: &CancellationToken,
    ) -> Result<WalletTrades, CollectError> {
        info!("Fetching events for Wallet Address {}...", wallet);

        let mut events: Vec<RawTradeEvent> = Vec::new();
        for filter in EventFilter::both_roles(wallet) {
            let batch = self
                .fetcher
                .fetch_all(self.ledger.as_ref(), self.kind, &filter, range, cancel)
                .await?;
            events.extend(batch);
        }
        let fetched = events.len();
        let events = dedup_events(events);

        let mut trades = Vec::with_capacity(events.len());
        let mut skipped = 0;
        for event in &events {
            let cancelled = FetchError::Cancelled {
                cursor: event.block_number,
            };
            if cancel.is_cancelled() {
                return Err(cancelled.into());
            }
            let timestamp = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(cancelled.into()),
                ts = self.block_timestamp(event.block_number, cache) => ts?,
            };
            match NormalizedTrade::from_raw(event, wallet, self.kind, timestamp) {
                Ok(trade) => trades.push(trade),
                Err(e) => {
                    warn!("Error processing event for Wallet {}: {}", wallet, e);
                    skipped += 1;
                }
            }
        }

        Ok(WalletTrades {
            trades,
            fetched,
            skipped,
        })
    }

    async fn block_timestamp(
        &self,
        block_number: u64,
        cache: &TimestampCache,
    ) -> Result<DateTime<Utc>, LedgerError> {
        let cached = cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&block_number)
            .copied();
        if let Some(ts) = cached {
            return Ok(ts);
        }

        let header = self.ledger.get_block(block_number).await?;
        cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(block_number, header.timestamp);
        Ok(header.timestamp)
    }
}

/// Drop repeated (transaction, log index) pairs, keeping first occurrences.
///
/// A trade where the wallet is both sender and receiver matches both role
/// filters.
fn dedup_events(events: Vec<RawTradeEvent>) -> Vec<RawTradeEvent> {
    let mut seen = HashSet::new();
    events
        .into_iter()
        .filter(|e| seen.insert(e.event_key()))
        .collect()
}
