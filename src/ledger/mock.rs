//! Scripted in-memory ledger for testing without network calls.

use super::{BlockHeader, Ledger, LedgerError};
use crate::domain::{BlockRange, EventFilter, EventKind, RawTradeEvent};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

/// Timestamp assigned to blocks without an explicit one: genesis-ish base
/// plus twelve seconds per block.
const SYNTHETIC_BASE_SECS: i64 = 1_438_269_973;
const SYNTHETIC_BLOCK_SECS: i64 = 12;

/// One attempted `query_events` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRecord {
    pub filter: EventFilter,
    pub range: BlockRange,
    pub succeeded: bool,
}

/// Mock ledger that serves predefined events and injects provider failures.
#[derive(Debug)]
pub struct MockLedger {
    latest_block: u64,
    events: Vec<RawTradeEvent>,
    block_timestamps: HashMap<u64, i64>,
    /// Queries spanning more blocks than this fail with `RangeTooLarge`.
    max_span: Option<u64>,
    /// The next N queries fail with `RateLimited`.
    pending_failures: Mutex<usize>,
    connected: bool,
    queries: Mutex<Vec<QueryRecord>>,
    block_lookups: Mutex<Vec<u64>>,
}

impl MockLedger {
    /// Create a mock ledger whose chain head is `latest_block`.
    pub fn new(latest_block: u64) -> Self {
        Self {
            latest_block,
            events: Vec::new(),
            block_timestamps: HashMap::new(),
            max_span: None,
            pending_failures: Mutex::new(0),
            connected: true,
            queries: Mutex::new(Vec::new()),
            block_lookups: Mutex::new(Vec::new()),
        }
    }

    /// Add an event to the mock ledger.
    pub fn with_event(mut self, event: RawTradeEvent) -> Self {
        self.events.push(event);
        self
    }

    /// Add multiple events to the mock ledger.
    pub fn with_events(mut self, events: Vec<RawTradeEvent>) -> Self {
        self.events.extend(events);
        self
    }

    /// Pin a block's timestamp (seconds since epoch).
    pub fn with_block_timestamp(mut self, block_number: u64, unix_secs: i64) -> Self {
        self.block_timestamps.insert(block_number, unix_secs);
        self
    }

    /// Reject queries covering more than `max_span` blocks.
    pub fn with_max_span(mut self, max_span: u64) -> Self {
        self.max_span = Some(max_span);
        self
    }

    /// Fail the next `count` queries with a rate-limit error.
    pub fn with_transient_failures(self, count: usize) -> Self {
        *self.pending_failures.lock().unwrap_or_else(|e| e.into_inner()) = count;
        self
    }

    /// Report the node as unreachable.
    pub fn disconnected(mut self) -> Self {
        self.connected = false;
        self
    }

    /// Every `query_events` attempt so far, in call order.
    pub fn queries(&self) -> Vec<QueryRecord> {
        self.queries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Successful query windows, in call order.
    pub fn successful_ranges(&self) -> Vec<BlockRange> {
        self.queries()
            .into_iter()
            .filter(|q| q.succeeded)
            .map(|q| q.range)
            .collect()
    }

    /// Block numbers passed to `get_block`, in call order.
    pub fn block_lookups(&self) -> Vec<u64> {
        self.block_lookups
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn record(&self, filter: &EventFilter, range: BlockRange, succeeded: bool) {
        self.queries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(QueryRecord {
                filter: filter.clone(),
                range,
                succeeded,
            });
    }

    fn take_injected_failure(&self) -> bool {
        let mut pending = self
            .pending_failures
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if *pending > 0 {
            *pending -= 1;
            true
        } else {
            false
        }
    }

    fn matches(filter: &EventFilter, event: &RawTradeEvent) -> bool {
        let side = match filter {
            EventFilter::Source(_) => event.source_address.as_ref(),
            EventFilter::Destination(_) => event.destination_address.as_ref(),
        };
        side.map(|a| a.matches(filter.address())).unwrap_or(false)
    }
}

#[async_trait]
impl Ledger for MockLedger {
    async fn latest_block(&self) -> Result<u64, LedgerError> {
        Ok(self.latest_block)
    }

    async fn query_events(
        &self,
        _kind: EventKind,
        filter: &EventFilter,
        range: BlockRange,
    ) -> Result<Vec<RawTradeEvent>, LedgerError> {
        if self.take_injected_failure() {
            self.record(filter, range, false);
            return Err(LedgerError::RateLimited);
        }
        if let Some(max_span) = self.max_span {
            if range.len() > max_span {
                self.record(filter, range, false);
                return Err(LedgerError::RangeTooLarge(format!(
                    "block range {} exceeds {} blocks",
                    range, max_span
                )));
            }
        }

        self.record(filter, range, true);
        let mut found: Vec<RawTradeEvent> = self
            .events
            .iter()
            .filter(|e| range.contains(e.block_number) && Self::matches(filter, e))
            .cloned()
            .collect();
        found.sort_by_key(|e| (e.block_number, e.log_index));
        Ok(found)
    }

    async fn get_block(&self, block_number: u64) -> Result<BlockHeader, LedgerError> {
        self.block_lookups
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(block_number);

        let secs = self
            .block_timestamps
            .get(&block_number)
            .copied()
            .unwrap_or(SYNTHETIC_BASE_SECS + block_number as i64 * SYNTHETIC_BLOCK_SECS);
        let timestamp = Utc
            .timestamp_opt(secs, 0)
            .single()
            .ok_or_else(|| LedgerError::ParseError(format!("Invalid timestamp {}", secs)))?;

        Ok(BlockHeader { timestamp })
    }

    async fn is_connected(&self) -> bool {
        self.connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Address, AssetId};

    const WALLET: &str = "0x00000000000000000000000000000000000000aa";
    const OTHER: &str = "0x00000000000000000000000000000000000000bb";

    fn event(block: u64, from: &str, to: &str) -> RawTradeEvent {
        RawTradeEvent {
            transaction_id: format!("0x{:x}", block),
            log_index: 0,
            block_number: block,
            asset_id: Some(AssetId::new(1)),
            source_address: Some(Address::new(from.to_string())),
            destination_address: Some(Address::new(to.to_string())),
            value: Some(1),
        }
    }

    #[tokio::test]
    async fn test_mock_filters_by_role_and_range() {
        let mock = MockLedger::new(100)
            .with_event(event(10, WALLET, OTHER))
            .with_event(event(20, OTHER, WALLET))
            .with_event(event(90, WALLET, OTHER));
        let wallet = Address::new(WALLET.to_string());

        let sold = mock
            .query_events(
                EventKind::PunkBought,
                &EventFilter::Source(wallet.clone()),
                BlockRange::new(0, 50),
            )
            .await
            .unwrap();
        assert_eq!(sold.len(), 1);
        assert_eq!(sold[0].block_number, 10);

        let bought = mock
            .query_events(
                EventKind::PunkBought,
                &EventFilter::Destination(wallet),
                BlockRange::new(0, 100),
            )
            .await
            .unwrap();
        assert_eq!(bought.len(), 1);
        assert_eq!(bought[0].block_number, 20);
    }

    #[tokio::test]
    async fn test_mock_max_span_rejects_wide_queries() {
        let mock = MockLedger::new(100).with_max_span(10);
        let filter = EventFilter::Source(Address::new(WALLET.to_string()));

        let err = mock
            .query_events(EventKind::PunkBought, &filter, BlockRange::new(0, 10))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::RangeTooLarge(_)));
        assert!(mock
            .query_events(EventKind::PunkBought, &filter, BlockRange::new(0, 9))
            .await
            .is_ok());
        assert_eq!(mock.successful_ranges(), vec![BlockRange::new(0, 9)]);
    }

    #[tokio::test]
    async fn test_mock_transient_failures_are_consumed() {
        let mock = MockLedger::new(100).with_transient_failures(2);
        let filter = EventFilter::Source(Address::new(WALLET.to_string()));
        let range = BlockRange::new(0, 1);

        assert!(mock.query_events(EventKind::PunkBought, &filter, range).await.is_err());
        assert!(mock.query_events(EventKind::PunkBought, &filter, range).await.is_err());
        assert!(mock.query_events(EventKind::PunkBought, &filter, range).await.is_ok());
        assert_eq!(mock.queries().len(), 3);
    }

    #[tokio::test]
    async fn test_mock_block_timestamps() {
        let mock = MockLedger::new(100).with_block_timestamp(5, 1_600_000_000);
        let header = mock.get_block(5).await.unwrap();
        assert_eq!(header.timestamp.timestamp(), 1_600_000_000);

        let synthetic = mock.get_block(10).await.unwrap();
        assert_eq!(
            synthetic.timestamp.timestamp(),
            SYNTHETIC_BASE_SECS + 10 * SYNTHETIC_BLOCK_SECS
        );
        assert_eq!(mock.block_lookups(), vec![5, 10]);
    }
}
