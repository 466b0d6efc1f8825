//! Adaptive block-range event fetching.
//!
//! Pages through `[from_block, to_block]` left to right. Every failed window
//! shrinks the step by a factor of ten (never below the floor) and the same
//! cursor is retried; at the floor the fetcher sleeps and retries forever.
//! The only way out of a failing range is the cancellation token.

use crate::domain::{BlockRange, EventFilter, EventKind, RawTradeEvent};
use crate::ledger::{Ledger, LedgerError};
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Factor applied to the step after a failed window.
pub const SHRINK_FACTOR: u64 = 10;

/// Window sizing and retry pacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchConfig {
    pub initial_step: u64,
    pub min_step: u64,
    pub retry_delay: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            initial_step: 1_000_000,
            min_step: 10_000,
            retry_delay: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("fetch cancelled with cursor at block {cursor}")]
    Cancelled { cursor: u64 },
}

/// What the fetcher does after a failed window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureAction {
    /// Step was reduced; retry immediately.
    Shrunk { from: u64, to: u64 },
    /// Step already at the floor; wait before retrying.
    Backoff,
}

/// Position of a ranged fetch: the next block to query, the current window
/// width, and how many consecutive attempts failed at this cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchCursor {
    cursor: u64,
    to_block: u64,
    step: u64,
    min_step: u64,
    attempt: u32,
    exhausted: bool,
}

impl FetchCursor {
    pub fn new(range: BlockRange, initial_step: u64, min_step: u64) -> Self {
        let min_step = min_step.max(1);
        Self {
            cursor: range.from_block,
            to_block: range.to_block,
            step: initial_step.max(min_step),
            min_step,
            attempt: 0,
            exhausted: range.is_empty(),
        }
    }

    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    pub fn step(&self) -> u64 {
        self.step
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn is_done(&self) -> bool {
        self.exhausted
    }

    /// The window to query next, or `None` once the range is covered.
    pub fn next_window(&self) -> Option<BlockRange> {
        if self.exhausted {
            return None;
        }
        let end = self
            .cursor
            .saturating_add(self.step - 1)
            .min(self.to_block);
        Some(BlockRange::new(self.cursor, end))
    }

    /// Advance past a window that was fetched successfully.
    pub fn on_success(&mut self, window: BlockRange) {
        self.attempt = 0;
        match window.to_block.checked_add(1) {
            Some(next) if next <= self.to_block => self.cursor = next,
            _ => self.exhausted = true,
        }
    }

    /// Record a failed window; the cursor stays where it is.
    pub fn on_failure(&mut self) -> FailureAction {
        self.attempt = self.attempt.saturating_add(1);
        if self.step > self.min_step {
            let from = self.step;
            self.step = (self.step / SHRINK_FACTOR).max(self.min_step);
            FailureAction::Shrunk {
                from,
                to: self.step,
            }
        } else {
            FailureAction::Backoff
        }
    }
}

/// Fetches every event in a block range despite provider limits.
#[derive(Debug, Clone, Copy, Default)]
pub struct RangedFetcher {
    config: FetchConfig,
}

impl RangedFetcher {
    pub fn new(config: FetchConfig) -> Self {
        Self { config }
    }

    /// Fetch all events of `kind` matching `filter` within `range`.
    ///
    /// Returns events in block order. Provider errors never escape; the call
    /// ends when the range is covered or `cancel` fires.
    pub async fn fetch_all(
        &self,
        ledger: &dyn Ledger,
        kind: EventKind,
        filter: &EventFilter,
        range: BlockRange,
        cancel: &CancellationToken,
    ) -> Result<Vec<RawTradeEvent>, FetchError> {
        let mut state = FetchCursor::new(range, self.config.initial_step, self.config.min_step);
        let mut events = Vec::new();

        while let Some(window) = state.next_window() {
            if cancel.is_cancelled() {
                return Err(FetchError::Cancelled {
                    cursor: state.cursor(),
                });
            }

            info!(
                "Querying {} {} from block {} to {}",
                kind, filter, window.from_block, window.to_block
            );
            match ledger.query_events(kind, filter, window).await {
                Ok(batch) => {
                    debug!("{} events in {}", batch.len(), window);
                    events.extend(batch);
                    state.on_success(window);
                }
                Err(e) => self.handle_failure(&mut state, kind, &e, cancel).await?,
            }
        }

        Ok(events)
    }

    async fn handle_failure(
        &self,
        state: &mut FetchCursor,
        kind: EventKind,
        error: &LedgerError,
        cancel: &CancellationToken,
    ) -> Result<(), FetchError> {
        warn!("Error fetching {}: {}", kind, error);
        match state.on_failure() {
            FailureAction::Shrunk { from, to } => {
                warn!("Reducing block step from {} to {} and retrying...", from, to);
                Ok(())
            }
            FailureAction::Backoff => {
                warn!(
                    "Retrying with block step {} after {:?} (attempt {})...",
                    state.step(),
                    self.config.retry_delay,
                    state.attempt()
                );
                tokio::select! {
                    _ = cancel.cancelled() => Err(FetchError::Cancelled { cursor: state.cursor() }),
                    _ = tokio::time::sleep(self.config.retry_delay) => Ok(()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_empty_range_is_done() {
        let state = FetchCursor::new(BlockRange::new(10, 9), 100, 10);
        assert!(state.is_done());
        assert_eq!(state.next_window(), None);
    }

    #[test]
    fn test_cursor_windows_tile_range() {
        let mut state = FetchCursor::new(BlockRange::new(0, 250), 100, 10);
        let mut windows = Vec::new();
        while let Some(w) = state.next_window() {
            windows.push(w);
            state.on_success(w);
        }
        assert_eq!(
            windows,
            vec![
                BlockRange::new(0, 99),
                BlockRange::new(100, 199),
                BlockRange::new(200, 250),
            ]
        );
    }

    #[test]
    fn test_failure_shrinks_by_ten_and_keeps_cursor() {
        let mut state = FetchCursor::new(BlockRange::new(500, 10_000), 1_000, 10);
        let before = state.next_window().unwrap();

        assert_eq!(
            state.on_failure(),
            FailureAction::Shrunk { from: 1_000, to: 100 }
        );
        let after = state.next_window().unwrap();
        assert_eq!(after.from_block, before.from_block);
        assert_eq!(after.to_block, 599);
        assert_eq!(state.attempt(), 1);
    }

    #[test]
    fn test_step_floors_at_min_step() {
        let mut state = FetchCursor::new(BlockRange::new(0, 1_000_000), 1_500, 100);
        assert_eq!(state.on_failure(), FailureAction::Shrunk { from: 1_500, to: 150 });
        assert_eq!(state.on_failure(), FailureAction::Shrunk { from: 150, to: 100 });
        assert_eq!(state.on_failure(), FailureAction::Backoff);
        assert_eq!(state.step(), 100);
    }

    #[test]
    fn test_success_resets_attempt_but_not_step() {
        let mut state = FetchCursor::new(BlockRange::new(0, 1_000), 100, 10);
        state.on_failure();
        let w = state.next_window().unwrap();
        state.on_success(w);
        assert_eq!(state.attempt(), 0);
        assert_eq!(state.step(), 10);
        assert_eq!(state.cursor(), 10);
    }

    #[test]
    fn test_initial_step_below_floor_is_raised() {
        let state = FetchCursor::new(BlockRange::new(0, 1_000), 5, 50);
        assert_eq!(state.step(), 50);
    }

    #[test]
    fn test_range_ending_at_u64_max_terminates() {
        let mut state = FetchCursor::new(BlockRange::new(u64::MAX - 5, u64::MAX), 4, 1);
        let mut count = 0;
        while let Some(w) = state.next_window() {
            state.on_success(w);
            count += 1;
        }
        assert_eq!(count, 2);
    }
}
